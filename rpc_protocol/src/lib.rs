// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

pub mod transport;

use log::*;

use std::fmt;

include!(concat!(env!("OUT_DIR"), "/rpc_prot.rs"));

pub use rpc_prot::{
    AcceptedReply, AcceptedReplyBody, AuthFlavor, AuthStat, CallBody, OpaqueAuth, ProgMismatchBody,
    RejectedReply, ReplyBody, RpcMessage, RpcMessageBody,
};

/// Only supported version of the RPC Protocol
const RPC_VERSION: u32 = 2;

/// The possible errors that can arise from trying to read or write an RPC call or reply.
#[derive(Debug)]
pub enum Error {
    /// Protocol errors are always returned by the RPC server implementation before
    /// even invoking procedure-specific code.
    Protocol(ProtocolError),

    /// Some RPC errors are returned by the server implementation (for example, unknown procedure),
    /// and some are returned by the procedure implementation (for example garbage args, or
    /// internal error like ENOMEM).
    ///
    // XXX: would it make sense to separate out the library-generated and user-generated errors
    // into separate variants?
    Rpc(ReplyBody),

    /// Errors returned by I/O failures.
    Io(std::io::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Protocol(e) => write!(f, "Protocol error: {e}"),
            Self::Rpc(e) => write!(f, "RPC error: {e:?}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[derive(Debug)]
pub enum ProtocolError {
    /// Generic decoding error:
    Decode,

    /// Received a fragmented message. TODO: once support for message fragments is included, this
    /// variant can be removed.
    MessageFragment,

    /// Message auth type is not supported by this library:
    UnsupportedAuth,

    /// Message's RPC Version was not 2 (only support version):
    WrongRpcVersion,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Decode => "Error decoding",
                Self::MessageFragment => "Received a fragmented message",
                Self::UnsupportedAuth => "Unsupported authorization mechanism",
                Self::WrongRpcVersion => "Only RPC Protocol version 2 is supported",
            }
        )
    }
}

/// A `call` holds the data needed to respond to an RPC call.
#[derive(Debug)]
pub struct Call<'a> {
    xid: u32,
    inner: CallBody,

    /// The call's encoded argument.
    pub arg: &'a [u8],
}

impl Call<'_> {
    /// Transaction ID of this call.
    pub fn get_xid(&self) -> u32 {
        self.xid
    }

    /// Program number, e.g., 10005 for NFS v3.
    pub fn get_program(&self) -> u32 {
        self.inner.prog
    }

    /// Version number, e.g., 3 for NFS v3.
    pub fn get_version(&self) -> u32 {
        self.inner.vers
    }

    /// Procedure number, e.g., 1 for GETATTR in NFS v3.
    pub fn get_procedure(&self) -> u32 {
        self.inner.proc
    }

    /// Credential
    pub fn get_credential(&self) -> &OpaqueAuth {
        &self.inner.cred
    }
}

/// Given an encoded RPC call in `data` (including both the call header and the encoded arguments),
/// tries to decode the call and returns either:
///
///   - Ok(_): the succesfully decoded call and a slice containing the argument
///   - Err(_): an error that occurred while trying to decode the call
///
/// The caller is expected to provide a complete RPC call record without the record mark prefix (if
/// present). If the caller is using a transport layer that uses record marking, like TCP, the
/// caller must handle decoding the record mark and reading a cmplete record. Passing a record that
/// is too short is returned as a decoding error.
pub fn decode_call(data: &[u8]) -> Result<Call<'_>, ProtocolError> {
    let mut message = RpcMessage::default();
    let mut rest = data;

    if let Err(e) = message.deserialize(&mut rest) {
        warn!("Error deserializing message: {e}");
        todo!();
    }

    let RpcMessageBody::Call(call) = message.body else {
        return Err(ProtocolError::Decode);
    };

    debug!(
        "recieved CALL for program {}, version {}, procedure {}, argument length {} bytes",
        call.prog,
        call.vers,
        call.proc,
        rest.len(),
    );

    if call.rpcvers != RPC_VERSION {
        debug!("CALL with unexpected RPC version: {}", call.rpcvers);
        return Err(ProtocolError::WrongRpcVersion);
    };

    Ok(Call {
        xid: message.xid,
        inner: call,
        arg: rest,
    })
}

/// Given a buffer that contains an encoded message, prefaced by a dummy record mark, update that
/// record mark based on the actual length of the message.
fn update_record_mark(buf: &mut [u8]) {
    // size of message, not including the 4 bytes for the record mark itself:
    let message_size = u32::try_from(buf.len() - 4).unwrap();
    let record_mark: u32 = message_size | (1 << 31);
    buf[..4].copy_from_slice(&record_mark.to_be_bytes());
}

impl OpaqueAuth {
    /// Build an AUTH_SYS (né AUTH_UNIX) credential: RFC 5531 section 9.2.
    ///
    /// `gids` is truncated to 16 entries, the maximum the protocol allows.
    pub fn unix(stamp: u32, machinename: &str, uid: u32, gid: u32, gids: &[u32]) -> Self {
        let gids = &gids[..gids.len().min(16)];

        let mut body = Vec::with_capacity(16 + machinename.len() + gids.len() * 4);
        body.extend_from_slice(&stamp.to_be_bytes());

        body.extend_from_slice(&(machinename.len() as u32).to_be_bytes());
        body.extend_from_slice(machinename.as_bytes());
        let padding = (4 - machinename.len() % 4) % 4;
        body.extend_from_slice(&vec![0; padding]);

        body.extend_from_slice(&uid.to_be_bytes());
        body.extend_from_slice(&gid.to_be_bytes());

        body.extend_from_slice(&(gids.len() as u32).to_be_bytes());
        for g in gids {
            body.extend_from_slice(&g.to_be_bytes());
        }

        OpaqueAuth {
            flavor: AuthFlavor::Sys,
            body,
        }
    }
}

/// Returns a buffer with space for a record mark already allocated, but a dummy value (0) encoded
/// since the length of the message isn't known yet.
fn buf_with_dummy_record_mark() -> Vec<u8> {
    vec![0, 0, 0, 0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_auth_unix_layout() {
        let auth = OpaqueAuth::unix(42, "host", 1000, 100, &[1, 2, 3]);
        assert_eq!(auth.flavor, AuthFlavor::Sys);

        let body = &auth.body;
        assert_eq!(&body[0..4], &42u32.to_be_bytes());
        assert_eq!(&body[4..8], &4u32.to_be_bytes());
        assert_eq!(&body[8..12], b"host");
        // "host" is already a multiple of 4 bytes, so no padding follows.
        assert_eq!(&body[12..16], &1000u32.to_be_bytes());
        assert_eq!(&body[16..20], &100u32.to_be_bytes());
        assert_eq!(&body[20..24], &3u32.to_be_bytes());
        assert_eq!(&body[24..28], &1u32.to_be_bytes());
        assert_eq!(&body[28..32], &2u32.to_be_bytes());
        assert_eq!(&body[32..36], &3u32.to_be_bytes());
    }

    #[test]
    fn opaque_auth_unix_truncates_gids() {
        let many: Vec<u32> = (0..32).collect();
        let auth = OpaqueAuth::unix(0, "", 0, 0, &many);
        let count = u32::from_be_bytes(auth.body[12..16].try_into().unwrap());
        assert_eq!(count, 16);
    }
}

/// An "pipe", constructed using socketpair(2), that can be used for testing client and
/// server behavior.
pub mod pipe {
    use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};

    pub struct Endpoint {
        fd: std::os::fd::OwnedFd,
    }

    pub fn pipe() -> std::io::Result<(Endpoint, Endpoint)> {
        let (a, b) = socketpair(
            AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::empty(),
        )?;

        Ok((Endpoint { fd: a }, Endpoint { fd: b }))
    }

    impl std::io::Read for Endpoint {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            Ok(nix::unistd::read(&self.fd, buf)?)
        }
    }

    impl std::io::Write for Endpoint {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(nix::unistd::write(&self.fd, buf)?)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
