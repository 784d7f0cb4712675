// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Builds and sends a single NFSv4 COMPOUND, wrapping it in the RPC envelope and pulling the
//! matching reply back off the shared [`Transport`].

use log::*;

use rpc_protocol::transport::{ContextPool, Transport, TransportConfig, TransportError};
use rpc_protocol::{AcceptedReplyBody, CallBody, OpaqueAuth, ReplyBody, RpcMessage, RpcMessageBody};

use nfs4::{ArgOp4, Compound4Args, Compound4Res, Nfsstat4};

use crate::error::Error;

/// The one NFSv4 RPC procedure this client ever calls; NFSv4 folds every filesystem operation
/// into COMPOUND (procedure 1), leaving procedure 0 as the usual RPC no-op ping.
const NFSPROC4_COMPOUND: u32 = 1;
const RPC_VERSION: u32 = 2;

/// Owns the persistent transport and its context pool, and knows how to frame/send/parse one
/// COMPOUND call at a time. Shared (read-only after construction) by every caller issuing
/// compounds: the transport itself is what multiplexes them.
pub struct CompoundExecutor {
    transport: Transport,
    pool: ContextPool,
    program: u32,
    version: u32,
}

impl CompoundExecutor {
    pub fn new(transport_config: TransportConfig, program: u32, version: u32) -> Self {
        let pool = ContextPool::new(&transport_config);
        let transport = Transport::spawn(transport_config);
        CompoundExecutor {
            transport,
            pool,
            program,
            version,
        }
    }

    pub fn wait_for_connection(&self) {
        self.transport.wait_for_connection();
    }

    /// Send one COMPOUND built from `ops` under `cred`, and return the server's parsed
    /// `Compound4Res`. A COMPOUND that the server accepted but whose *operations* failed still
    /// comes back `Ok` here with a non-`Ok` `status` and a truncated `resarray` — it's the
    /// caller's job (the planner) to attribute that back to TC item indices.
    pub fn execute(&self, cred: OpaqueAuth, tag: &str, ops: Vec<ArgOp4>) -> Result<Compound4Res, Error> {
        let _ctx = self.pool.acquire();

        let args = Compound4Args {
            tag: std::ffi::OsString::from(tag),
            minorversion: 0,
            argarray: ops,
        };
        let args_bytes = args.serialize_alloc();

        let program = self.program;
        let version = self.version;

        let handle = loop {
            let args_bytes = args_bytes.clone();
            let cred = cred.clone();
            match self.transport.send_call(move |xid| {
                let msg = RpcMessage {
                    xid,
                    body: RpcMessageBody::Call(CallBody {
                        rpcvers: RPC_VERSION,
                        prog: program,
                        vers: version,
                        proc: NFSPROC4_COMPOUND,
                        cred,
                        verf: OpaqueAuth {
                            flavor: rpc_protocol::AuthFlavor::None,
                            body: Vec::new(),
                        },
                    }),
                };
                let mut buf = msg.serialize_alloc();
                buf.extend_from_slice(&args_bytes);
                buf
            }) {
                Ok(handle) => break handle,
                Err(TransportError::SendFailed) => {
                    debug!("compound send failed, waiting for reconnect before retrying");
                    self.transport.wait_for_connection();
                    continue;
                }
            }
        };

        let (outcome, payload) = self.transport.await_reply(&handle);
        use rpc_protocol::transport::WaitOutcome;
        match outcome {
            WaitOutcome::Delivered => {}
            WaitOutcome::TimedOut | WaitOutcome::Reset => {
                return Err(Error::Transport(outcome));
            }
        }

        let mut rest: &[u8] = &payload;
        let mut reply = RpcMessage::default();
        reply
            .deserialize(&mut rest)
            .map_err(|_| Error::Compound(Nfsstat4::BadXdr))?;

        let RpcMessageBody::Reply(reply_body) = reply.body else {
            return Err(Error::Compound(Nfsstat4::BadXdr));
        };

        let accepted = match reply_body {
            ReplyBody::Accepted(accepted) => accepted,
            ReplyBody::Denied(_) => return Err(Error::Compound(Nfsstat4::BadXdr)),
        };

        match accepted.reply_data {
            AcceptedReplyBody::Success(_) => {}
            other => {
                warn!("COMPOUND rejected at the RPC layer before reaching NFS: {other:?}");
                return Err(Error::Compound(Nfsstat4::BadXdr));
            }
        }

        let mut res = Compound4Res::default();
        res.deserialize(&mut rest)
            .map_err(|_| Error::Compound(Nfsstat4::BadXdr))?;

        Ok(res)
    }
}
