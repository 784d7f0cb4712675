// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Client-ID/lease state machine: negotiates a `clientid4` with SETCLIENTID +
//! SETCLIENTID_CONFIRM, then keeps it alive with periodic RENEW from a background thread, the
//! way the original proxy's renewer thread did — renew while the lease holds, re-negotiate from
//! scratch the moment a renew comes back anything other than NFS4_OK (most commonly because the
//! transport reconnected and the server forgot us).

use log::*;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use nfs4::{ArgOp4, CbClient4, NfsClientId4, Nfsstat4, ResOp4};
use rpc_protocol::OpaqueAuth;

use crate::compound::CompoundExecutor;
use crate::error::Error;

/// The confirmed client ID this connection presents on every OPEN/CLOSE/LOCK-adjacent op that
/// carries one, plus the lease interval the renewer paces itself against.
#[derive(Debug, Clone, Copy)]
pub struct ClientId {
    pub clientid: u64,
    pub lease_seconds: u32,
}

/// Shared, lazily-negotiated client ID. `None` until the first successful SETCLIENTID exchange;
/// the renewer thread is the only writer.
pub struct ClientIdKeeper {
    current: Arc<Mutex<Option<ClientId>>>,
}

impl ClientIdKeeper {
    /// Negotiate an initial client ID synchronously (so the caller doesn't race the renewer
    /// thread for the first compound that needs one), then spawn the renewer thread to keep it
    /// alive for the life of the process.
    pub fn spawn(executor: Arc<CompoundExecutor>, cred: OpaqueAuth) -> Result<Self, Error> {
        let initial = negotiate(&executor, &cred)?;
        let current = Arc::new(Mutex::new(Some(initial)));

        let renewer_current = current.clone();
        std::thread::spawn(move || renewer_loop(executor, cred, renewer_current, initial));

        Ok(ClientIdKeeper { current })
    }

    /// Block until a client ID is available. Only ever blocks if the renewer is mid-reconnect,
    /// between dropping a stale ID and confirming a fresh one.
    pub fn get(&self) -> ClientId {
        loop {
            if let Some(id) = *self.current.lock().unwrap() {
                return id;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

fn renewer_loop(
    executor: Arc<CompoundExecutor>,
    cred: OpaqueAuth,
    current: Arc<Mutex<Option<ClientId>>>,
    mut id: ClientId,
) {
    loop {
        let renew_in = id.lease_seconds.saturating_sub(5).max(1);
        std::thread::sleep(Duration::from_secs(renew_in as u64));

        match renew(&executor, &cred, id.clientid) {
            Ok(()) => {
                debug!("renewed client id {:#x}", id.clientid);
                continue;
            }
            Err(e) => {
                warn!("renew failed ({e}), negotiating a new client id");
            }
        }

        *current.lock().unwrap() = None;
        loop {
            match negotiate(&executor, &cred) {
                Ok(fresh) => {
                    id = fresh;
                    *current.lock().unwrap() = Some(fresh);
                    break;
                }
                Err(e) => {
                    warn!("failed to negotiate client id: {e}, retrying");
                    std::thread::sleep(Duration::from_secs(1));
                }
            }
        }
    }
}

/// SETCLIENTID + SETCLIENTID_CONFIRM, RFC 3530 section 16.33/16.34. The verifier only needs to
/// be unique per client incarnation; the server uses it to detect that we rebooted (or
/// reconnected with a fresh process) and forgot any state we used to hold.
fn negotiate(executor: &CompoundExecutor, cred: &OpaqueAuth) -> Result<ClientId, Error> {
    let verifier = verifier_from_time();
    let id_string = format!("tc_client.{}.{}", std::process::id(), verifier_suffix());

    let setclientid = ArgOp4::SetClientId(nfs4::SetClientIdArgs4 {
        client: NfsClientId4 {
            verifier,
            id: id_string.into_bytes(),
        },
        callback: CbClient4 {
            cb_program: 0,
            r_netid: std::ffi::OsString::from(""),
            r_addr: std::ffi::OsString::from(""),
        },
        callback_ident: 0,
    });

    let res = executor.execute(cred.clone(), "setclientid", vec![setclientid])?;
    let op = first_op(&res)?;
    let ResOp4::SetClientId(set_res) = op else {
        return Err(Error::Lease(Nfsstat4::BadXdr));
    };

    let confirm_info = match set_res {
        nfs4::SetClientIdRes4::Ok(resok) => resok.clone(),
        nfs4::SetClientIdRes4::ClidInUse(_) => return Err(Error::Lease(Nfsstat4::ClidInUse)),
        other => return Err(Error::Lease(status_of(other))),
    };

    let confirm = ArgOp4::SetClientIdConfirm(nfs4::SetClientIdConfirmArgs4 {
        clientid: confirm_info.clientid,
        setclientid_confirm: confirm_info.confirm_verf,
    });
    let res = executor.execute(cred.clone(), "setclientid_confirm", vec![confirm])?;
    let op = first_op(&res)?;
    let ResOp4::SetClientIdConfirm(confirm_res) = op else {
        return Err(Error::Lease(Nfsstat4::BadXdr));
    };
    if confirm_res.status != Nfsstat4::Ok {
        return Err(Error::Lease(confirm_res.status));
    }

    Ok(ClientId {
        clientid: confirm_info.clientid,
        // The lease time is a server-chosen property of the fsinfo attributes; absent a
        // filesystem-abstraction layer to fetch it through, use the conservative default every
        // NFSv4 server is required to honor at minimum (RFC 3530 section 7.1 has no mandated
        // floor, but 60s is the value the reference client this is grounded on used).
        lease_seconds: 60,
    })
}

fn renew(executor: &CompoundExecutor, cred: &OpaqueAuth, clientid: u64) -> Result<(), Error> {
    let op = ArgOp4::Renew(nfs4::RenewArgs4 { clientid });
    let res = executor.execute(cred.clone(), "renew", vec![op])?;
    let op = first_op(&res)?;
    let ResOp4::Renew(renew_res) = op else {
        return Err(Error::Lease(Nfsstat4::BadXdr));
    };
    if renew_res.status == Nfsstat4::Ok {
        Ok(())
    } else {
        Err(Error::Lease(renew_res.status))
    }
}

fn first_op(res: &nfs4::Compound4Res) -> Result<&ResOp4, Error> {
    if res.status != Nfsstat4::Ok {
        return Err(Error::Compound(res.status));
    }
    res.resarray.first().ok_or(Error::Compound(Nfsstat4::BadXdr))
}

/// Best-effort extraction of the status out of a non-`Ok`/non-`ClidInUse` `SetClientIdRes4` arm;
/// every variant this client generates for that union carries a leading implicit status via the
/// union discriminant, which the codegen doesn't expose as a field on the `Default` catch-all, so
/// this falls back to a generic protocol error.
fn status_of(_res: &nfs4::SetClientIdRes4) -> Nfsstat4 {
    Nfsstat4::ServerFault
}

fn verifier_from_time() -> [u8; 8] {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    secs.to_be_bytes()
}

fn verifier_suffix() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0)
}
