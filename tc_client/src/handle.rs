// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Filehandle resolution and the open-owner/stateid lifecycle: turning a path into a filehandle,
//! opening it for I/O when an operation needs a stateid, and closing it again. Every call here
//! issues its own small COMPOUND; the planner is what fuses these into the larger per-item
//! compounds the batch operations actually send.

use std::sync::atomic::{AtomicU64, Ordering};

use nfs4::{
    ArgOp4, CloseArgs4, CreateAttrs4, GetFhRes4, LookupArgs4, OpenArgs4, OpenConfirmArgs4,
    OpenFlag4, OpenRes4, Owner4, PutFhArgs4, ResOp4, Stateid4, ANONYMOUS_STATEID,
};
use rpc_protocol::OpaqueAuth;

use crate::compound::CompoundExecutor;
use crate::error::Error;

/// Set on `OPEN4res.rflags` (RFC 3530 section 14.2.18) when the server requires an explicit
/// OPEN_CONFIRM before the stateid is usable; mandatory for servers without persistent reply
/// caches, and always honored here regardless.
const OPEN4_RESULT_CONFIRM: u32 = 0x0000_0002;

/// Generates the `open_owner4` this connection presents on every OPEN, one per call so that two
/// concurrent opens on the same client ID never collide on seqid.
pub struct OpenOwnerFactory {
    pid: u32,
    counter: AtomicU64,
}

impl OpenOwnerFactory {
    pub fn new() -> Self {
        OpenOwnerFactory {
            pid: std::process::id(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn next(&self, clientid: u64) -> Owner4 {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Owner4 {
            clientid,
            owner: format!("tc_client: pid={} {}", self.pid, n).into_bytes(),
        }
    }
}

impl Default for OpenOwnerFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve `components` (as produced by [`crate::path::components`]) to a filehandle, starting
/// from the server's root filehandle: `PUTROOTFH, LOOKUP*, GETFH`.
pub fn resolve(
    executor: &CompoundExecutor,
    cred: &OpaqueAuth,
    components: &[&str],
) -> Result<Vec<u8>, Error> {
    let mut ops = vec![ArgOp4::PutRootFh];
    for name in components {
        ops.push(ArgOp4::Lookup(LookupArgs4 {
            objname: std::ffi::OsString::from(*name),
        }));
    }
    ops.push(ArgOp4::GetFh);

    let res = executor.execute(cred.clone(), "resolve", ops)?;
    check_status(&res)?;

    let last = res
        .resarray
        .last()
        .ok_or_else(|| Error::Compound(nfs4::Nfsstat4::BadXdr))?;
    let ResOp4::GetFh(getfh) = last else {
        return Err(Error::Compound(nfs4::Nfsstat4::BadXdr));
    };
    match getfh {
        GetFhRes4::Ok(resok) => Ok(resok.object.clone()),
        other => Err(Error::Compound(status_of_getfh(other))),
    }
}

/// Open `name` within the directory identified by `parent_fh` for I/O, creating it with `mode`
/// first if `create_mode` is set, and running OPEN_CONFIRM when the server demands it. Returns
/// the file's own filehandle and the stateid reads/writes must present.
#[allow(clippy::too_many_arguments)]
pub fn open_for_io(
    executor: &CompoundExecutor,
    cred: &OpaqueAuth,
    owner: Owner4,
    parent_fh: Vec<u8>,
    name: &str,
    create_mode: Option<u32>,
) -> Result<(Vec<u8>, Stateid4), Error> {
    let openhow = match create_mode {
        Some(mode) => OpenFlag4::Create4(CreateAttrs4 { mode }),
        None => OpenFlag4::NoCreate4,
    };

    let ops = vec![
        ArgOp4::PutFh(PutFhArgs4 { object: parent_fh }),
        ArgOp4::Open(OpenArgs4 {
            seqid: 0,
            share_access: OPEN4_SHARE_ACCESS_BOTH,
            share_deny: OPEN4_SHARE_DENY_NONE,
            owner,
            openhow,
            claim_name: std::ffi::OsString::from(name),
        }),
        ArgOp4::GetFh,
    ];

    let res = executor.execute(cred.clone(), "open", ops)?;
    check_status(&res)?;

    let ResOp4::Open(open_res) = &res.resarray[1] else {
        return Err(Error::Compound(nfs4::Nfsstat4::BadXdr));
    };
    let opened = match open_res {
        OpenRes4::Ok(resok) => resok.clone(),
        other => return Err(Error::Compound(status_of_open(other))),
    };

    let ResOp4::GetFh(getfh) = &res.resarray[2] else {
        return Err(Error::Compound(nfs4::Nfsstat4::BadXdr));
    };
    let file_fh = match getfh {
        GetFhRes4::Ok(resok) => resok.object.clone(),
        other => return Err(Error::Compound(status_of_getfh(other))),
    };

    let mut stateid = opened.stateid;
    if opened.rflags & OPEN4_RESULT_CONFIRM != 0 {
        stateid = confirm_open(executor, cred, file_fh.clone(), stateid)?;
    }

    Ok((file_fh, stateid))
}

fn confirm_open(
    executor: &CompoundExecutor,
    cred: &OpaqueAuth,
    fh: Vec<u8>,
    stateid: Stateid4,
) -> Result<Stateid4, Error> {
    let ops = vec![
        ArgOp4::PutFh(PutFhArgs4 { object: fh }),
        ArgOp4::OpenConfirm(OpenConfirmArgs4 {
            open_stateid: stateid,
            // RFC 3530 14.2.18: the OPEN_CONFIRM seqid must be exactly one more than the seqid
            // the OPEN carried; `open_for_io` always sends OPEN with seqid 0.
            seqid: 1,
        }),
    ];

    let res = executor.execute(cred.clone(), "open_confirm", ops)?;
    check_status(&res)?;

    let ResOp4::OpenConfirm(confirm_res) = &res.resarray[1] else {
        return Err(Error::Compound(nfs4::Nfsstat4::BadXdr));
    };
    match confirm_res {
        nfs4::OpenConfirmRes4::Ok(resok) => Ok(resok.open_stateid),
        other => Err(Error::Compound(status_of_open_confirm(other))),
    }
}

/// Close `stateid` on `fh`. A no-op when `stateid` is the all-zero anonymous stateid: this
/// client only ever hands out a real stateid from a confirmed OPEN, so an anonymous one here
/// means the caller never actually opened anything worth closing (e.g. a GETATTR-only path).
pub fn close(
    executor: &CompoundExecutor,
    cred: &OpaqueAuth,
    fh: Vec<u8>,
    stateid: Stateid4,
) -> Result<(), Error> {
    if stateid.other == ANONYMOUS_STATEID.other {
        return Ok(());
    }

    let ops = vec![
        ArgOp4::PutFh(PutFhArgs4 { object: fh }),
        ArgOp4::Close(CloseArgs4 {
            seqid: stateid.seqid,
            open_stateid: stateid,
        }),
    ];

    let res = executor.execute(cred.clone(), "close", ops)?;
    check_status(&res)?;

    let ResOp4::Close(close_res) = &res.resarray[1] else {
        return Err(Error::Compound(nfs4::Nfsstat4::BadXdr));
    };
    match close_res {
        nfs4::CloseRes4::Ok(_) => Ok(()),
        other => Err(Error::Compound(status_of_close(other))),
    }
}

const OPEN4_SHARE_ACCESS_BOTH: u32 = 3;
const OPEN4_SHARE_DENY_NONE: u32 = 0;

fn check_status(res: &nfs4::Compound4Res) -> Result<(), Error> {
    if res.status == nfs4::Nfsstat4::Ok {
        Ok(())
    } else {
        Err(Error::Compound(res.status))
    }
}

fn status_of_getfh(res: &GetFhRes4) -> nfs4::Nfsstat4 {
    match res {
        GetFhRes4::Ok(_) => nfs4::Nfsstat4::Ok,
        GetFhRes4::Default => nfs4::Nfsstat4::ServerFault,
    }
}

fn status_of_open(res: &OpenRes4) -> nfs4::Nfsstat4 {
    match res {
        OpenRes4::Ok(_) => nfs4::Nfsstat4::Ok,
        OpenRes4::Default => nfs4::Nfsstat4::ServerFault,
    }
}

fn status_of_open_confirm(res: &nfs4::OpenConfirmRes4) -> nfs4::Nfsstat4 {
    match res {
        nfs4::OpenConfirmRes4::Ok(_) => nfs4::Nfsstat4::Ok,
        nfs4::OpenConfirmRes4::Default => nfs4::Nfsstat4::ServerFault,
    }
}

fn status_of_close(res: &nfs4::CloseRes4) -> nfs4::Nfsstat4 {
    match res {
        nfs4::CloseRes4::Ok(_) => nfs4::Nfsstat4::Ok,
        nfs4::CloseRes4::Default => nfs4::Nfsstat4::ServerFault,
    }
}
