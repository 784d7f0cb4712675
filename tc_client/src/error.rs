// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::fmt;

use nfs4::Nfsstat4;

/// Everything that can go wrong executing a single op within a compound, before it is folded into
/// a [`crate::planner::TcStatus`] for the caller.
#[derive(Debug)]
pub enum Error {
    /// The transport could not deliver the call at all: connection reset mid-wait, or the
    /// context pool/transport were torn down.
    Transport(rpc_protocol::transport::WaitOutcome),

    /// The RPC layer rejected the call (bad auth, version mismatch, garbage args) before NFS ever
    /// saw it.
    Rpc(rpc_protocol::Error),

    /// The COMPOUND as a whole was rejected by the server at an NFS4ERR_OP_ILLEGAL /
    /// NFS4ERR_BADXDR level, with no op index to blame.
    Compound(Nfsstat4),

    /// A specific op within the compound failed; `index` is its position in the TC-level item
    /// array (not the raw op array, which has extra PUTFH/LOOKUP/CLOSE bookkeeping ops spliced
    /// in).
    Op { index: usize, status: Nfsstat4 },

    /// The lease keeper could not obtain or renew a client ID.
    Lease(Nfsstat4),

    /// A TC batch item referred to a path that could not be decomposed into lookup components
    /// (e.g. contained an embedded NUL).
    InvalidPath,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(outcome) => write!(f, "transport error: {outcome:?}"),
            Self::Rpc(e) => write!(f, "RPC error: {e}"),
            Self::Compound(status) => write!(f, "COMPOUND rejected: {status:?}"),
            Self::Op { index, status } => write!(f, "operation {index} failed: {status:?}"),
            Self::Lease(status) => write!(f, "client-id/lease error: {status:?}"),
            Self::InvalidPath => write!(f, "invalid path in TC item"),
        }
    }
}

impl std::error::Error for Error {}

/// Convert a failure to the errno a filesystem-abstraction caller would expect from it. Errors
/// that never reached the NFS layer (transport resets, RPC rejections) are reported as `EIO`,
/// matching how POSIX filesystem calls report severed server connections.
pub fn to_errno(err: &Error) -> i32 {
    match err {
        Error::Transport(_) | Error::Rpc(_) | Error::Compound(_) | Error::InvalidPath => libc::EIO,
        Error::Op { status, .. } => nfs4::status::to_errno(*status),
        Error::Lease(status) => nfs4::status::to_errno(*status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_errors_use_the_nfs_status_table() {
        let err = Error::Op {
            index: 2,
            status: Nfsstat4::Noent,
        };
        assert_eq!(to_errno(&err), libc::ENOENT);
        assert!(format!("{err}").contains("operation 2 failed"));
    }

    #[test]
    fn pre_nfs_errors_fall_back_to_eio() {
        assert_eq!(
            to_errno(&Error::Transport(rpc_protocol::transport::WaitOutcome::Reset)),
            libc::EIO
        );
        assert_eq!(to_errno(&Error::InvalidPath), libc::EIO);
    }

    #[test]
    fn lease_errors_use_the_nfs_status_table() {
        let err = Error::Lease(Nfsstat4::Expired);
        assert_eq!(to_errno(&err), nfs4::status::to_errno(Nfsstat4::Expired));
    }
}
