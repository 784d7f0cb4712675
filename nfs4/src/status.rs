// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Mapping from `nfsstat4` to the POSIX errno a filesystem-abstraction caller expects.

use crate::Nfsstat4;

/// Map an `nfsstat4` to the closest POSIX errno. There isn't always an exact match (several
/// NFSv4-only errors like `StaleClientId` have no POSIX equivalent); those fall back to `EIO`,
/// matching how most NFS clients report protocol-level confusion to applications.
pub fn to_errno(status: Nfsstat4) -> i32 {
    match status {
        Nfsstat4::Ok => 0,
        Nfsstat4::Perm => libc::EPERM,
        Nfsstat4::Noent => libc::ENOENT,
        Nfsstat4::Io => libc::EIO,
        Nfsstat4::Nxio => libc::ENXIO,
        Nfsstat4::Access => libc::EACCES,
        Nfsstat4::Exist => libc::EEXIST,
        Nfsstat4::Xdev => libc::EXDEV,
        Nfsstat4::Notdir => libc::ENOTDIR,
        Nfsstat4::Isdir => libc::EISDIR,
        Nfsstat4::Inval => libc::EINVAL,
        Nfsstat4::Fbig => libc::EFBIG,
        Nfsstat4::Nospc => libc::ENOSPC,
        Nfsstat4::Rofs => libc::EROFS,
        Nfsstat4::Mlink => libc::EMLINK,
        Nfsstat4::NameTooLong => libc::ENAMETOOLONG,
        Nfsstat4::NotEmpty => libc::ENOTEMPTY,
        Nfsstat4::Dquot => libc::EDQUOT,
        Nfsstat4::Stale => libc::ESTALE,
        Nfsstat4::BadHandle => libc::ESTALE,
        Nfsstat4::FhExpired => libc::ESTALE,
        Nfsstat4::BadOwner => libc::EINVAL,
        Nfsstat4::BadChar => libc::EINVAL,
        Nfsstat4::BadName => libc::EINVAL,
        Nfsstat4::Symlink => libc::ELOOP,
        Nfsstat4::ServerFault => libc::EIO,
        Nfsstat4::Delay => libc::EAGAIN,
        Nfsstat4::Grace => libc::EAGAIN,
        Nfsstat4::NoGrace => libc::EAGAIN,
        Nfsstat4::Locked => libc::EACCES,
        Nfsstat4::ShareDenied => libc::EACCES,
        Nfsstat4::Denied => libc::EACCES,
        Nfsstat4::OpenMode => libc::EACCES,
        Nfsstat4::WrongSec => libc::EACCES,
        Nfsstat4::AttrNotSupp => libc::EOPNOTSUPP,
        Nfsstat4::NotSupp => libc::EOPNOTSUPP,
        Nfsstat4::BadType => libc::EINVAL,
        Nfsstat4::BadRange => libc::EINVAL,
        Nfsstat4::LockRange => libc::EINVAL,
        Nfsstat4::LockNotSupp => libc::EOPNOTSUPP,
        Nfsstat4::Deadlock => libc::EDEADLK,
        Nfsstat4::FileOpen => libc::EACCES,
        Nfsstat4::BadCookie => libc::ESPIPE,
        Nfsstat4::TooSmall => libc::ERANGE,
        // Protocol/session-layer errors this client retries or escalates internally rather than
        // surfacing to filesystem callers as a specific errno:
        Nfsstat4::Resource
        | Nfsstat4::Moved
        | Nfsstat4::NoFileHandle
        | Nfsstat4::MinorVersMismatch
        | Nfsstat4::StaleClientId
        | Nfsstat4::StaleStateid
        | Nfsstat4::OldStateid
        | Nfsstat4::BadStateid
        | Nfsstat4::BadSeqid
        | Nfsstat4::NotSame
        | Nfsstat4::Same
        | Nfsstat4::ClidInUse
        | Nfsstat4::RestoreFh
        | Nfsstat4::LeaseMoved
        | Nfsstat4::ReclaimBad
        | Nfsstat4::ReclaimConflict
        | Nfsstat4::BadXdr
        | Nfsstat4::LocksHeld
        | Nfsstat4::OpIllegal
        | Nfsstat4::AdminRevoked
        | Nfsstat4::Expired
        | Nfsstat4::CbPathDown => libc::EIO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_maps_to_zero() {
        assert_eq!(to_errno(Nfsstat4::Ok), 0);
    }

    #[test]
    fn stale_handle_maps_to_estale() {
        assert_eq!(to_errno(Nfsstat4::BadHandle), libc::ESTALE);
    }

    #[test]
    fn file_open_maps_to_eacces() {
        assert_eq!(to_errno(Nfsstat4::FileOpen), libc::EACCES);
    }

    #[test]
    fn bad_cookie_maps_to_espipe() {
        assert_eq!(to_errno(Nfsstat4::BadCookie), libc::ESPIPE);
    }

    #[test]
    fn too_small_maps_to_erange() {
        assert_eq!(to_errno(Nfsstat4::TooSmall), libc::ERANGE);
    }
}
