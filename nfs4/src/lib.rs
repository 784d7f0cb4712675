// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

pub mod attrs;
pub mod status;

include!(concat!(env!("OUT_DIR"), "/nfs4_prot.rs"));

pub use nfs4_prot::*;

/// Every stateid whose `other` field is all zeroes refers to no open state; used for I/O that
/// rides on the implied current-filehandle stateid rather than one returned by OPEN.
pub const ANONYMOUS_STATEID: Stateid4 = Stateid4 {
    seqid: 0,
    other: [0; 12],
};
