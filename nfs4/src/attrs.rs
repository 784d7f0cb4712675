// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Packing and unpacking of `fattr4` values.
//!
//! RFC 3530 attributes are selected with a bitmap (one bit per attribute number, packed into
//! 32-bit words) and carried as a single opaque blob holding each selected attribute's XDR
//! encoding back to back, in ascending attribute-number order. This module only knows about the
//! handful of attributes the TC API surfaces; everything else is out of scope for this layer (see
//! the filesystem-abstraction layer this client assumes, not implements).

use crate::{Fattr4, NfsFtype4, Nfstime4};

pub const FATTR4_TYPE: u32 = 1;
pub const FATTR4_SIZE: u32 = 4;
pub const FATTR4_FILEID: u32 = 20;
pub const FATTR4_MODE: u32 = 33;
pub const FATTR4_NUMLINKS: u32 = 35;
pub const FATTR4_OWNER: u32 = 36;
pub const FATTR4_OWNER_GROUP: u32 = 37;
pub const FATTR4_TIME_ACCESS: u32 = 47;
pub const FATTR4_TIME_ACCESS_SET: u32 = 48;
pub const FATTR4_TIME_MODIFY: u32 = 51;
pub const FATTR4_TIME_MODIFY_SET: u32 = 54;

fn bitmap_set(bitmap: &mut Vec<u32>, attr: u32) {
    let word = (attr / 32) as usize;
    if bitmap.len() <= word {
        bitmap.resize(word + 1, 0);
    }
    bitmap[word] |= 1 << (attr % 32);
}

fn bitmap_test(bitmap: &[u32], attr: u32) -> bool {
    let word = (attr / 32) as usize;
    bitmap
        .get(word)
        .is_some_and(|w| w & (1 << (attr % 32)) != 0)
}

/// The subset of NFSv4 file attributes this client reads and writes. `None` means "don't touch"
/// on a SETATTR, or "wasn't requested" on a GETATTR reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenericAttr {
    pub file_type: Option<NfsFtype4>,
    pub size: Option<u64>,
    pub mode: Option<u32>,
    pub numlinks: Option<u32>,
    pub fileid: Option<u64>,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub time_access: Option<Nfstime4>,
    pub time_modify: Option<Nfstime4>,
}

impl GenericAttr {
    /// An attribute set naming every attribute this layer understands, for a GETATTR that wants
    /// whatever the server has rather than a specific subset. Values are placeholders; only
    /// `request_bitmap`'s use of `is_some()` cares that they're populated.
    pub fn all() -> Self {
        GenericAttr {
            file_type: Some(NfsFtype4::Reg),
            size: Some(0),
            mode: Some(0),
            numlinks: Some(0),
            fileid: Some(0),
            owner: Some(String::new()),
            group: Some(String::new()),
            time_access: Some(Nfstime4 { seconds: 0, nseconds: 0 }),
            time_modify: Some(Nfstime4 { seconds: 0, nseconds: 0 }),
        }
    }

    /// Build the request bitmap for a GETATTR naming exactly the attributes set in `self`
    /// (values are ignored; only presence of `Some` matters).
    pub fn request_bitmap(&self) -> Vec<u32> {
        let mut bitmap = Vec::new();
        if self.file_type.is_some() {
            bitmap_set(&mut bitmap, FATTR4_TYPE);
        }
        if self.size.is_some() {
            bitmap_set(&mut bitmap, FATTR4_SIZE);
        }
        if self.mode.is_some() {
            bitmap_set(&mut bitmap, FATTR4_MODE);
        }
        if self.numlinks.is_some() {
            bitmap_set(&mut bitmap, FATTR4_NUMLINKS);
        }
        if self.fileid.is_some() {
            bitmap_set(&mut bitmap, FATTR4_FILEID);
        }
        if self.owner.is_some() {
            bitmap_set(&mut bitmap, FATTR4_OWNER);
        }
        if self.group.is_some() {
            bitmap_set(&mut bitmap, FATTR4_OWNER_GROUP);
        }
        if self.time_access.is_some() {
            bitmap_set(&mut bitmap, FATTR4_TIME_ACCESS);
        }
        if self.time_modify.is_some() {
            bitmap_set(&mut bitmap, FATTR4_TIME_MODIFY);
        }
        bitmap
    }

    /// Encode `self` into an `fattr4` suitable for a SETATTR argument. Attributes that are `None`
    /// are omitted.
    pub fn encode(&self) -> Fattr4 {
        let mut bitmap = Vec::new();
        let mut vals = Vec::new();

        // Attribute numbers must appear in the value blob in ascending order.
        if let Some(ref ty) = self.file_type {
            bitmap_set(&mut bitmap, FATTR4_TYPE);
            vals.extend_from_slice(&(ftype_to_wire(ty)).to_be_bytes());
        }
        if let Some(size) = self.size {
            bitmap_set(&mut bitmap, FATTR4_SIZE);
            vals.extend_from_slice(&size.to_be_bytes());
        }
        if let Some(fileid) = self.fileid {
            bitmap_set(&mut bitmap, FATTR4_FILEID);
            vals.extend_from_slice(&fileid.to_be_bytes());
        }
        if let Some(mode) = self.mode {
            bitmap_set(&mut bitmap, FATTR4_MODE);
            vals.extend_from_slice(&mode.to_be_bytes());
        }
        if let Some(numlinks) = self.numlinks {
            bitmap_set(&mut bitmap, FATTR4_NUMLINKS);
            vals.extend_from_slice(&numlinks.to_be_bytes());
        }
        if let Some(ref owner) = self.owner {
            bitmap_set(&mut bitmap, FATTR4_OWNER);
            encode_string(&mut vals, owner);
        }
        if let Some(ref group) = self.group {
            bitmap_set(&mut bitmap, FATTR4_OWNER_GROUP);
            encode_string(&mut vals, group);
        }
        // atime/mtime are writable only under their `_SET` attribute numbers, encoded as a
        // `settime4` (a `time_how4` discriminant ahead of the `nfstime4`, RFC 3530 section 7.3) —
        // the plain FATTR4_TIME_ACCESS/FATTR4_TIME_MODIFY numbers this type also uses for GETATTR
        // decoding are read-only and rejected by SETATTR.
        if let Some(ref t) = self.time_access {
            bitmap_set(&mut bitmap, FATTR4_TIME_ACCESS_SET);
            encode_settime(&mut vals, t);
        }
        if let Some(ref t) = self.time_modify {
            bitmap_set(&mut bitmap, FATTR4_TIME_MODIFY_SET);
            encode_settime(&mut vals, t);
        }

        Fattr4 {
            attrmask: bitmap,
            attr_vals: vals,
        }
    }

    /// Decode an `fattr4` received from GETATTR or a READDIR entry into the subset of attributes
    /// this client understands. Unrecognized bits in the mask are silently ignored.
    pub fn decode(attr: &Fattr4) -> Self {
        let mut out = GenericAttr::default();
        let mut rest = attr.attr_vals.as_slice();

        // Must walk bits in ascending attribute-number order: that's the order values were packed.
        let highest_word = attr.attrmask.len();
        for word in 0..highest_word {
            for bit in 0..32 {
                let attr_num = (word * 32 + bit) as u32;
                if !bitmap_test(&attr.attrmask, attr_num) {
                    continue;
                }
                match attr_num {
                    FATTR4_TYPE => {
                        let Some((raw, tail)) = take_u32(rest) else {
                            return out;
                        };
                        out.file_type = ftype_from_wire(raw);
                        rest = tail;
                    }
                    FATTR4_SIZE => {
                        let Some((v, tail)) = take_u64(rest) else {
                            return out;
                        };
                        out.size = Some(v);
                        rest = tail;
                    }
                    FATTR4_FILEID => {
                        let Some((v, tail)) = take_u64(rest) else {
                            return out;
                        };
                        out.fileid = Some(v);
                        rest = tail;
                    }
                    FATTR4_MODE => {
                        let Some((v, tail)) = take_u32(rest) else {
                            return out;
                        };
                        out.mode = Some(v);
                        rest = tail;
                    }
                    FATTR4_NUMLINKS => {
                        let Some((v, tail)) = take_u32(rest) else {
                            return out;
                        };
                        out.numlinks = Some(v);
                        rest = tail;
                    }
                    FATTR4_OWNER => {
                        let Some((v, tail)) = take_string(rest) else {
                            return out;
                        };
                        out.owner = Some(v);
                        rest = tail;
                    }
                    FATTR4_OWNER_GROUP => {
                        let Some((v, tail)) = take_string(rest) else {
                            return out;
                        };
                        out.group = Some(v);
                        rest = tail;
                    }
                    FATTR4_TIME_ACCESS => {
                        let Some((v, tail)) = take_time(rest) else {
                            return out;
                        };
                        out.time_access = Some(v);
                        rest = tail;
                    }
                    FATTR4_TIME_MODIFY => {
                        let Some((v, tail)) = take_time(rest) else {
                            return out;
                        };
                        out.time_modify = Some(v);
                        rest = tail;
                    }
                    // An attribute we didn't request but the server sent anyway (or one this
                    // layer doesn't know the width of): there's no way to skip it correctly, so
                    // stop decoding rather than risk misaligning the rest of the blob.
                    _ => return out,
                }
            }
        }

        out
    }
}

fn ftype_to_wire(ty: &NfsFtype4) -> u32 {
    match ty {
        NfsFtype4::Reg => 1,
        NfsFtype4::Dir => 2,
        NfsFtype4::Blk => 3,
        NfsFtype4::Chr => 4,
        NfsFtype4::Lnk => 5,
        NfsFtype4::Sock => 6,
        NfsFtype4::Fifo => 7,
    }
}

fn ftype_from_wire(v: u32) -> Option<NfsFtype4> {
    match v {
        1 => Some(NfsFtype4::Reg),
        2 => Some(NfsFtype4::Dir),
        3 => Some(NfsFtype4::Blk),
        4 => Some(NfsFtype4::Chr),
        5 => Some(NfsFtype4::Lnk),
        6 => Some(NfsFtype4::Sock),
        7 => Some(NfsFtype4::Fifo),
        _ => None,
    }
}

fn encode_time(vals: &mut Vec<u8>, t: &Nfstime4) {
    vals.extend_from_slice(&t.seconds.to_be_bytes());
    vals.extend_from_slice(&t.nseconds.to_be_bytes());
}

/// `SET_TO_CLIENT_TIME4`, the only `time_how4` discriminant this client ever sends — it always
/// carries an explicit value to set, never asks the server to stamp its own clock.
const SET_TO_CLIENT_TIME4: u32 = 1;

fn encode_settime(vals: &mut Vec<u8>, t: &Nfstime4) {
    vals.extend_from_slice(&SET_TO_CLIENT_TIME4.to_be_bytes());
    encode_time(vals, t);
}

fn encode_string(vals: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    vals.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    vals.extend_from_slice(bytes);
    let padding = (4 - bytes.len() % 4) % 4;
    vals.extend(std::iter::repeat(0u8).take(padding));
}

fn take_u32(b: &[u8]) -> Option<(u32, &[u8])> {
    if b.len() < 4 {
        return None;
    }
    let (head, tail) = b.split_at(4);
    Some((u32::from_be_bytes(head.try_into().unwrap()), tail))
}

fn take_u64(b: &[u8]) -> Option<(u64, &[u8])> {
    if b.len() < 8 {
        return None;
    }
    let (head, tail) = b.split_at(8);
    Some((u64::from_be_bytes(head.try_into().unwrap()), tail))
}

fn take_string(b: &[u8]) -> Option<(String, &[u8])> {
    let (len, b) = take_u32(b)?;
    let len = len as usize;
    if b.len() < len {
        return None;
    }
    let (data, b) = b.split_at(len);
    let padding = (4 - len % 4) % 4;
    if b.len() < padding {
        return None;
    }
    Some((String::from_utf8_lossy(data).into_owned(), &b[padding..]))
}

fn take_time(b: &[u8]) -> Option<(Nfstime4, &[u8])> {
    let (seconds, b) = take_u64(b)?;
    let (nseconds, b) = take_u32(b)?;
    Some((
        Nfstime4 {
            seconds: seconds as i64,
            nseconds,
        },
        b,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_size_and_mode() {
        let attr = GenericAttr {
            size: Some(4096),
            mode: Some(0o644),
            ..Default::default()
        };

        let encoded = attr.encode();
        let decoded = GenericAttr::decode(&encoded);

        assert_eq!(decoded.size, Some(4096));
        assert_eq!(decoded.mode, Some(0o644));
        assert_eq!(decoded.file_type, None);
    }

    #[test]
    fn round_trips_owner_and_group() {
        let attr = GenericAttr {
            owner: Some("alice".to_string()),
            group: Some("staff".to_string()),
            ..Default::default()
        };

        let encoded = attr.encode();
        assert!(bitmap_test(&encoded.attrmask, FATTR4_OWNER));
        assert!(bitmap_test(&encoded.attrmask, FATTR4_OWNER_GROUP));

        let decoded = GenericAttr::decode(&encoded);
        assert_eq!(decoded.owner, Some("alice".to_string()));
        assert_eq!(decoded.group, Some("staff".to_string()));
    }

    #[test]
    fn setattr_time_uses_set_attribute_numbers_and_settime4_framing() {
        let attr = GenericAttr {
            time_modify: Some(Nfstime4 {
                seconds: 1700000000,
                nseconds: 0,
            }),
            ..Default::default()
        };

        let encoded = attr.encode();
        assert!(bitmap_test(&encoded.attrmask, FATTR4_TIME_MODIFY_SET));
        assert!(!bitmap_test(&encoded.attrmask, FATTR4_TIME_MODIFY));

        // settime4: a 4-byte time_how4 discriminant (SET_TO_CLIENT_TIME4) ahead of the nfstime4.
        let discriminant = u32::from_be_bytes(encoded.attr_vals[0..4].try_into().unwrap());
        assert_eq!(discriminant, SET_TO_CLIENT_TIME4);
        let seconds = i64::from_be_bytes(encoded.attr_vals[4..12].try_into().unwrap());
        assert_eq!(seconds, 1700000000);
    }

    #[test]
    fn request_bitmap_matches_requested_fields() {
        let attr = GenericAttr {
            file_type: Some(NfsFtype4::Dir),
            time_modify: Some(Nfstime4 {
                seconds: 0,
                nseconds: 0,
            }),
            ..Default::default()
        };

        let bitmap = attr.request_bitmap();
        assert!(bitmap_test(&bitmap, FATTR4_TYPE));
        assert!(bitmap_test(&bitmap, FATTR4_TIME_MODIFY));
        assert!(!bitmap_test(&bitmap, FATTR4_SIZE));
    }
}
