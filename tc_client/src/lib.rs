// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! A user-space NFSv4 client built around the "transactional compound" (TC) API: callers submit
//! vectors of file operations (read, write, getattr, setattr, mkdir, rename, remove, open-for-read)
//! which this crate packs into NFSv4 COMPOUND RPCs and fires over one persistent, multiplexed TCP
//! connection.
//!
//! This crate does not implement a filesystem-abstraction layer, the XDR codec for NFSv4 types
//! (that lives in the sibling `nfs4` crate, generated by `xdr_codegen`), pNFS layout-file mounts,
//! or an NFSv2/v3 handle-mapping shim — those are assumed collaborators, not built here.

pub mod client_id;
pub mod compound;
pub mod config;
pub mod error;
pub mod handle;
pub mod path;
pub mod planner;

use std::sync::Arc;

use rpc_protocol::OpaqueAuth;

pub use config::ClientConfig;
pub use error::Error;
pub use planner::{TcFile, TcStatus};

use client_id::ClientIdKeeper;
use compound::CompoundExecutor;
use planner::Planner;

/// A connected TC client: one persistent transport, one negotiated client ID kept alive by a
/// background renewer thread, and the batch planner that turns TC vectors into COMPOUNDs.
pub struct Client {
    planner: Planner,
}

impl Client {
    /// Connect to the server named in `config`, run the initial SETCLIENTID/SETCLIENTID_CONFIRM
    /// exchange, and start the lease renewer. Blocks until the transport's first connection
    /// attempt and the initial client-id negotiation both succeed.
    pub fn connect(config: ClientConfig) -> Result<Self, Error> {
        let cred = OpaqueAuth::unix(std::process::id(), "", 0, 0, &[]);

        let executor = Arc::new(CompoundExecutor::new(
            config.transport_config(),
            config.rpc_program_number,
            config.rpc_program_version,
        ));
        executor.wait_for_connection();

        let client_id = Arc::new(ClientIdKeeper::spawn(executor.clone(), cred.clone())?);
        let planner = Planner::new(executor, client_id, cred, config.max_dir_depth);

        Ok(Client { planner })
    }

    /// Read `length` bytes at `offset` for each `(file, offset, length)` item. Returns, per item,
    /// a status plus whatever bytes were actually read and whether the read hit EOF.
    pub fn readv(&self, items: &[(TcFile, u64, usize)]) -> Result<Vec<(TcStatus, Vec<u8>, bool)>, Error> {
        self.planner.readv(items)
    }

    /// Write `data` at `offset` for each `(file, offset, data, is_creation)` item. `is_creation`
    /// items are created (and briefly opened) first; existing files are written with the
    /// anonymous stateid.
    pub fn writev(&self, items: &[(TcFile, u64, Vec<u8>, bool)]) -> Result<Vec<TcStatus>, Error> {
        self.planner.writev(items)
    }

    /// GETATTR every file in `files`, returning the attributes this client understands.
    pub fn getattrsv(&self, files: &[TcFile]) -> Result<Vec<(TcStatus, nfs4::attrs::GenericAttr)>, Error> {
        self.planner.getattrsv(files)
    }

    /// SETATTR each `(file, attrs)` pair.
    pub fn setattrsv(&self, items: &[(TcFile, nfs4::attrs::GenericAttr)]) -> Result<Vec<TcStatus>, Error> {
        self.planner.setattrsv(items)
    }

    /// REMOVE every file in `files`.
    pub fn removev(&self, files: &[TcFile]) -> Result<Vec<TcStatus>, Error> {
        self.planner.removev(files)
    }

    /// RENAME each `(from, to)` pair. Both names must share the same parent directory.
    pub fn renamev(&self, items: &[(TcFile, TcFile)]) -> Result<Vec<TcStatus>, Error> {
        self.planner.renamev(items)
    }

    /// MKDIR each `(dir, mode)` pair.
    pub fn mkdirv(&self, items: &[(TcFile, u32)]) -> Result<Vec<TcStatus>, Error> {
        self.planner.mkdirv(items)
    }

    /// List the names present in `dir`.
    pub fn listdir(&self, dir: &TcFile) -> Result<(TcStatus, Vec<String>), Error> {
        self.planner.listdir(dir)
    }
}
