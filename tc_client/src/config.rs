// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use rpc_protocol::transport::TransportConfig;

/// Configuration for a [`crate::Client`], mirroring the knobs the original mount helper exposed on
/// its command line: server address, privileged-port policy, buffer sizes, and retry/timeout
/// intervals.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_address: SocketAddr,
    pub use_privileged_client_port: bool,
    pub retry_sleeptime: Duration,
    pub server_timeout: Duration,
    pub send_buffer_size: usize,
    pub receive_buffer_size: usize,
    pub rpc_program_number: u32,
    pub rpc_program_version: u32,
    /// Maximum number of LOOKUP components this client will chase resolving one TC path.
    pub max_dir_depth: usize,
    /// Maximum number of compounds in flight on the transport at once.
    pub context_pool_size: usize,
}

impl ClientConfig {
    pub fn new(server: impl ToSocketAddrs) -> std::io::Result<Self> {
        let server_address = server
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::other("no address resolved for NFS server"))?;

        Ok(ClientConfig {
            server_address,
            ..Self::defaults()
        })
    }

    fn defaults() -> Self {
        ClientConfig {
            server_address: "127.0.0.1:2049".parse().unwrap(),
            use_privileged_client_port: false,
            retry_sleeptime: Duration::from_secs(1),
            server_timeout: Duration::from_secs(60),
            send_buffer_size: 64 * 1024,
            receive_buffer_size: 64 * 1024,
            rpc_program_number: 100003,
            rpc_program_version: 4,
            max_dir_depth: 64,
            context_pool_size: 16,
        }
    }

    pub(crate) fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            server_address: self.server_address,
            use_privileged_client_port: self.use_privileged_client_port,
            retry_sleeptime: self.retry_sleeptime,
            server_timeout: self.server_timeout,
            send_buffer_size: self.send_buffer_size,
            receive_buffer_size: self.receive_buffer_size,
            context_pool_size: self.context_pool_size,
        }
    }
}
