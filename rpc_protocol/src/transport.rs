// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! A persistent, multiplexed RPC transport.
//!
//! This module keeps a single TCP connection alive for the life of the process, lets many callers
//! have calls outstanding on it at once, and reconnects transparently when the server drops the
//! connection. Replies are routed back to their caller by XID, not by send order: the server is
//! free to answer out of order, and a reconnect can make the same XID get answered twice (the
//! second answer is simply dropped, since by then nothing is waiting for it).

use log::*;

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::*;

/// Configuration for a [`Transport`], taken from the caller's bind-time options.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub server_address: SocketAddr,
    pub use_privileged_client_port: bool,
    pub retry_sleeptime: Duration,
    pub server_timeout: Duration,
    pub send_buffer_size: usize,
    pub receive_buffer_size: usize,
    /// Number of reusable call contexts in the pool; bounds concurrent in-flight compounds.
    pub context_pool_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            server_address: "127.0.0.1:2049".parse().unwrap(),
            use_privileged_client_port: false,
            retry_sleeptime: Duration::from_secs(1),
            server_timeout: Duration::from_secs(60),
            send_buffer_size: 64 * 1024,
            receive_buffer_size: 64 * 1024,
            context_pool_size: 16,
        }
    }
}

/// Why [`CallHandle::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The reply arrived; its bytes are in the context's `recv_buf`.
    Delivered,
    /// No reply arrived within the deadline. The call is still registered; the receive loop may
    /// yet deliver (or drop, on reconnect) the reply.
    TimedOut,
    /// The connection carrying this call was dropped. The caller must resend.
    Reset,
}

/// A send/receive buffer pair borrowed from the [`ContextPool`] for the duration of one call.
pub struct CallContext {
    pub send_buf: Vec<u8>,
    pub recv_buf: Vec<u8>,
}

impl CallContext {
    fn new(send_cap: usize, recv_cap: usize) -> Self {
        CallContext {
            send_buf: Vec::with_capacity(send_cap),
            recv_buf: Vec::with_capacity(recv_cap),
        }
    }
}

/// A fixed-size free list of [`CallContext`]s. Exhaustion is the only admission control on the
/// number of concurrently in-flight compounds; callers block until one is returned.
pub struct ContextPool {
    free: Mutex<Vec<CallContext>>,
    available: Condvar,
}

impl ContextPool {
    pub fn new(config: &TransportConfig) -> Self {
        let mut free = Vec::with_capacity(config.context_pool_size);
        for _ in 0..config.context_pool_size {
            free.push(CallContext::new(
                config.send_buffer_size,
                config.receive_buffer_size,
            ));
        }
        ContextPool {
            free: Mutex::new(free),
            available: Condvar::new(),
        }
    }

    /// Block until a context is free, then remove it from the pool.
    pub fn acquire(&self) -> CallContext {
        let mut free = self.free.lock().unwrap();
        loop {
            if let Some(ctx) = free.pop() {
                return ctx;
            }
            free = self.available.wait(free).unwrap();
        }
    }

    /// Return a context to the pool and wake one waiter.
    pub fn release(&self, mut ctx: CallContext) {
        ctx.send_buf.clear();
        ctx.recv_buf.clear();
        self.free.lock().unwrap().push(ctx);
        self.available.notify_one();
    }
}

/// A one-shot rendezvous between the receive loop (producer) and one waiting caller (consumer).
struct CallSlot {
    state: Mutex<SlotState>,
    cond: Condvar,
}

struct SlotState {
    done: bool,
    outcome: WaitOutcome,
    payload: Vec<u8>,
}

impl CallSlot {
    fn new() -> Arc<Self> {
        Arc::new(CallSlot {
            state: Mutex::new(SlotState {
                done: false,
                outcome: WaitOutcome::TimedOut,
                payload: Vec::new(),
            }),
            cond: Condvar::new(),
        })
    }

    fn finish(&self, outcome: WaitOutcome, payload: Vec<u8>) {
        let mut s = self.state.lock().unwrap();
        if s.done {
            // Already delivered or reset once; a duplicate reply after reconnect lands here.
            return;
        }
        s.done = true;
        s.outcome = outcome;
        s.payload = payload;
        self.cond.notify_all();
    }

    /// Wait up to `timeout` for the call to complete. Does *not* deregister the slot on timeout:
    /// the receive loop owns that, so a late reply (or a reconnect) can still resolve it.
    fn wait(&self, timeout: Duration) -> (WaitOutcome, Vec<u8>) {
        let mut s = self.state.lock().unwrap();
        let deadline = Instant::now() + timeout;
        while !s.done {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return (WaitOutcome::TimedOut, Vec::new());
            }
            let (guard, timeout_result) = self.cond.wait_timeout(s, remaining).unwrap();
            s = guard;
            if timeout_result.timed_out() && !s.done {
                return (WaitOutcome::TimedOut, Vec::new());
            }
        }
        (s.outcome, std::mem::take(&mut s.payload))
    }
}

/// Everything guarded by the transport mutex: the write side of the socket, the pending-call
/// registry keyed by XID, and the XID counter itself.
struct Shared {
    stream: Option<TcpStream>,
    pending: HashMap<u32, Arc<CallSlot>>,
    next_xid: u32,
}

struct Inner {
    shared: Mutex<Shared>,
    socket_ready: Condvar,
    config: TransportConfig,
}

/// A handle to an in-flight call, returned by [`Transport::send_call`].
pub struct CallHandle {
    xid: u32,
    slot: Arc<CallSlot>,
}

impl CallHandle {
    pub fn xid(&self) -> u32 {
        self.xid
    }
}

/// Errors arising from sending a call or reading a reply, before RPC-level status is even
/// considered.
#[derive(Debug)]
pub enum TransportError {
    /// The record could not be written in full; the socket has been closed and a reconnect is
    /// under way. The caller should wait for [`Transport::wait_for_connection`] and resend.
    SendFailed,
}

/// A single persistent, multiplexed TCP connection to one NFSv4 server.
pub struct Transport {
    inner: Arc<Inner>,
}

impl Transport {
    /// Spawn the receive/reconnect thread and return a handle to the transport. The thread runs
    /// for the life of the process.
    pub fn spawn(config: TransportConfig) -> Self {
        let inner = Arc::new(Inner {
            shared: Mutex::new(Shared {
                stream: None,
                pending: HashMap::new(),
                next_xid: (std::process::id() as u32) ^ (seed_from_time()),
            }),
            socket_ready: Condvar::new(),
            config,
        });

        let recv_inner = inner.clone();
        std::thread::spawn(move || receive_loop(recv_inner));

        Transport { inner }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    /// Block until the connection is up. Used after `SendFailed` before retrying.
    pub fn wait_for_connection(&self) {
        let mut shared = self.inner.shared.lock().unwrap();
        while shared.stream.is_none() {
            shared = self.inner.socket_ready.wait(shared).unwrap();
        }
    }

    /// Assign a fresh XID, let `build_payload` serialize the call body around it (the embedded
    /// `rpc_message.xid` field must match the key this transport routes the reply back under),
    /// frame the result with a record mark, write it, and register it in the pending-call table —
    /// all under one lock so XID assignment and the write are atomic with respect to a concurrent
    /// reconnect.
    pub fn send_call(
        &self,
        build_payload: impl FnOnce(u32) -> Vec<u8>,
    ) -> Result<CallHandle, TransportError> {
        let mut shared = self.inner.shared.lock().unwrap();

        let xid = shared.next_xid;
        shared.next_xid = shared.next_xid.wrapping_add(1);

        let Some(stream) = shared.stream.as_mut() else {
            return Err(TransportError::SendFailed);
        };

        let payload = build_payload(xid);
        let mut framed = buf_with_dummy_record_mark();
        framed.extend_from_slice(&payload);
        update_record_mark(&mut framed);

        if let Err(e) = stream.write_all(&framed) {
            debug!("send_call: write failed, tearing down connection: {e}");
            shared.stream = None;
            return Err(TransportError::SendFailed);
        }

        let slot = CallSlot::new();
        shared.pending.insert(xid, slot.clone());

        Ok(CallHandle { xid, slot })
    }

    /// Wait for the reply to a call previously registered with [`Transport::send_call`].
    pub fn await_reply(&self, handle: &CallHandle) -> (WaitOutcome, Vec<u8>) {
        handle.slot.wait(self.inner.config.server_timeout)
    }
}

/// An 8-bit-resolution seed derived from the current time, used only to perturb the initial XID;
/// not a security boundary.
fn seed_from_time() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Owns the connect side as well as the read side, per the single-reader invariant: only this
/// thread ever calls `read()` on the socket, so the record-mark-then-xid read needs no lock.
fn receive_loop(inner: Arc<Inner>) {
    loop {
        let stream = match connect_with_retry(&inner) {
            Some(s) => s,
            None => continue,
        };
        let mut reader = match stream.try_clone() {
            Ok(r) => r,
            Err(e) => {
                warn!("failed to clone socket for reading: {e}");
                continue;
            }
        };

        {
            let mut shared = inner.shared.lock().unwrap();
            shared.stream = Some(stream);
            let dropped: Vec<_> = shared.pending.drain().collect();
            drop(shared);
            for (_, slot) in dropped {
                slot.finish(WaitOutcome::Reset, Vec::new());
            }
        }
        inner.socket_ready.notify_all();

        loop {
            match read_one_reply(&mut reader, &inner) {
                Ok(()) => continue,
                Err(e) => {
                    debug!("receive loop: connection lost: {e}");
                    break;
                }
            }
        }

        let mut shared = inner.shared.lock().unwrap();
        shared.stream = None;
    }
}

fn connect_with_retry(inner: &Arc<Inner>) -> Option<TcpStream> {
    let config = &inner.config;
    loop {
        let attempt = if config.use_privileged_client_port {
            connect_privileged(config.server_address)
        } else {
            TcpStream::connect(config.server_address)
        };

        match attempt {
            Ok(stream) => return Some(stream),
            Err(e) => {
                warn!(
                    "cannot connect to {}: {e}, retrying in {:?}",
                    config.server_address, config.retry_sleeptime
                );
                std::thread::sleep(config.retry_sleeptime);
            }
        }
    }
}

/// Bind to a privileged (< 1024) local port before connecting, as some NFSv4 servers require of
/// their clients. Tries each port in the reserved range once.
fn connect_privileged(dest: SocketAddr) -> std::io::Result<TcpStream> {
    use nix::sys::socket::{bind, connect, socket, AddressFamily, SockFlag, SockType, SockaddrIn};
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    for port in (512u16..1024).rev() {
        let fd: OwnedFd = socket(
            AddressFamily::Inet,
            SockType::Stream,
            SockFlag::empty(),
            None,
        )
        .map_err(std::io::Error::from)?;

        let local: SocketAddr = ([0, 0, 0, 0], port).into();
        let SocketAddr::V4(local_v4) = local else {
            unreachable!()
        };
        if bind(fd.as_raw_fd(), &SockaddrIn::from(local_v4)).is_err() {
            continue;
        }

        let SocketAddr::V4(dest_v4) = dest else {
            return Err(std::io::Error::other("privileged connect requires IPv4"));
        };
        match connect(fd.as_raw_fd(), &SockaddrIn::from(dest_v4)) {
            Ok(()) => {
                let raw = fd.as_raw_fd();
                std::mem::forget(fd);
                // SAFETY: `raw` came from a freshly bound and connected socket we just created,
                // and ownership is handed to the returned TcpStream via from_raw_fd.
                return Ok(unsafe { TcpStream::from_raw_fd(raw) });
            }
            Err(_) => continue,
        }
    }

    Err(std::io::Error::other(
        "no privileged port available to bind",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_config(size: usize) -> TransportConfig {
        TransportConfig {
            context_pool_size: size,
            ..TransportConfig::default()
        }
    }

    #[test]
    fn context_pool_round_trips_buffers() {
        let pool = ContextPool::new(&pool_config(1));
        let mut ctx = pool.acquire();
        ctx.send_buf.extend_from_slice(b"hello");
        pool.release(ctx);

        let ctx = pool.acquire();
        assert!(ctx.send_buf.is_empty(), "release must clear borrowed buffers");
    }

    #[test]
    fn context_pool_blocks_until_release() {
        let pool = Arc::new(ContextPool::new(&pool_config(1)));
        let ctx = pool.acquire();

        let waiter_pool = pool.clone();
        let waiter = std::thread::spawn(move || {
            // Blocks until the main thread releases its context below.
            waiter_pool.acquire();
        });

        std::thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished(), "acquire must block while the pool is empty");

        pool.release(ctx);
        waiter.join().unwrap();
    }

    #[test]
    fn call_slot_delivers_to_waiter() {
        let slot = CallSlot::new();
        let delivering = slot.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            delivering.finish(WaitOutcome::Delivered, vec![1, 2, 3]);
        });

        let (outcome, payload) = slot.wait(Duration::from_secs(5));
        assert_eq!(outcome, WaitOutcome::Delivered);
        assert_eq!(payload, vec![1, 2, 3]);
    }

    #[test]
    fn call_slot_wait_times_out() {
        let slot = CallSlot::new();
        let (outcome, payload) = slot.wait(Duration::from_millis(20));
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(payload.is_empty());
    }

    #[test]
    fn call_slot_ignores_second_finish() {
        let slot = CallSlot::new();
        slot.finish(WaitOutcome::Delivered, vec![1]);
        slot.finish(WaitOutcome::Reset, vec![2]);

        let (outcome, payload) = slot.wait(Duration::from_secs(1));
        assert_eq!(outcome, WaitOutcome::Delivered);
        assert_eq!(payload, vec![1]);
    }
}

/// Read one reply record: an 8-byte record-mark+XID header, then either route the remaining
/// bytes to the waiting call, or drain them if nothing is waiting (the call already timed out, or
/// this is a duplicate answer to a call we resent after a reconnect).
fn read_one_reply(reader: &mut TcpStream, inner: &Arc<Inner>) -> std::io::Result<()> {
    let mut header = [0u8; 8];
    reader.read_exact(&mut header)?;

    let mark = u32::from_be_bytes(header[0..4].try_into().unwrap());
    if mark & (1 << 31) == 0 {
        return Err(std::io::Error::other(
            "received a fragmented RPC reply; only single-fragment records are supported",
        ));
    }
    let record_len = mark & !(1 << 31);
    let xid = u32::from_be_bytes(header[4..8].try_into().unwrap());

    let payload_len = record_len as usize - 4;

    let slot = {
        let mut shared = inner.shared.lock().unwrap();
        shared.pending.remove(&xid)
    };

    match slot {
        Some(slot) => {
            let mut payload = vec![0u8; payload_len];
            reader.read_exact(&mut payload)?;
            slot.finish(WaitOutcome::Delivered, payload);
        }
        None => {
            trace!("xid {xid} has no waiter, discarding {payload_len} bytes");
            let mut sink = [0u8; 4096];
            let mut remaining = payload_len;
            while remaining > 0 {
                let n = remaining.min(sink.len());
                reader.read_exact(&mut sink[..n])?;
                remaining -= n;
            }
        }
    }

    Ok(())
}
