// SPDX-License-Identifier: GPL-3.0-or-later
//! The TUN reader (spec §4.C): blocking and batched io_uring ingress paths
//! over the same virtual network interface.
//!
//! Device creation and OS-level interface configuration are a thin wrapper
//! around the `tun` crate; everything downstream of "here is a readable
//! file descriptor delivering raw IPv6 frames" is implemented to the
//! letter of the spec and is exercised in tests against an in-memory
//! stand-in, not a real device.
pub mod blocking;
pub mod device;

#[cfg(feature = "io_uring")]
pub mod io_uring;

/// Ingress queue capacity: bounded at 1000, applying backpressure to the
/// reader when decoders fall behind (spec §5 "Backpressure").
pub const INGRESS_QUEUE_CAPACITY: usize = 1000;
