// SPDX-License-Identifier: GPL-3.0-or-later
//! Core pipeline for the IPv6-painted pixel canvas: packet ingest, decode,
//! the shared pixel grid, frame rendering and the subscriber fan-out.
//!
//! The binary (`src/main.rs`) wires these pieces together with a real TUN
//! device and a `warp` HTTP server; this library is structured so the
//! pipeline itself (everything except device I/O) can be exercised in
//! tests without either.

pub mod broadcaster;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod grid;
pub mod http;
pub mod packet;
pub mod pool;
pub mod settings;
pub mod subscriber;
pub mod tun;

pub use error::{IngestError, Result};
pub use grid::PixelGrid;
