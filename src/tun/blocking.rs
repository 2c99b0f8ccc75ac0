// SPDX-License-Identifier: GPL-3.0-or-later
//! The blocking TUN reader path (spec §4.C "Blocking path").
use std::io::Read;
use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::error::{IngestError, Result};
use crate::pool::BufferPool;

/// Read frames from `device` until a read error occurs, handing each one
/// off to `tx`. `tx.send` blocks when the ingress queue is full, which is
/// exactly the backpressure spec §5 calls for.
///
/// Returns the first fatal read error. A full queue is backpressure, not a
/// failure, and is handled by blocking, not by returning.
pub fn run(
    mut device: impl Read,
    tx: Sender<bytes::BytesMut>,
    pool: Arc<BufferPool>,
) -> Result<()> {
    loop {
        let mut buf = pool.acquire();
        // SAFETY-free: BytesMut::resize zero-fills, so reading into the
        // writable region through a plain slice never exposes uninitialized
        // memory even though the read may return fewer bytes than capacity.
        let capacity = buf.capacity();
        buf.resize(capacity, 0);
        let n = device.read(&mut buf).map_err(IngestError::Read)?;
        buf.truncate(n);
        // tx.send blocks if the bounded channel is full: this is the
        // reader's backpressure point.
        if tx.send(buf).is_err() {
            // All decoders gone; nothing left to do.
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::io;

    /// An in-memory stand-in for a TUN device: yields a fixed sequence of
    /// frames, then a read error.
    struct ScriptedDevice {
        frames: std::collections::VecDeque<Vec<u8>>,
    }

    impl Read for ScriptedDevice {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.frames.pop_front() {
                Some(frame) => {
                    buf[..frame.len()].copy_from_slice(&frame);
                    Ok(frame.len())
                }
                None => Err(io::Error::new(io::ErrorKind::Other, "no more frames")),
            }
        }
    }

    #[test]
    fn frames_are_forwarded_with_exact_length() {
        let device = ScriptedDevice {
            frames: vec![vec![0x60; 40], vec![0x60; 64]].into(),
        };
        let (tx, rx) = bounded(10);
        let pool = Arc::new(BufferPool::new());
        let result = run(device, tx, pool);
        assert!(result.is_err(), "reader stops on the scripted read error");

        let first = rx.recv().unwrap();
        assert_eq!(first.len(), 40);
        let second = rx.recv().unwrap();
        assert_eq!(second.len(), 64);
    }
}
