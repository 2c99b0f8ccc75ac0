// SPDX-License-Identifier: GPL-3.0-or-later
//! The packet decoder pool (spec §4.B).
//!
//! `N` worker threads, `N` equal to the number of hardware threads, all
//! pulling from the same ingress queue. There is no ordering guarantee
//! across workers; the grid's per-cell lock plus last-writer-wins is the
//! only ordering semantic that applies.
use std::sync::Arc;
use std::thread;

use bytes::BytesMut;
use crossbeam_channel::Receiver;
use tracing::trace;

use crate::grid::PixelGrid;
use crate::packet;
use crate::pool::BufferPool;

/// Spawn a decoder pool of `worker_count` threads consuming `rx`, applying
/// decoded paint commands to `grid`, and returning buffers to `pool` on
/// every exit path (success or drop).
pub fn spawn(
    worker_count: usize,
    rx: Receiver<BytesMut>,
    grid: Arc<PixelGrid>,
    pool: Arc<BufferPool>,
) -> Vec<thread::JoinHandle<()>> {
    (0..worker_count.max(1))
        .map(|id| {
            let rx = rx.clone();
            let grid = Arc::clone(&grid);
            let pool = Arc::clone(&pool);
            thread::Builder::new()
                .name(format!("decoder-{id}"))
                .spawn(move || run(rx, grid, pool))
                .expect("failed to spawn decoder thread")
        })
        .collect()
}

fn run(rx: Receiver<BytesMut>, grid: Arc<PixelGrid>, pool: Arc<BufferPool>) {
    while let Ok(frame) = rx.recv() {
        if let Some(cmd) = packet::decode(&frame) {
            grid.apply(cmd.x, cmd.y, cmd.r, cmd.g, cmd.b);
        } else {
            trace!(len = frame.len(), "dropped malformed packet");
        }
        pool.release(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn decoded_packet_lands_on_the_grid() {
        let (tx, rx) = bounded(10);
        let grid = Arc::new(PixelGrid::new());
        let pool = Arc::new(BufferPool::new());

        let mut frame = BytesMut::zeroed(40);
        frame[0] = 0x60;
        frame[32..40].copy_from_slice(&[0x00, 0x05, 0x00, 0x07, 0x11, 0xAA, 0xBB, 0xCC]);
        tx.send(frame).unwrap();
        drop(tx);

        run(rx, Arc::clone(&grid), pool);

        let snapshot = grid.snapshot(true, false);
        let full = snapshot.full.unwrap();
        assert_eq!(full.get_pixel(5, 7).0, [0xAA, 0xBB, 0xCC, 255]);
    }

    #[test]
    fn malformed_packet_returns_buffer_and_leaves_grid_unchanged() {
        let (tx, rx) = bounded(10);
        let grid = Arc::new(PixelGrid::new());
        let pool = Arc::new(BufferPool::new());

        let mut frame = BytesMut::zeroed(40);
        frame[0] = 0x60;
        frame[32..40].copy_from_slice(&[0x00, 0x05, 0x00, 0x07, 0x00, 0xAA, 0xBB, 0xCC]);
        tx.send(frame).unwrap();
        drop(tx);

        run(rx, Arc::clone(&grid), Arc::clone(&pool));

        let snapshot = grid.snapshot(false, true);
        assert!(snapshot.incremental.is_none());
    }
}
