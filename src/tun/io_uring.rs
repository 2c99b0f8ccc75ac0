// SPDX-License-Identifier: GPL-3.0-or-later
//! The batched, io_uring-backed TUN reader path (spec §4.C "Batched
//! asynchronous path").
//!
//! A fixed pool of in-flight read slots is kept armed at all times. Reads
//! complete out of order; each completion is tagged with its slot index
//! (`user_data`) so the buffer and re-arm logic know which slot to reuse.
//! Submissions are batched: re-armed reads accumulate locally and are only
//! flushed to the kernel once half the pool has been re-armed, amortizing
//! the per-submission syscall over many packets.
use std::os::unix::io::RawFd;
use std::sync::Arc;

use bytes::BytesMut;
use crossbeam_channel::Sender;
use io_uring::{opcode, types, IoUring};
use tracing::error;

use crate::error::{IngestError, Result};
use crate::pool::BufferPool;
use crate::tun::INGRESS_QUEUE_CAPACITY;

/// Number of in-flight read slots kept armed at once.
const SLOT_COUNT: usize = 128;

/// Re-armed reads are flushed to the kernel once this many have queued up
/// locally (half the batch size).
const SUBMIT_THRESHOLD: usize = SLOT_COUNT / 2;

struct Slot {
    buf: BytesMut,
}

/// Run the batched io_uring ingress loop against `fd` until a fatal error.
///
/// `fd` must stay open and valid for the duration of this call; callers
/// typically pass the raw fd of an open TUN device and keep the owning
/// `Device` alive on the stack above this call.
pub fn run(fd: RawFd, tx: Sender<BytesMut>, pool: Arc<BufferPool>) -> Result<()> {
    let mut ring: IoUring = IoUring::new((SLOT_COUNT * 2) as u32)
        .map_err(IngestError::Submit)?;
    let mut slots: Vec<Slot> = (0..SLOT_COUNT)
        .map(|_| {
            let mut buf = pool.acquire();
            buf.resize(buf.capacity(), 0);
            Slot { buf }
        })
        .collect();

    // Arm every slot and submit once up front.
    for idx in 0..SLOT_COUNT {
        push_read(&mut ring, fd, &mut slots[idx], idx)?;
    }
    ring.submit().map_err(IngestError::Submit)?;

    let mut pending_rearms = 0usize;
    loop {
        match ring.submit_and_wait(1) {
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(IngestError::Submit(err)),
        }

        // Drain whatever completed without blocking further; more may
        // complete between iterations of this loop, which is fine.
        let completions: Vec<_> = ring.completion().collect();
        for cqe in completions {
            let slot_idx = cqe.user_data() as usize;
            let result = cqe.result();
            if result >= 0 {
                let n = result as usize;
                let frame = BytesMut::from(&slots[slot_idx].buf[..n]);
                if tx.send(frame).is_err() {
                    return Ok(());
                }
                let mut fresh = pool.acquire();
                let cap = fresh.capacity();
                fresh.resize(cap, 0);
                slots[slot_idx].buf = fresh;
                push_read(&mut ring, fd, &mut slots[slot_idx], slot_idx)?;
                pending_rearms += 1;
            } else {
                let errno = -result;
                if errno == libc_eagain() {
                    push_read(&mut ring, fd, &mut slots[slot_idx], slot_idx)?;
                    pending_rearms += 1;
                } else {
                    error!(errno, "fatal io_uring read completion");
                    return Err(IngestError::Submit(std::io::Error::from_raw_os_error(
                        errno,
                    )));
                }
            }
        }

        if pending_rearms >= SUBMIT_THRESHOLD {
            ring.submit().map_err(IngestError::Submit)?;
            pending_rearms = 0;
        }
    }
}

fn push_read(ring: &mut IoUring, fd: RawFd, slot: &mut Slot, idx: usize) -> Result<()> {
    let entry = opcode::Read::new(
        types::Fd(fd),
        slot.buf.as_mut_ptr(),
        slot.buf.len() as u32,
    )
    .build()
    .user_data(idx as u64);
    // SAFETY: `slot.buf` stays alive (owned by `slots`, not reallocated
    // between push and completion) and sized to `slot.buf.len()` for the
    // duration of the in-flight read.
    unsafe {
        ring.submission()
            .push(&entry)
            .map_err(|_| IngestError::Submit(std::io::Error::new(
                std::io::ErrorKind::Other,
                "submission queue full",
            )))?;
    }
    Ok(())
}

fn libc_eagain() -> i32 {
    libc::EAGAIN
}

#[allow(dead_code)]
const _ASSERT_QUEUE_SIZED_FOR_POOL: () = assert!(INGRESS_QUEUE_CAPACITY > 0);
