// SPDX-License-Identifier: GPL-3.0-or-later
//! Frame building: turning raw pixel data into PNG bytes and the
//! event-stream envelope subscribers receive (spec §4.D).
use base64::encode as base64_encode;
use image::{ImageBuffer, Rgba};
use tracing::warn;

use crate::grid::{CANVAS_HEIGHT, CANVAS_WIDTH};

type Canvas = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// In-band marker meaning "no frame produced this tick" (spec glossary).
///
/// Distinct from any valid event-stream payload, which always starts with
/// `event: u`.
pub const SENTINEL: &str = "0";

/// The two images [crate::grid::PixelGrid::snapshot] can produce for a
/// single tick. `full` is `Some` iff it was requested; `incremental` is
/// `Some` iff at least one cell had changed.
pub struct Snapshot {
    pub full: Option<Canvas>,
    pub incremental: Option<Canvas>,
}

pub(crate) struct SnapshotBuilder {
    full: Option<Canvas>,
    incremental: Option<Canvas>,
}

impl Snapshot {
    pub(crate) fn builder(full_needed: bool) -> SnapshotBuilder {
        SnapshotBuilder {
            full: full_needed.then(|| Canvas::new(CANVAS_WIDTH as u32, CANVAS_HEIGHT as u32)),
            // Allocated unconditionally: we don't know yet whether any cell
            // will turn out to be dirty. It is discarded in `finish` if not.
            incremental: Some(Canvas::new(CANVAS_WIDTH as u32, CANVAS_HEIGHT as u32)),
        }
    }
}

impl SnapshotBuilder {
    /// Coordinate 512 is addressable in the grid but falls outside the
    /// advertised 512x512 image; writes to it are silently dropped, matching
    /// the source's use of a bounds-checked image setter.
    fn in_bounds(x: u16, y: u16) -> bool {
        (x as usize) < CANVAS_WIDTH && (y as usize) < CANVAS_HEIGHT
    }

    pub(crate) fn set_full(&mut self, x: u16, y: u16, r: u8, g: u8, b: u8) {
        if let (Some(full), true) = (&mut self.full, Self::in_bounds(x, y)) {
            full.put_pixel(x as u32, y as u32, Rgba([r, g, b, 255]));
        }
    }

    pub(crate) fn set_incremental(&mut self, x: u16, y: u16, r: u8, g: u8, b: u8) {
        if let (Some(incremental), true) = (&mut self.incremental, Self::in_bounds(x, y)) {
            incremental.put_pixel(x as u32, y as u32, Rgba([r, g, b, 255]));
        }
    }

    pub(crate) fn finish(mut self, any_change: bool) -> Snapshot {
        if !any_change {
            self.incremental = None;
        }
        Snapshot {
            full: self.full,
            incremental: self.incremental,
        }
    }
}

/// Encode an image as PNG, favoring encode speed over size: frames are
/// large and produced on a fixed cadence, so size-vs-speed favors speed.
fn encode_png(image: &Canvas) -> Option<Vec<u8>> {
    use image::codecs::png::{CompressionType, FilterType, PngEncoder};
    use image::ColorType;

    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Fast, FilterType::NoFilter);
    match encoder.encode(image.as_raw(), image.width(), image.height(), ColorType::Rgba8) {
        Ok(()) => Some(buf),
        Err(err) => {
            warn!(error = %err, "PNG encoding failed");
            None
        }
    }
}

/// Wrap PNG bytes in the event-stream envelope the browser side expects.
fn envelope(png: &[u8]) -> String {
    format!("event: u\ndata:{}\n\n", base64_encode(png))
}

/// Encode an optional canvas into its event-stream string, or the sentinel
/// if the canvas is absent or failed to encode.
pub fn render_event(image: Option<&Canvas>) -> String {
    match image.and_then(encode_png) {
        Some(png) => envelope(&png),
        None => SENTINEL.to_string(),
    }
}

/// Render both halves of a [Snapshot] to their event-stream strings.
pub fn render(snapshot: &Snapshot) -> (String, String) {
    (
        render_event(snapshot.full.as_ref()),
        render_event(snapshot.incremental.as_ref()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::PixelGrid;

    #[test]
    fn missing_frames_are_sentinel() {
        let grid = PixelGrid::new();
        let snapshot = grid.snapshot(false, true);
        let (full, incremental) = render(&snapshot);
        assert_eq!(full, SENTINEL);
        assert_eq!(incremental, SENTINEL);
    }

    #[test]
    fn present_frame_is_not_sentinel() {
        let grid = PixelGrid::new();
        grid.apply(5, 7, 0xAA, 0xBB, 0xCC);
        let snapshot = grid.snapshot(true, true);
        let (full, incremental) = render(&snapshot);
        assert_ne!(full, SENTINEL);
        assert_ne!(incremental, SENTINEL);
        assert!(full.starts_with("event: u\ndata:"));
    }

    #[test]
    fn coordinate_512_is_dropped_from_the_image() {
        let grid = PixelGrid::new();
        grid.apply(512, 0, 1, 2, 3);
        let snapshot = grid.snapshot(true, true);
        // The paint was applied (dirty flag set) but has no pixel to land
        // on in a 512x512 image, so the incremental frame is produced...
        assert!(snapshot.incremental.is_some());
        // ...yet it carries no visible change for any in-bounds pixel.
        let full = snapshot.full.unwrap();
        assert_eq!(full.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }
}
