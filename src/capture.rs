//! Offscreen capture pipeline
//!
//! Two independent strategies produce RGBA frames into the shared
//! [`FrameStore`]:
//!
//! - **Snapshot**: a one-shot compressed-image request decoded on the
//!   execution thread. Requests are coalesced through an in-flight guard.
//! - **Continuous**: a GPU capture session pushes frames from its own
//!   thread into [`ContinuousSink`], which swizzles BGRA rows into RGBA
//!   through a staging surface. A pending resize makes the next callback
//!   recreate the session instead of copying a frame.
//!
//! Decode and copy failures are transient: the frame is dropped, the guard
//! is cleared, and no event is emitted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::engine::{FrameDisposition, FramePayload, FrameSink};
use crate::error::CaptureError;
use crate::frame::{FrameStore, BYTES_PER_PIXEL};

/// Capture strategy, selected once during initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// One-shot compressed-image snapshots on request
    Snapshot,
    /// Continuous GPU capture session
    Continuous,
    /// No capture (separated top-level views)
    #[default]
    Disabled,
}

impl CaptureMode {
    /// Choose the capture mode for an instance.
    ///
    /// Continuous capture requires an embedded view, an active composition
    /// controller, and runtime support; separated views never capture.
    pub fn select(separated: bool, composition_active: bool, continuous_supported: bool) -> Self {
        if separated {
            CaptureMode::Disabled
        } else if composition_active && continuous_supported {
            CaptureMode::Continuous
        } else {
            CaptureMode::Snapshot
        }
    }
}

/// Decode a compressed snapshot stream and publish it as the current frame
pub fn publish_snapshot(store: &FrameStore, bytes: &[u8]) -> Result<(u32, u32), CaptureError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|err| CaptureError::DecodeFailed(err.to_string()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    store.publish_rgba(width, height, rgba.as_raw());
    debug!(width, height, "snapshot decoded");
    Ok((width, height))
}

/// Swizzle BGRA rows (possibly stride-padded) into tightly packed RGBA
pub fn swizzle_bgra_rows(
    src: &[u8],
    width: u32,
    height: u32,
    stride: usize,
    dst: &mut [u8],
) -> Result<(), CaptureError> {
    let row_bytes = width as usize * BYTES_PER_PIXEL;
    if stride < row_bytes || src.len() < stride * height as usize {
        return Err(CaptureError::CopyFailed(format!(
            "source too small: {} bytes for {}x{} stride {}",
            src.len(),
            width,
            height,
            stride
        )));
    }
    if dst.len() < row_bytes * height as usize {
        return Err(CaptureError::CopyFailed(
            "destination too small".to_string(),
        ));
    }
    for row in 0..height as usize {
        let src_row = &src[row * stride..row * stride + row_bytes];
        let dst_row = &mut dst[row * row_bytes..(row + 1) * row_bytes];
        for (s, d) in src_row
            .chunks_exact(BYTES_PER_PIXEL)
            .zip(dst_row.chunks_exact_mut(BYTES_PER_PIXEL))
        {
            d[0] = s[2];
            d[1] = s[1];
            d[2] = s[0];
            d[3] = s[3];
        }
    }
    Ok(())
}

/// Latched resize request shared between the execution thread and the
/// capture-session thread
#[derive(Debug, Default)]
pub struct ResizeSignal {
    pending: AtomicBool,
    dims: Mutex<(u32, u32)>,
}

impl ResizeSignal {
    /// Create an unset signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Record new pixel dimensions and latch the signal
    pub fn set(&self, width: u32, height: u32) {
        *self.dims.lock() = (width, height);
        self.pending.store(true, Ordering::Release);
    }

    /// Consume the signal, returning the latest dimensions if it was set
    pub fn take(&self) -> Option<(u32, u32)> {
        if self.pending.swap(false, Ordering::AcqRel) {
            Some(*self.dims.lock())
        } else {
            None
        }
    }

    /// Whether a resize is latched
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

/// Frame receiver for the continuous capture path.
///
/// Runs on the capture-session thread; synchronizes only through the frame
/// store lock and the shared in-flight guard, never by blocking the
/// execution thread.
pub struct ContinuousSink {
    frames: Arc<FrameStore>,
    in_flight: Arc<AtomicBool>,
    resize: Arc<ResizeSignal>,
    staging: Mutex<Vec<u8>>,
}

impl ContinuousSink {
    /// Create a sink writing into the given store
    pub fn new(
        frames: Arc<FrameStore>,
        in_flight: Arc<AtomicBool>,
        resize: Arc<ResizeSignal>,
    ) -> Self {
        Self {
            frames,
            in_flight,
            resize,
            staging: Mutex::new(Vec::new()),
        }
    }
}

impl FrameSink for ContinuousSink {
    fn on_frame(&self, frame: &FramePayload<'_>) -> FrameDisposition {
        // Resize and frame-copy are mutually exclusive within one callback.
        if let Some((width, height)) = self.resize.take() {
            debug!(width, height, "recreating capture session");
            return FrameDisposition::Recreate { width, height };
        }

        if self.in_flight.swap(true, Ordering::AcqRel) {
            // A prior frame is still being processed; drop this one.
            return FrameDisposition::Consumed;
        }

        let needed = frame.stride * frame.height as usize;
        let mut staging = self.staging.lock();
        staging.resize(needed, 0);
        let copied = frame.data.len().min(needed);
        staging[..copied].copy_from_slice(&frame.data[..copied]);

        let mut result = Ok(());
        self.frames.write_with(frame.width, frame.height, |dst| {
            result = swizzle_bgra_rows(&staging, frame.width, frame.height, frame.stride, dst);
        });
        if let Err(err) = result {
            warn!(%err, "dropping capture frame");
        }

        self.in_flight.store(false, Ordering::Release);
        FrameDisposition::Consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bgra_frame(width: u32, height: u32, stride: usize) -> Vec<u8> {
        let mut data = vec![0u8; stride * height as usize];
        for y in 0..height as usize {
            for x in 0..width as usize {
                let at = y * stride + x * 4;
                data[at] = 10; // B
                data[at + 1] = 20; // G
                data[at + 2] = 30; // R
                data[at + 3] = 40; // A
            }
        }
        data
    }

    fn sink() -> (
        ContinuousSink,
        Arc<FrameStore>,
        Arc<AtomicBool>,
        Arc<ResizeSignal>,
    ) {
        let frames = Arc::new(FrameStore::new());
        let in_flight = Arc::new(AtomicBool::new(false));
        let resize = Arc::new(ResizeSignal::new());
        let sink = ContinuousSink::new(frames.clone(), in_flight.clone(), resize.clone());
        (sink, frames, in_flight, resize)
    }

    #[test]
    fn test_capture_mode_selection() {
        assert_eq!(CaptureMode::select(true, true, true), CaptureMode::Disabled);
        assert_eq!(
            CaptureMode::select(false, true, true),
            CaptureMode::Continuous
        );
        assert_eq!(
            CaptureMode::select(false, true, false),
            CaptureMode::Snapshot
        );
        assert_eq!(
            CaptureMode::select(false, false, true),
            CaptureMode::Snapshot
        );
    }

    #[test]
    fn test_swizzle_swaps_channels() {
        let src = bgra_frame(2, 1, 8);
        let mut dst = vec![0u8; 8];
        swizzle_bgra_rows(&src, 2, 1, 8, &mut dst).unwrap();
        assert_eq!(&dst[..4], &[30, 20, 10, 40]);
    }

    #[test]
    fn test_swizzle_honors_stride_padding() {
        // 2px rows padded to 12 bytes.
        let src = bgra_frame(2, 2, 12);
        let mut dst = vec![0u8; 16];
        swizzle_bgra_rows(&src, 2, 2, 12, &mut dst).unwrap();
        assert_eq!(&dst[8..12], &[30, 20, 10, 40]);
    }

    #[test]
    fn test_swizzle_rejects_short_source() {
        let src = vec![0u8; 4];
        let mut dst = vec![0u8; 16];
        assert!(swizzle_bgra_rows(&src, 2, 2, 8, &mut dst).is_err());
    }

    #[test]
    fn test_sink_publishes_frame() {
        let (sink, frames, in_flight, _) = sink();
        let data = bgra_frame(2, 2, 8);
        let disposition = sink.on_frame(&FramePayload {
            width: 2,
            height: 2,
            stride: 8,
            data: &data,
        });

        assert_eq!(disposition, FrameDisposition::Consumed);
        assert!(!in_flight.load(Ordering::Acquire));
        assert_eq!(frames.dimensions(), (2, 2));

        let mut dst = vec![0u8; 16];
        assert_eq!(frames.copy_if_dirty(&mut dst), Some((2, 2)));
        assert_eq!(&dst[..4], &[30, 20, 10, 40]);
    }

    #[test]
    fn test_sink_drops_frame_while_in_flight() {
        let (sink, frames, in_flight, _) = sink();
        in_flight.store(true, Ordering::Release);

        let data = bgra_frame(2, 2, 8);
        let disposition = sink.on_frame(&FramePayload {
            width: 2,
            height: 2,
            stride: 8,
            data: &data,
        });

        assert_eq!(disposition, FrameDisposition::Consumed);
        assert!(!frames.is_dirty());
        // The guard belongs to the prior processing; it must stay set.
        assert!(in_flight.load(Ordering::Acquire));
    }

    #[test]
    fn test_pending_resize_preempts_frame_copy() {
        let (sink, frames, _, resize) = sink();
        resize.set(32, 16);

        let data = bgra_frame(2, 2, 8);
        let disposition = sink.on_frame(&FramePayload {
            width: 2,
            height: 2,
            stride: 8,
            data: &data,
        });

        assert_eq!(
            disposition,
            FrameDisposition::Recreate {
                width: 32,
                height: 16
            }
        );
        assert!(!frames.is_dirty());
        assert!(!resize.is_pending());

        // The next frame at the new size is copied normally.
        let data = bgra_frame(32, 16, 128);
        let disposition = sink.on_frame(&FramePayload {
            width: 32,
            height: 16,
            stride: 128,
            data: &data,
        });
        assert_eq!(disposition, FrameDisposition::Consumed);
        assert_eq!(frames.dimensions(), (32, 16));
    }

    #[test]
    fn test_resize_signal_latches_latest() {
        let signal = ResizeSignal::new();
        signal.set(10, 10);
        signal.set(20, 30);
        assert_eq!(signal.take(), Some((20, 30)));
        assert_eq!(signal.take(), None);
    }
}
