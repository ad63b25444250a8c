//! Double-buffered frame store
//!
//! Two fixed RGBA buffers plus a current index and a dirty flag, behind one
//! lock. Writers fill the inactive buffer and flip; the host copies out the
//! current buffer only when the dirty flag is set, which clears it. Each
//! buffer carries its own recorded dimensions, so a reader never observes
//! pixel data paired with mismatched width/height.

use parking_lot::Mutex;

/// Bytes per RGBA pixel
pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug)]
struct Buffers {
    pixels: [Vec<u8>; 2],
    dims: [(u32, u32); 2],
    current: usize,
    dirty: bool,
}

/// Thread-safe double-buffered RGBA frame storage
#[derive(Debug)]
pub struct FrameStore {
    inner: Mutex<Buffers>,
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Buffers {
                pixels: [Vec::new(), Vec::new()],
                dims: [(0, 0), (0, 0)],
                current: 0,
                dirty: false,
            }),
        }
    }

    /// Fill the inactive buffer through `fill`, then publish it.
    ///
    /// The buffer passed to `fill` is sized to `width * height * 4` bytes.
    /// Publication records the dimensions, flips the current index, and sets
    /// the dirty flag, all under the lock.
    pub fn write_with(&self, width: u32, height: u32, fill: impl FnOnce(&mut Vec<u8>)) {
        let mut inner = self.inner.lock();
        let back = 1 - inner.current;
        let len = width as usize * height as usize * BYTES_PER_PIXEL;
        inner.pixels[back].resize(len, 0);
        fill(&mut inner.pixels[back]);
        inner.dims[back] = (width, height);
        inner.current = back;
        inner.dirty = true;
    }

    /// Publish a tightly packed RGBA frame
    pub fn publish_rgba(&self, width: u32, height: u32, pixels: &[u8]) {
        self.write_with(width, height, |dst| {
            let len = dst.len().min(pixels.len());
            dst[..len].copy_from_slice(&pixels[..len]);
        });
    }

    /// Dimensions of the current frame
    pub fn dimensions(&self) -> (u32, u32) {
        let inner = self.inner.lock();
        inner.dims[inner.current]
    }

    /// Whether an unconsumed frame is available
    pub fn is_dirty(&self) -> bool {
        self.inner.lock().dirty
    }

    /// Copy the current frame into `dst` if a new one is available.
    ///
    /// Returns the frame dimensions and clears the dirty flag on success.
    /// Returns None, leaving the flag untouched, when there is no new frame
    /// or `dst` is too small for it.
    pub fn copy_if_dirty(&self, dst: &mut [u8]) -> Option<(u32, u32)> {
        let mut inner = self.inner.lock();
        if !inner.dirty {
            return None;
        }
        let current = inner.current;
        let (width, height) = inner.dims[current];
        let len = inner.pixels[current].len();
        if dst.len() < len {
            return None;
        }
        dst[..len].copy_from_slice(&inner.pixels[current]);
        inner.dirty = false;
        Some((width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_store_has_nothing_to_copy() {
        let store = FrameStore::new();
        assert_eq!(store.dimensions(), (0, 0));
        assert!(!store.is_dirty());
        let mut dst = vec![0u8; 16];
        assert_eq!(store.copy_if_dirty(&mut dst), None);
    }

    #[test]
    fn test_publish_then_copy() {
        let store = FrameStore::new();
        let frame = vec![7u8; 2 * 2 * BYTES_PER_PIXEL];
        store.publish_rgba(2, 2, &frame);

        assert_eq!(store.dimensions(), (2, 2));
        assert!(store.is_dirty());

        let mut dst = vec![0u8; frame.len()];
        assert_eq!(store.copy_if_dirty(&mut dst), Some((2, 2)));
        assert_eq!(dst, frame);
    }

    #[test]
    fn test_dirty_consumed_exactly_once() {
        let store = FrameStore::new();
        store.publish_rgba(1, 1, &[1, 2, 3, 4]);

        let mut dst = vec![0u8; 4];
        assert!(store.copy_if_dirty(&mut dst).is_some());
        // No new frame was written; a second read must see nothing.
        assert_eq!(store.copy_if_dirty(&mut dst), None);

        store.publish_rgba(1, 1, &[5, 6, 7, 8]);
        assert_eq!(store.copy_if_dirty(&mut dst), Some((1, 1)));
        assert_eq!(dst, vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_small_destination_leaves_frame_pending() {
        let store = FrameStore::new();
        store.publish_rgba(2, 2, &[9u8; 16]);

        let mut small = vec![0u8; 4];
        assert_eq!(store.copy_if_dirty(&mut small), None);
        assert!(store.is_dirty());

        let mut big = vec![0u8; 16];
        assert_eq!(store.copy_if_dirty(&mut big), Some((2, 2)));
    }

    #[test]
    fn test_dimensions_follow_latest_write() {
        let store = FrameStore::new();
        store.publish_rgba(4, 2, &[0u8; 32]);
        assert_eq!(store.dimensions(), (4, 2));
        store.publish_rgba(2, 4, &[0u8; 32]);
        assert_eq!(store.dimensions(), (2, 4));
    }

    #[test]
    fn test_writer_never_touches_current_buffer() {
        let store = FrameStore::new();
        store.publish_rgba(1, 1, &[1, 1, 1, 1]);

        // Write a second frame while the first is still unread; the reader
        // must get exactly one coherent frame (the newest).
        store.publish_rgba(1, 1, &[2, 2, 2, 2]);
        let mut dst = vec![0u8; 4];
        assert_eq!(store.copy_if_dirty(&mut dst), Some((1, 1)));
        assert_eq!(dst, vec![2, 2, 2, 2]);
    }
}
