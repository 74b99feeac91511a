//! Last-frame cache
//!
//! Holds the last rendered frame of positions the user has left so the view
//! can show a still image instead of a blank placeholder while the position's
//! engine is reloaded. Entries are keyed by list position and are only valid
//! for the list they were captured from.

use std::collections::HashMap;
use std::sync::Arc;

/// A captured video frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastFrame {
    pub width: u32,
    pub height: u32,
    /// RGBA pixels, shared between the cache and the view
    pub pixels: Arc<[u8]>,
}

impl LastFrame {
    pub fn new(width: u32, height: u32, pixels: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }
}

/// Position to last-frame mapping, bounded to a window around the current position
#[derive(Debug, Default)]
pub struct FrameCache {
    frames: HashMap<usize, LastFrame>,
    radius: usize,
}

impl FrameCache {
    pub fn new(radius: usize) -> Self {
        Self {
            frames: HashMap::new(),
            radius,
        }
    }

    /// Store a frame, replacing any earlier capture of the same position
    pub fn insert(&mut self, position: usize, frame: LastFrame) -> Option<LastFrame> {
        self.frames.insert(position, frame)
    }

    pub fn get(&self, position: usize) -> Option<&LastFrame> {
        self.frames.get(&position)
    }

    /// Drop frames farther than the configured radius from `center`
    pub fn retain_window(&mut self, center: usize) {
        let radius = self.radius;
        self.frames
            .retain(|&position, _| position.abs_diff(center) <= radius);
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Cached positions in ascending order
    pub fn positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = self.frames.keys().copied().collect();
        positions.sort_unstable();
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(fill: u8) -> LastFrame {
        LastFrame::new(2, 2, vec![fill; 16])
    }

    #[test]
    fn test_recapture_replaces_entry() {
        let mut cache = FrameCache::new(2);
        assert!(cache.insert(4, frame(1)).is_none());
        let previous = cache.insert(4, frame(2));

        assert_eq!(previous, Some(frame(1)));
        assert_eq!(cache.get(4), Some(&frame(2)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_retain_window_prunes_far_positions() {
        let mut cache = FrameCache::new(2);
        for position in [0, 3, 5, 7, 8] {
            cache.insert(position, frame(position as u8));
        }

        cache.retain_window(5);
        assert_eq!(cache.positions(), vec![3, 5, 7]);

        cache.retain_window(0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_empties_cache() {
        let mut cache = FrameCache::new(1);
        cache.insert(0, frame(0));
        cache.insert(1, frame(1));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(0), None);
    }
}
