//! View binding callbacks
//!
//! The view layer renders rows and owns the rendering surfaces. The scheduler
//! drives it through `FeedView`; every call happens on the scheduler task, in
//! the order the scheduler decided.

use crate::playback::LastFrame;
use std::ops::Range;

/// Callbacks the scheduler issues to the row views
pub trait FeedView: Send {
    /// Show the buffering indicator of the row at `position`
    fn show_loading(&mut self, position: usize);

    fn hide_loading(&mut self, position: usize);

    /// Reveal the live playback surface of the row
    fn show_playback_surface(&mut self, position: usize);

    /// Hide the playback surface and show a still image instead
    ///
    /// `frame` is the cached last frame of the row, or None for the generic
    /// placeholder.
    fn show_placeholder(&mut self, position: usize, frame: Option<&LastFrame>);

    /// Progress of the foreground clip
    fn update_progress(&mut self, position: usize, current_ms: u64, total_ms: u64);

    fn update_mute_indicator(&mut self, position: usize, muted: bool);

    /// Grab the frame currently shown by the row's surface
    fn capture_frame(&mut self, position: usize) -> Option<LastFrame>;

    /// Keep the display awake while the foreground item plays
    fn set_screen_active(&mut self, active: bool);

    /// Mark a live row as finished
    fn show_ended(&mut self, position: usize) {
        self.show_placeholder(position, None);
    }

    /// Scroll the list so `position` becomes the visible row
    fn scroll_to(&mut self, _position: usize) {}

    /// Rows were appended to the list
    fn items_appended(&mut self, _range: Range<usize>) {}

    /// The list was replaced with `len` new rows
    fn list_replaced(&mut self, _len: usize) {}
}
