//! View that records every scheduler callback

use crate::playback::LastFrame;
use crate::view::FeedView;
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// One recorded view callback
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCall {
    ShowLoading(usize),
    HideLoading(usize),
    ShowPlaybackSurface(usize),
    /// `cached` is true when a last frame was shown instead of the generic placeholder
    ShowPlaceholder { position: usize, cached: bool },
    UpdateProgress {
        position: usize,
        current_ms: u64,
        total_ms: u64,
    },
    UpdateMuteIndicator { position: usize, muted: bool },
    CaptureFrame(usize),
    ScreenActive(bool),
    ShowEnded(usize),
    ScrollTo(usize),
    ItemsAppended(Range<usize>),
    ListReplaced(usize),
}

/// Shared, cloneable access to the calls a [`RecordingView`] received
#[derive(Debug, Clone, Default)]
pub struct ViewLog {
    calls: Arc<Mutex<Vec<ViewCall>>>,
}

impl ViewLog {
    fn lock(&self) -> MutexGuard<'_, Vec<ViewCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, call: ViewCall) {
        trace!("view <- {:?}", call);
        self.lock().push(call);
    }

    /// Every call so far, oldest first
    pub fn calls(&self) -> Vec<ViewCall> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn contains(&self, call: &ViewCall) -> bool {
        self.lock().iter().any(|c| c == call)
    }

    pub fn count(&self, predicate: impl Fn(&ViewCall) -> bool) -> usize {
        self.lock().iter().filter(|c| predicate(c)).count()
    }

    /// Most recent progress update, if any
    pub fn last_progress(&self) -> Option<ViewCall> {
        self.lock()
            .iter()
            .rev()
            .find(|c| matches!(c, ViewCall::UpdateProgress { .. }))
            .cloned()
    }
}

/// [`FeedView`] that records calls and fabricates captured frames
///
/// Captured frames are 2x2 images filled with the position's low byte, so a
/// test can tell which position a cached frame came from.
#[derive(Debug, Default)]
pub struct RecordingView {
    log: ViewLog,
    capture_enabled: bool,
}

impl RecordingView {
    pub fn new() -> (Self, ViewLog) {
        let log = ViewLog::default();
        (
            Self {
                log: log.clone(),
                capture_enabled: true,
            },
            log,
        )
    }

    /// Frame this view returns when capturing `position`
    pub fn frame_for(position: usize) -> LastFrame {
        LastFrame::new(2, 2, vec![position as u8; 16])
    }

    /// A view whose surfaces never yield frames
    pub fn without_capture() -> (Self, ViewLog) {
        let (mut view, log) = Self::new();
        view.capture_enabled = false;
        (view, log)
    }
}

impl FeedView for RecordingView {
    fn show_loading(&mut self, position: usize) {
        self.log.push(ViewCall::ShowLoading(position));
    }

    fn hide_loading(&mut self, position: usize) {
        self.log.push(ViewCall::HideLoading(position));
    }

    fn show_playback_surface(&mut self, position: usize) {
        self.log.push(ViewCall::ShowPlaybackSurface(position));
    }

    fn show_placeholder(&mut self, position: usize, frame: Option<&LastFrame>) {
        self.log.push(ViewCall::ShowPlaceholder {
            position,
            cached: frame.is_some(),
        });
    }

    fn update_progress(&mut self, position: usize, current_ms: u64, total_ms: u64) {
        self.log.push(ViewCall::UpdateProgress {
            position,
            current_ms,
            total_ms,
        });
    }

    fn update_mute_indicator(&mut self, position: usize, muted: bool) {
        self.log.push(ViewCall::UpdateMuteIndicator { position, muted });
    }

    fn capture_frame(&mut self, position: usize) -> Option<LastFrame> {
        self.log.push(ViewCall::CaptureFrame(position));
        self.capture_enabled.then(|| Self::frame_for(position))
    }

    fn set_screen_active(&mut self, active: bool) {
        self.log.push(ViewCall::ScreenActive(active));
    }

    fn show_ended(&mut self, position: usize) {
        self.log.push(ViewCall::ShowEnded(position));
    }

    fn scroll_to(&mut self, position: usize) {
        self.log.push(ViewCall::ScrollTo(position));
    }

    fn items_appended(&mut self, range: Range<usize>) {
        self.log.push(ViewCall::ItemsAppended(range));
    }

    fn list_replaced(&mut self, len: usize) {
        self.log.push(ViewCall::ListReplaced(len));
    }
}
