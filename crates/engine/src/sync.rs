//! Playback-clock to detection-frame synchronization.
//!
//! Detection caches are sampled at a few frames per second while the
//! renderer queries on every redraw, so the synchronizer keeps a
//! locality cursor and only searches a bounded neighborhood around it
//! for the frame nearest the playback clock. Expected monotonic
//! playback makes the lookup O(1) amortized; seeks reset the cursor
//! so the search is not biased by stale locality.

use zonewatch_core::detection::{filter_frame, DetectionFrame, FilteredDetectionFrame};
use zonewatch_core::geometry::Point;

use crate::config::EngineConfig;

/// Explicit playback synchronization state.
///
/// One enum instead of independent booleans: `Seeking` cannot coexist
/// with `Idle`, and a paused synchronizer cannot emit updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Not playing; queries yield nothing.
    Idle,
    /// Advancing normally; the cursor tracks playback.
    Playing,
    /// A discontinuous jump happened; the cursor has been reset and
    /// the next query re-localizes from the start of the list.
    Seeking,
}

/// Maps a monotonically advancing playback time onto the closest
/// cached detection frame.
pub struct DetectionSynchronizer {
    frames: Vec<DetectionFrame>,
    last_idx: usize,
    state: PlaybackState,
    window_behind: usize,
    window_ahead: usize,
}

impl DetectionSynchronizer {
    /// Build a synchronizer over a timestamp-ascending detection list.
    pub fn new(mut frames: Vec<DetectionFrame>, config: &EngineConfig) -> Self {
        // The backend serves the cache in timestamp order; sorting is
        // a cheap invariant repair if it ever arrives shuffled.
        frames.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Self {
            frames,
            last_idx: 0,
            state: PlaybackState::Idle,
            window_behind: config.sync_window_behind,
            window_ahead: config.sync_window_ahead,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Playback started (or resumed). Restarts updates from the
    /// current cursor position.
    pub fn play(&mut self) {
        self.state = PlaybackState::Playing;
    }

    /// Playback paused. No further updates until `play` or `seek`.
    pub fn pause(&mut self) {
        self.state = PlaybackState::Idle;
    }

    /// The playback clock jumped discontinuously. Resets the cursor
    /// so the next query's neighborhood search starts unbiased.
    pub fn seek(&mut self) {
        self.last_idx = 0;
        self.state = PlaybackState::Seeking;
    }

    /// Query the detection frame nearest to playback time `t` and
    /// trim it to the given zone polygons.
    ///
    /// Returns `None` while idle (paused) or when the detection list
    /// is empty. Filtering always uses the polygons passed in — the
    /// caller supplies the *current* zone set, so zones edited during
    /// playback take effect on the very next query.
    pub fn sample(&mut self, t: f64, polygons: &[Vec<Point>]) -> Option<FilteredDetectionFrame> {
        if self.state == PlaybackState::Idle || self.frames.is_empty() {
            return None;
        }

        let winner = self.nearest_in_window(t);
        self.last_idx = winner;
        self.state = PlaybackState::Playing;

        Some(filter_frame(&self.frames[winner], polygons))
    }

    /// Index of the frame minimizing `|timestamp - t|` within the
    /// bounded neighborhood `[last_idx - behind, last_idx + ahead)`,
    /// clamped to the list bounds.
    fn nearest_in_window(&self, t: f64) -> usize {
        let lo = self.last_idx.saturating_sub(self.window_behind);
        let hi = (self.last_idx + self.window_ahead).min(self.frames.len());

        let mut best = lo;
        let mut best_delta = f64::INFINITY;
        for idx in lo..hi {
            let delta = (self.frames[idx].timestamp - t).abs();
            if delta < best_delta {
                best = idx;
                best_delta = delta;
            }
        }
        best
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
