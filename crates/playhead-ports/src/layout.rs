use serde::{Deserialize, Serialize};

/// Screen geometry of the scrolling staff, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewGeometry {
    pub viewport_width_px: f64,
    /// Where the playhead line sits, measured from the left edge.
    pub target_x_px: f64,
    pub px_per_beat: f64,
}

impl Default for ViewGeometry {
    fn default() -> Self {
        Self {
            viewport_width_px: 1200.0,
            target_x_px: 200.0,
            px_per_beat: 100.0,
        }
    }
}

/// Initial on-screen x of one first-pass beat, before any scrolling.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeatAnchor {
    pub global_index: u64,
    pub screen_x: f64,
}

/// Implemented by the notation renderer. Queried once per session start.
pub trait LayoutPort: Send + Sync {
    fn geometry(&self) -> ViewGeometry;
    fn beat_anchors(&self) -> Vec<BeatAnchor>;
}
