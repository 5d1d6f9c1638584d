//! Deterministic replay of recorded pan cycles: normalization, keyframe compilation,
//! derived-state reconstruction, and timer-driven playback.

pub mod engine;
pub mod error;
pub mod keyframe;
pub mod layout;
pub mod normalize;
pub mod playback;
pub mod protein;
pub mod registry;

pub use engine::{ReplayEngine, SeekReport};
pub use error::{ReplayError, Result};
pub use keyframe::{Keyframe, PanEvent, RejectReason, RejectedEvent, Timeline};
pub use layout::Position;
pub use normalize::{
    normalize_rows, CycleRecord, NormalizeReport, RawRow, ReplayDataset, RowIssue,
};
pub use playback::{PlaybackDriver, PollOutcome, Renderer};
pub use registry::{EntityRegistry, EventKey, Machine, Notification, Pan};
