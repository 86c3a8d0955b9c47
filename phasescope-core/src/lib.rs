//! # PhaseScope Core
//!
//! Viewer-side state. A [`ViewerSession`] owns the sliding window, the tab
//! board and the recompute pipeline; the diagnostics scheduler and axis
//! domain calculator hang off it.

pub mod axis;
pub mod board;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod local;
pub mod session;
pub mod window;

// Re-export the main struct so users can just use `phasescope_core::ViewerSession`
pub use session::{IngestOutcome, ViewerSession, WindowSnapshot};

pub use axis::AxisDomain;
pub use board::{CommitOutcome, GraphId, GraphInstance, Tab, TabBoard, TabId};
pub use config::{DiagnosticsConfig, Profile, SessionConfig};
pub use diagnostics::{CycleOutcome, DiagnosticsResult, DiagnosticsScheduler};
pub use error::SessionError;
pub use window::SlidingWindow;
