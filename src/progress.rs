//! Stage observation for a single conversion request.
//!
//! Every request walks the same state machine:
//!
//! ```text
//! Received → Validating → Normalizing → LayingOut → Assembling → Completed
//!     └──────────┴─────────────┴────────────┴───────────┴──▶ Failed(kind)
//! ```
//!
//! Pass an observer to [`crate::convert::convert_observed`] to receive every
//! transition, e.g. to drive a progress bar or to count failures. An observer
//! belongs to one call; concurrent requests each get their own.
//!
//! # Example
//!
//! ```rust
//! use pdfbridge::{ConversionObserver, Stage};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Recorder(Mutex<Vec<Stage>>);
//!
//! impl ConversionObserver for Recorder {
//!     fn on_stage(&self, stage: Stage) {
//!         self.0.lock().unwrap().push(stage);
//!     }
//! }
//! ```

use crate::error::FailureKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a conversion request currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "stage", content = "kind")]
pub enum Stage {
    Received,
    Validating,
    Normalizing,
    LayingOut,
    Assembling,
    Completed,
    Failed(FailureKind),
}

impl Stage {
    /// `Completed` and `Failed` end the request.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed(_))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Received => f.write_str("received"),
            Stage::Validating => f.write_str("validating"),
            Stage::Normalizing => f.write_str("normalizing"),
            Stage::LayingOut => f.write_str("laying out"),
            Stage::Assembling => f.write_str("assembling"),
            Stage::Completed => f.write_str("completed"),
            Stage::Failed(kind) => write!(f, "failed ({kind:?})"),
        }
    }
}

/// Receives stage transitions of one conversion.
///
/// Implementations must be `Send + Sync`: the pipeline reports from
/// whichever runtime thread is driving the request.
pub trait ConversionObserver: Send + Sync {
    /// Called on entering `stage`.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ConversionObserver for NoopObserver {}
