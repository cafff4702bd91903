//! Callback trait for workflow events.
//!
//! Inject an [`Arc<dyn WorkflowObserver>`] via
//! [`crate::config::ClientConfigBuilder::observer`] to follow the controller
//! as it moves between states and runs exports. The CLI uses it to drive its
//! spinner; a GUI would use it to toggle a loading indicator.
//!
//! # Example
//!
//! ```rust
//! use gonogo_client::{ClientConfig, WorkflowObserver, WorkflowStatus};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Recorder {
//!     seen: Mutex<Vec<WorkflowStatus>>,
//! }
//!
//! impl WorkflowObserver for Recorder {
//!     fn on_transition(&self, _from: WorkflowStatus, to: WorkflowStatus) {
//!         self.seen.lock().unwrap().push(to);
//!     }
//! }
//!
//! let config = ClientConfig::builder()
//!     .observer(Arc::new(Recorder::default()))
//!     .build()
//!     .unwrap();
//! ```

use crate::workflow::WorkflowStatus;
use std::path::Path;
use std::sync::Arc;

/// Receives workflow events from the controller.
///
/// All methods have default no-op implementations so implementors only
/// override what they care about.
pub trait WorkflowObserver: Send + Sync {
    /// Called on every status change, including the transient `Selecting`.
    fn on_transition(&self, from: WorkflowStatus, to: WorkflowStatus) {
        let _ = (from, to);
    }

    /// Called when an export starts from `Succeeded`.
    fn on_export_start(&self) {}

    /// Called when an export saved its artifact.
    fn on_export_complete(&self, path: &Path) {
        let _ = path;
    }

    /// Called when an export failed. The workflow stays `Succeeded`.
    fn on_export_error(&self, error: &str) {
        let _ = error;
    }
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {}

/// Type stored in [`crate::config::ClientConfig`].
pub type ObserverRef = Arc<dyn WorkflowObserver>;
