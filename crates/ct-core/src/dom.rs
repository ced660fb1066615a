//! Host abstractions
//!
//! The engine never touches a browser API directly. A host (the wasm
//! bindings, the CLI simulator, tests) provides the live document through
//! [`Dom`] and delayed callbacks through [`Timers`]. Both are driven from a
//! single thread; nothing here needs to be `Send`.

use std::time::Duration;

use crate::types::FeatureId;

/// Error type for document operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Invalid selector '{0}'")]
    InvalidSelector(String),
    #[error("Document is detached")]
    Detached,
    #[error("Script error: {0}")]
    Script(String),
}

/// The custom view mounted in place of the home feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayView {
    pub message: String,
    pub reduced_motion: bool,
}

/// Live document of the host page.
pub trait Dom {
    /// Handle to an element. Cheap to clone.
    type Node: Clone;

    /// Minimal readiness: the document has a root element to attach to.
    fn is_ready(&self) -> bool;

    /// Current navigable location (URL or path).
    fn location(&self) -> String;

    /// All elements currently matching a selector.
    fn query_all(&self, selector: &str) -> Result<Vec<Self::Node>, DomError>;

    /// Feature that marked this element hidden, if any.
    fn hidden_by(&self, node: &Self::Node) -> Option<FeatureId>;

    /// Hide an element and mark it with the owning feature.
    fn hide(&mut self, node: &Self::Node, feature: FeatureId) -> Result<(), DomError>;

    /// Clear the hidden marking and style.
    fn reveal(&mut self, node: &Self::Node) -> Result<(), DomError>;

    /// Insert (or replace) a stylesheet with the given id.
    fn insert_style(&mut self, id: &str, css: &str) -> Result<(), DomError>;

    /// Remove a stylesheet. Missing ids are not an error.
    fn remove_style(&mut self, id: &str) -> Result<(), DomError>;

    /// Mount the isolated overlay surface at the document root.
    fn mount_overlay(&mut self, view: &OverlayView) -> Result<(), DomError>;

    /// Tear the overlay surface down. Not mounted is not an error.
    fn unmount_overlay(&mut self) -> Result<(), DomError>;
}

// =============================================================================
// Timers
// =============================================================================

/// Handle returned by [`Timers::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u32);

/// Work to run when a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTask {
    /// Next region lookup attempt for a feature
    Retry(FeatureId),
    /// Debounced apply pass after a navigation
    Navigation,
}

/// One-shot timer scheduling on the host event loop.
///
/// When a timer fires the host calls `Orchestrator::on_timer` with the id
/// and task it was scheduled with.
pub trait Timers {
    fn schedule(&mut self, delay: Duration, task: TimerTask) -> TimerId;
    fn cancel(&mut self, id: TimerId);
}
