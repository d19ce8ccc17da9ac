//! X11 selection (clipboard) protocol — read, write with manager
//! handoff, clear.
//!
//! Every public operation opens its own [`x11::ConnectionScope`], runs
//! one protocol exchange to completion, and releases the connection
//! (and any surrogate window) before returning, on every exit path.
//!
//! The protocol logic in [`reader`], [`writer`], and [`clearer`] is
//! written against the [`backend::SelectionBackend`] seam so it can run
//! against either a live display or the in-memory fake used by tests.

mod atoms;
mod backend;
mod clearer;
mod encoding;
#[cfg(test)]
mod fake;
mod offer;
mod reader;
mod surrogate;
mod writer;
mod x11;

use std::time::Duration;

use x11::ConnectionScope;

/// Selection used when the caller does not name one.
pub const DEFAULT_SELECTION: &str = "clipboard";

/// Errors surfaced by selection operations.
///
/// An unowned selection is not an error: reads of it return an empty
/// result.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    /// A selection or format name has no identifier on this display.
    #[error("invalid selection name: {0:?}")]
    InvalidName(String),

    /// The owner could not (or would not) convert the selection.
    #[error("conversion failed: {0}")]
    ProtocolFailure(String),

    /// Nobody owns the `CLIPBOARD_MANAGER` selection.
    #[error("no clipboard manager is running")]
    NoManager,

    /// Another client owned the selection right after we claimed it.
    #[error("could not acquire ownership of the selection")]
    OwnershipLost,

    /// The clipboard manager declined to take over the selection.
    #[error("clipboard manager refused the handoff; data was not persisted")]
    HandoffFailed,

    /// A bounded wait elapsed before the expected reply arrived.
    #[error("timed out after {after:?} waiting for {stage} reply")]
    Timeout {
        stage: &'static str,
        after: Duration,
    },

    /// Low-level fault reported by the X11 connection.
    #[error("X11: {0}")]
    X11(String),
}

impl From<x11rb::errors::ConnectError> for SelectionError {
    fn from(e: x11rb::errors::ConnectError) -> Self {
        Self::X11(format!("connect failed: {e}"))
    }
}

impl From<x11rb::errors::ConnectionError> for SelectionError {
    fn from(e: x11rb::errors::ConnectionError) -> Self {
        Self::X11(format!("connection: {e}"))
    }
}

impl From<x11rb::errors::ReplyError> for SelectionError {
    fn from(e: x11rb::errors::ReplyError) -> Self {
        Self::X11(format!("reply: {e}"))
    }
}

impl From<x11rb::errors::ReplyOrIdError> for SelectionError {
    fn from(e: x11rb::errors::ReplyOrIdError) -> Self {
        Self::X11(format!("reply or id: {e}"))
    }
}

/// Bounds on the two blocking waits in the protocol.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Wait for the owner's reply to a conversion request (read path).
    pub conversion: Duration,
    /// Wait for the clipboard manager to finish a handoff (write path).
    pub handoff: Duration,
}

/// Read the text content of the named selection.
///
/// Returns an empty string if the selection has no owner.
pub fn read(selection: &str, timeouts: &Timeouts) -> Result<String, SelectionError> {
    let scope = ConnectionScope::open()?;
    reader::read(&scope, selection, timeouts.conversion)
}

/// List the format names the current owner of `selection` offers.
pub fn targets(selection: &str, timeouts: &Timeouts) -> Result<Vec<String>, SelectionError> {
    let scope = ConnectionScope::open()?;
    reader::targets(&scope, selection, timeouts.conversion)
}

/// Put `text` on the CLIPBOARD selection and hand it to the clipboard
/// manager so it outlives this process. Returns `text` on success.
pub fn write(text: &str, timeouts: &Timeouts) -> Result<String, SelectionError> {
    let scope = ConnectionScope::open()?;
    writer::write(&scope, text, timeouts.handoff)
}

/// Release ownership of the named selections (CLIPBOARD when empty).
pub fn clear<S: AsRef<str>>(selections: &[S]) -> Result<(), SelectionError> {
    let scope = ConnectionScope::open()?;
    clearer::clear(&scope, selections)
}
