//! Write path — claim CLIPBOARD, ask the clipboard manager to take it
//! over (`SAVE_TARGETS`), and serve every request that arrives until
//! the manager confirms.
//!
//! The handshake is an explicit state machine ([`WriteState`]) driven
//! by [`WriteState::next`]; the loop in [`write`] only gathers inputs.

use std::time::{Duration, Instant};

use super::SelectionError;
use super::atoms::{FormatRegistry, MANAGER_SELECTION, Markers};
use super::backend::{ConversionRequest, NONE, Property, SelectionBackend, SelectionEvent};
use super::encoding::Payload;
use super::offer::Offer;
use super::surrogate::Surrogate;

/// Selection written by [`write`].
const TARGET_SELECTION: &str = "CLIPBOARD";

/// Progress of one write call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Idle,
    /// Manager present; about to claim the selection.
    OwnershipPending,
    /// We own the selection; handoff not yet requested.
    OwnedAwaitingManager,
    /// Handoff requested; answering requests until the manager replies.
    ServicingRequest,
    /// The manager owns the data now.
    HandedOff,
}

/// Inputs that move a [`WriteState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEvent {
    ManagerProbed { present: bool },
    OwnershipChecked { confirmed: bool },
    HandoffRequested,
    RequestServed,
    HandoffReplied { accepted: bool },
    DeadlineElapsed { after: Duration },
}

impl WriteState {
    /// Transition function. Failure states are the error variants.
    pub fn next(self, event: WriteEvent) -> Result<WriteState, SelectionError> {
        use WriteEvent::*;
        use WriteState::*;

        match (self, event) {
            (Idle, ManagerProbed { present: true }) => Ok(OwnershipPending),
            (Idle, ManagerProbed { present: false }) => Err(SelectionError::NoManager),

            (OwnershipPending, OwnershipChecked { confirmed: true }) => Ok(OwnedAwaitingManager),
            (OwnershipPending, OwnershipChecked { confirmed: false }) => {
                Err(SelectionError::OwnershipLost)
            }

            (OwnedAwaitingManager, HandoffRequested) => Ok(ServicingRequest),

            (ServicingRequest, RequestServed) => Ok(ServicingRequest),
            (ServicingRequest, HandoffReplied { accepted: true }) => Ok(HandedOff),
            (ServicingRequest, HandoffReplied { accepted: false }) => {
                Err(SelectionError::HandoffFailed)
            }
            (ServicingRequest, DeadlineElapsed { after }) => Err(SelectionError::Timeout {
                stage: "handoff",
                after,
            }),

            (state, event) => Err(SelectionError::ProtocolFailure(format!(
                "unexpected {event:?} in write state {state:?}"
            ))),
        }
    }
}

/// Write `text` to CLIPBOARD and hand it to the clipboard manager.
///
/// Returns `text` unchanged on success. Fails `NoManager` without
/// touching any selection when no manager is running.
pub fn write<B: SelectionBackend>(
    backend: &B,
    text: &str,
    timeout: Duration,
) -> Result<String, SelectionError> {
    let payload = Payload::encode(text);
    let mut registry = FormatRegistry::new(backend);
    let markers = Markers::intern(&mut registry)?;
    let offer = Offer::new(&markers, &payload);
    let mut state = WriteState::Idle;

    // Manager probe.
    let manager = registry.lookup(MANAGER_SELECTION)?;
    let manager_owner = match manager {
        Some(atom) => backend.selection_owner(atom)?,
        None => NONE,
    };
    state = state.next(WriteEvent::ManagerProbed {
        present: manager_owner != NONE,
    })?;
    let manager = manager.ok_or(SelectionError::NoManager)?;
    tracing::debug!(manager_owner, "clipboard manager present");

    // Claim the selection.
    let selection = registry.marker(TARGET_SELECTION)?;
    let surrogate = Surrogate::create(backend)?;
    backend.set_selection_owner(surrogate.window(), selection)?;
    let owner = backend.selection_owner(selection)?;
    state = state.next(WriteEvent::OwnershipChecked {
        confirmed: owner == surrogate.window(),
    })?;

    // Ask the manager to take over. The property on our window lists
    // the targets it should save.
    backend.change_property(
        surrogate.window(),
        markers.property,
        &Property::longs(markers.atom, &[markers.utf8]),
    )?;
    let handoff = ConversionRequest {
        requestor: surrogate.window(),
        selection: manager,
        target: markers.save_targets,
        property: markers.property,
    };
    backend.convert_selection(&handoff)?;
    state = state.next(WriteEvent::HandoffRequested)?;

    let deadline = Instant::now() + timeout;
    while state != WriteState::HandedOff {
        let event = match backend.wait_event(deadline)? {
            Some(event) => event,
            None => {
                state = state.next(WriteEvent::DeadlineElapsed { after: timeout })?;
                continue;
            }
        };

        match event {
            SelectionEvent::Request(request) => {
                offer.serve(backend, &request)?;
                state = state.next(WriteEvent::RequestServed)?;
            }
            SelectionEvent::Notify(notify) if handoff.answered_by(&notify) => {
                state = state.next(WriteEvent::HandoffReplied {
                    accepted: notify.property != NONE,
                })?;
            }
            SelectionEvent::Notify(notify) => {
                tracing::debug!(?notify, "ignoring unrelated selection notify");
            }
            SelectionEvent::Clear { selection: lost } => {
                tracing::debug!(selection = lost, "selection ownership passed on");
            }
        }
    }

    tracing::info!(bytes = payload.utf8().len(), "clipboard handed off to manager");
    Ok(text.to_string())
}
