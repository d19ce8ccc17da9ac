//! Read path — ask the current owner to convert a selection into our
//! surrogate's property, then fetch it.

use std::time::{Duration, Instant};

use x11rb::protocol::xproto::Atom;

use super::SelectionError;
use super::atoms::{FormatRegistry, Markers};
use super::backend::{
    ConversionRequest, NONE, Property, SelectionBackend, SelectionEvent, SelectionNotify,
    fetch_property,
};
use super::surrogate::Surrogate;

/// Read the named selection as UTF-8 text.
///
/// Returns `""` if the selection has no owner. Embedded NUL bytes are
/// part of the result.
pub fn read<B: SelectionBackend>(
    backend: &B,
    selection: &str,
    timeout: Duration,
) -> Result<String, SelectionError> {
    let mut registry = FormatRegistry::new(backend);
    let atom = registry.selection(selection)?;
    let markers = Markers::intern(&mut registry)?;

    let Some(property) = convert(backend, &markers, atom, markers.utf8, timeout)? else {
        tracing::debug!(selection, "selection has no owner");
        return Ok(String::new());
    };

    if property.type_ == markers.incr {
        return Err(SelectionError::ProtocolFailure(
            "owner requested an incremental transfer, which is not supported".into(),
        ));
    }

    let text = String::from_utf8(property.data).map_err(|e| {
        SelectionError::ProtocolFailure(format!("owner supplied invalid UTF-8: {e}"))
    })?;
    tracing::debug!(selection, bytes = text.len(), "selection read");
    Ok(text)
}

/// List the targets the owner of the named selection advertises.
pub fn targets<B: SelectionBackend>(
    backend: &B,
    selection: &str,
    timeout: Duration,
) -> Result<Vec<String>, SelectionError> {
    let mut registry = FormatRegistry::new(backend);
    let atom = registry.selection(selection)?;
    let markers = Markers::intern(&mut registry)?;

    let Some(property) = convert(backend, &markers, atom, markers.targets, timeout)? else {
        return Ok(Vec::new());
    };
    if property.format != 32 {
        return Err(SelectionError::ProtocolFailure(format!(
            "TARGETS reply has format {}, expected 32",
            property.format
        )));
    }

    property
        .as_longs()
        .into_iter()
        .filter(|&a| a != NONE)
        .map(|a| registry.name_of(a))
        .collect()
}

/// Convert `selection` to `target` and fetch the result.
///
/// `Ok(None)` if the selection is unowned; in that case no surrogate
/// is created.
fn convert<B: SelectionBackend>(
    backend: &B,
    markers: &Markers,
    selection: Atom,
    target: Atom,
    timeout: Duration,
) -> Result<Option<Property>, SelectionError> {
    if backend.selection_owner(selection)? == NONE {
        return Ok(None);
    }

    let surrogate = Surrogate::create(backend)?;
    let request = ConversionRequest {
        requestor: surrogate.window(),
        selection,
        target,
        property: markers.property,
    };
    backend.convert_selection(&request)?;

    let notify = await_reply(backend, &request, timeout)?;
    if notify.property == NONE {
        return Err(SelectionError::ProtocolFailure(
            "owner could not convert the selection (likely non-text data)".into(),
        ));
    }

    let property = fetch_property(backend, surrogate.window(), notify.property)?;
    Ok(Some(property))
}

/// Wait for the reply correlated with `request`, skipping anything else.
fn await_reply<B: SelectionBackend>(
    backend: &B,
    request: &ConversionRequest,
    timeout: Duration,
) -> Result<SelectionNotify, SelectionError> {
    let deadline = Instant::now() + timeout;
    loop {
        match backend.wait_event(deadline)? {
            Some(SelectionEvent::Notify(notify)) if request.answered_by(&notify) => {
                return Ok(notify);
            }
            Some(other) => {
                tracing::debug!(event = ?other, "ignoring unrelated event while awaiting conversion");
            }
            None => {
                return Err(SelectionError::Timeout {
                    stage: "conversion",
                    after: timeout,
                });
            }
        }
    }
}
