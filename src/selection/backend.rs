//! `SelectionBackend` trait — the display-server operations the
//! selection protocol needs, plus the request/event types that flow
//! through it.

use std::time::Instant;

use x11rb::protocol::xproto::{Atom, Window};

use super::SelectionError;

/// The "no atom" / "no window" value.
pub const NONE: u32 = x11rb::NONE;

/// A window property value.
///
/// `data` holds the raw bytes; for format 32 each item is a native-endian
/// `u32`, matching what the server sends a same-endian client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub type_: Atom,
    pub format: u8,
    pub data: Vec<u8>,
}

impl Property {
    /// Format-8 property.
    pub fn bytes(type_: Atom, data: &[u8]) -> Self {
        Self {
            type_,
            format: 8,
            data: data.to_vec(),
        }
    }

    /// Format-32 property.
    pub fn longs(type_: Atom, items: &[u32]) -> Self {
        Self {
            type_,
            format: 32,
            data: items.iter().flat_map(|v| v.to_ne_bytes()).collect(),
        }
    }

    /// Number of items in units of `format`.
    pub fn item_count(&self) -> u32 {
        match self.format {
            16 => (self.data.len() / 2) as u32,
            32 => (self.data.len() / 4) as u32,
            _ => self.data.len() as u32,
        }
    }

    /// Decode a format-32 property. Trailing partial items are dropped.
    pub fn as_longs(&self) -> Vec<u32> {
        self.data
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

/// One `GetProperty` reply.
#[derive(Debug, Clone)]
pub struct PropertyChunk {
    /// Actual type, `NONE` if the property does not exist.
    pub type_: Atom,
    pub format: u8,
    /// Bytes remaining after the returned slice.
    pub bytes_after: u32,
    pub value: Vec<u8>,
}

/// An outstanding `ConvertSelection` request, issued at `CurrentTime`.
#[derive(Debug, Clone, Copy)]
pub struct ConversionRequest {
    pub requestor: Window,
    pub selection: Atom,
    pub target: Atom,
    pub property: Atom,
}

impl ConversionRequest {
    /// Whether `notify` is the reply to this request.
    ///
    /// The reply must name our requestor and selection and report
    /// either our destination property or `NONE` (failure). The echoed
    /// time is not compared: owners may substitute their own time for
    /// `CurrentTime`.
    pub fn answered_by(&self, notify: &SelectionNotify) -> bool {
        notify.requestor == self.requestor
            && notify.selection == self.selection
            && (notify.property == self.property || notify.property == NONE)
    }
}

/// A foreign client asking the owner to convert a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRequest {
    pub time: u32,
    pub owner: Window,
    pub requestor: Window,
    pub selection: Atom,
    pub target: Atom,
    pub property: Atom,
}

impl SelectionRequest {
    /// Property the reply goes to. Obsolete clients send `NONE` and
    /// expect the target atom to be used as the property name.
    pub fn destination(&self) -> Atom {
        if self.property == NONE {
            self.target
        } else {
            self.property
        }
    }
}

/// Completion (or failure) of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionNotify {
    pub time: u32,
    pub requestor: Window,
    pub selection: Atom,
    pub target: Atom,
    pub property: Atom,
}

/// Selection events delivered to this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    Request(SelectionRequest),
    Notify(SelectionNotify),
    /// We lost ownership of `selection`.
    Clear { selection: Atom },
}

/// Display-server operations used by the selection protocol.
///
/// Methods take `&self` so a [`Surrogate`](super::surrogate::Surrogate)
/// can hold a shared borrow for its cleanup while the protocol keeps
/// issuing requests.
pub trait SelectionBackend {
    /// Look up (or create, unless `only_if_exists`) the atom for `name`.
    /// Returns `NONE` when `only_if_exists` is set and the atom is unknown.
    fn intern_atom(&self, name: &str, only_if_exists: bool) -> Result<Atom, SelectionError>;

    /// Name of an atom.
    fn atom_name(&self, atom: Atom) -> Result<String, SelectionError>;

    /// Current owner of `selection`, `NONE` if unowned.
    fn selection_owner(&self, selection: Atom) -> Result<Window, SelectionError>;

    /// Set (or with `NONE`, release) the owner of `selection` at
    /// `CurrentTime`.
    fn set_selection_owner(&self, owner: Window, selection: Atom) -> Result<(), SelectionError>;

    /// Create a 1×1 unmapped child of the root window.
    fn create_window(&self) -> Result<Window, SelectionError>;

    fn destroy_window(&self, window: Window) -> Result<(), SelectionError>;

    /// Issue `ConvertSelection`.
    fn convert_selection(&self, request: &ConversionRequest) -> Result<(), SelectionError>;

    /// `GetProperty` without delete; offset and length are in 32-bit units.
    fn get_property(
        &self,
        window: Window,
        property: Atom,
        long_offset: u32,
        long_length: u32,
    ) -> Result<PropertyChunk, SelectionError>;

    /// `ChangeProperty` in replace mode.
    fn change_property(
        &self,
        window: Window,
        property: Atom,
        value: &Property,
    ) -> Result<(), SelectionError>;

    /// Send a `SelectionNotify` to `notify.requestor`.
    fn send_notify(&self, notify: &SelectionNotify) -> Result<(), SelectionError>;

    /// Block until the next selection event or `deadline`.
    ///
    /// Returns `Ok(None)` only once the deadline has passed. Protocol
    /// errors reported by the server surface as `Err`.
    fn wait_event(&self, deadline: Instant) -> Result<Option<SelectionEvent>, SelectionError>;
}

/// Fetch a whole property in two phases: a zero-length query for its
/// size, then a read of exactly that many bytes.
///
/// The returned byte count is the server's, not a terminator search.
pub fn fetch_property<B: SelectionBackend>(
    backend: &B,
    window: Window,
    property: Atom,
) -> Result<Property, SelectionError> {
    let probe = backend.get_property(window, property, 0, 0)?;
    let total = probe.bytes_after;
    let chunk = backend.get_property(window, property, 0, total.div_ceil(4))?;

    let mut value = chunk.value;
    value.truncate(total as usize);

    Ok(Property {
        type_: chunk.type_,
        format: chunk.format,
        data: value,
    })
}
