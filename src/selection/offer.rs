//! What a writer offers while it owns a selection, and how it answers
//! `SelectionRequest`s for it.

use x11rb::protocol::xproto::Atom;

use super::SelectionError;
use super::atoms::Markers;
use super::backend::{
    NONE, Property, SelectionBackend, SelectionNotify, SelectionRequest, fetch_property,
};
use super::encoding::Payload;

/// Size reported for targets whose size is not known up front.
const UNKNOWN_SIZE: u32 = u32::MAX; // -1 as a CARD32

/// Outcome of serving one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    /// Data was written to the requestor's property.
    Supplied,
    /// Target unsupported; the requestor got a notify with target `NONE`.
    Refused,
}

/// Targets and sizes advertised for one write call.
pub struct Offer<'a> {
    markers: &'a Markers,
    payload: &'a Payload,
    targets: [Atom; 6],
    sizes: [u32; 12],
}

impl<'a> Offer<'a> {
    pub fn new(markers: &'a Markers, payload: &'a Payload) -> Self {
        let targets = [
            markers.targets,
            markers.utf8,
            markers.string,
            markers.timestamp,
            markers.save_targets,
            markers.target_sizes,
        ];
        let sizes = [
            markers.targets,
            (targets.len() * 4) as u32,
            markers.utf8,
            payload.utf8().len() as u32,
            markers.string,
            payload.latin1().len() as u32,
            markers.timestamp,
            UNKNOWN_SIZE,
            markers.save_targets,
            UNKNOWN_SIZE,
            markers.target_sizes,
            (12 * 4) as u32,
        ];
        Self {
            markers,
            payload,
            targets,
            sizes,
        }
    }

    /// Answer one foreign request and notify the requestor.
    pub fn serve<B: SelectionBackend>(
        &self,
        backend: &B,
        request: &SelectionRequest,
    ) -> Result<Served, SelectionError> {
        let m = self.markers;
        let destination = request.destination();

        let served = if request.target == m.targets {
            let value = Property::longs(m.atom, &self.targets);
            backend.change_property(request.requestor, destination, &value)?;
            Served::Supplied
        } else if request.target == m.target_sizes {
            let value = Property::longs(m.atom_pair, &self.sizes);
            backend.change_property(request.requestor, destination, &value)?;
            Served::Supplied
        } else if request.target == m.multiple {
            self.serve_multiple(backend, request)?;
            Served::Supplied
        } else if let Some(value) = self.text_for(request.target) {
            backend.change_property(request.requestor, destination, &value)?;
            Served::Supplied
        } else {
            Served::Refused
        };

        let notify = SelectionNotify {
            time: request.time,
            requestor: request.requestor,
            selection: request.selection,
            target: match served {
                Served::Supplied => request.target,
                Served::Refused => NONE,
            },
            property: destination,
        };
        backend.send_notify(&notify)?;

        tracing::debug!(
            requestor = request.requestor,
            owner = request.owner,
            target = request.target,
            property = destination,
            ?served,
            "answered selection request"
        );
        Ok(served)
    }

    /// Resolve each (target, property) pair of a `MULTIPLE` request.
    ///
    /// Unsupported targets get an empty format-32 property typed as the
    /// requested target, rather than being skipped.
    fn serve_multiple<B: SelectionBackend>(
        &self,
        backend: &B,
        request: &SelectionRequest,
    ) -> Result<(), SelectionError> {
        let pairs = fetch_property(backend, request.requestor, request.property)?.as_longs();

        for pair in pairs.chunks_exact(2) {
            let (target, property) = (pair[0], pair[1]);
            let value = self.text_for(target).unwrap_or(Property {
                type_: target,
                format: 32,
                data: Vec::new(),
            });
            backend.change_property(request.requestor, property, &value)?;
        }
        Ok(())
    }

    fn text_for(&self, target: Atom) -> Option<Property> {
        if target == self.markers.utf8 {
            Some(Property::bytes(self.markers.utf8, self.payload.utf8()))
        } else if target == self.markers.string {
            Some(Property::bytes(self.markers.string, self.payload.latin1()))
        } else {
            None
        }
    }
}
