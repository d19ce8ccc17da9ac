//! In-memory display server for protocol tests.
//!
//! Tracks atoms, selection owners, windows, and properties, queues the
//! events the real server would deliver to our client, and plays the
//! part of foreign clients (text owners, a clipboard manager, plain
//! requestors) so every protocol path runs without a live display.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use x11rb::protocol::xproto::{Atom, Window};

use super::SelectionError;
use super::backend::{
    ConversionRequest, NONE, Property, PropertyChunk, SelectionBackend, SelectionEvent,
    SelectionNotify, SelectionRequest,
};

/// First id handed to windows our client creates.
const CLIENT_WINDOW_BASE: Window = 0x0040_0001;
/// First id handed to simulated foreign windows.
const FOREIGN_WINDOW_BASE: Window = 0x0100_0001;
/// Window that "steals" ownership in `steal_ownership` mode.
const INTRUDER: Window = 0x0fff_0001;

/// Behaviour of a simulated foreign selection owner.
#[derive(Debug, Clone)]
pub enum Peer {
    /// Serves `UTF8_STRING` (and `TARGETS`).
    Text(Vec<u8>),
    /// Only offers an image; text conversions fail.
    Opaque,
    /// Never answers.
    Silent,
    /// Plain client that only issues requests of its own.
    Requester,
    /// A clipboard manager.
    Manager(Manager),
}

impl Peer {
    pub fn text(text: &str) -> Self {
        Peer::Text(text.as_bytes().to_vec())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerMode {
    /// Fetches TARGETS then UTF8_STRING, takes CLIPBOARD, confirms.
    Cooperative,
    /// Answers SAVE_TARGETS with a failure notice.
    Refusing,
    /// Never answers SAVE_TARGETS.
    Silent,
}

#[derive(Debug, Clone)]
pub struct Manager {
    mode: ManagerMode,
    /// Data saved from the last handoff.
    saved: Option<Vec<u8>>,
    /// Targets listed by the writer's SAVE_TARGETS property.
    save_targets: Option<Vec<Atom>>,
    /// Handoff being processed.
    handoff: Option<ConversionRequest>,
}

#[derive(Debug, Default)]
struct Server {
    atoms: HashMap<String, Atom>,
    names: HashMap<Atom, String>,
    next_atom: Atom,
    intern_calls: usize,

    owners: HashMap<Atom, Window>,
    ownership_changes: usize,
    steal_ownership: bool,
    reject_foreign_writes: bool,
    broken_connection: Option<String>,

    live: HashSet<Window>,
    next_window: Window,
    windows_created: usize,
    peers: HashMap<Window, Peer>,
    next_foreign: Window,

    properties: HashMap<(Window, Atom), Property>,
    queue: VecDeque<SelectionEvent>,
    sent: Vec<SelectionNotify>,
}

pub struct FakeDisplay {
    server: RefCell<Server>,
}

impl FakeDisplay {
    /// A display with the predefined atoms plus `CLIPBOARD`.
    pub fn new() -> Self {
        let mut server = Server {
            next_atom: 69,
            next_window: CLIENT_WINDOW_BASE,
            next_foreign: FOREIGN_WINDOW_BASE,
            ..Server::default()
        };
        for (name, atom) in [
            ("PRIMARY", 1),
            ("SECONDARY", 2),
            ("ATOM", 4),
            ("STRING", 31),
        ] {
            server.atoms.insert(name.to_string(), atom);
            server.names.insert(atom, name.to_string());
        }
        server.intern("CLIPBOARD");
        Self {
            server: RefCell::new(server),
        }
    }

    // -- Scenario setup --

    /// Intern `name` (creating it) without counting as a client call.
    pub fn intern(&self, name: &str) -> Atom {
        self.server.borrow_mut().intern(name)
    }

    /// A foreign window owning `selection` with behaviour `peer`.
    pub fn add_owner(&self, selection: &str, peer: Peer) -> Window {
        let mut s = self.server.borrow_mut();
        let atom = s.intern(selection);
        let window = s.add_peer(peer);
        s.owners.insert(atom, window);
        window
    }

    /// A clipboard manager owning `CLIPBOARD_MANAGER`.
    pub fn add_manager(&self, mode: ManagerMode) -> Window {
        self.add_owner(
            "CLIPBOARD_MANAGER",
            Peer::Manager(Manager {
                mode,
                saved: None,
                save_targets: None,
                handoff: None,
            }),
        )
    }

    /// A foreign window that owns nothing.
    pub fn add_requester(&self) -> Window {
        self.server.borrow_mut().add_peer(Peer::Requester)
    }

    /// Make every ownership claim by our client lose to another client.
    pub fn steal_ownership(&self) {
        self.server.borrow_mut().steal_ownership = true;
    }

    /// Fail every `change_property` on a window our client did not create.
    pub fn reject_foreign_writes(&self) {
        self.server.borrow_mut().reject_foreign_writes = true;
    }

    /// Make every later `wait_event` report `error` as a connection fault.
    pub fn break_connection(&self, error: &str) {
        self.server.borrow_mut().broken_connection = Some(error.to_string());
    }

    pub fn push_event(&self, event: SelectionEvent) {
        self.server.borrow_mut().queue.push_back(event);
    }

    pub fn set_property(&self, window: Window, property: Atom, value: Property) {
        self.server
            .borrow_mut()
            .properties
            .insert((window, property), value);
    }

    // -- Inspection --

    pub fn atom(&self, name: &str) -> Option<Atom> {
        self.server.borrow().atoms.get(name).copied()
    }

    pub fn intern_calls(&self) -> usize {
        self.server.borrow().intern_calls
    }

    pub fn owner_of(&self, selection: &str) -> Window {
        let s = self.server.borrow();
        s.atoms
            .get(selection)
            .and_then(|a| s.owners.get(a))
            .copied()
            .unwrap_or(NONE)
    }

    /// `set_selection_owner` calls made by our client.
    pub fn ownership_changes(&self) -> usize {
        self.server.borrow().ownership_changes
    }

    pub fn is_live(&self, window: Window) -> bool {
        self.server.borrow().live.contains(&window)
    }

    /// Client windows not yet destroyed.
    pub fn live_windows(&self) -> usize {
        self.server.borrow().live.len()
    }

    pub fn windows_created(&self) -> usize {
        self.server.borrow().windows_created
    }

    pub fn property(&self, window: Window, property: Atom) -> Option<Property> {
        self.server
            .borrow()
            .properties
            .get(&(window, property))
            .cloned()
    }

    /// Every `SelectionNotify` our client sent, in order.
    pub fn sent_notifies(&self) -> Vec<SelectionNotify> {
        self.server.borrow().sent.clone()
    }

    /// What the last handoff asked the manager to save.
    pub fn manager_save_targets(&self) -> Option<Vec<Atom>> {
        self.server.borrow().peers.values().find_map(|p| match p {
            Peer::Manager(m) => m.save_targets.clone(),
            _ => None,
        })
    }
}

impl Server {
    fn intern(&mut self, name: &str) -> Atom {
        if let Some(&atom) = self.atoms.get(name) {
            return atom;
        }
        let atom = self.next_atom;
        self.next_atom += 1;
        self.atoms.insert(name.to_string(), atom);
        self.names.insert(atom, name.to_string());
        atom
    }

    fn add_peer(&mut self, peer: Peer) -> Window {
        let window = self.next_foreign;
        self.next_foreign += 1;
        self.peers.insert(window, peer);
        window
    }

    fn atom_named(&self, name: &str) -> Atom {
        self.atoms.get(name).copied().unwrap_or(NONE)
    }

    fn notify(&mut self, request: &ConversionRequest, property: Atom) {
        self.queue.push_back(SelectionEvent::Notify(SelectionNotify {
            time: x11rb::CURRENT_TIME,
            requestor: request.requestor,
            selection: request.selection,
            target: request.target,
            property,
        }));
    }

    /// Transfer `selection` to `owner`, telling a client-side previous
    /// owner it lost it.
    fn take_ownership(&mut self, selection: Atom, owner: Window) {
        if let Some(previous) = self.owners.insert(selection, owner)
            && previous != owner
            && self.live.contains(&previous)
        {
            self.queue.push_back(SelectionEvent::Clear { selection });
        }
    }

    /// A peer owner answers our `ConvertSelection`.
    fn answer_conversion(&mut self, owner: Window, request: &ConversionRequest) {
        let targets = self.atom_named("TARGETS");
        let save_targets = self.atom_named("SAVE_TARGETS");
        let manager_sel = self.atom_named("CLIPBOARD_MANAGER");
        let atom_type = self.atom_named("ATOM");

        let Some(peer) = self.peers.get(&owner).cloned() else {
            self.notify(request, NONE);
            return;
        };

        match peer {
            Peer::Silent => {}
            Peer::Requester => self.notify(request, NONE),
            Peer::Opaque => {
                if request.target == targets {
                    let png = self.intern("image/png");
                    self.properties.insert(
                        (request.requestor, request.property),
                        Property::longs(atom_type, &[targets, png]),
                    );
                    self.notify(request, request.property);
                } else {
                    self.notify(request, NONE);
                }
            }
            Peer::Text(data) => self.serve_text(request, &data),
            Peer::Manager(mut manager) => {
                if request.selection == manager_sel && request.target == save_targets {
                    manager.save_targets = self
                        .properties
                        .get(&(request.requestor, request.property))
                        .map(Property::as_longs);
                    match manager.mode {
                        ManagerMode::Silent => {}
                        ManagerMode::Refusing => self.notify(request, NONE),
                        ManagerMode::Cooperative => {
                            manager.handoff = Some(*request);
                            self.manager_request(owner, request.requestor, targets, "MGR_TARGETS");
                        }
                    }
                    self.peers.insert(owner, Peer::Manager(manager));
                } else if let Some(saved) = manager.saved {
                    self.serve_text(request, &saved);
                } else {
                    self.notify(request, NONE);
                }
            }
        }
    }

    fn serve_text(&mut self, request: &ConversionRequest, data: &[u8]) {
        let targets = self.atom_named("TARGETS");
        let utf8 = self.atom_named("UTF8_STRING");
        let atom_type = self.atom_named("ATOM");
        let key = (request.requestor, request.property);

        if request.target == utf8 {
            self.properties.insert(key, Property::bytes(utf8, data));
            self.notify(request, request.property);
        } else if request.target == targets {
            self.properties
                .insert(key, Property::longs(atom_type, &[targets, utf8]));
            self.notify(request, request.property);
        } else {
            self.notify(request, NONE);
        }
    }

    /// The manager asks our surrogate for `target`.
    fn manager_request(&mut self, manager: Window, owner: Window, target: Atom, into: &str) {
        let clipboard = self.atom_named("CLIPBOARD");
        let property = self.intern(into);
        self.queue.push_back(SelectionEvent::Request(SelectionRequest {
            time: 0,
            owner,
            requestor: manager,
            selection: clipboard,
            target,
            property,
        }));
    }

    /// React to a notify our client sent to a manager.
    fn manager_received(&mut self, manager_window: Window, notify: &SelectionNotify) {
        let Some(Peer::Manager(mut manager)) = self.peers.get(&manager_window).cloned() else {
            return;
        };
        let Some(handoff) = manager.handoff else {
            return;
        };
        let targets = self.atom_named("TARGETS");
        let utf8 = self.atom_named("UTF8_STRING");
        let clipboard = self.atom_named("CLIPBOARD");

        if notify.target == targets {
            let offered = self
                .properties
                .get(&(manager_window, notify.property))
                .map(Property::as_longs)
                .unwrap_or_default();
            if offered.contains(&utf8) {
                self.manager_request(manager_window, handoff.requestor, utf8, "MGR_DATA");
            } else {
                manager.handoff = None;
                self.notify(&handoff, NONE);
            }
        } else if notify.target == utf8 {
            manager.saved = self
                .properties
                .get(&(manager_window, notify.property))
                .map(|p| p.data.clone());
            manager.handoff = None;
            self.take_ownership(clipboard, manager_window);
            self.notify(&handoff, handoff.property);
        } else {
            manager.handoff = None;
            self.notify(&handoff, NONE);
        }
        self.peers.insert(manager_window, Peer::Manager(manager));
    }
}

impl SelectionBackend for FakeDisplay {
    fn intern_atom(&self, name: &str, only_if_exists: bool) -> Result<Atom, SelectionError> {
        let mut s = self.server.borrow_mut();
        s.intern_calls += 1;
        if only_if_exists {
            Ok(s.atom_named(name))
        } else {
            Ok(s.intern(name))
        }
    }

    fn atom_name(&self, atom: Atom) -> Result<String, SelectionError> {
        self.server
            .borrow()
            .names
            .get(&atom)
            .cloned()
            .ok_or_else(|| SelectionError::X11(format!("Atom error (bad value 0x{atom:x})")))
    }

    fn selection_owner(&self, selection: Atom) -> Result<Window, SelectionError> {
        Ok(self
            .server
            .borrow()
            .owners
            .get(&selection)
            .copied()
            .unwrap_or(NONE))
    }

    fn set_selection_owner(&self, owner: Window, selection: Atom) -> Result<(), SelectionError> {
        let mut s = self.server.borrow_mut();
        s.ownership_changes += 1;
        if owner == NONE {
            s.owners.remove(&selection);
        } else if s.steal_ownership {
            s.owners.insert(selection, INTRUDER);
        } else {
            s.take_ownership(selection, owner);
        }
        Ok(())
    }

    fn create_window(&self) -> Result<Window, SelectionError> {
        let mut s = self.server.borrow_mut();
        let window = s.next_window;
        s.next_window += 1;
        s.windows_created += 1;
        s.live.insert(window);
        Ok(window)
    }

    fn destroy_window(&self, window: Window) -> Result<(), SelectionError> {
        let mut s = self.server.borrow_mut();
        if !s.live.remove(&window) {
            return Err(SelectionError::X11(format!(
                "Window error (bad value 0x{window:x})"
            )));
        }
        s.properties.retain(|&(w, _), _| w != window);
        s.owners.retain(|_, owner| *owner != window);
        Ok(())
    }

    fn convert_selection(&self, request: &ConversionRequest) -> Result<(), SelectionError> {
        let mut s = self.server.borrow_mut();
        match s.owners.get(&request.selection).copied() {
            None => s.notify(request, NONE),
            Some(owner) if s.live.contains(&owner) => {
                // We own it ourselves: the server routes the request back to us.
                s.queue.push_back(SelectionEvent::Request(SelectionRequest {
                    time: x11rb::CURRENT_TIME,
                    owner,
                    requestor: request.requestor,
                    selection: request.selection,
                    target: request.target,
                    property: request.property,
                }));
            }
            Some(owner) => s.answer_conversion(owner, request),
        }
        Ok(())
    }

    fn get_property(
        &self,
        window: Window,
        property: Atom,
        long_offset: u32,
        long_length: u32,
    ) -> Result<PropertyChunk, SelectionError> {
        let s = self.server.borrow();
        let Some(prop) = s.properties.get(&(window, property)) else {
            return Ok(PropertyChunk {
                type_: NONE,
                format: 0,
                bytes_after: 0,
                value: Vec::new(),
            });
        };

        let total = prop.data.len();
        let start = (long_offset as usize * 4).min(total);
        let end = (start + long_length as usize * 4).min(total);
        Ok(PropertyChunk {
            type_: prop.type_,
            format: prop.format,
            bytes_after: (total - end) as u32,
            value: prop.data[start..end].to_vec(),
        })
    }

    fn change_property(
        &self,
        window: Window,
        property: Atom,
        value: &Property,
    ) -> Result<(), SelectionError> {
        let mut s = self.server.borrow_mut();
        if s.reject_foreign_writes && !s.live.contains(&window) {
            return Err(SelectionError::X11(format!(
                "Window error (bad value 0x{window:x})"
            )));
        }
        s.properties.insert((window, property), value.clone());
        Ok(())
    }

    fn send_notify(&self, notify: &SelectionNotify) -> Result<(), SelectionError> {
        let mut s = self.server.borrow_mut();
        s.sent.push(*notify);
        if matches!(s.peers.get(&notify.requestor), Some(Peer::Manager(_))) {
            s.manager_received(notify.requestor, notify);
        }
        Ok(())
    }

    fn wait_event(&self, _deadline: Instant) -> Result<Option<SelectionEvent>, SelectionError> {
        let mut s = self.server.borrow_mut();
        if let Some(error) = &s.broken_connection {
            return Err(SelectionError::X11(error.clone()));
        }
        // An empty queue stands for a wait that ran until the deadline.
        Ok(s.queue.pop_front())
    }
}
