//! Format registry — name ↔ atom resolution, cached for one call.
//!
//! Atoms are only meaningful on the connection that interned them, so
//! a registry is created per operation and dropped with it.

use std::collections::HashMap;

use x11rb::protocol::xproto::{Atom, AtomEnum};

use super::SelectionError;
use super::backend::{NONE, SelectionBackend};

/// Selection owned by the running clipboard manager.
pub const MANAGER_SELECTION: &str = "CLIPBOARD_MANAGER";

/// Property name this tool uses on its surrogate windows.
pub const MARKER_PROPERTY: &str = "XCLIPCTL_SELECTION";

/// Per-call atom cache over a backend.
pub struct FormatRegistry<'a, B: SelectionBackend> {
    backend: &'a B,
    by_name: HashMap<String, Atom>,
    by_atom: HashMap<Atom, String>,
}

impl<'a, B: SelectionBackend> FormatRegistry<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            by_name: HashMap::new(),
            by_atom: HashMap::new(),
        }
    }

    /// Resolve a caller-supplied selection name.
    ///
    /// Names are case-insensitive (`clipboard` → `CLIPBOARD`) and never
    /// interned: an unknown name is `InvalidName`.
    pub fn selection(&mut self, name: &str) -> Result<Atom, SelectionError> {
        let upper = name.trim().to_ascii_uppercase();
        if upper.is_empty() {
            return Err(SelectionError::InvalidName(name.to_string()));
        }
        self.lookup(&upper)?
            .ok_or_else(|| SelectionError::InvalidName(name.to_string()))
    }

    /// Look up an existing atom without creating it.
    pub fn lookup(&mut self, name: &str) -> Result<Option<Atom>, SelectionError> {
        if let Some(&atom) = self.by_name.get(name) {
            return Ok(Some(atom));
        }
        let atom = self.backend.intern_atom(name, true)?;
        if atom == NONE {
            return Ok(None);
        }
        self.remember(name, atom);
        Ok(Some(atom))
    }

    /// Intern a protocol marker, creating it if needed.
    pub fn marker(&mut self, name: &str) -> Result<Atom, SelectionError> {
        if let Some(&atom) = self.by_name.get(name) {
            return Ok(atom);
        }
        let atom = self.backend.intern_atom(name, false)?;
        if atom == NONE {
            return Err(SelectionError::InvalidName(name.to_string()));
        }
        self.remember(name, atom);
        Ok(atom)
    }

    /// Name of an atom, as reported by the server.
    pub fn name_of(&mut self, atom: Atom) -> Result<String, SelectionError> {
        if let Some(name) = self.by_atom.get(&atom) {
            return Ok(name.clone());
        }
        let name = self.backend.atom_name(atom)?;
        self.remember(&name, atom);
        Ok(name)
    }

    fn remember(&mut self, name: &str, atom: Atom) {
        self.by_name.insert(name.to_string(), atom);
        self.by_atom.insert(atom, name.to_string());
    }
}

/// Protocol marker atoms used by the reader and writer.
#[derive(Debug, Clone, Copy)]
pub struct Markers {
    pub targets: Atom,
    pub utf8: Atom,
    /// ISO-8859-1 text (predefined `STRING`).
    pub string: Atom,
    pub timestamp: Atom,
    pub save_targets: Atom,
    pub target_sizes: Atom,
    pub multiple: Atom,
    pub atom_pair: Atom,
    pub atom: Atom,
    pub incr: Atom,
    /// Our own property on surrogate windows.
    pub property: Atom,
}

impl Markers {
    pub fn intern<B: SelectionBackend>(
        registry: &mut FormatRegistry<'_, B>,
    ) -> Result<Self, SelectionError> {
        Ok(Self {
            targets: registry.marker("TARGETS")?,
            utf8: registry.marker("UTF8_STRING")?,
            string: AtomEnum::STRING.into(),
            timestamp: registry.marker("TIMESTAMP")?,
            save_targets: registry.marker("SAVE_TARGETS")?,
            target_sizes: registry.marker("TARGET_SIZES")?,
            multiple: registry.marker("MULTIPLE")?,
            atom_pair: registry.marker("ATOM_PAIR")?,
            atom: AtomEnum::ATOM.into(),
            incr: registry.marker("INCR")?,
            property: registry.marker(MARKER_PROPERTY)?,
        })
    }
}
