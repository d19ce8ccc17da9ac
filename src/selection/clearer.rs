//! Clear path — release ownership of one or more selections.

use super::backend::{NONE, SelectionBackend};
use super::{DEFAULT_SELECTION, SelectionError};

/// Set the owner of each named selection to `None`.
///
/// An empty list means CLIPBOARD only. All names are resolved before
/// anything is released, so an invalid name leaves every selection
/// untouched.
pub fn clear<B: SelectionBackend, S: AsRef<str>>(
    backend: &B,
    selections: &[S],
) -> Result<(), SelectionError> {
    let mut registry = super::atoms::FormatRegistry::new(backend);

    let names: Vec<&str> = if selections.is_empty() {
        vec![DEFAULT_SELECTION]
    } else {
        selections.iter().map(AsRef::as_ref).collect()
    };

    let atoms = names
        .iter()
        .map(|name| registry.selection(name))
        .collect::<Result<Vec<_>, _>>()?;

    for (name, atom) in names.iter().zip(atoms) {
        backend.set_selection_owner(NONE, atom)?;
        tracing::info!(selection = *name, "selection cleared");
    }
    Ok(())
}
