//! Requestor surrogate — a throwaway unmapped window that receives
//! conversion replies and anchors ownership claims.
//!
//! One surrogate per read or write call; destroyed on drop so a stale
//! property can never leak into a later request.

use x11rb::protocol::xproto::Window;

use super::SelectionError;
use super::backend::SelectionBackend;

pub struct Surrogate<'a, B: SelectionBackend> {
    backend: &'a B,
    window: Window,
}

impl<'a, B: SelectionBackend> Surrogate<'a, B> {
    /// Create the 1×1 unmapped window.
    pub fn create(backend: &'a B) -> Result<Self, SelectionError> {
        let window = backend.create_window()?;
        tracing::debug!(window, "surrogate window created");
        Ok(Self { backend, window })
    }

    pub fn window(&self) -> Window {
        self.window
    }
}

impl<B: SelectionBackend> Drop for Surrogate<'_, B> {
    fn drop(&mut self) {
        match self.backend.destroy_window(self.window) {
            Ok(()) => tracing::debug!(window = self.window, "surrogate window destroyed"),
            Err(e) => tracing::warn!(
                window = self.window,
                error = %e,
                "failed to destroy surrogate window"
            ),
        }
    }
}
