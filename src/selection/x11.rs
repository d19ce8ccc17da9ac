//! X11 connection scope — the live `SelectionBackend`.
//!
//! Wraps `x11rb::rust_connection::RustConnection` for the duration of
//! one operation. Dropping the scope flushes and closes the connection.
//! Waits poll the connection fd with a deadline and drain
//! `poll_for_event()` whenever it becomes readable.

use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::Instant;

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{
    self, Atom, CreateWindowAux, EventMask, PropMode, Window, WindowClass,
};
use x11rb::rust_connection::RustConnection;

use super::SelectionError;
use super::backend::{
    ConversionRequest, Property, PropertyChunk, SelectionBackend, SelectionEvent,
    SelectionNotify, SelectionRequest,
};

/// An open display connection, closed on drop.
pub struct ConnectionScope {
    conn: RustConnection,
    root: Window,
}

impl ConnectionScope {
    /// Connect to the display named by `$DISPLAY`.
    pub fn open() -> Result<Self, SelectionError> {
        let (conn, screen_num) = RustConnection::connect(None)?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| SelectionError::X11(format!("no screen {screen_num}")))?;
        tracing::debug!(screen = screen_num, "connected to X11 display");
        Ok(Self { conn, root })
    }
}

impl Drop for ConnectionScope {
    fn drop(&mut self) {
        if let Err(e) = self.conn.flush() {
            tracing::debug!(error = %e, "flush before close failed");
        }
        tracing::debug!("closing X11 connection");
    }
}

/// Translate an X11 error event into the single structured error kind.
fn protocol_error(e: &x11rb::x11_utils::X11Error) -> SelectionError {
    SelectionError::X11(format!(
        "{:?} error (request {}, bad value 0x{:x})",
        e.error_kind,
        e.request_name.unwrap_or("unknown"),
        e.bad_value
    ))
}

impl SelectionBackend for ConnectionScope {
    fn intern_atom(&self, name: &str, only_if_exists: bool) -> Result<Atom, SelectionError> {
        Ok(xproto::intern_atom(&self.conn, only_if_exists, name.as_bytes())?
            .reply()?
            .atom)
    }

    fn atom_name(&self, atom: Atom) -> Result<String, SelectionError> {
        let reply = xproto::get_atom_name(&self.conn, atom)?.reply()?;
        Ok(String::from_utf8_lossy(&reply.name).into_owned())
    }

    fn selection_owner(&self, selection: Atom) -> Result<Window, SelectionError> {
        Ok(xproto::get_selection_owner(&self.conn, selection)?
            .reply()?
            .owner)
    }

    fn set_selection_owner(&self, owner: Window, selection: Atom) -> Result<(), SelectionError> {
        xproto::set_selection_owner(&self.conn, owner, selection, x11rb::CURRENT_TIME)?.check()?;
        Ok(())
    }

    fn create_window(&self) -> Result<Window, SelectionError> {
        let window = self.conn.generate_id()?;
        xproto::create_window(
            &self.conn,
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            self.root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new(),
        )?
        .check()?;
        Ok(window)
    }

    fn destroy_window(&self, window: Window) -> Result<(), SelectionError> {
        xproto::destroy_window(&self.conn, window)?;
        self.conn.flush()?;
        Ok(())
    }

    fn convert_selection(&self, request: &ConversionRequest) -> Result<(), SelectionError> {
        xproto::convert_selection(
            &self.conn,
            request.requestor,
            request.selection,
            request.target,
            request.property,
            x11rb::CURRENT_TIME,
        )?;
        self.conn.flush()?;
        Ok(())
    }

    fn get_property(
        &self,
        window: Window,
        property: Atom,
        long_offset: u32,
        long_length: u32,
    ) -> Result<PropertyChunk, SelectionError> {
        let reply = xproto::get_property(
            &self.conn,
            false,
            window,
            property,
            xproto::AtomEnum::ANY,
            long_offset,
            long_length,
        )?
        .reply()?;
        Ok(PropertyChunk {
            type_: reply.type_,
            format: reply.format,
            bytes_after: reply.bytes_after,
            value: reply.value,
        })
    }

    fn change_property(
        &self,
        window: Window,
        property: Atom,
        value: &Property,
    ) -> Result<(), SelectionError> {
        xproto::change_property(
            &self.conn,
            PropMode::REPLACE,
            window,
            property,
            value.type_,
            value.format,
            value.item_count(),
            &value.data,
        )?;
        Ok(())
    }

    fn send_notify(&self, notify: &SelectionNotify) -> Result<(), SelectionError> {
        let event = xproto::SelectionNotifyEvent {
            response_type: xproto::SELECTION_NOTIFY_EVENT,
            sequence: 0,
            time: notify.time,
            requestor: notify.requestor,
            selection: notify.selection,
            target: notify.target,
            property: notify.property,
        };
        xproto::send_event(
            &self.conn,
            false,
            notify.requestor,
            EventMask::NO_EVENT,
            event,
        )?;
        self.conn.flush()?;
        Ok(())
    }

    fn wait_event(&self, deadline: Instant) -> Result<Option<SelectionEvent>, SelectionError> {
        self.conn.flush()?;
        let raw_fd = self.conn.stream().as_raw_fd();

        loop {
            // Drain anything already buffered before sleeping.
            while let Some(event) = self.conn.poll_for_event()? {
                match event {
                    Event::SelectionRequest(e) => {
                        return Ok(Some(SelectionEvent::Request(SelectionRequest {
                            time: e.time,
                            owner: e.owner,
                            requestor: e.requestor,
                            selection: e.selection,
                            target: e.target,
                            property: e.property,
                        })));
                    }
                    Event::SelectionNotify(e) => {
                        return Ok(Some(SelectionEvent::Notify(SelectionNotify {
                            time: e.time,
                            requestor: e.requestor,
                            selection: e.selection,
                            target: e.target,
                            property: e.property,
                        })));
                    }
                    Event::SelectionClear(e) => {
                        return Ok(Some(SelectionEvent::Clear {
                            selection: e.selection,
                        }));
                    }
                    Event::Error(e) => return Err(protocol_error(&e)),
                    other => tracing::trace!(event = ?other, "ignoring non-selection event"),
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let millis = u16::try_from(remaining.as_millis())
                .unwrap_or(u16::MAX)
                .max(1);

            // SAFETY: raw_fd is the X11 connection fd, valid while self.conn is alive.
            let borrowed = unsafe { BorrowedFd::borrow_raw(raw_fd) };
            let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];

            match poll(&mut fds, PollTimeout::from(millis)) {
                Ok(_) => continue,
                Err(nix::Error::EINTR) => continue,
                Err(e) => return Err(SelectionError::X11(format!("poll on X11 fd: {e}"))),
            }
        }
    }
}
