/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::io;

use log::debug;

/// Identifies a registered disconnect handler.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct HandlerId(u64);

type Handler = Box<dyn FnMut() -> io::Result<()>>;

/// Callbacks run when the stream drops, newest first.
#[derive(Default)]
pub(super) struct DisconnectHandlers {
    next_id: u64,
    handlers: Vec<(HandlerId, Handler)>,
}

impl DisconnectHandlers {
    pub(super) fn register(&mut self, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, handler));
        id
    }

    pub(super) fn unregister(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    pub(super) fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Runs every handler in reverse registration order.
    ///
    /// A failing handler does not stop the others; the first error is
    /// returned.
    pub(super) fn run(&mut self) -> io::Result<()> {
        let mut result = Ok(());
        for (id, handler) in self.handlers.iter_mut().rev() {
            if let Err(err) = handler() {
                debug!("disconnect handler {id:?} failed: {err}");
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }
}

/// Pre-registered handler, treats losing the server as fatal.
pub(super) fn abort_on_disconnect() -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::ConnectionAborted,
        "connection to the server is lost",
    ))
}
