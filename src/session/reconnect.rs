/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use log::info;

use super::ReconnectError;
use super::Session;
use super::SessionError;
use crate::capability::CapabilityFactory;
use crate::capability::HandlerSnapshot;
use crate::state::ConnectionState;

impl<F: CapabilityFactory> Session<F> {
    /// Drops the connection and builds it up again with the cached
    /// options and credentials.
    ///
    /// Stanza handlers of the current stream, or the given snapshot, are
    /// restored on the new stream. On failure the snapshot comes back
    /// in the error untouched.
    pub fn reconnect_and_reauth(
        &mut self,
        snapshot: Option<HandlerSnapshot>,
    ) -> Result<ConnectionState, ReconnectError> {
        let snapshot = match snapshot {
            Some(snapshot) => Some(snapshot),
            None => self
                .caps
                .dispatcher_mut()
                .map(|dispatcher| dispatcher.dump_handlers()),
        };

        self.teardown();

        let Some(credentials) = self.credentials.clone() else {
            return Err(ReconnectError {
                error: SessionError::MissingCredentials,
                snapshot,
            });
        };
        let options = self.connect_options.clone();
        if let Err(error) = self.connect(options) {
            return Err(ReconnectError { error, snapshot });
        }
        if let Err(error) = self.auth(credentials) {
            return Err(ReconnectError { error, snapshot });
        }

        if let Some(snapshot) = snapshot
            && let Some(dispatcher) = self.caps.dispatcher_mut()
        {
            dispatcher.restore_handlers(snapshot);
        }
        info!("reconnected to {} ({})", self.server, self.state);
        Ok(self.state)
    }
}
