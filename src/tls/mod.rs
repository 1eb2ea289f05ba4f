/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! TLS record layer built on rustls.

use std::io;
use std::io::Read;
use std::io::Write;
use std::sync::Arc;

use log::debug;
use log::info;
use log::warn;
use rustls::ClientConfig;
use rustls::ClientConnection;
use rustls::RootCertStore;
use rustls::pki_types::ServerName;

use crate::capability::ByteStream;
use crate::capability::Capabilities;
use crate::capability::Capability;
use crate::capability::CapabilityError;
use crate::capability::SecurityLayer;
use crate::capability::StartTlsReply;
use crate::capability::TlsMode;
use crate::capability::TlsOutcome;
use crate::constants::STARTTLS_REQUEST;

/// Security layer for direct TLS and STARTTLS.
///
/// Until the handshake completes, reads and writes pass through
/// untouched, so the stream can ask for STARTTLS over the same path.
pub struct RustlsLayer {
    config: Arc<ClientConfig>,
    conn: Option<ClientConnection>,
    secured: bool,
    outcome: Option<TlsOutcome>,
}

impl Default for RustlsLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl RustlsLayer {
    /// Verifies servers against the Mozilla root certificates.
    pub fn new() -> Self {
        Self::with_config(Self::default_config())
    }

    pub fn with_config(config: Arc<ClientConfig>) -> Self {
        RustlsLayer {
            config,
            conn: None,
            secured: false,
            outcome: None,
        }
    }

    pub fn default_config() -> Arc<ClientConfig> {
        let root_store = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Arc::new(
            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        )
    }

    pub fn is_secured(&self) -> bool {
        self.secured
    }

    fn connection(&self, caps: &Capabilities) -> Result<ClientConnection, CapabilityError> {
        let Some(transport) = caps.transport() else {
            return Err(CapabilityError::Unavailable("no transport to secure"));
        };
        let name = ServerName::try_from(transport.server_name().to_owned())
            .map_err(|err| CapabilityError::Rejected(format!("bad server name: {err}")))?;
        ClientConnection::new(self.config.clone(), name)
            .map_err(|err| CapabilityError::Rejected(err.to_string()))
    }

    fn secure(&mut self, caps: &mut Capabilities) -> Result<(), CapabilityError> {
        let conn = self
            .conn
            .as_mut()
            .ok_or(CapabilityError::Unavailable("TLS connection is not set up"))?;
        let sock = caps
            .transport_stream()
            .ok_or(CapabilityError::Unavailable("no transport to secure"))?;
        handshake(conn, sock)?;
        self.secured = true;
        info!("TLS handshake complete");
        Ok(())
    }

    fn finish(&mut self, outcome: TlsOutcome) -> Option<TlsOutcome> {
        if let TlsOutcome::Failure(reason) = &outcome {
            warn!("TLS negotiation failed: {reason}");
            self.conn = None;
        }
        self.outcome = Some(outcome.clone());
        Some(outcome)
    }
}

fn handshake(conn: &mut ClientConnection, mut sock: &mut dyn ByteStream) -> io::Result<()> {
    while conn.is_handshaking() {
        conn.complete_io(&mut sock)?;
    }
    Ok(())
}

impl Capability for RustlsLayer {
    fn detach(&mut self) {
        self.conn = None;
        self.secured = false;
    }
}

impl SecurityLayer for RustlsLayer {
    fn attach(&mut self, caps: &mut Capabilities, mode: TlsMode) -> Result<(), CapabilityError> {
        self.conn = Some(self.connection(caps)?);
        match mode {
            TlsMode::Immediate => {
                self.secure(caps)?;
                self.outcome = Some(TlsOutcome::Success);
            }
            TlsMode::Deferred => {
                debug!("asking for STARTTLS");
                caps.send(STARTTLS_REQUEST)?;
            }
        }
        Ok(())
    }

    fn negotiate(&mut self, caps: &mut Capabilities) -> Option<TlsOutcome> {
        if self.outcome.is_some() {
            return self.outcome.clone();
        }
        let reply = caps.dispatcher()?.starttls_reply()?;
        match reply {
            StartTlsReply::Failure => {
                self.finish(TlsOutcome::Failure("failure".to_owned()))
            }
            StartTlsReply::Proceed => match self.secure(caps) {
                Ok(()) => {
                    if let Some(dispatcher) = caps.dispatcher_mut() {
                        dispatcher.restart();
                    }
                    self.finish(TlsOutcome::Success)
                }
                Err(err) => self.finish(TlsOutcome::Failure(err.to_string())),
            },
        }
    }

    fn read(&mut self, mut sock: &mut dyn ByteStream, buf: &mut [u8]) -> io::Result<usize> {
        match self.conn.as_mut() {
            Some(conn) if self.secured => rustls::Stream::new(conn, &mut sock).read(buf),
            _ => sock.read(buf),
        }
    }

    fn write(&mut self, mut sock: &mut dyn ByteStream, buf: &[u8]) -> io::Result<usize> {
        match self.conn.as_mut() {
            Some(conn) if self.secured => rustls::Stream::new(conn, &mut sock).write(buf),
            _ => sock.write(buf),
        }
    }

    fn flush(&mut self, mut sock: &mut dyn ByteStream) -> io::Result<()> {
        match self.conn.as_mut() {
            Some(conn) if self.secured => rustls::Stream::new(conn, &mut sock).flush(),
            _ => sock.flush(),
        }
    }
}
