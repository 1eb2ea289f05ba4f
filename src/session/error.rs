/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::error::Error;
use std::fmt::Display;
use std::io;

use crate::capability::CapabilityKind;
use crate::capability::HandlerSnapshot;

#[derive(Debug)]
pub enum SessionError {
    /// No connection to the server or the proxy.
    TransportFailed,
    /// Direct TLS handshake failed.
    TlsFailed,
    /// Server did not accept the stream header.
    StreamFailed,
    CapabilityFailed(CapabilityKind),
    /// Stream dropped while waiting for the server.
    Disconnected,
    Timeout(&'static str),
    Cancelled,
    /// Credentials were refused, with the server's condition.
    NotAuthorized(String),
    BindFailed(String),
    DomainBindFailed(String),
    NotConnected,
    MissingCredentials,
    Io(io::Error),
}

impl SessionError {
    /// True when the server refused us, as opposed to things breaking.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            SessionError::NotAuthorized(_)
                | SessionError::BindFailed(_)
                | SessionError::DomainBindFailed(_)
        )
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::TransportFailed => write!(f, "cannot connect to the server"),
            SessionError::TlsFailed => write!(f, "TLS negotiation failed"),
            SessionError::StreamFailed => write!(f, "cannot open the XML stream"),
            SessionError::CapabilityFailed(kind) => write!(f, "cannot attach {kind}"),
            SessionError::Disconnected => write!(f, "disconnected from the server"),
            SessionError::Timeout(what) => write!(f, "timed out waiting for {what}"),
            SessionError::Cancelled => write!(f, "cancelled"),
            SessionError::NotAuthorized(token) => write!(f, "not authorized: {token}"),
            SessionError::BindFailed(token) => write!(f, "resource binding failed: {token}"),
            SessionError::DomainBindFailed(domain) => {
                write!(f, "cannot bind domain {domain}")
            }
            SessionError::NotConnected => write!(f, "not connected"),
            SessionError::MissingCredentials => write!(f, "no credentials to authenticate with"),
            SessionError::Io(err) => err.fmt(f),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SessionError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SessionError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotConnected => SessionError::NotConnected,
            _ => SessionError::Io(err),
        }
    }
}

/// A failed reconnect, with the routing table which was not restored.
#[derive(Debug)]
pub struct ReconnectError {
    pub error: SessionError,
    pub snapshot: Option<HandlerSnapshot>,
}

impl Display for ReconnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "reconnect failed: {}", self.error)
    }
}

impl Error for ReconnectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}
