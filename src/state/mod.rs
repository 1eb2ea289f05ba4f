/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::fmt::Display;

/// How the byte stream under the XMPP session is protected.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SecurityLevel {
    /// Plain TCP, nothing negotiated yet.
    Tcp,
    /// Upgraded in-band with STARTTLS.
    Tls,
    /// TLS handshake done before the stream started (ports 5223/443).
    Ssl,
}

impl SecurityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::Tcp => "tcp",
            SecurityLevel::Tls => "tls",
            SecurityLevel::Ssl => "ssl",
        }
    }

    pub fn is_secure(&self) -> bool {
        !matches!(self, SecurityLevel::Tcp)
    }
}

/// Which mechanism authenticated the stream.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum AuthMethod {
    Sasl,
    OldAuth,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Sasl => "sasl",
            AuthMethod::OldAuth => "old_auth",
        }
    }
}

impl Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection state of a session.
///
/// Renders as the classic composite token: empty when not connected,
/// otherwise one of `tcp`, `tls` or `ssl`, followed by `+sasl` or
/// `+old_auth` once the stream is authenticated.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct ConnectionState {
    level: Option<SecurityLevel>,
    auth: Option<AuthMethod>,
}

impl ConnectionState {
    pub fn new(level: SecurityLevel) -> Self {
        ConnectionState {
            level: Some(level),
            auth: None,
        }
    }

    pub fn level(&self) -> Option<SecurityLevel> {
        self.level
    }

    pub fn auth_method(&self) -> Option<AuthMethod> {
        self.auth
    }

    /// True when no connection is up.
    pub fn is_unset(&self) -> bool {
        self.level.is_none()
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    pub(crate) fn set_level(&mut self, level: SecurityLevel) {
        self.level = Some(level);
    }

    pub(crate) fn set_auth(&mut self, method: AuthMethod) {
        self.auth = Some(method);
    }

    pub(crate) fn clear(&mut self) {
        self.level = None;
        self.auth = None;
    }
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(level) = self.level {
            f.write_str(level.as_str())?;
            if let Some(auth) = self.auth {
                write!(f, "+{auth}")?;
            }
        }
        Ok(())
    }
}

/// Progress of a session through connection establishment.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
pub enum Phase {
    #[default]
    Idle,
    TcpConnecting,
    TcpConnected,
    TlsNegotiating,
    TlsActive,
    StreamInit,
    FeaturesAwaited,
    Ready,
    Disconnected,
}

#[cfg(test)]
mod tests;
