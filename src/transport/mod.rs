/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod error;
mod proxy;
mod srv;
mod tcp;

use std::fmt::Display;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub use error::BadAddress;
use error::description;
pub use proxy::HttpProxyTransport;
pub use tcp::TcpTransport;

/// Where a transport should connect to.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub use_srv: bool,
}

impl Target {
    pub fn new(host: &str, port: u16) -> Self {
        Target {
            host: host.to_owned(),
            port,
            use_srv: false,
        }
    }

    pub fn with_srv(mut self, use_srv: bool) -> Self {
        self.use_srv = use_srv;
        self
    }

    /// Parses `host`, `host:port`, `[v6]` or `[v6]:port`.
    ///
    /// A bare IPv6 literal without brackets is taken as a host
    /// without a port.
    pub fn parse(address: &str, default_port: u16) -> Result<Target, BadAddress> {
        let (host, port) = if let Some(rest) = address.strip_prefix('[') {
            let Some(bracket_pos) = rest.find(']') else {
                return Err(BadAddress(description::BRACKET_UNCLOSED));
            };
            let host = &rest[..bracket_pos];
            let port = match rest[bracket_pos + 1..].strip_prefix(':') {
                Some(port) => Some(port),
                None if rest.len() == bracket_pos + 1 => None,
                None => return Err(BadAddress(description::PORT_INVALID)),
            };
            (host, port)
        } else {
            match address.rfind(':') {
                Some(pos) if address[..pos].contains(':') => (address, None),
                Some(pos) => (&address[..pos], Some(&address[pos + 1..])),
                None => (address, None),
            }
        };
        if host.is_empty() {
            return Err(BadAddress(description::HOST_EMPTY));
        }
        let port = match port {
            Some(port) => match port.parse::<u16>() {
                Ok(port) if port > 0 => port,
                _ => return Err(BadAddress(description::PORT_INVALID)),
            },
            None => default_port,
        };
        Ok(Target::new(host, port))
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// An HTTP proxy supporting the CONNECT method.
#[derive(Clone, Eq, PartialEq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    user: Option<String>,
    password: Option<String>,
}

impl ProxyConfig {
    pub fn new(host: &str, port: u16) -> Self {
        ProxyConfig {
            host: host.to_owned(),
            port,
            user: None,
            password: None,
        }
    }

    pub fn credentials(mut self, user: &str, password: &str) -> Self {
        self.user = Some(user.to_owned());
        self.password = Some(password.to_owned());
        self
    }

    /// Value of the `Proxy-Authorization` header, if credentials are set.
    pub fn authorization(&self) -> Option<String> {
        let user = self.user.as_deref()?;
        let password = self.password.as_deref().unwrap_or("");
        let token = STANDARD.encode(format!("{user}:{password}"));
        Some(format!("Basic {token}"))
    }
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}
