/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod channel;
mod error;
mod registry;

use std::any::Any;
use std::fmt::Debug;
use std::fmt::Display;
use std::io;
use std::time::Duration;

use crate::constants::STREAM_VERSION;
use crate::transport::HttpProxyTransport;
use crate::transport::ProxyConfig;
use crate::transport::Target;
use crate::transport::TcpTransport;

pub use channel::ByteStream;
pub use channel::Channel;
pub use error::CapabilityError;
pub use registry::Capabilities;

/// Names of the slots in the capability registry.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum CapabilityKind {
    Transport,
    Security,
    Dispatcher,
    Sasl,
    LegacyAuth,
    ResourceBind,
    ComponentBind,
}

impl CapabilityKind {
    pub fn name(&self) -> &'static str {
        match self {
            CapabilityKind::Transport => "transport",
            CapabilityKind::Security => "security layer",
            CapabilityKind::Dispatcher => "stream dispatcher",
            CapabilityKind::Sasl => "SASL",
            CapabilityKind::LegacyAuth => "legacy auth",
            CapabilityKind::ResourceBind => "resource bind",
            CapabilityKind::ComponentBind => "component bind",
        }
    }
}

impl Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Common part of everything which can be attached to a session.
pub trait Capability {
    /// Releases whatever the capability holds.
    ///
    /// The registry calls this at most once per instance, also for
    /// instances whose attach has failed.
    fn detach(&mut self) {}
}

/// A byte stream to the server, plain or tunnelled.
pub trait Transport: Capability {
    fn attach(&mut self) -> Result<(), CapabilityError>;

    fn stream(&mut self) -> Option<&mut dyn ByteStream>;

    /// Name of the XMPP server, as used for certificate checks.
    fn server_name(&self) -> &str;

    /// Port the transport ended up connecting to.
    fn peer_port(&self) -> Option<u16>;
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TlsMode {
    /// Handshake right away, before the XML stream starts.
    Immediate,
    /// Ask the server with STARTTLS and handshake when it agrees.
    Deferred,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TlsOutcome {
    Success,
    Failure(String),
}

/// TLS record layer wrapping the transport.
pub trait SecurityLayer: Capability {
    fn attach(&mut self, caps: &mut Capabilities, mode: TlsMode) -> Result<(), CapabilityError>;

    /// Advances a deferred negotiation, returns the outcome once known.
    fn negotiate(&mut self, caps: &mut Capabilities) -> Option<TlsOutcome>;

    fn read(&mut self, sock: &mut dyn ByteStream, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, sock: &mut dyn ByteStream, buf: &[u8]) -> io::Result<usize>;

    fn flush(&mut self, sock: &mut dyn ByteStream) -> io::Result<()>;
}

/// Parameters of the stream header the dispatcher sends.
#[derive(Debug, Clone, Copy)]
pub struct StreamOpen<'a> {
    pub to: &'a str,
    pub namespace: &'a str,
}

/// Attributes of the stream header received from the server.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct StreamHeader {
    pub id: Option<String>,
    pub from: Option<String>,
    pub version: Option<String>,
    pub lang: Option<String>,
}

impl StreamHeader {
    /// Version 1.0 streams always advertise their features.
    pub fn expects_features(&self) -> bool {
        self.version.as_deref() == Some(STREAM_VERSION)
    }
}

/// Stream features advertised by the server.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct StreamFeatures {
    pub starttls: bool,
    pub mechanisms: Vec<String>,
    pub bind: bool,
    pub session: bool,
}

impl StreamFeatures {
    pub fn has_sasl(&self) -> bool {
        !self.mechanisms.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StartTlsReply {
    Proceed,
    Failure,
}

/// Opaque capture of a dispatcher's stanza routing table.
///
/// Only the dispatcher implementation which produced a snapshot knows
/// what is inside; the session merely carries it across a reconnect.
pub struct HandlerSnapshot(Box<dyn Any>);

impl HandlerSnapshot {
    pub fn new<T: Any>(table: T) -> Self {
        HandlerSnapshot(Box::new(table))
    }

    pub fn downcast<T: Any>(self) -> Result<T, HandlerSnapshot> {
        match self.0.downcast::<T>() {
            Ok(table) => Ok(*table),
            Err(other) => Err(HandlerSnapshot(other)),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl Debug for HandlerSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HandlerSnapshot { .. }")
    }
}

/// The XML stream reader and stanza router.
pub trait Dispatcher: Capability {
    /// Sends the stream header over the channel.
    fn attach(
        &mut self,
        channel: &mut Channel<'_>,
        open: &StreamOpen<'_>,
    ) -> Result<(), CapabilityError>;

    /// Processes at most one unit of incoming data.
    ///
    /// Returns false when the stream is no longer usable.
    fn process(&mut self, channel: &mut Channel<'_>, unit: Duration) -> bool;

    fn send(&mut self, channel: &mut Channel<'_>, data: &str) -> io::Result<()>;

    fn header(&self) -> Option<&StreamHeader>;

    fn features(&self) -> Option<&StreamFeatures>;

    fn starttls_reply(&self) -> Option<StartTlsReply>;

    /// Forgets the current header and features, and opens a new stream
    /// on the next `process` call.
    fn restart(&mut self);

    fn register_namespace(&mut self, namespace: &str);

    fn register_protocol(&mut self, tag: &str, namespace: &str);

    fn dump_handlers(&mut self) -> HandlerSnapshot;

    fn restore_handlers(&mut self, snapshot: HandlerSnapshot);
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub enum SaslStatus {
    #[default]
    Idle,
    NotSupported,
    InProcess,
    Success,
    Failure(String),
}

impl SaslStatus {
    pub fn token(&self) -> &str {
        match self {
            SaslStatus::Idle => "",
            SaslStatus::NotSupported => "not-supported",
            SaslStatus::InProcess => "in-process",
            SaslStatus::Success => "success",
            SaslStatus::Failure(token) => token,
        }
    }

    /// True until the exchange reaches a terminal status.
    pub fn is_pending(&self) -> bool {
        matches!(self, SaslStatus::Idle | SaslStatus::InProcess)
    }
}

pub trait SaslAuth: Capability {
    fn attach(&mut self, caps: &mut Capabilities) -> Result<(), CapabilityError>;

    /// Sends the initial auth request with the best mechanism.
    fn start(&mut self, caps: &mut Capabilities) -> Result<(), CapabilityError>;

    fn status(&self) -> SaslStatus;
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AuthOutcome {
    Accepted,
    Rejected(String),
}

/// Pre-SASL authentication.
pub trait LegacyAuth: Capability {
    fn attach(&mut self, caps: &mut Capabilities) -> Result<(), CapabilityError>;

    fn outcome(&self) -> Option<AuthOutcome>;
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BindOutcome {
    Bound(String),
    Failed(String),
}

pub trait ResourceBind: Capability {
    /// Requests a resource, the server picks one when none is given.
    fn attach(
        &mut self,
        caps: &mut Capabilities,
        resource: Option<&str>,
    ) -> Result<(), CapabilityError>;

    fn outcome(&self) -> Option<BindOutcome>;
}

pub trait ComponentBind: Capability {
    fn attach(&mut self, caps: &mut Capabilities, domain: &str) -> Result<(), CapabilityError>;

    fn outcome(&self) -> Option<BindOutcome>;
}

/// Creates the capabilities a session attaches while negotiating.
///
/// Transports have a default implementation using [TcpTransport] and
/// [HttpProxyTransport]; everything speaking XML is up to the caller.
pub trait CapabilityFactory {
    fn transport(
        &mut self,
        target: &Target,
        proxy: Option<&ProxyConfig>,
        timeout: Duration,
    ) -> Box<dyn Transport> {
        match proxy {
            Some(proxy) => Box::new(
                HttpProxyTransport::new(proxy.clone(), target.clone()).connection_timeout(timeout),
            ),
            None => Box::new(TcpTransport::new(target.clone()).connection_timeout(timeout)),
        }
    }

    fn security(&mut self) -> Box<dyn SecurityLayer>;

    fn dispatcher(&mut self) -> Box<dyn Dispatcher>;

    fn sasl(&mut self, user: &str, password: &str) -> Box<dyn SaslAuth>;

    fn legacy_auth(&mut self, user: &str, password: &str, resource: &str) -> Box<dyn LegacyAuth>;

    fn resource_bind(&mut self) -> Box<dyn ResourceBind>;

    fn component_bind(&mut self, sasl: bool) -> Box<dyn ComponentBind>;
}
