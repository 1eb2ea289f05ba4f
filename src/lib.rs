/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Connection establishment and authentication for XMPP sessions.
//!
//! A [Session] takes a client or component from a server address to an
//! authenticated stream: TCP or proxy connect, direct TLS or STARTTLS,
//! SASL with legacy fallback, and resource or domain binding. The XML
//! side is supplied by the application through a [CapabilityFactory].

mod capability;
mod constants;
mod pump;
mod session;
mod state;
#[cfg(test)]
mod testing;
#[cfg(feature = "tls")]
mod tls;
mod transport;

pub use capability::AuthOutcome;
pub use capability::BindOutcome;
pub use capability::ByteStream;
pub use capability::Capabilities;
pub use capability::Capability;
pub use capability::CapabilityError;
pub use capability::CapabilityFactory;
pub use capability::CapabilityKind;
pub use capability::Channel;
pub use capability::ComponentBind;
pub use capability::Dispatcher;
pub use capability::HandlerSnapshot;
pub use capability::LegacyAuth;
pub use capability::ResourceBind;
pub use capability::SaslAuth;
pub use capability::SaslStatus;
pub use capability::SecurityLayer;
pub use capability::StartTlsReply;
pub use capability::StreamFeatures;
pub use capability::StreamHeader;
pub use capability::StreamOpen;
pub use capability::TlsMode;
pub use capability::TlsOutcome;
pub use capability::Transport;

pub use constants::CLIENT_NS;
pub use constants::CLIENT_PORT;
pub use constants::COMPONENT_1_NS;
pub use constants::COMPONENT_ACCEPT_NS;
pub use constants::COMPONENT_PORT;
pub use constants::STARTTLS_REQUEST;

pub use pump::CancelToken;
pub use pump::PumpPolicy;

pub use session::ComponentOptions;
pub use session::ComponentServer;
pub use session::ConnectOptions;
pub use session::Credentials;
pub use session::DomainBinding;
pub use session::HandlerId;
pub use session::ReconnectError;
pub use session::Role;
pub use session::Session;
pub use session::SessionBuilder;
pub use session::SessionError;
pub use session::SessionEvent;

pub use state::AuthMethod;
pub use state::ConnectionState;
pub use state::Phase;
pub use state::SecurityLevel;

#[cfg(feature = "tls")]
pub use tls::RustlsLayer;

pub use transport::BadAddress;
pub use transport::HttpProxyTransport;
pub use transport::ProxyConfig;
pub use transport::Target;
pub use transport::TcpTransport;
