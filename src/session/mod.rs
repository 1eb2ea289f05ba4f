/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Bringing an XMPP session from an address to an authenticated stream.

mod auth;
mod builder;
mod client;
mod component;
mod disconnect;
mod error;
mod reconnect;

use std::io;
use std::time::Duration;

use log::debug;
use log::info;
use log::warn;

use crate::capability::Capabilities;
use crate::capability::CapabilityFactory;
use crate::capability::CapabilityKind;
use crate::capability::StreamOpen;
use crate::capability::TlsMode;
use crate::constants::DIRECT_TLS_PORTS;
use crate::pump::CancelToken;
use crate::pump::PumpPolicy;
use crate::pump::PumpStop;
use crate::state::AuthMethod;
use crate::state::ConnectionState;
use crate::state::Phase;
use crate::state::SecurityLevel;
use crate::transport::Target;

pub use builder::ComponentOptions;
pub use builder::ComponentServer;
pub use builder::ConnectOptions;
pub use builder::Credentials;
pub use builder::SessionBuilder;
use disconnect::DisconnectHandlers;
pub use disconnect::HandlerId;
pub use error::ReconnectError;
pub use error::SessionError;

// Detached after the bindings and the route
const TEARDOWN_ORDER: [CapabilityKind; 5] = [
    CapabilityKind::LegacyAuth,
    CapabilityKind::Sasl,
    CapabilityKind::Security,
    CapabilityKind::Dispatcher,
    CapabilityKind::Transport,
];

/// What the session negotiates as.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Role {
    Client,
    Component(ComponentOptions),
}

/// Outcome of binding one component domain.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DomainBinding {
    pub domain: String,
    pub bound: bool,
}

/// Things the application may want to hear about.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SessionEvent {
    /// STARTTLS did not work out, the stream goes on unencrypted.
    TlsFailed(String),
    Disconnected,
}

pub struct Session<F> {
    server: String,
    port: u16,
    namespace: String,
    default_namespace: String,
    state: ConnectionState,
    phase: Phase,
    route: bool,
    role: Role,
    caps: Capabilities,
    factory: F,
    disconnect_handlers: DisconnectHandlers,
    default_handler: Option<HandlerId>,
    pump_policy: PumpPolicy,
    cancel_token: CancelToken,
    connection_timeout: Duration,
    default_resource: String,
    connect_options: ConnectOptions,
    credentials: Option<Credentials>,
    bindings: Vec<DomainBinding>,
    events: Option<Box<dyn FnMut(SessionEvent)>>,
}

impl<F: CapabilityFactory> Session<F> {
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Namespace of stanzas, differs from the stream namespace on
    /// jabberd2 component streams.
    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn route(&self) -> bool {
        self.route
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn capabilities_mut(&mut self) -> &mut Capabilities {
        &mut self.caps
    }

    /// Component domains tried by the last authentication.
    pub fn domain_bindings(&self) -> &[DomainBinding] {
        &self.bindings
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel_token
    }

    pub fn set_event_handler(&mut self, handler: impl FnMut(SessionEvent) + 'static) {
        self.events = Some(Box::new(handler));
    }

    fn emit(&mut self, event: SessionEvent) {
        match self.events.as_mut() {
            Some(handler) => handler(event),
            None => match event {
                SessionEvent::TlsFailed(reason) => warn!("STARTTLS failed: {reason}"),
                SessionEvent::Disconnected => info!("disconnected from {}", self.server),
            },
        }
    }

    pub fn register_disconnect_handler(
        &mut self,
        handler: impl FnMut() -> io::Result<()> + 'static,
    ) -> HandlerId {
        self.disconnect_handlers.register(Box::new(handler))
    }

    pub fn unregister_disconnect_handler(&mut self, id: HandlerId) -> bool {
        if self.default_handler == Some(id) {
            self.default_handler = None;
        }
        self.disconnect_handlers.unregister(id)
    }

    /// The pre-registered handler which fails on disconnection.
    pub fn default_disconnect_handler(&self) -> Option<HandlerId> {
        self.default_handler
    }

    pub fn disconnect_handler_count(&self) -> usize {
        self.disconnect_handlers.len()
    }

    /// Tears the session down after the stream is lost.
    ///
    /// Returns the first error of the disconnect handlers.
    pub fn disconnected(&mut self) -> io::Result<()> {
        self.state.clear();
        self.phase = Phase::Disconnected;
        let result = self.disconnect_handlers.run();
        self.caps.detach(CapabilityKind::Security);
        self.emit(SessionEvent::Disconnected);
        result
    }

    fn lost(&mut self) -> SessionError {
        match self.disconnected() {
            Ok(()) => SessionError::Disconnected,
            Err(err) => SessionError::Io(err),
        }
    }

    /// Processes one unit of incoming data.
    pub fn process(&mut self) -> Result<(), SessionError> {
        if !self.caps.has(CapabilityKind::Dispatcher) {
            return Err(SessionError::NotConnected);
        }
        if self.caps.process(self.pump_policy.get_unit()) {
            Ok(())
        } else {
            Err(self.lost())
        }
    }

    pub fn send(&mut self, data: &str) -> Result<(), SessionError> {
        Ok(self.caps.send(data)?)
    }

    /// Pumps the stream until `poll` has an answer, within the policy.
    fn pump_until<T>(
        &mut self,
        what: &'static str,
        mut poll: impl FnMut(&mut Capabilities) -> Option<T>,
    ) -> Result<T, SessionError> {
        let mut budget = self.pump_policy.budget();
        loop {
            if let Some(value) = poll(&mut self.caps) {
                return Ok(value);
            }
            match budget.spend(&self.cancel_token) {
                Ok(()) => {}
                Err(PumpStop::Cancelled) => return Err(SessionError::Cancelled),
                Err(PumpStop::Exhausted) => return Err(SessionError::Timeout(what)),
            }
            if !self.caps.process(self.pump_policy.get_unit()) {
                debug!("stream lost while waiting for {what}");
                return Err(self.lost());
            }
        }
    }

    /// Waits for the stream header, and the features on 1.0 streams.
    fn await_stream(&mut self) -> Result<(), SessionError> {
        let header = self.pump_until("stream header", |caps| caps.header().cloned())?;
        if header.expects_features() {
            self.phase = Phase::FeaturesAwaited;
            self.pump_until("stream features", |caps| caps.features().map(|_| ()))?;
        }
        Ok(())
    }

    /// Connects to the server and opens the XML stream.
    pub fn connect(&mut self, options: ConnectOptions) -> Result<ConnectionState, SessionError> {
        self.connect_options = options.clone();
        match self.role.clone() {
            Role::Client => client::connect(self, &options),
            Role::Component(component) => component::connect(self, &options, &component),
        }
    }

    /// Authenticates the stream and binds a resource or domains.
    pub fn auth(&mut self, credentials: Credentials) -> Result<AuthMethod, SessionError> {
        self.credentials = Some(credentials.clone());
        match self.role.clone() {
            Role::Client => client::auth(self, &credentials),
            Role::Component(component) => component::auth(self, &credentials, &component),
        }
    }

    /// Steps shared by both roles, up to a ready stream.
    fn establish(
        &mut self,
        options: &ConnectOptions,
        use_srv_default: bool,
    ) -> Result<ConnectionState, SessionError> {
        let target = options
            .server
            .clone()
            .unwrap_or_else(|| Target::new(&self.server, self.port))
            .with_srv(options.use_srv.unwrap_or(use_srv_default));

        self.teardown();
        self.phase = Phase::TcpConnecting;
        let transport = self.factory.transport(
            &target,
            options.proxy.as_ref(),
            self.connection_timeout,
        );
        if !self.caps.attach_transport(transport) {
            self.phase = Phase::Idle;
            return Err(SessionError::TransportFailed);
        }
        self.state = ConnectionState::new(SecurityLevel::Tcp);
        self.phase = Phase::TcpConnected;

        let port = self
            .caps
            .transport()
            .and_then(|transport| transport.peer_port())
            .unwrap_or(target.port);
        let direct_tls = options
            .secure
            .unwrap_or_else(|| DIRECT_TLS_PORTS.contains(&port));
        if direct_tls {
            self.phase = Phase::TlsNegotiating;
            let layer = self.factory.security();
            if !self.caps.attach_security(layer, TlsMode::Immediate) {
                self.abort_connect();
                return Err(SessionError::TlsFailed);
            }
            self.state.set_level(SecurityLevel::Ssl);
            self.phase = Phase::TlsActive;
        }

        self.phase = Phase::StreamInit;
        let dispatcher = self.factory.dispatcher();
        let open = StreamOpen {
            to: &self.server,
            namespace: &self.namespace,
        };
        if !self.caps.attach_dispatcher(dispatcher, &open) {
            self.abort_connect();
            return Err(SessionError::StreamFailed);
        }
        if let Err(err) = self.await_stream() {
            self.abort_connect();
            return Err(err);
        }
        self.phase = Phase::Ready;
        info!("connected to {} ({})", self.server, self.state);
        Ok(self.state)
    }

    /// Detaches everything a connect or auth attached, in order.
    fn teardown(&mut self) {
        self.caps.detach(CapabilityKind::ComponentBind);
        self.caps.detach(CapabilityKind::ResourceBind);
        self.route = false;
        for kind in TEARDOWN_ORDER {
            self.caps.detach(kind);
        }
        self.state.clear();
        self.phase = Phase::Idle;
        self.bindings.clear();
    }

    /// Drops a half-built connection.
    fn abort_connect(&mut self) {
        self.caps.detach(CapabilityKind::Dispatcher);
        self.caps.detach(CapabilityKind::Security);
        self.caps.detach(CapabilityKind::Transport);
        self.state.clear();
        self.phase = Phase::Idle;
    }
}
