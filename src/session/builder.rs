/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::time::Duration;

use super::DisconnectHandlers;
use super::Role;
use super::Session;
use super::disconnect::abort_on_disconnect;
use crate::capability::Capabilities;
use crate::capability::CapabilityFactory;
use crate::constants::CLIENT_NS;
use crate::constants::CLIENT_PORT;
use crate::constants::COMPONENT_ACCEPT_NS;
use crate::constants::COMPONENT_PORT;
use crate::constants::DEFAULT_RESOURCE;
use crate::pump::CancelToken;
use crate::pump::PumpPolicy;
use crate::state::ConnectionState;
use crate::state::Phase;
use crate::transport::ProxyConfig;
use crate::transport::Target;

pub struct SessionBuilder {
    server: String,
    port: u16,
    role: Role,
    pump_policy: PumpPolicy,
    cancel_token: CancelToken,
    connection_timeout: Duration,
    default_resource: String,
}

impl SessionBuilder {
    pub fn client(server: &str) -> Self {
        Self::new(server, CLIENT_PORT, Role::Client)
    }

    pub fn component(server: &str, options: ComponentOptions) -> Self {
        Self::new(server, COMPONENT_PORT, Role::Component(options))
    }

    fn new(server: &str, port: u16, role: Role) -> Self {
        SessionBuilder {
            server: server.to_owned(),
            port,
            role,
            pump_policy: PumpPolicy::default(),
            cancel_token: CancelToken::new(),
            connection_timeout: Duration::from_secs(30),
            default_resource: DEFAULT_RESOURCE.to_owned(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn pump_policy(mut self, policy: PumpPolicy) -> Self {
        self.pump_policy = policy;
        self
    }

    /// Shares a token, so the session can be stopped from elsewhere.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Resource used by legacy authentication when none is given.
    pub fn default_resource(mut self, resource: &str) -> Self {
        self.default_resource = resource.to_owned();
        self
    }

    pub fn build<F: CapabilityFactory>(self, factory: F) -> Session<F> {
        let namespace = match self.role {
            Role::Client => CLIENT_NS,
            Role::Component(_) => COMPONENT_ACCEPT_NS,
        };
        let mut disconnect_handlers = DisconnectHandlers::default();
        let default_handler = disconnect_handlers.register(Box::new(abort_on_disconnect));
        Session {
            server: self.server,
            port: self.port,
            namespace: namespace.to_owned(),
            default_namespace: namespace.to_owned(),
            state: ConnectionState::default(),
            phase: Phase::Idle,
            route: false,
            role: self.role,
            caps: Capabilities::new(),
            factory,
            disconnect_handlers,
            default_handler: Some(default_handler),
            pump_policy: self.pump_policy,
            cancel_token: self.cancel_token,
            connection_timeout: self.connection_timeout,
            default_resource: self.default_resource,
            connect_options: ConnectOptions::default(),
            credentials: None,
            bindings: Vec::new(),
            events: None,
        }
    }
}

/// Per-call overrides for [Session::connect].
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ConnectOptions {
    pub(super) server: Option<Target>,
    pub(super) proxy: Option<ProxyConfig>,
    pub(super) secure: Option<bool>,
    pub(super) use_srv: Option<bool>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects here instead of the session's server and port.
    pub fn server(mut self, target: Target) -> Self {
        self.server = Some(target);
        self
    }

    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Forces direct TLS on, or turns off every kind of TLS.
    ///
    /// When left alone, direct TLS is used for the ports 5223 and 443,
    /// and STARTTLS is tried on client streams.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    pub fn use_srv(mut self, use_srv: bool) -> Self {
        self.use_srv = Some(use_srv);
        self
    }
}

#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    pub(super) user: String,
    pub(super) password: String,
    pub(super) resource: Option<String>,
    pub(super) use_sasl: bool,
}

impl Credentials {
    pub fn new(user: &str, password: &str) -> Self {
        Credentials {
            user: user.to_owned(),
            password: password.to_owned(),
            resource: None,
            use_sasl: true,
        }
    }

    pub fn resource(mut self, resource: &str) -> Self {
        self.resource = Some(resource.to_owned());
        self
    }

    pub fn use_sasl(mut self, use_sasl: bool) -> Self {
        self.use_sasl = use_sasl;
        self
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("resource", &self.resource)
            .field("use_sasl", &self.use_sasl)
            .finish_non_exhaustive()
    }
}

/// Which component protocol the server talks.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum ComponentServer {
    /// Decide from the stream: features mean jabberd2.
    #[default]
    Auto,
    Jabberd2,
    /// Plain XEP-0114 handshake.
    Legacy,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ComponentOptions {
    pub(super) server_type: ComponentServer,
    pub(super) domains: Vec<String>,
    pub(super) sasl: bool,
    pub(super) bind: bool,
    pub(super) route: bool,
    pub(super) xcp: bool,
}

impl Default for ComponentOptions {
    fn default() -> Self {
        ComponentOptions {
            server_type: ComponentServer::Auto,
            domains: Vec::new(),
            sasl: false,
            bind: true,
            route: false,
            xcp: false,
        }
    }
}

impl ComponentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server_type(mut self, server_type: ComponentServer) -> Self {
        self.server_type = server_type;
        self
    }

    /// Adds a domain to bind after authentication, in order.
    pub fn domain(mut self, domain: &str) -> Self {
        self.domains.push(domain.to_owned());
        self
    }

    pub fn sasl(mut self, sasl: bool) -> Self {
        self.sasl = sasl;
        self
    }

    pub fn bind(mut self, bind: bool) -> Self {
        self.bind = bind;
        self
    }

    /// Asks to be the default route for unknown domains.
    pub fn route(mut self, route: bool) -> Self {
        self.route = route;
        self
    }

    /// Server is Cisco XCP, which keeps the component namespace.
    pub fn xcp(mut self, xcp: bool) -> Self {
        self.xcp = xcp;
        self
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }
}
