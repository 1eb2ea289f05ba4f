/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use log::debug;
use log::info;
use log::warn;

use super::ComponentOptions;
use super::ComponentServer;
use super::ConnectOptions;
use super::Credentials;
use super::DomainBinding;
use super::Session;
use super::SessionError;
use super::auth::SaslResult;
use super::auth::negotiate_legacy;
use super::auth::negotiate_sasl;
use crate::capability::BindOutcome;
use crate::capability::CapabilityFactory;
use crate::capability::CapabilityKind;
use crate::constants::CLIENT_NS;
use crate::constants::COMPONENT_1_NS;
use crate::constants::IQ_TAG;
use crate::constants::MESSAGE_TAG;
use crate::constants::PRESENCE_TAG;
use crate::state::AuthMethod;
use crate::state::ConnectionState;
use crate::state::Phase;

pub(super) fn connect<F: CapabilityFactory>(
    session: &mut Session<F>,
    options: &ConnectOptions,
    component: &ComponentOptions,
) -> Result<ConnectionState, SessionError> {
    if component.sasl {
        session.namespace = COMPONENT_1_NS.to_owned();
        if let Some(target) = &options.server {
            session.server = target.host.clone();
        }
    }
    session.default_namespace = session.namespace.clone();
    let state = session.establish(options, false)?;

    let jabberd2 = match component.server_type {
        ComponentServer::Jabberd2 => true,
        ComponentServer::Auto => session.caps.features().is_some(),
        ComponentServer::Legacy => false,
    };
    if jabberd2 && !component.xcp {
        debug!("jabberd2 component stream, stanzas are in {CLIENT_NS}");
        session.default_namespace = CLIENT_NS.to_owned();
        if let Some(dispatcher) = session.caps.dispatcher_mut() {
            dispatcher.register_namespace(CLIENT_NS);
            for tag in [IQ_TAG, MESSAGE_TAG, PRESENCE_TAG] {
                dispatcher.register_protocol(tag, CLIENT_NS);
            }
        }
    }
    Ok(state)
}

pub(super) fn auth<F: CapabilityFactory>(
    session: &mut Session<F>,
    credentials: &Credentials,
    component: &ComponentOptions,
) -> Result<AuthMethod, SessionError> {
    session.await_stream()?;
    let result = if component.sasl {
        negotiate_sasl(session, credentials)?
    } else {
        SaslResult::Unsupported
    };
    let method = match result {
        SaslResult::Unsupported => {
            // Components have no resource
            let resource = credentials.resource.as_deref().unwrap_or("");
            negotiate_legacy(session, credentials, resource)?;
            AuthMethod::OldAuth
        }
        SaslResult::Authenticated => {
            session.await_stream()?;
            AuthMethod::Sasl
        }
    };
    bind_domains(session, component, method == AuthMethod::Sasl)?;
    session.state.set_auth(method);
    session.phase = Phase::Ready;
    Ok(method)
}

/// Binds the configured domains one by one, stopping at the first failure.
///
/// Without configured domains the component binds its own name. Domains
/// bound before a failure stay bound.
fn bind_domains<F: CapabilityFactory>(
    session: &mut Session<F>,
    component: &ComponentOptions,
    sasl: bool,
) -> Result<(), SessionError> {
    session.route = component.route;
    session.bindings.clear();
    if !component.bind {
        return Ok(());
    }
    let domains = if component.domains.is_empty() {
        vec![session.server.clone()]
    } else {
        component.domains.clone()
    };
    for domain in &domains {
        let binder = session.factory.component_bind(sasl);
        let outcome = if session.caps.attach_component_bind(binder, domain) {
            let outcome =
                session.pump_until("domain binding", |caps| caps.component_bind_outcome());
            session.caps.detach(CapabilityKind::ComponentBind);
            outcome?
        } else {
            BindOutcome::Failed("cannot attach binder".to_owned())
        };
        match outcome {
            BindOutcome::Bound(_) => {
                info!("bound domain {domain}");
                session.bindings.push(DomainBinding {
                    domain: domain.clone(),
                    bound: true,
                });
            }
            BindOutcome::Failed(token) => {
                warn!("cannot bind domain {domain}: {token}");
                session.bindings.push(DomainBinding {
                    domain: domain.clone(),
                    bound: false,
                });
                return Err(SessionError::DomainBindFailed(domain.clone()));
            }
        }
    }
    Ok(())
}
