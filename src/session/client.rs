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

use super::ConnectOptions;
use super::Credentials;
use super::Session;
use super::SessionError;
use super::SessionEvent;
use super::auth::SaslResult;
use super::auth::negotiate_legacy;
use super::auth::negotiate_sasl;
use crate::capability::BindOutcome;
use crate::capability::CapabilityFactory;
use crate::capability::CapabilityKind;
use crate::capability::TlsMode;
use crate::capability::TlsOutcome;
use crate::state::AuthMethod;
use crate::state::ConnectionState;
use crate::state::Phase;
use crate::state::SecurityLevel;

pub(super) fn connect<F: CapabilityFactory>(
    session: &mut Session<F>,
    options: &ConnectOptions,
) -> Result<ConnectionState, SessionError> {
    let state = session.establish(options, true)?;
    if options.secure == Some(false) || state.level() == Some(SecurityLevel::Ssl) {
        return Ok(state);
    }
    let offered = session
        .caps
        .features()
        .is_some_and(|features| features.starttls);
    if !offered {
        debug!("server does not offer STARTTLS");
        return Ok(state);
    }

    session.phase = Phase::TlsNegotiating;
    let layer = session.factory.security();
    if !session.caps.attach_security(layer, TlsMode::Deferred) {
        session.phase = Phase::Ready;
        session.emit(SessionEvent::TlsFailed("cannot request STARTTLS".to_owned()));
        return Ok(state);
    }
    let outcome = match session.pump_until("STARTTLS outcome", |caps| caps.negotiate_security()) {
        Ok(outcome) => outcome,
        Err(err) => {
            session.abort_connect();
            return Err(err);
        }
    };
    match outcome {
        TlsOutcome::Success => {
            info!("stream upgraded with STARTTLS");
            session.state.set_level(SecurityLevel::Tls);
            session.phase = Phase::TlsActive;
        }
        TlsOutcome::Failure(reason) => {
            session.caps.detach(CapabilityKind::Security);
            session.phase = Phase::Ready;
            session.emit(SessionEvent::TlsFailed(reason));
        }
    }
    Ok(session.state)
}

pub(super) fn auth<F: CapabilityFactory>(
    session: &mut Session<F>,
    credentials: &Credentials,
) -> Result<AuthMethod, SessionError> {
    session.await_stream()?;
    let result = if credentials.use_sasl {
        negotiate_sasl(session, credentials)?
    } else {
        SaslResult::Unsupported
    };
    if let SaslResult::Unsupported = result {
        let resource = credentials
            .resource
            .clone()
            .unwrap_or_else(|| session.default_resource.clone());
        negotiate_legacy(session, credentials, &resource)?;
        session.state.set_auth(AuthMethod::OldAuth);
        session.phase = Phase::Ready;
        return Ok(AuthMethod::OldAuth);
    }

    // Stream restarts after SASL, binding needs the new features
    session.await_stream()?;
    let bind = session.factory.resource_bind();
    if !session
        .caps
        .attach_resource_bind(bind, credentials.resource.as_deref())
    {
        return Err(SessionError::CapabilityFailed(CapabilityKind::ResourceBind));
    }
    match session.pump_until("resource binding", |caps| caps.resource_bind_outcome())? {
        BindOutcome::Bound(jid) => {
            info!("bound as {jid}");
            session.state.set_auth(AuthMethod::Sasl);
            session.phase = Phase::Ready;
            Ok(AuthMethod::Sasl)
        }
        BindOutcome::Failed(token) => Err(SessionError::BindFailed(token)),
    }
}
