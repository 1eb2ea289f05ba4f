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

use super::Credentials;
use super::Session;
use super::SessionError;
use crate::capability::AuthOutcome;
use crate::capability::CapabilityFactory;
use crate::capability::CapabilityKind;
use crate::capability::SaslStatus;

pub(super) enum SaslResult {
    /// Server has no usable mechanism, legacy auth is next.
    Unsupported,
    Authenticated,
}

/// Attaches SASL and drives it to a terminal status.
pub(super) fn negotiate_sasl<F: CapabilityFactory>(
    session: &mut Session<F>,
    credentials: &Credentials,
) -> Result<SaslResult, SessionError> {
    let sasl = session.factory.sasl(&credentials.user, &credentials.password);
    if !session.caps.attach_sasl(sasl) {
        return Err(SessionError::CapabilityFailed(CapabilityKind::Sasl));
    }
    if let Err(err) = session.caps.start_sasl() {
        debug!("cannot start SASL: {err}");
        session.caps.detach(CapabilityKind::Sasl);
        return Err(SessionError::CapabilityFailed(CapabilityKind::Sasl));
    }
    let status = session.pump_until("SASL outcome", |caps| {
        caps.sasl_status().filter(|status| !status.is_pending())
    })?;
    match status {
        SaslStatus::Success => {
            info!("SASL authentication of {} succeeded", credentials.user);
            Ok(SaslResult::Authenticated)
        }
        SaslStatus::NotSupported => {
            debug!("SASL not supported, falling back to legacy auth");
            session.caps.detach(CapabilityKind::Sasl);
            Ok(SaslResult::Unsupported)
        }
        status => {
            session.caps.detach(CapabilityKind::Sasl);
            Err(SessionError::NotAuthorized(status.token().to_owned()))
        }
    }
}

/// Pre-SASL authentication.
///
/// The state is left alone, callers mark it once their own steps after
/// the handshake are done.
pub(super) fn negotiate_legacy<F: CapabilityFactory>(
    session: &mut Session<F>,
    credentials: &Credentials,
    resource: &str,
) -> Result<(), SessionError> {
    let legacy = session
        .factory
        .legacy_auth(&credentials.user, &credentials.password, resource);
    if !session.caps.attach_legacy_auth(legacy) {
        return Err(SessionError::CapabilityFailed(CapabilityKind::LegacyAuth));
    }
    match session.pump_until("legacy auth outcome", |caps| caps.legacy_auth_outcome())? {
        AuthOutcome::Accepted => {
            info!("legacy authentication of {} succeeded", credentials.user);
            Ok(())
        }
        AuthOutcome::Rejected(token) => {
            session.caps.detach(CapabilityKind::LegacyAuth);
            Err(SessionError::NotAuthorized(token))
        }
    }
}
