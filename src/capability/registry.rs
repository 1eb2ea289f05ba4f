/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::io;
use std::time::Duration;

use log::debug;
use log::warn;

use super::AuthOutcome;
use super::BindOutcome;
use super::ByteStream;
use super::Capability;
use super::CapabilityError;
use super::CapabilityKind;
use super::Channel;
use super::ComponentBind;
use super::Dispatcher;
use super::LegacyAuth;
use super::ResourceBind;
use super::SaslAuth;
use super::SaslStatus;
use super::SecurityLayer;
use super::StreamFeatures;
use super::StreamHeader;
use super::StreamOpen;
use super::TlsMode;
use super::TlsOutcome;
use super::Transport;

/// Per-session table of attached capabilities.
///
/// Every [CapabilityKind] has one slot, so at most one instance of a
/// kind is active at a time. A capability is kept outside the table
/// while its own attach logic runs, and gets the table to reach the
/// capabilities attached before it.
#[derive(Default)]
pub struct Capabilities {
    transport: Option<Box<dyn Transport>>,
    security: Option<Box<dyn SecurityLayer>>,
    dispatcher: Option<Box<dyn Dispatcher>>,
    sasl: Option<Box<dyn SaslAuth>>,
    legacy_auth: Option<Box<dyn LegacyAuth>>,
    resource_bind: Option<Box<dyn ResourceBind>>,
    component_bind: Option<Box<dyn ComponentBind>>,
}

fn settle<T: Capability + ?Sized>(
    kind: CapabilityKind,
    slot: &mut Option<Box<T>>,
    mut capability: Box<T>,
    result: Result<(), CapabilityError>,
) -> bool {
    match result {
        Ok(()) => {
            debug!("{kind} attached");
            *slot = Some(capability);
            true
        }
        Err(err) => {
            warn!("{kind} failed to attach: {err}");
            capability.detach();
            false
        }
    }
}

fn teardown<T: Capability + ?Sized>(kind: CapabilityKind, slot: &mut Option<Box<T>>) {
    if let Some(mut capability) = slot.take() {
        debug!("{kind} detached");
        capability.detach();
    }
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, kind: CapabilityKind) -> bool {
        match kind {
            CapabilityKind::Transport => self.transport.is_some(),
            CapabilityKind::Security => self.security.is_some(),
            CapabilityKind::Dispatcher => self.dispatcher.is_some(),
            CapabilityKind::Sasl => self.sasl.is_some(),
            CapabilityKind::LegacyAuth => self.legacy_auth.is_some(),
            CapabilityKind::ResourceBind => self.resource_bind.is_some(),
            CapabilityKind::ComponentBind => self.component_bind.is_some(),
        }
    }

    pub fn get(&self, kind: CapabilityKind) -> Option<&dyn Capability> {
        match kind {
            CapabilityKind::Transport => self.transport.as_deref().map(|c| c as &dyn Capability),
            CapabilityKind::Security => self.security.as_deref().map(|c| c as &dyn Capability),
            CapabilityKind::Dispatcher => self.dispatcher.as_deref().map(|c| c as &dyn Capability),
            CapabilityKind::Sasl => self.sasl.as_deref().map(|c| c as &dyn Capability),
            CapabilityKind::LegacyAuth => {
                self.legacy_auth.as_deref().map(|c| c as &dyn Capability)
            }
            CapabilityKind::ResourceBind => {
                self.resource_bind.as_deref().map(|c| c as &dyn Capability)
            }
            CapabilityKind::ComponentBind => {
                self.component_bind.as_deref().map(|c| c as &dyn Capability)
            }
        }
    }

    /// Tears down and removes a capability. Absent kinds are ignored.
    pub fn detach(&mut self, kind: CapabilityKind) {
        match kind {
            CapabilityKind::Transport => teardown(kind, &mut self.transport),
            CapabilityKind::Security => teardown(kind, &mut self.security),
            CapabilityKind::Dispatcher => teardown(kind, &mut self.dispatcher),
            CapabilityKind::Sasl => teardown(kind, &mut self.sasl),
            CapabilityKind::LegacyAuth => teardown(kind, &mut self.legacy_auth),
            CapabilityKind::ResourceBind => teardown(kind, &mut self.resource_bind),
            CapabilityKind::ComponentBind => teardown(kind, &mut self.component_bind),
        }
    }

    pub fn attach_transport(&mut self, mut transport: Box<dyn Transport>) -> bool {
        let kind = CapabilityKind::Transport;
        self.detach(kind);
        let result = transport.attach();
        settle(kind, &mut self.transport, transport, result)
    }

    pub fn attach_security(&mut self, mut security: Box<dyn SecurityLayer>, mode: TlsMode) -> bool {
        let kind = CapabilityKind::Security;
        self.detach(kind);
        let result = security.attach(self, mode);
        settle(kind, &mut self.security, security, result)
    }

    pub fn attach_dispatcher(
        &mut self,
        mut dispatcher: Box<dyn Dispatcher>,
        open: &StreamOpen<'_>,
    ) -> bool {
        let kind = CapabilityKind::Dispatcher;
        self.detach(kind);
        let result = match self.channel() {
            Some(mut channel) => dispatcher.attach(&mut channel, open),
            None => Err(CapabilityError::Unavailable("no transport to open the stream on")),
        };
        settle(kind, &mut self.dispatcher, dispatcher, result)
    }

    pub fn attach_sasl(&mut self, mut sasl: Box<dyn SaslAuth>) -> bool {
        let kind = CapabilityKind::Sasl;
        self.detach(kind);
        let result = sasl.attach(self);
        settle(kind, &mut self.sasl, sasl, result)
    }

    pub fn attach_legacy_auth(&mut self, mut legacy_auth: Box<dyn LegacyAuth>) -> bool {
        let kind = CapabilityKind::LegacyAuth;
        self.detach(kind);
        let result = legacy_auth.attach(self);
        settle(kind, &mut self.legacy_auth, legacy_auth, result)
    }

    pub fn attach_resource_bind(
        &mut self,
        mut bind: Box<dyn ResourceBind>,
        resource: Option<&str>,
    ) -> bool {
        let kind = CapabilityKind::ResourceBind;
        self.detach(kind);
        let result = bind.attach(self, resource);
        settle(kind, &mut self.resource_bind, bind, result)
    }

    pub fn attach_component_bind(
        &mut self,
        mut bind: Box<dyn ComponentBind>,
        domain: &str,
    ) -> bool {
        let kind = CapabilityKind::ComponentBind;
        self.detach(kind);
        let result = bind.attach(self, domain);
        settle(kind, &mut self.component_bind, bind, result)
    }

    fn link<'a>(
        transport: &'a mut Option<Box<dyn Transport>>,
        security: &'a mut Option<Box<dyn SecurityLayer>>,
    ) -> Option<Channel<'a>> {
        let stream = transport.as_deref_mut()?.stream()?;
        Some(Channel::new(stream, security.as_deref_mut()))
    }

    /// The active byte path: the transport, wrapped by the security
    /// layer when one is attached.
    pub fn channel(&mut self) -> Option<Channel<'_>> {
        Self::link(&mut self.transport, &mut self.security)
    }

    /// The raw transport stream, bypassing any security layer.
    pub fn transport_stream(&mut self) -> Option<&mut dyn ByteStream> {
        self.transport.as_deref_mut()?.stream()
    }

    /// Pumps one unit of work through the stream dispatcher.
    ///
    /// Returns false if there is no stream or the dispatcher reports
    /// that it is no longer usable.
    pub fn process(&mut self, unit: Duration) -> bool {
        let Some(dispatcher) = self.dispatcher.as_deref_mut() else {
            return false;
        };
        let Some(mut channel) = Self::link(&mut self.transport, &mut self.security) else {
            return false;
        };
        dispatcher.process(&mut channel, unit)
    }

    pub fn send(&mut self, data: &str) -> io::Result<()> {
        let Some(dispatcher) = self.dispatcher.as_deref_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no stream dispatcher attached",
            ));
        };
        let Some(mut channel) = Self::link(&mut self.transport, &mut self.security) else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no transport attached",
            ));
        };
        dispatcher.send(&mut channel, data)
    }

    /// Runs the SASL negotiation entry point.
    pub fn start_sasl(&mut self) -> Result<(), CapabilityError> {
        let Some(mut sasl) = self.sasl.take() else {
            return Err(CapabilityError::Unavailable("SASL is not attached"));
        };
        let result = sasl.start(self);
        self.sasl = Some(sasl);
        result
    }

    /// Gives a deferred security layer a chance to advance.
    pub fn negotiate_security(&mut self) -> Option<TlsOutcome> {
        let mut security = self.security.take()?;
        let outcome = security.negotiate(self);
        self.security = Some(security);
        outcome
    }

    pub fn transport(&self) -> Option<&dyn Transport> {
        self.transport.as_deref()
    }

    pub fn dispatcher(&self) -> Option<&dyn Dispatcher> {
        self.dispatcher.as_deref()
    }

    pub fn dispatcher_mut(&mut self) -> Option<&mut (dyn Dispatcher + 'static)> {
        self.dispatcher.as_deref_mut()
    }

    pub fn header(&self) -> Option<&StreamHeader> {
        self.dispatcher.as_deref()?.header()
    }

    pub fn features(&self) -> Option<&StreamFeatures> {
        self.dispatcher.as_deref()?.features()
    }

    pub fn sasl_status(&self) -> Option<SaslStatus> {
        self.sasl.as_deref().map(|sasl| sasl.status())
    }

    pub fn legacy_auth_outcome(&self) -> Option<AuthOutcome> {
        self.legacy_auth.as_deref()?.outcome()
    }

    pub fn resource_bind_outcome(&self) -> Option<BindOutcome> {
        self.resource_bind.as_deref()?.outcome()
    }

    pub fn component_bind_outcome(&self) -> Option<BindOutcome> {
        self.component_bind.as_deref()?.outcome()
    }
}
