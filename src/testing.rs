/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Scripted collaborators for driving sessions in tests.

use std::cell::RefCell;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use crate::capability::AuthOutcome;
use crate::capability::BindOutcome;
use crate::capability::ByteStream;
use crate::capability::Capabilities;
use crate::capability::Capability;
use crate::capability::CapabilityError;
use crate::capability::CapabilityFactory;
use crate::capability::Channel;
use crate::capability::ComponentBind;
use crate::capability::Dispatcher;
use crate::capability::HandlerSnapshot;
use crate::capability::LegacyAuth;
use crate::capability::ResourceBind;
use crate::capability::SaslAuth;
use crate::capability::SaslStatus;
use crate::capability::SecurityLayer;
use crate::capability::StartTlsReply;
use crate::capability::StreamFeatures;
use crate::capability::StreamHeader;
use crate::capability::StreamOpen;
use crate::capability::TlsMode;
use crate::capability::TlsOutcome;
use crate::capability::Transport;
use crate::constants::STARTTLS_REQUEST;
use crate::transport::ProxyConfig;
use crate::transport::Target;

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// What the fake server does, and what happened to it.
pub(crate) struct Script {
    pub(crate) transport_fails: bool,
    pub(crate) peer_port: Option<u16>,
    pub(crate) tls_fails: bool,
    pub(crate) stream_fails: bool,
    pub(crate) version: Option<String>,
    pub(crate) features: StreamFeatures,
    pub(crate) starttls_reply: StartTlsReply,
    /// Server never answers a STARTTLS request.
    pub(crate) starttls_ignored: bool,
    pub(crate) sasl: SaslStatus,
    pub(crate) legacy: AuthOutcome,
    pub(crate) bind: BindOutcome,
    pub(crate) failing_domains: Vec<String>,
    /// Pump number at which the stream drops.
    pub(crate) drop_at: Option<u32>,
    /// Server never says anything.
    pub(crate) silent: bool,
    pub(crate) pumps: u32,
    /// Routing table of the live dispatcher.
    pub(crate) handlers: Vec<String>,
    pub(crate) events: Vec<String>,
}

impl Default for Script {
    fn default() -> Self {
        Script {
            transport_fails: false,
            peer_port: None,
            tls_fails: false,
            stream_fails: false,
            version: Some("1.0".to_owned()),
            features: StreamFeatures {
                starttls: false,
                mechanisms: vec!["PLAIN".to_owned()],
                bind: true,
                session: false,
            },
            starttls_reply: StartTlsReply::Proceed,
            starttls_ignored: false,
            sasl: SaslStatus::Success,
            legacy: AuthOutcome::Accepted,
            bind: BindOutcome::Bound("juliet@example.com/iksconn".to_owned()),
            failing_domains: Vec::new(),
            drop_at: None,
            silent: false,
            pumps: 0,
            handlers: Vec::new(),
            events: Vec::new(),
        }
    }
}

impl Script {
    fn log(&mut self, event: String) {
        self.events.push(event);
    }

    pub(crate) fn count(&self, event: &str) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }

    pub(crate) fn has(&self, event: &str) -> bool {
        self.count(event) > 0
    }

    pub(crate) fn position(&self, event: &str) -> Option<usize> {
        self.events.iter().position(|e| e == event)
    }

    fn decided(&self, ready_at: Option<u32>) -> bool {
        ready_at.is_some_and(|ready_at| self.pumps >= ready_at)
    }
}

pub(crate) type Shared = Rc<RefCell<Script>>;

pub(crate) struct MockTransport {
    script: Shared,
    target: Target,
    stream: Option<Cursor<Vec<u8>>>,
}

impl MockTransport {
    pub(crate) fn new(script: &Shared, target: Target) -> Self {
        MockTransport {
            script: script.clone(),
            target,
            stream: None,
        }
    }
}

impl Capability for MockTransport {
    fn detach(&mut self) {
        self.stream = None;
        self.script.borrow_mut().log("detach transport".into());
    }
}

impl Transport for MockTransport {
    fn attach(&mut self) -> Result<(), CapabilityError> {
        let mut script = self.script.borrow_mut();
        script.log(format!("connect {}", self.target));
        if script.transport_fails {
            return Err(CapabilityError::Io(std::io::ErrorKind::ConnectionRefused.into()));
        }
        self.stream = Some(Cursor::new(Vec::new()));
        Ok(())
    }

    fn stream(&mut self) -> Option<&mut dyn ByteStream> {
        self.stream.as_mut().map(|stream| stream as &mut dyn ByteStream)
    }

    fn server_name(&self) -> &str {
        &self.target.host
    }

    fn peer_port(&self) -> Option<u16> {
        self.stream.as_ref()?;
        self.script.borrow().peer_port.or(Some(self.target.port))
    }
}

pub(crate) struct MockSecurity {
    script: Shared,
    outcome: Option<TlsOutcome>,
}

impl Capability for MockSecurity {
    fn detach(&mut self) {
        self.script.borrow_mut().log("detach security".into());
    }
}

impl SecurityLayer for MockSecurity {
    fn attach(&mut self, caps: &mut Capabilities, mode: TlsMode) -> Result<(), CapabilityError> {
        let fails = {
            let mut script = self.script.borrow_mut();
            script.log(format!("attach security {mode:?}"));
            script.tls_fails
        };
        match mode {
            TlsMode::Immediate if fails => Err(CapabilityError::Rejected("bad certificate".into())),
            TlsMode::Immediate => {
                self.outcome = Some(TlsOutcome::Success);
                Ok(())
            }
            TlsMode::Deferred => Ok(caps.send(STARTTLS_REQUEST)?),
        }
    }

    fn negotiate(&mut self, caps: &mut Capabilities) -> Option<TlsOutcome> {
        if self.outcome.is_some() {
            return self.outcome.clone();
        }
        let outcome = match caps.dispatcher()?.starttls_reply()? {
            StartTlsReply::Failure => TlsOutcome::Failure("failure".into()),
            StartTlsReply::Proceed if self.script.borrow().tls_fails => {
                TlsOutcome::Failure("handshake failed".into())
            }
            StartTlsReply::Proceed => {
                caps.dispatcher_mut()?.restart();
                TlsOutcome::Success
            }
        };
        self.outcome = Some(outcome.clone());
        Some(outcome)
    }

    fn read(&mut self, sock: &mut dyn ByteStream, buf: &mut [u8]) -> std::io::Result<usize> {
        sock.read(buf)
    }

    fn write(&mut self, sock: &mut dyn ByteStream, buf: &[u8]) -> std::io::Result<usize> {
        sock.write(buf)
    }

    fn flush(&mut self, sock: &mut dyn ByteStream) -> std::io::Result<()> {
        sock.flush()
    }
}

pub(crate) struct MockDispatcher {
    script: Shared,
    header: Option<StreamHeader>,
    features: Option<StreamFeatures>,
    starttls_asked: bool,
    starttls_reply: Option<StartTlsReply>,
}

impl MockDispatcher {
    pub(crate) fn new(script: &Shared) -> Self {
        MockDispatcher {
            script: script.clone(),
            header: None,
            features: None,
            starttls_asked: false,
            starttls_reply: None,
        }
    }
}

impl Capability for MockDispatcher {
    fn detach(&mut self) {
        self.script.borrow_mut().log("detach dispatcher".into());
    }
}

impl Dispatcher for MockDispatcher {
    fn attach(
        &mut self,
        channel: &mut Channel<'_>,
        open: &StreamOpen<'_>,
    ) -> Result<(), CapabilityError> {
        let mut script = self.script.borrow_mut();
        script.log(format!("open stream to={} ns={}", open.to, open.namespace));
        if script.stream_fails {
            return Err(CapabilityError::Rejected("host-unknown".into()));
        }
        script.handlers = vec!["default".to_owned()];
        write!(channel, "<stream:stream to='{}' xmlns='{}'>", open.to, open.namespace)?;
        Ok(())
    }

    fn process(&mut self, _channel: &mut Channel<'_>, _unit: Duration) -> bool {
        let mut script = self.script.borrow_mut();
        script.pumps += 1;
        if script.drop_at.is_some_and(|drop_at| script.pumps >= drop_at) {
            return false;
        }
        if script.silent {
            return true;
        }
        if self.header.is_none() {
            self.header = Some(StreamHeader {
                id: Some(format!("s{}", script.pumps)),
                from: Some("example.com".to_owned()),
                version: script.version.clone(),
                lang: None,
            });
        } else if self.features.is_none()
            && self.header.as_ref().is_some_and(|h| h.expects_features())
        {
            self.features = Some(script.features.clone());
        } else if self.starttls_asked && self.starttls_reply.is_none() && !script.starttls_ignored {
            self.starttls_reply = Some(script.starttls_reply);
        }
        true
    }

    fn send(&mut self, channel: &mut Channel<'_>, data: &str) -> std::io::Result<()> {
        if data == STARTTLS_REQUEST {
            self.starttls_asked = true;
        }
        self.script.borrow_mut().log(format!("send {data}"));
        channel.write_all(data.as_bytes())
    }

    fn header(&self) -> Option<&StreamHeader> {
        self.header.as_ref()
    }

    fn features(&self) -> Option<&StreamFeatures> {
        self.features.as_ref()
    }

    fn starttls_reply(&self) -> Option<StartTlsReply> {
        self.starttls_reply
    }

    fn restart(&mut self) {
        self.header = None;
        self.features = None;
        self.starttls_asked = false;
        self.starttls_reply = None;
        self.script.borrow_mut().log("restart stream".into());
    }

    fn register_namespace(&mut self, namespace: &str) {
        self.script.borrow_mut().log(format!("namespace {namespace}"));
    }

    fn register_protocol(&mut self, tag: &str, namespace: &str) {
        self.script.borrow_mut().log(format!("protocol {tag} {namespace}"));
    }

    fn dump_handlers(&mut self) -> HandlerSnapshot {
        HandlerSnapshot::new(self.script.borrow().handlers.clone())
    }

    fn restore_handlers(&mut self, snapshot: HandlerSnapshot) {
        if let Ok(handlers) = snapshot.downcast::<Vec<String>>() {
            self.script.borrow_mut().handlers = handlers;
        }
    }
}

struct MockSasl {
    script: Shared,
    ready_at: Option<u32>,
}

impl Capability for MockSasl {
    fn detach(&mut self) {
        self.script.borrow_mut().log("detach sasl".into());
    }
}

impl SaslAuth for MockSasl {
    fn attach(&mut self, _caps: &mut Capabilities) -> Result<(), CapabilityError> {
        self.script.borrow_mut().log("attach sasl".into());
        Ok(())
    }

    fn start(&mut self, caps: &mut Capabilities) -> Result<(), CapabilityError> {
        if self.script.borrow().sasl == SaslStatus::NotSupported {
            self.ready_at = Some(0);
            return Ok(());
        }
        caps.send("<auth mechanism='PLAIN'/>")?;
        self.ready_at = Some(self.script.borrow().pumps + 1);
        Ok(())
    }

    fn status(&self) -> SaslStatus {
        let script = self.script.borrow();
        match self.ready_at {
            None => SaslStatus::Idle,
            Some(_) if script.decided(self.ready_at) => script.sasl.clone(),
            Some(_) => SaslStatus::InProcess,
        }
    }
}

struct MockLegacyAuth {
    script: Shared,
    ready_at: Option<u32>,
}

impl Capability for MockLegacyAuth {
    fn detach(&mut self) {
        self.script.borrow_mut().log("detach legacy auth".into());
    }
}

impl LegacyAuth for MockLegacyAuth {
    fn attach(&mut self, _caps: &mut Capabilities) -> Result<(), CapabilityError> {
        let mut script = self.script.borrow_mut();
        self.ready_at = Some(script.pumps + 1);
        script.log("attach legacy auth".into());
        Ok(())
    }

    fn outcome(&self) -> Option<AuthOutcome> {
        let script = self.script.borrow();
        script.decided(self.ready_at).then(|| script.legacy.clone())
    }
}

struct MockResourceBind {
    script: Shared,
    ready_at: Option<u32>,
}

impl Capability for MockResourceBind {
    fn detach(&mut self) {
        self.script.borrow_mut().log("detach resource bind".into());
    }
}

impl ResourceBind for MockResourceBind {
    fn attach(
        &mut self,
        _caps: &mut Capabilities,
        resource: Option<&str>,
    ) -> Result<(), CapabilityError> {
        let mut script = self.script.borrow_mut();
        self.ready_at = Some(script.pumps + 1);
        script.log(format!("bind resource {}", resource.unwrap_or("*")));
        Ok(())
    }

    fn outcome(&self) -> Option<BindOutcome> {
        let script = self.script.borrow();
        script.decided(self.ready_at).then(|| script.bind.clone())
    }
}

struct MockComponentBind {
    script: Shared,
    domain: String,
    ready_at: Option<u32>,
}

impl Capability for MockComponentBind {
    fn detach(&mut self) {
        self.script.borrow_mut().log(format!("unbind {}", self.domain));
    }
}

impl ComponentBind for MockComponentBind {
    fn attach(&mut self, _caps: &mut Capabilities, domain: &str) -> Result<(), CapabilityError> {
        let mut script = self.script.borrow_mut();
        self.domain = domain.to_owned();
        self.ready_at = Some(script.pumps + 1);
        script.log(format!("bind {domain}"));
        Ok(())
    }

    fn outcome(&self) -> Option<BindOutcome> {
        let script = self.script.borrow();
        if !script.decided(self.ready_at) {
            return None;
        }
        if script.failing_domains.contains(&self.domain) {
            Some(BindOutcome::Failed("conflict".to_owned()))
        } else {
            Some(BindOutcome::Bound(self.domain.clone()))
        }
    }
}

/// Hands out mocks sharing one script.
pub(crate) struct MockFactory {
    script: Shared,
}

impl MockFactory {
    pub(crate) fn new() -> (MockFactory, Shared) {
        let script = Shared::default();
        (MockFactory { script: script.clone() }, script)
    }
}

impl CapabilityFactory for MockFactory {
    fn transport(
        &mut self,
        target: &Target,
        proxy: Option<&ProxyConfig>,
        _timeout: Duration,
    ) -> Box<dyn Transport> {
        if let Some(proxy) = proxy {
            self.script
                .borrow_mut()
                .log(format!("proxy {}:{}", proxy.host, proxy.port));
        }
        if target.use_srv {
            self.script.borrow_mut().log("srv".into());
        }
        Box::new(MockTransport::new(&self.script, target.clone()))
    }

    fn security(&mut self) -> Box<dyn SecurityLayer> {
        Box::new(MockSecurity {
            script: self.script.clone(),
            outcome: None,
        })
    }

    fn dispatcher(&mut self) -> Box<dyn Dispatcher> {
        Box::new(MockDispatcher::new(&self.script))
    }

    fn sasl(&mut self, user: &str, _password: &str) -> Box<dyn SaslAuth> {
        self.script.borrow_mut().log(format!("sasl user {user}"));
        Box::new(MockSasl {
            script: self.script.clone(),
            ready_at: None,
        })
    }

    fn legacy_auth(&mut self, user: &str, _password: &str, resource: &str) -> Box<dyn LegacyAuth> {
        self.script
            .borrow_mut()
            .log(format!("legacy user {user} resource {resource}"));
        Box::new(MockLegacyAuth {
            script: self.script.clone(),
            ready_at: None,
        })
    }

    fn resource_bind(&mut self) -> Box<dyn ResourceBind> {
        Box::new(MockResourceBind {
            script: self.script.clone(),
            ready_at: None,
        })
    }

    fn component_bind(&mut self, sasl: bool) -> Box<dyn ComponentBind> {
        self.script
            .borrow_mut()
            .log(format!("component bind sasl={sasl}"));
        Box::new(MockComponentBind {
            script: self.script.clone(),
            domain: String::new(),
            ready_at: None,
        })
    }
}
