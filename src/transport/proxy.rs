/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::io::Read;
use std::io::Write;
use std::net::Shutdown;
use std::net::TcpStream;
use std::time::Duration;

use log::debug;
use log::info;

use super::ProxyConfig;
use super::Target;
use super::tcp::DEFAULT_CONNECTION_TIMEOUT;
use super::tcp::connect_host;
use crate::capability::ByteStream;
use crate::capability::Capability;
use crate::capability::CapabilityError;
use crate::capability::Transport;

const MAX_RESPONSE_HEAD: usize = 8 * 1024;

/// TCP connection tunnelled through an HTTP proxy with CONNECT.
///
/// The proxy resolves the server name itself, so SRV lookups are not
/// done for tunnelled connections.
pub struct HttpProxyTransport {
    proxy: ProxyConfig,
    target: Target,
    timeout: Duration,
    stream: Option<TcpStream>,
}

impl HttpProxyTransport {
    pub fn new(proxy: ProxyConfig, target: Target) -> Self {
        HttpProxyTransport {
            proxy,
            target,
            timeout: DEFAULT_CONNECTION_TIMEOUT,
            stream: None,
        }
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(super) fn connect_request(&self) -> String {
        let authority = self.target.to_string();
        let mut request = format!(
            "CONNECT {authority} HTTP/1.1\r\n\
             Host: {authority}\r\n\
             Proxy-Connection: Keep-Alive\r\n\
             Pragma: no-cache\r\n"
        );
        if let Some(authorization) = self.proxy.authorization() {
            request.push_str("Proxy-Authorization: ");
            request.push_str(&authorization);
            request.push_str("\r\n");
        }
        request.push_str("\r\n");
        request
    }
}

/// Reads the proxy response up to the empty line, returns the status code.
///
/// Reads byte by byte, so nothing from the tunnelled stream is consumed.
pub(super) fn read_response_head(stream: &mut impl Read) -> Result<u16, CapabilityError> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_RESPONSE_HEAD {
            return Err(CapabilityError::Rejected("proxy response is too long".into()));
        }
        if stream.read(&mut byte)? == 0 {
            return Err(CapabilityError::Rejected(
                "proxy closed the connection".into(),
            ));
        }
        head.push(byte[0]);
    }
    let head = String::from_utf8_lossy(&head);
    let status_line = head.lines().next().unwrap_or_default();
    let mut parts = status_line.split_whitespace();
    match (parts.next(), parts.next().map(str::parse::<u16>)) {
        (Some(version), Some(Ok(code))) if version.starts_with("HTTP/") => Ok(code),
        _ => Err(CapabilityError::Rejected(format!(
            "malformed proxy response: {status_line}"
        ))),
    }
}

impl Capability for HttpProxyTransport {
    fn detach(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl Transport for HttpProxyTransport {
    fn attach(&mut self) -> Result<(), CapabilityError> {
        debug!(
            "connecting to {} through proxy {}:{}",
            self.target, self.proxy.host, self.proxy.port
        );
        let mut stream = connect_host(&self.proxy.host, self.proxy.port, self.timeout)?;
        stream.write_all(self.connect_request().as_bytes())?;
        let code = read_response_head(&mut stream)?;
        if !(200..300).contains(&code) {
            let _ = stream.shutdown(Shutdown::Both);
            return Err(CapabilityError::Rejected(format!(
                "proxy refused the tunnel with status {code}"
            )));
        }
        info!("tunnel to {} established", self.target);
        self.stream = Some(stream);
        Ok(())
    }

    fn stream(&mut self) -> Option<&mut dyn ByteStream> {
        self.stream.as_mut().map(|stream| stream as &mut dyn ByteStream)
    }

    fn server_name(&self) -> &str {
        &self.target.host
    }

    fn peer_port(&self) -> Option<u16> {
        self.stream.as_ref().map(|_| self.target.port)
    }
}
