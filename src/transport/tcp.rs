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
use std::net::Shutdown;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::time::Duration;

use log::debug;
use log::info;

use super::Target;
use super::srv;
use crate::capability::ByteStream;
use crate::capability::Capability;
use crate::capability::CapabilityError;
use crate::capability::Transport;
use crate::constants::CLIENT_SRV;

pub(super) const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Connects to the first reachable address of a host.
pub(super) fn connect_host(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                debug!("connecting to {addr} failed: {err}");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("no address found for {host}"))
    }))
}

/// Plain TCP connection to the server.
pub struct TcpTransport {
    target: Target,
    timeout: Duration,
    stream: Option<TcpStream>,
    peer_port: Option<u16>,
}

impl TcpTransport {
    pub fn new(target: Target) -> Self {
        TcpTransport {
            target,
            timeout: DEFAULT_CONNECTION_TIMEOUT,
            stream: None,
            peer_port: None,
        }
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn candidates(&self) -> Vec<(String, u16)> {
        let mut candidates = if self.target.use_srv {
            srv::lookup(&self.target.host, CLIENT_SRV)
        } else {
            Vec::new()
        };
        candidates.push((self.target.host.clone(), self.target.port));
        candidates
    }
}

impl Capability for TcpTransport {
    fn detach(&mut self) {
        if let Some(stream) = self.stream.take() {
            // Peer may already be gone
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.peer_port = None;
    }
}

impl Transport for TcpTransport {
    fn attach(&mut self) -> Result<(), CapabilityError> {
        let mut last_err = None;
        for (host, port) in self.candidates() {
            debug!("connecting to {host}:{port}");
            match connect_host(&host, port, self.timeout) {
                Ok(stream) => {
                    info!("connected to {host}:{port}");
                    self.stream = Some(stream);
                    self.peer_port = Some(port);
                    return Ok(());
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(match last_err {
            Some(err) => CapabilityError::Io(err),
            None => CapabilityError::Unavailable("no address to connect to"),
        })
    }

    fn stream(&mut self) -> Option<&mut dyn ByteStream> {
        self.stream.as_mut().map(|stream| stream as &mut dyn ByteStream)
    }

    fn server_name(&self) -> &str {
        &self.target.host
    }

    fn peer_port(&self) -> Option<u16> {
        self.peer_port
    }
}
