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
use std::io::Read;
use std::io::Write;

use super::SecurityLayer;

/// Anything the session can move stream bytes through.
pub trait ByteStream: Read + Write {}

impl<T: Read + Write> ByteStream for T {}

/// The active read/write path of a session.
///
/// Bytes go straight to the transport until a security layer is
/// attached, after which every read and write passes through it.
pub struct Channel<'a> {
    stream: &'a mut dyn ByteStream,
    security: Option<&'a mut (dyn SecurityLayer + 'static)>,
}

impl<'a> Channel<'a> {
    pub fn new(
        stream: &'a mut dyn ByteStream,
        security: Option<&'a mut (dyn SecurityLayer + 'static)>,
    ) -> Self {
        Channel { stream, security }
    }

    pub fn is_secure(&self) -> bool {
        self.security.is_some()
    }
}

impl Read for Channel<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.security.as_deref_mut() {
            Some(security) => security.read(&mut *self.stream, buf),
            None => self.stream.read(buf),
        }
    }
}

impl Write for Channel<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.security.as_deref_mut() {
            Some(security) => security.write(&mut *self.stream, buf),
            None => self.stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.security.as_deref_mut() {
            Some(security) => security.flush(&mut *self.stream),
            None => self.stream.flush(),
        }
    }
}
