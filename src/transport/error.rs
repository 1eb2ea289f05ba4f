/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::error::Error;
use std::fmt::Display;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct BadAddress(pub &'static str);

impl Display for BadAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid server address: {}", self.0)
    }
}

impl Error for BadAddress {}

pub(super) mod description {
    pub(in super::super) const HOST_EMPTY: &str = "host is empty";
    pub(in super::super) const PORT_INVALID: &str = "port is not a number between 1 and 65535";
    pub(in super::super) const BRACKET_UNCLOSED: &str = "IPv6 literal is missing the closing bracket";
}
