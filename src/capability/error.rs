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
use std::io;

/// Error returned by a capability which could not attach itself.
///
/// The registry logs these and reports a plain failure to the
/// negotiation code, since attach failures are an expected outcome
/// of talking to real servers.
#[derive(Debug)]
pub enum CapabilityError {
    Io(io::Error),
    Unavailable(&'static str),
    Rejected(String),
}

impl Display for CapabilityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityError::Io(err) => err.fmt(f),
            CapabilityError::Unavailable(what) => write!(f, "not available: {what}"),
            CapabilityError::Rejected(reason) => write!(f, "rejected by peer: {reason}"),
        }
    }
}

impl Error for CapabilityError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CapabilityError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for CapabilityError {
    fn from(err: io::Error) -> Self {
        CapabilityError::Io(err)
    }
}
