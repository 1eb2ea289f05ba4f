/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

pub const CLIENT_PORT: u16 = 5222;

pub const COMPONENT_PORT: u16 = 5347;

/// Ports where servers traditionally speak TLS before the stream starts.
pub const DIRECT_TLS_PORTS: [u16; 2] = [5223, 443];

pub const CLIENT_SRV: &str = "_xmpp-client._tcp";

pub const STREAM_VERSION: &str = "1.0";

pub const DEFAULT_RESOURCE: &str = "iksconn";

pub const CLIENT_NS: &str = "jabber:client";

pub const COMPONENT_ACCEPT_NS: &str = "jabber:component:accept";

pub const COMPONENT_1_NS: &str = "http://jabberd.jabberstudio.org/ns/component/1.0";

pub const STARTTLS_REQUEST: &str = "<starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/>";

pub const IQ_TAG: &str = "iq";

pub const MESSAGE_TAG: &str = "message";

pub const PRESENCE_TAG: &str = "presence";
