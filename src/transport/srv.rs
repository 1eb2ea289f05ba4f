/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

#[cfg(feature = "dns")]
use log::debug;

/// One SRV answer, before ordering.
#[cfg_attr(not(feature = "dns"), allow(dead_code))]
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct SrvRecord {
    pub(crate) priority: u16,
    pub(crate) weight: u16,
    pub(crate) target: String,
    pub(crate) port: u16,
}

/// Orders SRV answers into connection candidates.
///
/// Lower priority first, heavier weight first within a priority. A
/// single "." target means the service is decidedly not offered.
#[cfg_attr(not(feature = "dns"), allow(dead_code))]
pub(crate) fn candidates(mut records: Vec<SrvRecord>) -> Vec<(String, u16)> {
    records.retain(|record| record.target != ".");
    records.sort_by(|a, b| a.priority.cmp(&b.priority).then(b.weight.cmp(&a.weight)));
    records
        .into_iter()
        .map(|record| {
            let host = record.target.strip_suffix('.').unwrap_or(&record.target);
            (host.to_owned(), record.port)
        })
        .collect()
}

#[cfg(feature = "dns")]
pub(crate) fn lookup(host: &str, service: &str) -> Vec<(String, u16)> {
    use hickory_resolver::Resolver;

    if host.parse::<std::net::IpAddr>().is_ok() {
        return Vec::new();
    }
    let resolver = match Resolver::from_system_conf() {
        Ok(resolver) => resolver,
        Err(err) => {
            debug!("cannot create resolver: {err}");
            return Vec::new();
        }
    };
    let name = format!("{service}.{host}.");
    match resolver.srv_lookup(name.as_str()) {
        Ok(lookup) => {
            let records = lookup
                .iter()
                .map(|srv| SrvRecord {
                    priority: srv.priority(),
                    weight: srv.weight(),
                    target: srv.target().to_ascii(),
                    port: srv.port(),
                })
                .collect();
            candidates(records)
        }
        Err(err) => {
            debug!("SRV lookup for {name} failed: {err}");
            Vec::new()
        }
    }
}

#[cfg(not(feature = "dns"))]
pub(crate) fn lookup(_host: &str, _service: &str) -> Vec<(String, u16)> {
    Vec::new()
}
