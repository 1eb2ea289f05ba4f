/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::*;

fn check_token(state: ConnectionState, token: &str) {
    assert_eq!(state.to_string(), token);
}

#[test]
fn unset_renders_empty() {
    let state = ConnectionState::default();
    assert!(state.is_unset());
    assert!(!state.is_authenticated());
    check_token(state, "");
}

#[test]
fn security_levels() {
    check_token(ConnectionState::new(SecurityLevel::Tcp), "tcp");
    check_token(ConnectionState::new(SecurityLevel::Tls), "tls");
    check_token(ConnectionState::new(SecurityLevel::Ssl), "ssl");
    assert!(!SecurityLevel::Tcp.is_secure());
    assert!(SecurityLevel::Tls.is_secure());
}

#[test]
fn auth_suffixes() {
    let mut state = ConnectionState::new(SecurityLevel::Tls);
    state.set_auth(AuthMethod::Sasl);
    check_token(state, "tls+sasl");
    assert_eq!(state.auth_method(), Some(AuthMethod::Sasl));

    let mut state = ConnectionState::new(SecurityLevel::Tcp);
    state.set_auth(AuthMethod::OldAuth);
    check_token(state, "tcp+old_auth");
}

#[test]
fn clear_resets_everything() {
    let mut state = ConnectionState::new(SecurityLevel::Ssl);
    state.set_auth(AuthMethod::Sasl);
    state.clear();
    assert_eq!(state, ConnectionState::default());
    check_token(state, "");
}
