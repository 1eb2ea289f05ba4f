/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::thread;

use super::*;

#[test]
fn default_policy() {
    let policy = PumpPolicy::default();
    assert_eq!(policy.get_unit(), Duration::from_secs(1));
    assert_eq!(policy, PumpPolicy::new());
    assert_ne!(policy, PumpPolicy::unbounded());
}

#[test]
fn attempts_run_out() {
    let cancel = CancelToken::new();
    let mut budget = PumpPolicy::unbounded().max_attempts(3).budget();
    for _ in 0..3 {
        assert_eq!(budget.spend(&cancel), Ok(()));
    }
    assert_eq!(budget.spend(&cancel), Err(PumpStop::Exhausted));
    assert_eq!(budget.spend(&cancel), Err(PumpStop::Exhausted));
}

#[test]
fn zero_attempts() {
    let cancel = CancelToken::new();
    let mut budget = PumpPolicy::new().max_attempts(0).budget();
    assert_eq!(budget.spend(&cancel), Err(PumpStop::Exhausted));
}

#[test]
fn deadline_passes() {
    let cancel = CancelToken::new();
    let mut budget = PumpPolicy::unbounded().deadline(Duration::ZERO).budget();
    assert_eq!(budget.spend(&cancel), Err(PumpStop::Exhausted));

    let mut budget = PumpPolicy::unbounded().deadline(Duration::from_secs(3600)).budget();
    assert_eq!(budget.spend(&cancel), Ok(()));
}

#[test]
fn unbounded_keeps_going() {
    let cancel = CancelToken::new();
    let mut budget = PumpPolicy::unbounded().budget();
    for _ in 0..10_000 {
        assert_eq!(budget.spend(&cancel), Ok(()));
    }
}

#[test]
fn cancel_wins() {
    let cancel = CancelToken::new();
    let mut budget = PumpPolicy::unbounded().max_attempts(0).budget();
    cancel.cancel();
    assert_eq!(budget.spend(&cancel), Err(PumpStop::Cancelled));
    cancel.reset();
    assert!(!cancel.is_cancelled());
    assert_eq!(budget.spend(&cancel), Err(PumpStop::Exhausted));
}

#[test]
fn cancel_from_another_thread() {
    let cancel = CancelToken::new();
    let remote = cancel.clone();
    thread::spawn(move || remote.cancel()).join().unwrap();
    assert!(cancel.is_cancelled());
}
