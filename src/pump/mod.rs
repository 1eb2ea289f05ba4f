/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

const DEFAULT_UNIT: Duration = Duration::from_secs(1);
const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

/// Limits for the loops waiting on the server.
///
/// Every wait checks its condition, then the cancel token and the
/// limits, then pumps the stream once with `unit` as the timeout.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PumpPolicy {
    unit: Duration,
    max_attempts: Option<u32>,
    deadline: Option<Duration>,
}

impl Default for PumpPolicy {
    fn default() -> Self {
        PumpPolicy {
            unit: DEFAULT_UNIT,
            max_attempts: None,
            deadline: Some(DEFAULT_DEADLINE),
        }
    }
}

impl PumpPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits forever, like a plain blocking loop would.
    pub fn unbounded() -> Self {
        PumpPolicy {
            unit: DEFAULT_UNIT,
            max_attempts: None,
            deadline: None,
        }
    }

    pub fn unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn get_unit(&self) -> Duration {
        self.unit
    }

    pub(crate) fn budget(&self) -> PumpBudget {
        PumpBudget {
            attempts_left: self.max_attempts,
            expires: self.deadline.map(|deadline| Instant::now() + deadline),
        }
    }
}

/// Stops the waiting loops of a session, from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum PumpStop {
    Cancelled,
    Exhausted,
}

/// What is left of a [PumpPolicy] during one wait.
#[derive(Debug)]
pub(crate) struct PumpBudget {
    attempts_left: Option<u32>,
    expires: Option<Instant>,
}

impl PumpBudget {
    /// Takes one pump attempt from the budget.
    pub(crate) fn spend(&mut self, cancel: &CancelToken) -> Result<(), PumpStop> {
        if cancel.is_cancelled() {
            return Err(PumpStop::Cancelled);
        }
        if let Some(expires) = self.expires
            && Instant::now() >= expires
        {
            return Err(PumpStop::Exhausted);
        }
        match self.attempts_left {
            Some(0) => Err(PumpStop::Exhausted),
            Some(ref mut left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests;
