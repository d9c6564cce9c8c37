//! In-memory latch remembering the last public address seen by the collector.

use crate::core::UNKNOWN_ADDRESS;

/// Outcome of comparing a fresh public address against the remembered one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IpCheck {
    pub changed: bool,
    pub previous: Option<String>,
}

/// Tracks the last known-good public address for the process lifetime.
#[derive(Debug, Default)]
pub struct IpChangeTracker {
    last_seen: Option<String>,
}

impl IpChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `current` and reports whether it differs from the last address.
    ///
    /// The first real observation is never a change. The `"unknown"` sentinel
    /// (and an empty string) neither counts as a change nor replaces the
    /// remembered address.
    pub fn check(&mut self, current: &str) -> IpCheck {
        let current = current.trim();
        if current.is_empty() || current.eq_ignore_ascii_case(UNKNOWN_ADDRESS) {
            return IpCheck::default();
        }

        match self.last_seen.replace(current.to_string()) {
            Some(previous) if previous != current => IpCheck {
                changed: true,
                previous: Some(previous),
            },
            _ => IpCheck::default(),
        }
    }

    pub fn last_seen(&self) -> Option<&str> {
        self.last_seen.as_deref()
    }
}
