//! Optimistic value container with bounded-time rollback protection.
//!
//! DESIGN
//! ======
//! A field holds the latest value seen from the push source (`persisted`) and
//! an optional locally asserted override. Readers see the override while it is
//! younger than the field's window. Two caller-supplied predicates decide what
//! a fresh persisted value means for an active override:
//!
//! - `rollback(persisted, optimistic)`: the server contradicts the override.
//!   The override is dropped and the caller is told via
//!   [`Reconciliation::RolledBack`] so it can surface an error.
//! - `accept_immediately(previous, next)`: the server made a transition that
//!   must win right away (e.g. running -> stopped). The override is dropped
//!   without an error.
//!
//! TRADE-OFFS
//! ==========
//! Expiry is evaluated lazily. `get_at` treats an expired override as absent
//! without mutating, and `expire_at` performs the cleanup. Both are safe to
//! call on every read; expiry never produces an error signal because a missing
//! confirmation means the server is slow, not wrong.

#[cfg(test)]
#[path = "optimistic_test.rs"]
mod optimistic_test;

use std::fmt;
use std::time::Duration;

use crate::clock::Timestamp;

// =============================================================================
// POLICY
// =============================================================================

/// Predicates deciding how a persisted update interacts with an override.
pub struct FieldPolicy<T> {
    /// `(persisted, optimistic) -> contradicted?`
    pub rollback: fn(&T, &T) -> bool,
    /// `(previously_persisted, newly_persisted) -> trust the server now?`
    pub accept_immediately: fn(&T, &T) -> bool,
}

impl<T> FieldPolicy<T> {
    /// Never rolls back, never accepts early. Only the window reverts.
    #[must_use]
    pub fn never() -> Self {
        Self { rollback: |_, _| false, accept_immediately: |_, _| false }
    }
}

impl<T> Clone for FieldPolicy<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldPolicy<T> {}

impl<T> fmt::Debug for FieldPolicy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldPolicy").finish_non_exhaustive()
    }
}

/// Outcome of feeding a persisted value into a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// No override was active; the value was simply adopted.
    Adopted,
    /// An override is active and still wins.
    Kept,
    /// The override was contradicted and dropped.
    RolledBack,
    /// The server transition was trusted over the override.
    AcceptedImmediately,
}

/// Why an override was dropped by [`OptimisticField::expire_at`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expiry {
    /// The persisted value already matched the override.
    Confirmed,
    /// No confirmation arrived within the window.
    TimedOut,
}

// =============================================================================
// FIELD
// =============================================================================

#[derive(Clone, Debug)]
pub struct OptimisticField<T> {
    name: &'static str,
    persisted: T,
    optimistic: Option<T>,
    set_at: Timestamp,
    window: Duration,
    policy: FieldPolicy<T>,
}

impl<T> OptimisticField<T>
where
    T: Clone + PartialEq + fmt::Debug,
{
    #[must_use]
    pub fn new(name: &'static str, initial: T, policy: FieldPolicy<T>, window: Duration) -> Self {
        Self { name, persisted: initial, optimistic: None, set_at: 0.0, window, policy }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Assert `value` locally, effective immediately.
    pub fn set_at(&mut self, value: T, now: Timestamp) {
        tracing::debug!(field = self.name, ?value, "optimistic value set");
        self.optimistic = Some(value);
        self.set_at = now;
    }

    /// Current value: the live override if any, else the persisted value.
    #[must_use]
    pub fn get_at(&self, now: Timestamp) -> &T {
        self.optimistic_at(now).unwrap_or(&self.persisted)
    }

    /// The override, if one is active and not yet past its window.
    #[must_use]
    pub fn optimistic_at(&self, now: Timestamp) -> Option<&T> {
        self.optimistic.as_ref().filter(|_| !self.is_expired(now))
    }

    #[must_use]
    pub fn is_optimistic_at(&self, now: Timestamp) -> bool {
        self.optimistic_at(now).is_some()
    }

    #[must_use]
    pub fn persisted(&self) -> &T {
        &self.persisted
    }

    /// Drop the override without touching the persisted value.
    pub fn clear(&mut self) {
        self.optimistic = None;
    }

    /// Rewrite an active override against the current persisted value,
    /// keeping its set time. `merge(persisted, optimistic)` returns the new
    /// override, or `None` to leave it as is.
    pub fn rebase(&mut self, merge: fn(&T, &T) -> Option<T>) {
        let Some(optimistic) = self.optimistic.as_mut() else {
            return;
        };
        if let Some(merged) = merge(&self.persisted, optimistic) {
            *optimistic = merged;
        }
    }

    /// Drop the override once its window has elapsed. Idempotent: returns
    /// `None` when there was nothing to expire.
    pub fn expire_at(&mut self, now: Timestamp) -> Option<Expiry> {
        if self.optimistic.is_none() || !self.is_expired(now) {
            return None;
        }
        let optimistic = self.optimistic.take()?;
        let expiry = if optimistic == self.persisted { Expiry::Confirmed } else { Expiry::TimedOut };
        tracing::debug!(field = self.name, ?expiry, persisted = ?self.persisted, "optimistic value expired");
        Some(expiry)
    }

    /// Feed a fresh value from the push source.
    ///
    /// Callers should run [`Self::expire_at`] first so a stale override is not
    /// reported as contradicted.
    pub fn on_persisted_value_changed(&mut self, next: T) -> Reconciliation {
        let previous = std::mem::replace(&mut self.persisted, next);
        let Some(optimistic) = self.optimistic.as_ref() else {
            return Reconciliation::Adopted;
        };

        if (self.policy.rollback)(&self.persisted, optimistic) {
            tracing::warn!(
                field = self.name,
                ?optimistic,
                persisted = ?self.persisted,
                "optimistic value contradicted, rolling back"
            );
            self.optimistic = None;
            return Reconciliation::RolledBack;
        }

        if (self.policy.accept_immediately)(&previous, &self.persisted) {
            tracing::debug!(
                field = self.name,
                ?previous,
                persisted = ?self.persisted,
                "accepting persisted transition over optimistic value"
            );
            self.optimistic = None;
            return Reconciliation::AcceptedImmediately;
        }

        Reconciliation::Kept
    }

    fn is_expired(&self, now: Timestamp) -> bool {
        now - self.set_at > self.window.as_secs_f64()
    }
}
