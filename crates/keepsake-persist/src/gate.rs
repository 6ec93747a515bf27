//! The suppression gate: a reference-counted "don't touch the disk" switch.
//!
//! Bulk jobs (season resets, mass XP grants, migrations) mutate thousands
//! of records. Rewriting a category file on every one of those saves is
//! wasteful, so callers open a [`SuppressionScope`] around the batch:
//!
//! ```text
//!   enter() ──→ depth 1 ──→ enter() ──→ depth 2
//!                                          │
//!   depth 0 ←── exit() ←── depth 1 ←── exit()
//!      │
//!      └─ writes allowed again
//! ```
//!
//! Scopes nest and may be opened and closed on different threads. Each
//! scope decrements the depth at most once, whether it is exited
//! explicitly, dropped, or both.

use std::sync::Arc;

use parking_lot::Mutex;

/// Process-wide suppression counter.
///
/// This is a cheap handle: cloning it gives another handle to the *same*
/// counter (the depth lives behind an `Arc`). Construct one at startup
/// and hand clones to everything that needs it.
///
/// Every read and write of the depth goes through one mutex, so
/// `is_suppressed()` can never observe a half-applied enter or exit.
#[derive(Debug, Clone, Default)]
pub struct SuppressionGate {
    depth: Arc<Mutex<u32>>,
}

impl SuppressionGate {
    /// Creates a gate with depth 0 (writes allowed).
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a suppression scope. Writes stay suppressed until every open
    /// scope has been exited or dropped.
    pub fn enter(&self) -> SuppressionScope {
        let mut depth = self.depth.lock();
        *depth += 1;
        tracing::trace!(depth = *depth, "persistence suppressed");

        SuppressionScope {
            gate: self.clone(),
            exited: false,
        }
    }

    /// Returns `true` while at least one scope is open.
    pub fn is_suppressed(&self) -> bool {
        *self.depth.lock() > 0
    }

    /// Number of currently open scopes.
    ///
    /// Diagnostic only; code deciding whether to write should use
    /// [`is_suppressed`](Self::is_suppressed).
    pub fn depth(&self) -> u32 {
        *self.depth.lock()
    }

    fn release(&self) {
        let mut depth = self.depth.lock();
        *depth = depth.saturating_sub(1);
        if *depth == 0 {
            tracing::debug!("persistence re-enabled");
        } else {
            tracing::trace!(depth = *depth, "suppression scope exited");
        }
    }
}

/// An open suppression scope (RAII guard).
///
/// Dropping the scope exits it. Calling [`exit`](Self::exit) first is
/// allowed; the later drop is then a no-op, so "release early, and again
/// when the guard goes out of scope" never drives the depth down twice.
///
/// Scopes are `Send`: a worker can open one and hand it to another
/// thread to close.
#[derive(Debug)]
#[must_use = "persistence is re-enabled as soon as the scope is dropped"]
pub struct SuppressionScope {
    gate: SuppressionGate,
    exited: bool,
}

impl SuppressionScope {
    /// Exits the scope now. Subsequent calls do nothing.
    pub fn exit(&mut self) {
        if !self.exited {
            self.exited = true;
            self.gate.release();
        }
    }

    /// Returns `true` once this scope has been exited.
    pub fn is_exited(&self) -> bool {
        self.exited
    }
}

impl Drop for SuppressionScope {
    fn drop(&mut self) {
        self.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_gate_is_not_suppressed() {
        let gate = SuppressionGate::new();

        assert!(!gate.is_suppressed());
        assert_eq!(gate.depth(), 0);
    }

    #[test]
    fn test_enter_suppresses_until_scope_dropped() {
        let gate = SuppressionGate::new();

        let scope = gate.enter();
        assert!(gate.is_suppressed());
        assert_eq!(gate.depth(), 1);

        drop(scope);
        assert!(!gate.is_suppressed());
        assert_eq!(gate.depth(), 0);
    }

    #[test]
    fn test_nested_scopes_last_exit_reenables() {
        let gate = SuppressionGate::new();

        let outer = gate.enter();
        let inner = gate.enter();
        assert_eq!(gate.depth(), 2);

        drop(inner);
        assert!(gate.is_suppressed(), "outer scope still open");

        drop(outer);
        assert!(!gate.is_suppressed());
    }

    #[test]
    fn test_exit_then_drop_decrements_once() {
        let gate = SuppressionGate::new();
        let outer = gate.enter();
        let mut inner = gate.enter();

        inner.exit();
        inner.exit();
        assert!(inner.is_exited());
        assert_eq!(gate.depth(), 1);

        drop(inner);
        assert_eq!(gate.depth(), 1, "drop after exit must be a no-op");

        drop(outer);
        assert_eq!(gate.depth(), 0);
    }

    #[test]
    fn test_extra_release_on_idle_gate_stays_at_zero() {
        let gate = SuppressionGate::new();

        gate.release();

        assert_eq!(gate.depth(), 0);
        assert!(!gate.is_suppressed());
    }

    #[test]
    fn test_clones_share_one_counter() {
        let gate = SuppressionGate::new();
        let other = gate.clone();

        let _scope = other.enter();

        assert!(gate.is_suppressed());
        assert_eq!(gate.depth(), 1);
    }

    #[test]
    fn test_scope_released_during_panic_unwind() {
        let gate = SuppressionGate::new();
        let inner = gate.clone();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _scope = inner.enter();
            panic!("batch job failed");
        }));

        assert!(result.is_err());
        assert_eq!(gate.depth(), 0);
    }

    #[test]
    fn test_scope_can_exit_on_another_thread() {
        let gate = SuppressionGate::new();
        let scope = gate.enter();

        std::thread::spawn(move || drop(scope)).join().unwrap();

        assert!(!gate.is_suppressed());
    }
}
