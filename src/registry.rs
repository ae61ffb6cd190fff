//! Guard registry driven by instrumented loops
//!
//! Instrumented code calls `reset` right before a loop starts and `guard` at
//! the top of every iteration. `guard` trips once the loop has been running
//! for at least the configured threshold since its last reset.
//!
//! The registry does no internal synchronization: every mutating call takes
//! `&mut self`. Hosts keep one registry per execution context (for example
//! behind an `Rc<RefCell<_>>` inside a JS isolate).

use crate::{Clock, GuardError, LoopLimits, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Argument of the emitted `ALIAS.reset(...)` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetOptions {
    /// Loop key (`file:line:column` in generated coordinates)
    pub key: String,
    /// Diagnostic file name
    pub file: String,
    /// Diagnostic line (original source when a source map was supplied)
    pub line: u32,
    /// Diagnostic column (original source when a source map was supplied)
    pub column: u32,
}

/// Per-loop state tracked by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterEntry {
    pub key: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    last_reset: Instant,
}

impl CounterEntry {
    /// When the loop last started or re-entered
    pub fn last_reset(&self) -> Instant {
        self.last_reset
    }

    /// Time elapsed since the last reset, as seen at `now`
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_reset)
    }
}

/// Callback invoked when a guard trips
pub type HitCallback = Box<dyn FnMut(&CounterEntry) + Send>;

/// Type alias for hit event sender
pub type HitSender = mpsc::UnboundedSender<CounterEntry>;

/// Registry of loop counters shared by all instrumented code of one execution context
pub struct GuardRegistry<C = SystemClock> {
    counters: HashMap<String, CounterEntry>,
    threshold: Duration,
    idle_ttl: Option<Duration>,
    on_hit: Option<HitCallback>,
    clock: C,
}

impl GuardRegistry<SystemClock> {
    /// Create a registry with default limits and the system clock
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Create a registry with the given limits and the system clock
    pub fn with_limits(limits: LoopLimits) -> Self {
        Self::with_limits_and_clock(limits, SystemClock)
    }
}

impl Default for GuardRegistry<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> GuardRegistry<C> {
    /// Create a registry with default limits and a custom clock
    pub fn with_clock(clock: C) -> Self {
        Self::with_limits_and_clock(LoopLimits::default(), clock)
    }

    pub fn with_limits_and_clock(limits: LoopLimits, clock: C) -> Self {
        Self {
            counters: HashMap::new(),
            threshold: limits.threshold(),
            idle_ttl: limits.idle_ttl(),
            on_hit: None,
            clock,
        }
    }

    /// Mark a loop as (re)starting now
    ///
    /// The location fields are kept from the first reset of a key; the
    /// timestamp is always refreshed.
    pub fn reset(&mut self, options: ResetOptions) {
        let now = self.clock.now();

        match self.counters.entry(options.key) {
            Entry::Occupied(mut slot) => slot.get_mut().last_reset = now,
            Entry::Vacant(slot) => {
                let key = slot.key().clone();
                slot.insert(CounterEntry {
                    key,
                    file: options.file,
                    line: options.line,
                    column: options.column,
                    last_reset: now,
                });
            }
        }
    }

    /// Check whether the loop identified by `key` has exceeded the threshold
    ///
    /// Returns `Ok(true)` (and fires the hit callback) when it has, in which
    /// case the instrumented loop breaks.
    pub fn guard(&mut self, key: &str) -> Result<bool, GuardError> {
        let entry = self
            .counters
            .get(key)
            .ok_or_else(|| GuardError::UnknownKey(key.to_string()))?;

        let elapsed = entry.elapsed_at(self.clock.now());
        if elapsed < self.threshold {
            return Ok(false);
        }

        tracing::warn!(
            key = %entry.key,
            file = %entry.file,
            line = entry.line,
            column = entry.column,
            elapsed_ms = elapsed.as_millis() as u64,
            "loop exceeded its time budget"
        );

        if let Some(callback) = self.on_hit.as_mut() {
            callback(entry);
        }

        Ok(true)
    }

    /// Replace the threshold for all future `guard` calls
    pub fn set_threshold(&mut self, threshold: Duration) {
        self.threshold = threshold;
    }

    pub fn set_threshold_ms(&mut self, threshold_ms: u64) {
        self.set_threshold(Duration::from_millis(threshold_ms));
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Register the hit callback, replacing any previous one
    pub fn on_hit<F>(&mut self, callback: F)
    where
        F: FnMut(&CounterEntry) + Send + 'static,
    {
        self.on_hit = Some(Box::new(callback));
    }

    /// Forward every tripped entry to `tx` (replaces the hit callback)
    ///
    /// Hits are dropped once the receiver is gone.
    pub fn forward_hits(&mut self, tx: HitSender) {
        self.on_hit(move |entry| {
            let _ = tx.send(entry.clone());
        });
    }

    pub fn get(&self, key: &str) -> Option<&CounterEntry> {
        self.counters.get(key)
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Drop every counter entry
    pub fn clear(&mut self) {
        self.counters.clear();
    }

    /// Drop the entries of one compilation unit, returning how many were removed
    pub fn forget_file(&mut self, file: &str) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, entry| entry.file != file);
        let removed = before - self.counters.len();

        tracing::debug!(file, removed, "forgot loop counters");
        removed
    }

    /// Evict entries not reset within the idle TTL, returning how many were removed
    ///
    /// A no-op when the TTL is disabled.
    pub fn sweep(&mut self) -> usize {
        let Some(ttl) = self.idle_ttl else {
            return 0;
        };

        let now = self.clock.now();
        let before = self.counters.len();
        self.counters.retain(|_, entry| entry.elapsed_at(now) <= ttl);
        let removed = before - self.counters.len();

        if removed > 0 {
            tracing::debug!(removed, remaining = self.counters.len(), "swept idle loop counters");
        }
        removed
    }
}

impl<C> std::fmt::Debug for GuardRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardRegistry")
            .field("counters", &self.counters.len())
            .field("threshold", &self.threshold)
            .field("idle_ttl", &self.idle_ttl)
            .field("on_hit", &self.on_hit.is_some())
            .finish()
    }
}
