//! Test utilities for loop protection
//!
//! Enabled for this crate's own tests and, behind the `testing` feature, for
//! runtimes that embed the guard registry.
//!
//! # Usage
//!
//! ```ignore
//! use openworkers_loop_protect::assert_protected;
//!
//! assert_protected!(
//!     "while (x) {}",
//!     r#"loopProtect.reset({"key":"foo:1:0","file":"foo","line":1,"column":0});
//!        while (x) { if (loopProtect.guard("foo:1:0")) break; }"#
//! );
//! ```

use crate::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Clock that only moves when told to
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the registry.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset_nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.offset_nanos
            .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

/// Remove all whitespace so printer layout does not matter in comparisons
pub fn squash_whitespace(code: &str) -> String {
    code.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Transform `$code` as file `foo` with alias `loopProtect` and compare the
/// result against `$expected`, ignoring whitespace
///
/// Evaluates to the `TransformOutput`.
#[macro_export]
macro_rules! assert_protected {
    ($code:expr, $expected:expr) => {{
        let output = $crate::Transformer::new($crate::TransformOptions::new(
            "loopProtect",
            "foo",
            $code,
        ))
        .and_then(|transformer| transformer.transform())
        .expect("Transform should succeed");

        assert_eq!(
            $crate::testing::squash_whitespace(&output.code),
            $crate::testing::squash_whitespace($expected),
            "instrumented output:\n{}",
            output.code
        );

        output
    }};
}
