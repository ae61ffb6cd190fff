//! Loop protection for OpenWorkers runtimes
//!
//! This crate keeps user-authored infinite loops from hanging a JS runtime
//! (Deno, V8, QuickJS, JSC, Boa):
//! - [`Transformer`] rewrites every loop of a script so it reports to a guard
//!   registry reachable under an alias;
//! - [`GuardRegistry`] is the runtime side those calls land on, breaking any
//!   loop that runs past the configured threshold.

mod clock;
mod error;
mod limits;
mod position;
mod registry;
mod transform;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use clock::{Clock, SystemClock};
pub use error::{GuardError, TransformError};
pub use limits::LoopLimits;
pub use position::{InputSourceMap, LoopKey, Position, PositionResolver};
pub use registry::{CounterEntry, GuardRegistry, HitCallback, HitSender, ResetOptions};
pub use transform::{
    InsertionContext, Iteration, LoopKind, LoopSite, TransformOptions, TransformOutput,
    Transformer, protect_loops,
};
