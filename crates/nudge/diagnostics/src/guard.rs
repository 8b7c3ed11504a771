//! Isolation guard for diagnostic entry points.

use std::panic;

use nudge_types::{active_decision_stage, IsolationViolation};
use tracing::error;

/// Panic if called while a decision stage is open on this thread.
///
/// Every public diagnostic entry point calls this first. The panic payload is
/// an [`IsolationViolation`], which the rule set re-raises rather than
/// treating as an ordinary rule crash.
pub fn assert_outside_decision_path(entry_point: &'static str) {
    if let Some(stage) = active_decision_stage() {
        let violation = IsolationViolation { entry_point, stage };
        error!(entry_point, stage = %stage, "{violation}");
        panic::panic_any(violation);
    }
}

/// Run `f` and return the isolation violation it raised, if any.
///
/// Other panics pass through untouched.
pub fn catch_violation<F, R>(f: F) -> Result<R, IsolationViolation>
where
    F: FnOnce() -> R + panic::UnwindSafe,
{
    match panic::catch_unwind(f) {
        Ok(value) => Ok(value),
        Err(payload) => match payload.downcast::<IsolationViolation>() {
            Ok(violation) => Err(*violation),
            Err(other) => panic::resume_unwind(other),
        },
    }
}
