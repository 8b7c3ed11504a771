//! Decision-path boundary marker.
//!
//! Decision code enters a [`DecisionScope`] for the duration of each stage
//! (rule evaluation, cooldown evaluation, contract building, ...). The scope
//! is tracked per thread; diagnostic entry points consult
//! [`active_decision_stage`] and refuse to run while any scope is open.
//!
//! The marker is a typed value pushed and popped by RAII guards, so it holds
//! regardless of symbol names or inlining.

use std::cell::RefCell;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A decision-path stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStage {
    Pipeline,
    RuleEvaluation,
    CooldownEvaluation,
    AutoResolve,
    IntentResolution,
    ContractBuilding,
}

impl fmt::Display for DecisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipeline => write!(f, "pipeline"),
            Self::RuleEvaluation => write!(f, "rule_evaluation"),
            Self::CooldownEvaluation => write!(f, "cooldown_evaluation"),
            Self::AutoResolve => write!(f, "auto_resolve"),
            Self::IntentResolution => write!(f, "intent_resolution"),
            Self::ContractBuilding => write!(f, "contract_building"),
        }
    }
}

thread_local! {
    static STAGES: RefCell<Vec<DecisionStage>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard marking the current thread as inside a decision stage.
///
/// Scopes nest; dropping a guard pops its stage.
#[must_use = "the stage is only marked while the guard is alive"]
pub struct DecisionScope {
    stage: DecisionStage,
    // Not Send: the marker is thread-local.
    _not_send: std::marker::PhantomData<*const ()>,
}

impl DecisionScope {
    pub fn enter(stage: DecisionStage) -> Self {
        STAGES.with(|stages| stages.borrow_mut().push(stage));
        Self {
            stage,
            _not_send: std::marker::PhantomData,
        }
    }

    pub fn stage(&self) -> DecisionStage {
        self.stage
    }
}

impl Drop for DecisionScope {
    fn drop(&mut self) {
        STAGES.with(|stages| {
            let mut stages = stages.borrow_mut();
            if let Some(pos) = stages.iter().rposition(|s| *s == self.stage) {
                stages.remove(pos);
            }
        });
    }
}

/// The innermost decision stage open on this thread, if any.
pub fn active_decision_stage() -> Option<DecisionStage> {
    STAGES.with(|stages| stages.borrow().last().copied())
}

/// Panic payload raised when diagnostic code runs inside a decision stage.
///
/// Decision code that contains panics (the rule set) must re-raise this
/// payload instead of swallowing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IsolationViolation {
    pub entry_point: &'static str,
    pub stage: DecisionStage,
}

impl fmt::Display for IsolationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "isolation violation: diagnostic entry point `{}` invoked inside decision stage `{}`",
            self.entry_point, self.stage
        )
    }
}
