//! Where each intent sends the user.

use nudge_types::CtaIntent;
use serde::{Deserialize, Serialize};

use crate::contract::ActionKind;
use crate::error::{CtaError, CtaResult};

/// Action kind and target for one intent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTarget {
    pub kind: ActionKind,
    pub target: String,
}

impl ActionTarget {
    pub fn new(kind: ActionKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }
}

/// Per-intent action targets. `NONE` never has one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtaTargets {
    pub pay_now: ActionTarget,
    pub contact_support: ActionTarget,
    pub fix_limit: ActionTarget,
    pub upgrade: ActionTarget,
}

impl Default for CtaTargets {
    fn default() -> Self {
        Self {
            pay_now: ActionTarget::new(ActionKind::Route, "/settings/billing"),
            contact_support: ActionTarget::new(ActionKind::External, "support-portal"),
            fix_limit: ActionTarget::new(ActionKind::Route, "/settings/usage"),
            upgrade: ActionTarget::new(ActionKind::Modal, "upgrade-plans"),
        }
    }
}

impl CtaTargets {
    /// Target for `intent`; `None` for the hidden intent.
    pub fn for_intent(&self, intent: CtaIntent) -> Option<&ActionTarget> {
        match intent {
            CtaIntent::PayNow => Some(&self.pay_now),
            CtaIntent::ContactSupport => Some(&self.contact_support),
            CtaIntent::FixLimit => Some(&self.fix_limit),
            CtaIntent::Upgrade => Some(&self.upgrade),
            CtaIntent::None => None,
        }
    }

    /// Reject blank targets and `none` actions on visible intents.
    pub fn validate(&self) -> CtaResult<()> {
        for intent in CtaIntent::ALL {
            let Some(action) = self.for_intent(intent) else {
                continue;
            };
            if action.kind == ActionKind::None {
                return Err(CtaError::MissingTarget { intent });
            }
            if action.target.trim().is_empty() {
                return Err(CtaError::InvalidTarget {
                    intent,
                    reason: "target is blank".to_string(),
                });
            }
            if action.kind == ActionKind::Route && !action.target.starts_with('/') {
                return Err(CtaError::InvalidTarget {
                    intent,
                    reason: format!("route `{}` must start with `/`", action.target),
                });
            }
        }
        Ok(())
    }
}
