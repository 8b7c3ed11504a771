//! Intent resolver.
//!
//! A fixed priority chain, first match wins:
//!
//! | # | Condition                                | Intent            |
//! |---|------------------------------------------|-------------------|
//! | 1 | subscription needs payment attention     | `PAY_NOW`         |
//! | 2 | an unknown error is present              | `CONTACT_SUPPORT` |
//! | 3 | usage limit reached                      | `FIX_LIMIT`       |
//! | 4 | feature locked or paid access denied     | `UPGRADE`         |
//! | 5 | otherwise                                | `NONE`            |

use std::fmt;

use nudge_types::{CtaIntent, DecisionScope, DecisionStage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::input::{CapabilityResult, ErrorSignal, Subscription};

/// Which link of the chain produced the intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedCondition {
    PaymentAttention,
    UnknownError,
    UsageLimit,
    UpgradeRequired,
    Fallthrough,
}

impl fmt::Display for MatchedCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PaymentAttention => write!(f, "payment_attention"),
            Self::UnknownError => write!(f, "unknown_error"),
            Self::UsageLimit => write!(f, "usage_limit"),
            Self::UpgradeRequired => write!(f, "upgrade_required"),
            Self::Fallthrough => write!(f, "fallthrough"),
        }
    }
}

/// An intent together with the condition that selected it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIntent {
    pub intent: CtaIntent,
    pub matched: MatchedCondition,
}

/// Resolve the single CTA intent for the current state.
pub fn resolve_intent(
    subscription: &Subscription,
    capability: Option<&CapabilityResult>,
    error: Option<&ErrorSignal>,
) -> CtaIntent {
    resolve_with_reason(subscription, capability, error).intent
}

/// Like [`resolve_intent`] but also reports which condition matched.
pub fn resolve_with_reason(
    subscription: &Subscription,
    capability: Option<&CapabilityResult>,
    error: Option<&ErrorSignal>,
) -> ResolvedIntent {
    let _scope = DecisionScope::enter(DecisionStage::IntentResolution);

    let (intent, matched) = if subscription.status.requires_payment_attention() {
        (CtaIntent::PayNow, MatchedCondition::PaymentAttention)
    } else if error.is_some_and(ErrorSignal::is_unknown) {
        (CtaIntent::ContactSupport, MatchedCondition::UnknownError)
    } else if capability.is_some_and(CapabilityResult::usage_limit_reached) {
        (CtaIntent::FixLimit, MatchedCondition::UsageLimit)
    } else if capability.is_some_and(CapabilityResult::requires_upgrade) {
        (CtaIntent::Upgrade, MatchedCondition::UpgradeRequired)
    } else {
        (CtaIntent::None, MatchedCondition::Fallthrough)
    };

    debug!(
        subscription_status = %subscription.status,
        capability = capability.map(|c| c.capability.as_str()),
        intent = %intent,
        matched = %matched,
        "cta intent resolved"
    );
    ResolvedIntent { intent, matched }
}
