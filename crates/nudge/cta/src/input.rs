//! Inputs to the intent resolver: subscription state, capability check
//! outcome and an optional error signal.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Subscription ───────────────────────────────────────────────────────

/// Billing-provider subscription status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Incomplete,
    IncompleteExpired,
    Canceled,
    /// Any status this crate does not know about.
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    /// The user owes money or has an unfinished payment.
    pub fn requires_payment_attention(&self) -> bool {
        matches!(self, Self::PastDue | Self::Unpaid | Self::Incomplete)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Unpaid => "unpaid",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// The user's subscription as reported by the billing provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub plan: Option<String>,
}

impl Subscription {
    pub fn new(status: SubscriptionStatus) -> Self {
        Self { status, plan: None }
    }

    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = Some(plan.into());
        self
    }
}

// ── Capability ─────────────────────────────────────────────────────────

/// Why a capability check was denied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    FeatureLocked,
    PaidAccessDenied,
    UsageLimitReached,
}

/// Metered usage attached to a capability.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub used: u64,
    pub limit: u64,
}

impl Usage {
    /// Used up. A zero limit counts as unmetered.
    pub fn is_exhausted(&self) -> bool {
        self.limit > 0 && self.used >= self.limit
    }
}

/// Outcome of checking whether the user may use a capability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub capability: String,
    pub allowed: bool,
    #[serde(default)]
    pub denial: Option<DenialReason>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl CapabilityResult {
    pub fn allowed(capability: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            allowed: true,
            denial: None,
            usage: None,
        }
    }

    pub fn denied(capability: impl Into<String>, reason: DenialReason) -> Self {
        Self {
            capability: capability.into(),
            allowed: false,
            denial: Some(reason),
            usage: None,
        }
    }

    pub fn with_usage(mut self, used: u64, limit: u64) -> Self {
        self.usage = Some(Usage { used, limit });
        self
    }

    /// Denied for usage, or metered usage is exhausted.
    pub fn usage_limit_reached(&self) -> bool {
        self.denial == Some(DenialReason::UsageLimitReached)
            || self.usage.is_some_and(|u| u.is_exhausted())
    }

    /// Denied because the plan does not include the feature.
    pub fn requires_upgrade(&self) -> bool {
        !self.allowed
            && matches!(
                self.denial,
                Some(DenialReason::FeatureLocked | DenialReason::PaidAccessDenied)
            )
    }
}

// ── Error Signal ───────────────────────────────────────────────────────

/// An error surfaced to the user alongside the CTA slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorSignal {
    /// A classified error the UI already handles.
    Known { code: String },
    /// Anything unclassified.
    Unknown {
        #[serde(default)]
        message: Option<String>,
    },
}

impl ErrorSignal {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }
}
