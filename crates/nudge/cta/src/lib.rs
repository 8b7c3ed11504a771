//! # nudge-cta
//!
//! Picks the single call-to-action a user should see and turns it into a
//! render-ready contract.
//!
//! ```text
//!  Subscription ─┐
//!  Capability? ──┼──▶ resolve_intent ──▶ CtaIntent ──▶ build_contract ──▶ CtaContract
//!  ErrorSignal? ─┘                                       ▲
//!                                                   CtaTargets
//! ```
//!
//! Both steps are pure and run inside a decision scope; nothing here may call
//! into the diagnostic layer.

#![deny(unsafe_code)]

pub mod config;
pub mod contract;
pub mod error;
pub mod input;
pub mod resolver;

// ── Re-exports ─────────────────────────────────────────────────────────

pub use config::{ActionTarget, CtaTargets};
pub use contract::{
    build_contract, build_contract_with, ActionDescriptor, ActionKind, CopyKeys, CtaContract,
};
pub use error::{CtaError, CtaResult};
pub use input::{
    CapabilityResult, DenialReason, ErrorSignal, Subscription, SubscriptionStatus, Usage,
};
pub use resolver::{resolve_intent, resolve_with_reason, MatchedCondition, ResolvedIntent};
