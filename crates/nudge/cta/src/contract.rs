//! CTA contract builder.
//!
//! The contract is the only thing a presentation layer renders. It is built
//! whole from an intent; `visible` is derived here and nowhere else.

use std::collections::BTreeMap;
use std::fmt;

use nudge_types::{CtaIntent, DecisionScope, DecisionStage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CtaTargets;

/// How the action is carried out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Route,
    Modal,
    External,
    None,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Route => write!(f, "route"),
            Self::Modal => write!(f, "modal"),
            Self::External => write!(f, "external"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Translation keys for the CTA copy. Resolution happens downstream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CopyKeys {
    pub label: String,
    pub helper: Option<String>,
}

/// What pressing the CTA does.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActionDescriptor {
    pub kind: ActionKind,
    pub target: Option<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Fully built CTA contract.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CtaContract {
    intent: CtaIntent,
    visible: bool,
    copy: CopyKeys,
    action: ActionDescriptor,
}

impl CtaContract {
    pub fn intent(&self) -> CtaIntent {
        self.intent
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn copy(&self) -> &CopyKeys {
        &self.copy
    }

    pub fn action(&self) -> &ActionDescriptor {
        &self.action
    }
}

/// Build a contract with the default targets.
pub fn build_contract(intent: CtaIntent) -> CtaContract {
    build_contract_with(intent, &CtaTargets::default())
}

/// Build a contract using configured targets.
pub fn build_contract_with(intent: CtaIntent, targets: &CtaTargets) -> CtaContract {
    let _scope = DecisionScope::enter(DecisionStage::ContractBuilding);

    let key = intent.as_str().to_ascii_lowercase();
    let copy = CopyKeys {
        label: format!("cta.{key}.label"),
        helper: (intent != CtaIntent::None).then(|| format!("cta.{key}.helper")),
    };

    let mut metadata = BTreeMap::new();
    metadata.insert("intent".to_string(), serde_json::json!(intent.as_str()));
    metadata.insert("rank".to_string(), serde_json::json!(intent.rank()));

    let action = match targets.for_intent(intent) {
        Some(t) => ActionDescriptor {
            kind: t.kind,
            target: Some(t.target.clone()),
            metadata,
        },
        None => ActionDescriptor {
            kind: ActionKind::None,
            target: None,
            metadata,
        },
    };

    let contract = CtaContract {
        intent,
        visible: intent != CtaIntent::None,
        copy,
        action,
    };
    debug!(
        intent = %contract.intent,
        visible = contract.visible,
        action = %contract.action.kind,
        "cta contract built"
    );
    contract
}
