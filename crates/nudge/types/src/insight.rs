//! Insight notifications.
//!
//! An [`Insight`] is identified by its [`InsightId`]; two insights with the
//! same id are the same notification across time, whatever their content.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Insight priority. Lower is more urgent.
pub type Priority = i32;

// ── Insight Id ─────────────────────────────────────────────────────────

/// Stable identifier from the append-only insight registry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InsightId(String);

impl InsightId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InsightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InsightId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ── Insight Kind ───────────────────────────────────────────────────────

/// Presentation class of an insight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Warning,
    Info,
    Success,
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
        }
    }
}

// ── Insight ────────────────────────────────────────────────────────────

/// A renderable insight notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: InsightId,
    pub kind: InsightKind,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    /// Free-form rule output (observed values, product references).
    #[serde(default)]
    pub meta: BTreeMap<String, serde_json::Value>,
}

impl Insight {
    pub fn new(
        id: impl Into<InsightId>,
        kind: InsightKind,
        title: impl Into<String>,
        body: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            body: body.into(),
            priority,
            meta: BTreeMap::new(),
        }
    }

    /// Attach a meta entry.
    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_serializes_as_plain_string() {
        let id = InsightId::new("failed_payments");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"failed_payments\"");
        assert_eq!(id.to_string(), "failed_payments");
    }

    #[test]
    fn kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&InsightKind::Warning).unwrap(),
            "\"warning\""
        );
        assert_eq!(InsightKind::Success.to_string(), "success");
    }

    #[test]
    fn meta_is_ordered() {
        let insight = Insight::new("x", InsightKind::Info, "t", "b", 3)
            .with_meta("zeta", 1)
            .with_meta("alpha", "a");
        let keys: Vec<&String> = insight.meta.keys().collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }
}
