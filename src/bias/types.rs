// src/bias/types.rs
use serde::{Deserialize, Serialize};

/// A genuine classification outcome. Values in the source table and the
/// digest cache are always one of these three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bias {
    #[serde(rename = "LEFT")]
    Left,
    #[serde(rename = "CENTER")]
    Center,
    #[serde(rename = "RIGHT")]
    Right,
}

/// Wire-level label. `Unknown` means "no confident/parseable result" and is
/// distinct from `Center`, which is either a real classification or the
/// deliberate failsafe default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "LEFT")]
    Left,
    #[serde(rename = "CENTER")]
    Center,
    #[serde(rename = "RIGHT")]
    Right,
    Unknown,
}

impl Label {
    /// Validate a raw worker label. Anything outside the three-value enum
    /// (including a missing label) collapses to `Unknown`.
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw {
            Some("LEFT") => Label::Left,
            Some("CENTER") => Label::Center,
            Some("RIGHT") => Label::Right,
            _ => Label::Unknown,
        }
    }

    /// The conclusive value, if any. `Unknown` yields `None` so it is never
    /// written to the cache.
    pub fn bias(self) -> Option<Bias> {
        match self {
            Label::Left => Some(Bias::Left),
            Label::Center => Some(Bias::Center),
            Label::Right => Some(Bias::Right),
            Label::Unknown => None,
        }
    }
}

impl From<Bias> for Label {
    fn from(b: Bias) -> Self {
        match b {
            Bias::Left => Label::Left,
            Bias::Center => Label::Center,
            Bias::Right => Label::Right,
        }
    }
}

/// Which mechanism produced a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Via {
    Map,
    Cache,
    Model,
}

/// One unit submitted for classification. `id` identifies the item within a
/// batch; `source` is the outlet display name; `text` a representative
/// snippet (commonly the headline).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BiasItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BiasResult {
    pub id: String,
    pub label: Label,
    pub via: Via,
}

/// Item sent to the classifier worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerItem {
    pub id: String,
    pub text: String,
}

/// Per-item result coming back from the worker. The label arrives as a raw
/// string and is validated via [`Label::from_wire`].
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerResult {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl WorkerResult {
    pub fn validated(&self) -> Label {
        Label::from_wire(self.label.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_serialize_to_uppercase_wire_names() {
        assert_eq!(serde_json::to_string(&Label::Left).unwrap(), "\"LEFT\"");
        assert_eq!(serde_json::to_string(&Label::Unknown).unwrap(), "\"Unknown\"");
        assert_eq!(serde_json::to_string(&Via::Cache).unwrap(), "\"cache\"");
    }

    #[test]
    fn from_wire_rejects_anything_outside_the_enum() {
        assert_eq!(Label::from_wire(Some("LEFT")), Label::Left);
        assert_eq!(Label::from_wire(Some("left")), Label::Unknown);
        assert_eq!(Label::from_wire(Some("PURPLE")), Label::Unknown);
        assert_eq!(Label::from_wire(None), Label::Unknown);
    }

    #[test]
    fn unknown_has_no_conclusive_bias() {
        assert_eq!(Label::Unknown.bias(), None);
        assert_eq!(Label::Right.bias(), Some(Bias::Right));
    }
}
