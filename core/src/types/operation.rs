use std::fmt;

use serde::{Deserialize, Serialize};


#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Write a settings key.
    Set,
    /// Enable a shell extension.
    Enable,
    /// Install an application from a catalog remote.
    Install,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Set => write!(f, "SET"),
            OperationKind::Enable => write!(f, "ENABLE"),
            OperationKind::Install => write!(f, "INSTALL"),
        }
    }
}


/// A per-operation gate. When the probe answers false the operation is
/// skipped rather than attempted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "check", content = "id")]
pub enum Precondition {
    ExtensionInstalled(String),
    ExtensionEnabled(String),
    /// The settings backend lists this schema among its capabilities.
    SchemaAvailable(String),
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precondition::ExtensionInstalled(id) => write!(f, "extension {} installed", id),
            Precondition::ExtensionEnabled(id) => write!(f, "extension {} enabled", id),
            Precondition::SchemaAvailable(schema) => write!(f, "schema {} available", schema),
        }
    }
}


/// A single desired-state mutation.
///
/// `target` and `desired_value` are opaque to everything but the backend
/// that applies them:
///
/// | Kind    | `target`           | `desired_value`     |
/// |---------|--------------------|---------------------|
/// | Set     | `"<schema> <key>"` | GVariant text       |
/// | Enable  | extension UUID     | `"enabled"`         |
/// | Install | application id     | catalog remote name |
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub target: String,
    pub desired_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precondition: Option<Precondition>,
}

impl Operation {
    pub fn set(schema: &str, key: &str, value: &str) -> Self {
        Operation {
            kind: OperationKind::Set,
            target: format!("{} {}", schema, key),
            desired_value: value.to_string(),
            precondition: None,
        }
    }

    pub fn enable(uuid: &str) -> Self {
        Operation {
            kind: OperationKind::Enable,
            target: uuid.to_string(),
            desired_value: "enabled".to_string(),
            precondition: None,
        }
    }

    pub fn install(remote: &str, app_id: &str) -> Self {
        Operation {
            kind: OperationKind::Install,
            target: app_id.to_string(),
            desired_value: remote.to_string(),
            precondition: None,
        }
    }

    /// Attach a precondition (builder style).
    pub fn when(mut self, precondition: Precondition) -> Self {
        self.precondition = Some(precondition);
        self
    }

    /// Split a SET target into `(schema, key)`.
    pub fn settings_key(&self) -> Option<(&str, &str)> {
        if self.kind != OperationKind::Set {
            return None;
        }
        let (schema, key) = self.target.split_once(' ')?;
        let key = key.trim();
        if schema.is_empty() || key.is_empty() {
            return None;
        }
        Some((schema, key))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OperationKind::Set => write!(f, "SET {} = {}", self.target, self.desired_value),
            OperationKind::Enable => write!(f, "ENABLE {}", self.target),
            OperationKind::Install => {
                write!(f, "INSTALL {} from {}", self.target, self.desired_value)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_key_splits_schema_and_key() {
        let op = Operation::set("org.gnome.desktop.interface", "color-scheme", "'prefer-dark'");
        assert_eq!(
            op.settings_key(),
            Some(("org.gnome.desktop.interface", "color-scheme"))
        );
    }

    #[test]
    fn settings_key_rejects_other_kinds_and_malformed_targets() {
        assert_eq!(Operation::enable("x@y").settings_key(), None);
        let mut op = Operation::set("a", "b", "c");
        op.target = "no-key".into();
        assert_eq!(op.settings_key(), None);
    }

    #[test]
    fn display_names_kind_and_target() {
        let op = Operation::install("flathub", "org.mozilla.firefox");
        assert_eq!(op.to_string(), "INSTALL org.mozilla.firefox from flathub");
        assert_eq!(Operation::enable("dash@x").to_string(), "ENABLE dash@x");
    }

    #[test]
    fn precondition_serializes_tagged() {
        let op = Operation::enable("dash@x")
            .when(Precondition::ExtensionInstalled("dash@x".into()));
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains("\"check\":\"extension_installed\""));
        let back: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }
}
