use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct ViolationRule {
    /// Key in the per-kind map, e.g. `glove`.
    pub kind: String,
    /// Text shown on the warning banner, e.g. `Missing Safety Gloves`.
    pub reason: String,
    /// Detector labels that map to this rule.
    pub labels: Vec<String>,
}

impl ViolationRule {
    fn new(kind: &str, reason: &str, labels: &[&str]) -> Self {
        Self {
            kind: kind.to_string(),
            reason: reason.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    #[default]
    SlittingProcess,
    Warehouse,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::SlittingProcess => "slitting-process",
            Preset::Warehouse => "warehouse",
        }
    }

    pub fn rules(&self) -> Vec<ViolationRule> {
        match self {
            Preset::SlittingProcess => vec![
                ViolationRule::new("glove", "Missing Safety Gloves", &["non-safety-glove"]),
                ViolationRule::new(
                    "shoe",
                    "Missing Safety Shoes",
                    &["non-safety-shoe", "non-safety-shoes"],
                ),
                ViolationRule::new(
                    "glasses",
                    "Missing Safety Glasses",
                    &["non-safety-glasses"],
                ),
                ViolationRule::new("shirt", "Missing Safety Shirt", &["non-safety-shirt"]),
            ],
            Preset::Warehouse => vec![
                ViolationRule::new("helmet", "Missing Safety Helmet", &["non-safety-helmet"]),
                ViolationRule::new("shoes", "Missing Safety Shoes", &["non-safety-shoes"]),
                ViolationRule::new("vest", "Missing Safety Vest", &["non-safety-vest"]),
            ],
        }
    }
}

/// Site configuration for the violation labels. Custom rules replace the
/// preset entirely.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct Config {
    #[serde(default)]
    pub preset: Preset,
    #[serde(default)]
    pub rules: Vec<ViolationRule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViolationCatalog {
    rules: Vec<ViolationRule>,
}

impl ViolationCatalog {
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.rules.is_empty() {
            Self::new(config.preset.rules())
        } else {
            Self::new(config.rules.clone())
        }
    }

    pub fn new(rules: Vec<ViolationRule>) -> Result<Self> {
        let mut seen_kinds = HashSet::new();
        let mut seen_labels = HashSet::new();

        let rules = rules
            .into_iter()
            .map(|mut rule| {
                if !seen_kinds.insert(rule.kind.clone()) {
                    return Err(Error::Config(format!(
                        "Violation kind '{}' is defined more than once",
                        rule.kind
                    )));
                }

                rule.labels = rule
                    .labels
                    .iter()
                    .map(|label| label.trim().to_lowercase())
                    .collect();

                if rule.labels.is_empty() || rule.labels.iter().any(String::is_empty) {
                    return Err(Error::Config(format!(
                        "Violation kind '{}' needs at least one non-empty label",
                        rule.kind
                    )));
                }

                for label in &rule.labels {
                    if label == super::NG_LABEL || !seen_labels.insert(label.clone()) {
                        return Err(Error::Config(format!(
                            "Label '{label}' can not be used for violation kind '{}'",
                            rule.kind
                        )));
                    }
                }

                Ok(rule)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Looks up a normalized (trimmed, lower-cased) label.
    pub fn match_label(&self, label: &str) -> Option<&ViolationRule> {
        self.rules
            .iter()
            .find(|rule| rule.labels.iter().any(|l| l == label))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.kind.as_str())
    }

    pub fn rules(&self) -> &[ViolationRule] {
        &self.rules
    }
}

impl Default for ViolationCatalog {
    fn default() -> Self {
        Self {
            rules: Preset::default().rules(),
        }
    }
}
