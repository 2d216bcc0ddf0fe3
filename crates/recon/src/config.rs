use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::{field, CommitAction};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: FieldNames,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub commit: CommitConfig,
    /// Action key → explicit action, consulted before the bucket default.
    #[serde(default)]
    pub overrides: BTreeMap<String, CommitAction>,
}

// ---------------------------------------------------------------------------
// Field names
// ---------------------------------------------------------------------------

/// Which record fields carry identity, description, exclusion marker and category.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldNames {
    #[serde(default = "default_id")]
    pub id: String,
    /// Identity-defining description text, used for rename detection.
    #[serde(default = "default_key")]
    pub key: String,
    /// Numeric marker; negative values exclude a persisted record from comparison.
    #[serde(default = "default_exclusion")]
    pub exclusion: String,
    #[serde(default = "default_category")]
    pub category: String,
    /// Bookkeeping fields never compared.
    #[serde(default = "default_ignored")]
    pub ignored: Vec<String>,
}

fn default_id() -> String {
    field::ID.into()
}

fn default_key() -> String {
    field::DESCRIPTION.into()
}

fn default_exclusion() -> String {
    field::PICTYPE.into()
}

fn default_category() -> String {
    field::CATEGORY.into()
}

fn default_ignored() -> Vec<String> {
    vec![field::ROWNUM.into()]
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            id: default_id(),
            key: default_key(),
            exclusion: default_exclusion(),
            category: default_category(),
            ignored: default_ignored(),
        }
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchingConfig {
    #[serde(default)]
    pub rename_policy: RenamePolicy,
}

/// How a deletion candidate is paired with an addition candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenamePolicy {
    /// First addition candidate (in id order) with the same description wins.
    #[default]
    FirstMatch,
    /// Accept only a one-to-one description match.
    Unique,
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitConfig {
    #[serde(default)]
    pub mode: CommitMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// Report what would happen; write nothing.
    Review,
    /// Write changes, but never hard-delete.
    Live,
    /// Write everything, hard deletes included.
    #[default]
    Full,
}

impl std::fmt::Display for CommitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Review => write!(f, "review"),
            Self::Live => write!(f, "live"),
            Self::Full => write!(f, "full"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let f = &self.fields;
        for (label, value) in [
            ("id", &f.id),
            ("key", &f.key),
            ("exclusion", &f.exclusion),
            ("category", &f.category),
        ] {
            if value.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "fields.{label} must not be empty"
                )));
            }
        }

        if f.id == f.key {
            return Err(ReconError::ConfigValidation(format!(
                "fields.id and fields.key must differ (both '{}')",
                f.id
            )));
        }

        for name in [&f.id, &f.key] {
            if f.ignored.contains(name) {
                return Err(ReconError::ConfigValidation(format!(
                    "field '{name}' cannot be both compared and ignored"
                )));
            }
        }

        if let Some(key) = self.overrides.keys().find(|k| k.is_empty()) {
            return Err(ReconError::ConfigValidation(format!(
                "override key {key:?} must not be empty"
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ReconConfig::from_toml("").unwrap();
        assert_eq!(config.fields.id, "id");
        assert_eq!(config.fields.key, "descriptionX");
        assert_eq!(config.fields.exclusion, "pictype");
        assert_eq!(config.fields.ignored, vec!["rownum"]);
        assert_eq!(config.matching.rename_policy, RenamePolicy::FirstMatch);
        assert_eq!(config.commit.mode, CommitMode::Full);
        assert!(config.overrides.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let input = r#"
name = "Nightly"

[fields]
id = "code"
key = "descr"
ignored = ["rownum", "exOrder"]

[matching]
rename_policy = "unique"

[commit]
mode = "live"

[overrides]
"s1s2" = "add_and_remove"
"s9" = "remove"
"#;
        let config = ReconConfig::from_toml(input).unwrap();
        assert_eq!(config.name.as_deref(), Some("Nightly"));
        assert_eq!(config.fields.id, "code");
        assert_eq!(config.fields.key, "descr");
        assert_eq!(config.fields.exclusion, "pictype");
        assert_eq!(config.fields.ignored, vec!["rownum", "exOrder"]);
        assert_eq!(config.matching.rename_policy, RenamePolicy::Unique);
        assert_eq!(config.commit.mode, CommitMode::Live);
        assert_eq!(config.overrides["s1s2"], CommitAction::AddAndRemove);
        assert_eq!(config.overrides["s9"], CommitAction::Remove);
    }

    #[test]
    fn reject_unknown_action() {
        let input = r#"
[overrides]
"s1" = "obliterate"
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }

    #[test]
    fn reject_id_equal_to_key() {
        let input = r#"
[fields]
id = "code"
key = "code"
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn reject_ignored_key_field() {
        let input = r#"
[fields]
ignored = ["descriptionX"]
"#;
        let err = ReconConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("both compared and ignored"));
    }

    #[test]
    fn reject_invalid_mode() {
        let input = r#"
[commit]
mode = "yolo"
"#;
        assert!(ReconConfig::from_toml(input).is_err());
    }
}
