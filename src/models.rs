//! Core data models for the activity recommender

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::RepositoryError;

/// Fields every activity document carries after cleaning.
pub const ACTIVITY_FIELDS: [&str; 5] = ["name", "description", "keywords", "link", "category"];

//
// ================= Activity =================
//

/// A persisted recommendable item. `name` is the document key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Activity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
}

impl Activity {
    /// The only way to build a storable activity: trims every field,
    /// normalizes keywords and stamps `last_updated`.
    pub fn clean(draft: ActivityDraft) -> Result<Self, RepositoryError> {
        let activity = draft.normalize();
        if activity.name.is_empty() {
            return Err(RepositoryError::Validation(
                "activity name must not be empty".to_string(),
            ));
        }
        Ok(activity)
    }

    /// Case-insensitive element-wise match between keywords and interests.
    pub fn matches_any(&self, interests: &[String]) -> bool {
        let wanted: Vec<String> = interests.iter().map(|i| i.to_lowercase()).collect();
        self.keywords
            .iter()
            .any(|kw| wanted.contains(&kw.to_lowercase()))
    }

    /// Equality on every semantic field, ignoring `last_updated`.
    pub fn same_content(&self, other: &Activity) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.keywords == other.keywords
            && self.link == other.link
            && self.category == other.category
    }
}

//
// ================= Draft (loosely typed input) =================
//

/// Keywords as they arrive from files or the model: either a comma separated
/// string or a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Keywords {
    Text(String),
    List(Vec<Value>),
    Other(Value),
}

impl Keywords {
    pub fn normalize(&self) -> Vec<String> {
        match self {
            Keywords::Text(text) => text.split(',').map(|kw| kw.trim().to_string()).collect(),
            Keywords::List(items) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .collect(),
            Keywords::Other(_) => Vec::new(),
        }
    }
}

/// Raw activity payload. Every field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActivityDraft {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Keywords>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ActivityDraft {
    /// Names of required fields the payload does not carry.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let present = [
            self.name.is_some(),
            self.description.is_some(),
            self.keywords.is_some(),
            self.link.is_some(),
            self.category.is_some(),
        ];

        ACTIVITY_FIELDS
            .iter()
            .zip(present)
            .filter(|(_, is_present)| !is_present)
            .map(|(field, _)| *field)
            .collect()
    }

    /// All five fields present. Does not clean or trim.
    pub fn validate(&self) -> Result<(), RepositoryError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RepositoryError::Validation(format!(
                "missing fields: {}",
                missing.join(", ")
            )))
        }
    }

    /// Trim and coerce without rejecting anything. Used for display of
    /// unvalidated model output.
    pub fn normalize(self) -> Activity {
        Activity {
            name: trimmed(self.name),
            description: trimmed(self.description),
            keywords: self.keywords.map(|k| k.normalize()).unwrap_or_default(),
            link: trimmed(self.link),
            category: trimmed(self.category),
            last_updated: Utc::now(),
        }
    }
}

impl From<Activity> for ActivityDraft {
    fn from(activity: Activity) -> Self {
        Self {
            name: Some(activity.name),
            description: Some(activity.description),
            keywords: Some(Keywords::List(
                activity.keywords.into_iter().map(Value::String).collect(),
            )),
            link: Some(activity.link),
            category: Some(activity.category),
        }
    }
}

fn trimmed(field: Option<String>) -> String {
    field.map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Accepts any JSON scalar for a text field; `null` counts as absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

//
// ================= Interests =================
//

/// What one inbound message says the user is into. Lives for one pass.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct InterestQuery {
    pub categories: BTreeSet<String>,
    pub interests: Vec<String>,
    pub raw_message: String,
}

impl InterestQuery {
    pub fn category_list(&self) -> Vec<String> {
        self.categories.iter().cloned().collect()
    }
}

//
// ================= Merge =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    #[default]
    Update,
    Skip,
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "update" => Ok(MergeStrategy::Update),
            "skip" => Ok(MergeStrategy::Skip),
            other => Err(format!("unknown merge strategy '{}' (expected update or skip)", other)),
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MergeStrategy::Update => "update",
            MergeStrategy::Skip => "skip",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeStats {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for MergeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} updated={} skipped={} failed={}",
            self.created, self.updated, self.skipped, self.failed
        )
    }
}
