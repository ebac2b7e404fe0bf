//! Platform records as stored in the collection

use crate::store::{Document, Fields};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const UNCATEGORIZED: &str = "Uncategorized";

static SCHEME_AND_WWW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:[a-z][a-z0-9+.-]*://)?(?i:www\.)?").expect("static regex is valid")
});

/// Key features are usually a list, but older records hold a single string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Features {
    List(Vec<String>),
    Text(String),
}

impl Default for Features {
    fn default() -> Self {
        Features::List(Vec::new())
    }
}

/// One money-making platform
///
/// Every field is optional because records come from a language model and
/// from older writers. Fields this type does not know are kept in `extra`
/// and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    /// Document id; not part of the stored fields
    #[serde(skip)]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub cleaned_domain: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub free_tier_details: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub pricing_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub quick_start_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_features: Option<Features>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub monetization_options: Option<String>,

    #[serde(default, deserialize_with = "lenient_rating", skip_serializing_if = "Option::is_none")]
    pub beginner_friendly: Option<i64>,
    #[serde(default, deserialize_with = "lenient_rating", skip_serializing_if = "Option::is_none")]
    pub usefulness: Option<i64>,
    #[serde(default, deserialize_with = "lenient_rating", skip_serializing_if = "Option::is_none")]
    pub importance: Option<i64>,

    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub pros: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub cons: Vec<String>,

    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub crawled_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name_lower: Option<String>,

    #[serde(flatten)]
    pub extra: Fields,
}

impl Platform {
    /// Read a stored document
    pub fn from_document(doc: &Document) -> Result<Self, serde_json::Error> {
        let mut platform: Platform = serde_json::from_value(Value::Object(doc.fields.clone()))?;
        platform.id = Some(doc.id.clone());
        Ok(platform)
    }

    /// Stored fields, without the id
    pub fn to_fields(&self) -> Result<Fields, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            _ => Ok(Fields::new()),
        }
    }

    pub fn category(&self) -> &str {
        self.category.as_deref().unwrap_or(UNCATEGORIZED)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    /// Sort key for ranking inside a category, missing ratings count as zero
    pub fn rank_key(&self) -> (i64, i64, i64) {
        (
            self.importance.unwrap_or(0),
            self.usefulness.unwrap_or(0),
            self.beginner_friendly.unwrap_or(0),
        )
    }
}

/// Dedup key for a platform name: lowercase with spaces removed
pub fn name_key(name: &str) -> String {
    name.to_lowercase().replace(' ', "")
}

/// Strip scheme, `www.`, path, and trailing dots from a URL
pub fn clean_domain(url: &str) -> String {
    let stripped = SCHEME_AND_WWW.replace(url.trim(), "");
    stripped
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('.')
        .to_lowercase()
}

/// Group platforms by category, preserving input order inside each group
pub fn group_by_category(platforms: Vec<Platform>) -> BTreeMap<String, Vec<Platform>> {
    let mut groups: BTreeMap<String, Vec<Platform>> = BTreeMap::new();
    for platform in platforms {
        groups
            .entry(platform.category().to_string())
            .or_default()
            .push(platform);
    }
    groups
}

fn lenient_rating<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let rating: Option<i64> = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(rating.map(|n| n.clamp(0, 5)))
}

/// Scalars are kept as their text; null, lists and maps read as missing
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s],
        _ => Vec::new(),
    })
}
