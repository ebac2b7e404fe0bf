//! Formatting helpers for README cells, also exposed as template filters

use minijinja::value::Value;
use minijinja::{Error, ErrorKind};

/// Keyword → emoji, first case-insensitive match wins
const CATEGORY_EMOJI: &[(&str, &str)] = &[
    ("Freelancing", "💼"),
    ("Content Creation", "📝"),
    ("E-commerce", "🛍️"),
    ("AI Services", "🤖"),
    ("Digital Products", "📦"),
    ("Online Services", "🌐"),
    ("Education", "📚"),
    ("Investing", "💰"),
    ("Gaming", "🎮"),
    ("Social Media", "📱"),
    ("Development", "👨‍💻"),
    ("Design", "🎨"),
    ("Writing", "✍️"),
    ("Marketing", "📢"),
    ("Tutoring", "👨‍🏫"),
    ("Translation", "🌍"),
    ("Data Entry", "📊"),
    ("Virtual Assistant", "👩‍💼"),
    ("Customer Service", "🎯"),
    ("Research", "🔍"),
    ("Uncategorized", "📌"),
];

const DEFAULT_EMOJI: &str = "📌";

/// Register the README filters with a minijinja Environment
pub fn register_filters(env: &mut minijinja::Environment) {
    env.add_filter("emoji", filter_emoji);
    env.add_filter("anchor", filter_anchor);
    env.add_filter("stars", filter_stars);
    env.add_filter("cell", filter_cell);
}

pub fn category_emoji(category: &str) -> &'static str {
    let lowered = category.to_lowercase();
    CATEGORY_EMOJI
        .iter()
        .find(|(keyword, _)| lowered.contains(&keyword.to_lowercase()))
        .map(|(_, emoji)| *emoji)
        .unwrap_or(DEFAULT_EMOJI)
}

/// In-page link target for a category heading
///
/// Headings start with an emoji, which GitHub drops, leaving a leading `-`.
/// `&` renders as an empty segment, hence the double dash.
pub fn category_anchor(category: &str) -> String {
    let slugged = slug::slugify(category.replace('&', "_amp_"));
    format!("-{}", slugged.replace("-amp-", "--"))
}

/// `⭐⭐⭐ (3/5)`, or `N/A` for a missing or zero rating; values outside 0..=5 are clamped
pub fn format_rating(rating: Option<i64>) -> String {
    match rating.map(|n| n.clamp(0, 5)) {
        Some(n) if n > 0 => format!("{} ({}/5)", "⭐".repeat(n as usize), n),
        _ => "N/A".to_string(),
    }
}

/// Bullet list for a table cell: `<br>• a<br>• b`
pub fn format_list_items(items: &[String]) -> String {
    items.iter().map(|item| format!("<br>• {}", item)).collect()
}

/// Escape `|` so a value cannot split a table cell
pub fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

/// Escape `&` in a link target
pub fn escape_url(url: &str) -> String {
    url.replace('&', "&amp;")
}

fn filter_emoji(value: Value) -> Value {
    Value::from(category_emoji(&value.to_string()))
}

fn filter_anchor(value: Value) -> Value {
    Value::from(category_anchor(&value.to_string()))
}

fn filter_stars(value: Value) -> Result<Value, Error> {
    if value.is_undefined() || value.is_none() {
        return Ok(Value::from(format_rating(None)));
    }
    let rating = i64::try_from(value.clone()).map_err(|_| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("stars filter expects an integer, got {}", value),
        )
    })?;
    Ok(Value::from(format_rating(Some(rating))))
}

fn filter_cell(value: Value) -> Value {
    if value.is_undefined() || value.is_none() {
        return Value::from("");
    }
    Value::from(escape_cell(&value.to_string()))
}
