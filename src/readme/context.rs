//! Data handed to the README template

use super::filters::{
    category_anchor, category_emoji, escape_cell, escape_url, format_list_items, format_rating,
};
use crate::platform::{Features, Platform};
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::error;

/// Repository-level values used in badges and links
#[derive(Debug, Clone, Serialize)]
pub struct SiteInfo {
    pub repository: String,
    pub workflow_file: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySection {
    pub name: String,
    pub emoji: &'static str,
    pub anchor: String,
    /// Platforms stored under this category, including unrenderable ones
    pub count: usize,
    /// Preformatted Markdown table rows
    pub rows: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadmeContext {
    #[serde(flatten)]
    pub site: SiteInfo,
    pub total: usize,
    pub total_rounded: usize,
    pub updated: String,
    pub year: i32,
    pub categories: Vec<CategorySection>,
}

impl ReadmeContext {
    pub fn build(
        catalog: &BTreeMap<String, Vec<Platform>>,
        site: SiteInfo,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> Self {
        let local = now.with_timezone(&tz);
        let total: usize = catalog.values().map(Vec::len).sum();

        let mut ordered: Vec<(&String, &Vec<Platform>)> = catalog.iter().collect();
        ordered.sort_by(|(a_name, a), (b_name, b)| {
            (b.len(), b_name.as_str()).cmp(&(a.len(), a_name.as_str()))
        });

        let categories = ordered
            .into_iter()
            .map(|(name, platforms)| CategorySection {
                name: name.clone(),
                emoji: category_emoji(name),
                anchor: category_anchor(name),
                count: platforms.len(),
                rows: category_rows(platforms),
            })
            .collect();

        Self {
            site,
            total,
            total_rounded: total / 100 * 100,
            updated: local.format("%Y-%m-%d %H:%M:%S").to_string(),
            year: local.year(),
            categories,
        }
    }
}

/// Table rows for one category, best platforms first
pub fn category_rows(platforms: &[Platform]) -> Vec<String> {
    let mut sorted: Vec<&Platform> = platforms.iter().collect();
    sorted.sort_by(|a, b| b.rank_key().cmp(&a.rank_key()));

    let mut rows = Vec::with_capacity(sorted.len());
    for platform in sorted {
        match format_row(rows.len() + 1, platform) {
            Some(row) => rows.push(row),
            None => error!(
                "Error processing platform {}: missing name or url",
                platform.display_name()
            ),
        }
    }
    rows
}

/// One Markdown table row, or `None` when the platform has no name or url
pub fn format_row(rank: usize, platform: &Platform) -> Option<String> {
    let name = platform.name.as_deref()?;
    let url = platform.url.as_deref()?;

    let mut links = Vec::new();
    if let Some(pricing) = platform.pricing_url.as_deref().filter(|u| !u.is_empty()) {
        links.push(format!("[(💰 pricing)]({})", pricing));
    }
    if let Some(quick_start) = platform.quick_start_url.as_deref().filter(|u| !u.is_empty()) {
        links.push(format!("[(🚀 quick start)]({})", quick_start));
    }

    let features = match &platform.key_features {
        Some(Features::List(items)) => format_list_items(items),
        Some(Features::Text(text)) => text.clone(),
        None => String::new(),
    };

    let cells = [
        format!("**{}**", rank),
        format!("[{}]({})", name, escape_url(url)),
        format!(
            "{} {}",
            platform.description.as_deref().unwrap_or_default(),
            links.join(" ")
        ),
        platform.free_tier_details.clone().unwrap_or_default(),
        features,
        platform.monetization_options.clone().unwrap_or_default(),
        format_rating(platform.importance),
    ];

    let escaped: Vec<String> = cells.iter().map(|c| escape_cell(c)).collect();
    Some(format!("| {} |", escaped.join(" | ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn platform(name: &str, importance: Option<i64>, usefulness: Option<i64>) -> Platform {
        Platform {
            name: Some(name.into()),
            url: Some(format!("https://{}.com", name.to_lowercase())),
            importance,
            usefulness,
            ..Default::default()
        }
    }

    fn site() -> SiteInfo {
        SiteInfo {
            repository: "owner/repo".into(),
            workflow_file: "readme.yml".into(),
        }
    }

    #[test]
    fn test_full_row_format() {
        let p = Platform {
            name: Some("Gumroad".into()),
            url: Some("https://gumroad.com/?a=1&b=2".into()),
            description: Some("Sell | ship".into()),
            pricing_url: Some("https://gumroad.com/pricing".into()),
            quick_start_url: Some("https://gumroad.com/start".into()),
            free_tier_details: Some("Free, 10% fee".into()),
            key_features: Some(Features::List(vec!["Payouts".into(), "Storefront".into()])),
            monetization_options: Some("Sell products".into()),
            importance: Some(4),
            ..Default::default()
        };

        assert_eq!(
            format_row(1, &p).unwrap(),
            "| **1** | [Gumroad](https://gumroad.com/?a=1&amp;b=2) | Sell \\| ship \
             [(💰 pricing)](https://gumroad.com/pricing) [(🚀 quick start)](https://gumroad.com/start) \
             | Free, 10% fee | <br>• Payouts<br>• Storefront | Sell products | ⭐⭐⭐⭐ (4/5) |"
        );
    }

    #[test]
    fn test_minimal_row_format() {
        let p = platform("Etsy", None, None);
        assert_eq!(
            format_row(3, &p).unwrap(),
            "| **3** | [Etsy](https://etsy.com) |   |  |  |  | N/A |"
        );
    }

    #[test]
    fn test_row_requires_name_and_url() {
        let mut p = platform("Etsy", None, None);
        p.url = None;
        assert!(format_row(1, &p).is_none());
    }

    #[test]
    fn test_rows_sorted_by_ratings() {
        let platforms = vec![
            platform("Low", Some(2), Some(5)),
            platform("High", Some(5), Some(1)),
            platform("Mid", Some(2), Some(5)),
            Platform {
                name: Some("Broken".into()),
                importance: Some(5),
                ..Default::default()
            },
            platform("Unrated", None, None),
        ];

        let rows = category_rows(&platforms);
        assert_eq!(rows.len(), 4);
        assert!(rows[0].starts_with("| **1** | [High]"));
        // ties keep store order
        assert!(rows[1].starts_with("| **2** | [Low]"));
        assert!(rows[2].starts_with("| **3** | [Mid]"));
        assert!(rows[3].starts_with("| **4** | [Unrated]"));
    }

    #[test]
    fn test_context_orders_categories_and_rounds_total() {
        let mut catalog = BTreeMap::new();
        catalog.insert(
            "Affiliate Marketing".to_string(),
            (0..60).map(|i| platform(&format!("A{i}"), None, None)).collect(),
        );
        catalog.insert(
            "Freelancing & Services".to_string(),
            (0..60).map(|i| platform(&format!("F{i}"), None, None)).collect(),
        );
        catalog.insert("Gaming".to_string(), vec![platform("G", None, None)]);

        let now = Utc.with_ymd_and_hms(2024, 10, 1, 16, 30, 0).unwrap();
        let ctx = ReadmeContext::build(&catalog, site(), now, chrono_tz::US::Eastern);

        assert_eq!(ctx.total, 121);
        assert_eq!(ctx.total_rounded, 100);
        assert_eq!(ctx.updated, "2024-10-01 12:30:00");
        let names: Vec<&str> = ctx.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Freelancing & Services", "Affiliate Marketing", "Gaming"]);
        assert_eq!(ctx.categories[0].emoji, "💼");
        assert_eq!(ctx.categories[0].anchor, "-freelancing--services");
    }
}
