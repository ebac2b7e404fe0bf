//! Prompts that ask the model for platforms

use rand::Rng;

pub const LATEST: &str = "latest";
pub const POPULAR: &str = "popular";

/// Rank pool sampled by the `latest` aim
const LATEST_POOL: u32 = 100;
/// Rank pool sampled by the `popular` aim
const POPULAR_POOL: u32 = 500;

/// What one update pass asks the model for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aim {
    /// Recently launched platforms, random rank window
    Latest,
    /// Popular platforms in any category, random rank window
    Popular,
    /// Top platforms in a named category
    Category(String),
}

impl Aim {
    pub fn parse(raw: &str) -> Self {
        match raw {
            LATEST => Aim::Latest,
            POPULAR => Aim::Popular,
            other => Aim::Category(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Aim::Latest => LATEST,
            Aim::Popular => POPULAR,
            Aim::Category(name) => name,
        }
    }
}

/// Inclusive rank window `start..=start + width`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankWindow {
    pub start: u32,
    pub end: u32,
}

impl RankWindow {
    pub fn random(rng: &mut impl Rng, pool: u32, width: u32) -> Self {
        let start = rng.random_range(1..=pool);
        Self {
            start,
            end: start + width,
        }
    }
}

/// JSON shape the model must answer with
pub fn output_template(as_of: &str) -> String {
    format!(
        r#"
{{
    "results": [
        {{
            "category": "<Category Name> (string)",
            "cleaned_domain": "<Cleaned domain of the platform as unique identifier, without http:// or https://> (string)",
            "name": "<Platform Name> (string)",
            "description": "<Brief description of the platform> (string)",
            "free_tier_details": "<Details about the free tier> (string)",
            "url": "<The main URL of the platform> (string)",
            "pricing_url": "<URL for pricing information> (string)",
            "quick_start_url": "<URL for getting started quickly> (string)",
            "key_features": "<Key features of the platform> (list of strings)",
            "monetization_options": "<How to make money using the platform> (string)",
            "beginner_friendly": "<A rating from 1 to 5 indicating how beginner-friendly the platform is> (int)",
            "usefulness": "<A rating from 1 to 5 indicating the usefulness of the platform> (int)",
            "importance": "<A rating from 1 to 5 indicating the importance of the platform> (int)",
            "pros": "<A list of pros> (list of strings)",
            "cons": "<A list of cons> (list of strings)",
            "crawled_at": "{as_of}"
        }},
        ...
    ]
}}
Ensure all urls are accessible.
Ensure the JSON is valid and concise, fact-checked and the data is accurate and up-to-date.
"#
    )
}

/// Build the prompt for `aim`, drawing rank windows from `rng`
pub fn build_prompt(aim: &Aim, as_of: &str, batch_size: u32, rng: &mut impl Rng) -> String {
    let template = output_template(as_of);
    match aim {
        Aim::Latest => {
            let window = RankWindow::random(rng, LATEST_POOL, batch_size);
            format!(
                "Give me a raw JSON array of latest free platforms for making money online as of {as_of}\n\
                 order by descending rank\n\
                 Just give me the platforms in rank {} to {}\n\
                 Big randomness is allowed, so don't be afraid to include some less popular ones\n\
                 The platforms should be free,popular and useful, and the data should be accurate and up-to-date.\n\
                 Output is pure raw JSON like this:\n{template}",
                window.start, window.end
            )
        }
        Aim::Popular => {
            let window = RankWindow::random(rng, POPULAR_POOL, batch_size);
            format!(
                "Give me a raw JSON array of top popular free platforms for making money online as of {as_of} in random category\n\
                 Just give me the platforms in rank {} to {}\n\
                 The platforms should be popular and useful, and the data should be accurate and up-to-date.\n\
                 Output is pure raw JSON like this:\n{template}",
                window.start, window.end
            )
        }
        Aim::Category(category) => format!(
            "Give me a raw JSON array of top {batch_size} popular free platforms for making money online as of {as_of} in category \"{category}\"\n\
             The platforms should be popular and useful, and the data should be accurate and up-to-date.\n\
             Output is pure raw JSON like this:\n{template}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_parse_aims() {
        assert_eq!(Aim::parse("latest"), Aim::Latest);
        assert_eq!(Aim::parse("popular"), Aim::Popular);
        assert_eq!(
            Aim::parse("Affiliate Marketing"),
            Aim::Category("Affiliate Marketing".into())
        );
        assert_eq!(Aim::parse("Affiliate Marketing").label(), "Affiliate Marketing");
    }

    #[test]
    fn test_rank_windows_stay_in_pool() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let w = RankWindow::random(&mut rng, 100, 20);
            assert!((1..=100).contains(&w.start));
            assert_eq!(w.end, w.start + 20);
        }
    }

    #[test]
    fn test_latest_prompt() {
        let mut rng = StdRng::seed_from_u64(1);
        let prompt = build_prompt(&Aim::Latest, "2024-10-01", 20, &mut rng);
        assert!(prompt.contains("latest free platforms for making money online as of 2024-10-01"));
        assert!(prompt.contains("Just give me the platforms in rank "));
        assert!(prompt.contains(r#""crawled_at": "2024-10-01""#));
    }

    #[test]
    fn test_category_prompt() {
        let mut rng = StdRng::seed_from_u64(1);
        let aim = Aim::Category("Digital Product Sales".into());
        let prompt = build_prompt(&aim, "2024-10-01", 20, &mut rng);
        assert!(prompt.contains(r#"top 20 popular free platforms"#));
        assert!(prompt.contains(r#"in category "Digital Product Sales""#));
        assert!(!prompt.contains("rank"));
        assert!(prompt.contains(r#""results": ["#));
    }
}
