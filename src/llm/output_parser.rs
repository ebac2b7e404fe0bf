//! Recover JSON from model output
//!
//! Models asked for "pure raw JSON" still wrap it in prose or code fences
//! often enough that a strict `from_str` loses whole batches.

use serde_json::Value;

/// Extract the first JSON object or array from text
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(json) = serde_json::from_str(trimmed) {
        return Some(json);
    }

    if let Some(json) = fenced_blocks(trimmed).find_map(|block| serde_json::from_str(block).ok()) {
        return Some(json);
    }

    first_embedded_value(trimmed)
}

/// Bodies of ``` fenced blocks, with any language tag dropped
fn fenced_blocks(text: &str) -> impl Iterator<Item = &str> {
    text.split("```")
        .skip(1)
        .step_by(2)
        .map(|block| match block.split_once('\n') {
            Some((tag, body)) if !tag.trim_start().starts_with(['{', '[']) => body.trim(),
            _ => block.trim(),
        })
}

/// Parse the first value starting at any `{` or `[`, ignoring trailing text
fn first_embedded_value(text: &str) -> Option<Value> {
    text.char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .find_map(|(i, _)| {
            let mut stream = serde_json::Deserializer::from_str(&text[i..]).into_iter::<Value>();
            match stream.next() {
                Some(Ok(value)) if value.is_object() || value.is_array() => Some(value),
                _ => None,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_raw_results_object() {
        let text = r#"{"results": [{"name": "Gumroad", "importance": 5}]}"#;
        let json = extract_json(text).unwrap();
        assert_eq!(json["results"][0]["name"], "Gumroad");
    }

    #[test]
    fn test_extract_from_json_fence() {
        let text = r#"
Here are the platforms:

```json
{"results": [{"name": "Etsy"}]}
```

Let me know if you need more.
"#;
        let json = extract_json(text).unwrap();
        assert_eq!(json["results"][0]["name"], "Etsy");
    }

    #[test]
    fn test_extract_from_untagged_fence() {
        let text = "```\n[1, 2, 3]\n```";
        let json = extract_json(text).unwrap();
        assert_eq!(json[2], 3);
    }

    #[test]
    fn test_extract_embedded_with_trailing_prose() {
        let text = r#"Sure! {"results": [{"name": "Teachable", "pros": ["easy {setup}"]}]} Hope this helps."#;
        let json = extract_json(text).unwrap();
        assert_eq!(json["results"][0]["pros"][0], "easy {setup}");
    }

    #[test]
    fn test_skips_unbalanced_brace_before_real_json() {
        let text = r#"Rank {1 to 20}: {"results": []}"#;
        let json = extract_json(text).unwrap();
        assert!(json["results"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_none_for_plain_text() {
        assert!(extract_json("I could not find any platforms.").is_none());
        assert!(extract_json("   ").is_none());
    }
}
