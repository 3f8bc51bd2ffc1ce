//! Case-insensitive, whole-word brand matching.

use regex::Regex;
use std::collections::HashMap;

pub struct BrandMatcher {
    patterns: HashMap<String, Regex>,
}

impl BrandMatcher {
    pub fn new(brands: &[String]) -> Self {
        let patterns = brands
            .iter()
            .map(|brand| (brand.clone(), whole_word_pattern(brand)))
            .collect();
        Self { patterns }
    }

    /// Byte offset of the first occurrence of `brand`, or `None`.
    pub fn first_position(&self, text: &str, brand: &str) -> Option<usize> {
        self.patterns
            .get(brand)
            .and_then(|re| re.find(text))
            .map(|m| m.start())
    }

    pub fn is_match(&self, text: &str, brand: &str) -> bool {
        self.patterns
            .get(brand)
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    }
}

pub fn whole_word_pattern(brand: &str) -> Regex {
    let escaped = regex::escape(brand);
    regex::RegexBuilder::new(&format!(r"\b{escaped}\b"))
        .case_insensitive(true)
        .build()
        .expect("brand-derived regex is always valid once escaped")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_case_insensitively_on_word_boundaries() {
        let brands = vec!["Levoit".to_string()];
        let matcher = BrandMatcher::new(&brands);
        assert!(matcher.is_match("I love my LEVOIT purifier.", "Levoit"));
        assert!(!matcher.is_match("Levoitron is different.", "Levoit"));
    }

    #[test]
    fn first_position_returns_byte_offset() {
        let brands = vec!["Dyson".to_string()];
        let matcher = BrandMatcher::new(&brands);
        let pos = matcher.first_position("prefix text Dyson suffix", "Dyson");
        assert_eq!(pos, Some("prefix text ".len()));
    }
}
