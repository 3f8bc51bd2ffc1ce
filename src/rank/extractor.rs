//! Rank Extractor (C6): deterministically assigns ranks to brands in
//! cleaned AI-answer text.

use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

use crate::rank::brand_matcher::BrandMatcher;
use crate::rank::snippet;

/// Extraction result for one brand within one scraped response.
#[derive(Debug, Clone, PartialEq)]
pub struct RankResult {
    pub brand: String,
    /// 1-5 = ranked; 0 = not found.
    pub rank_position: u8,
    pub snippet: String,
    /// Section the brand first appears in, or -1 if absent.
    pub section_index: i32,
    pub is_recommended: bool,
}

const RECOMMENDATION_TEMPLATES: &[&str] = &[
    r"(?:recommend|recommends|recommended)\s+(?:the\s+)?{brand}",
    r"{brand}\s+is\s+(?:the\s+)?(?:best|top|leading|number[- ]?one|#1|great|excellent|ideal)",
    r"(?:top\s+pick|best\s+(?:choice|option|pick)|our\s+(?:pick|choice|recommendation))[\s:]*{brand}",
    r"(?:^|\n)\s*\d+[.\):\s]+{brand}",
    r"(?:first|top)\s+(?:on\s+(?:the|our)\s+list|recommendation|choice).*?{brand}",
    r"{brand}.*?(?:stands?\s+out|leads?\s+the\s+pack|comes?\s+out\s+on\s+top)",
    r"(?:we|i)\s+(?:suggest|pick|choose|prefer)\s+(?:the\s+)?{brand}",
];

fn section_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\n\s*\n|\n(?=#{1,3}\s)|\n(?=\d+[.\)]\s)").expect("valid section split regex")
    })
}

fn recommendation_patterns(brand: &str) -> Vec<Regex> {
    let escaped = regex::escape(brand);
    RECOMMENDATION_TEMPLATES
        .iter()
        .map(|tmpl| {
            let pattern = tmpl.replace("{brand}", &escaped);
            RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .multi_line(true)
                .dot_matches_new_line(false)
                .build()
                .expect("brand-derived recommendation regex is always valid")
        })
        .collect()
}

fn split_sections(text: &str) -> Vec<&str> {
    section_split_re()
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn find_first_section(sections: &[&str], brand_pattern: &Regex) -> i32 {
    for (i, section) in sections.iter().enumerate() {
        if brand_pattern.is_match(section) {
            return i as i32;
        }
    }
    -1
}

fn is_recommendation(text: &str, brand: &str) -> bool {
    recommendation_patterns(brand)
        .iter()
        .any(|re| re.is_match(text))
}

struct BrandInfo {
    brand: String,
    section_index: i32,
    is_recommended: bool,
    first_char_pos: Option<usize>,
}

/// Given cleaned text and a brand list, returns one `RankResult` per brand,
/// sorted by `(rank_position if >0 else 999, brand)`.
pub fn extract(text: &str, brands: &[String]) -> Vec<RankResult> {
    if text.is_empty() || brands.is_empty() {
        return brands
            .iter()
            .map(|b| RankResult {
                brand: b.clone(),
                rank_position: 0,
                snippet: String::new(),
                section_index: -1,
                is_recommended: false,
            })
            .collect();
    }

    let matcher = BrandMatcher::new(brands);
    let sections = split_sections(text);

    let brand_infos: Vec<BrandInfo> = brands
        .iter()
        .map(|brand| {
            let pattern = crate::rank::brand_matcher::whole_word_pattern(brand);
            BrandInfo {
                brand: brand.clone(),
                section_index: find_first_section(&sections, &pattern),
                is_recommended: is_recommendation(text, brand),
                first_char_pos: matcher.first_position(text, brand),
            }
        })
        .collect();

    let mut recommended: Vec<&BrandInfo> = brand_infos
        .iter()
        .filter(|b| b.is_recommended && b.section_index >= 0)
        .collect();
    recommended.sort_by_key(|b| b.section_index);

    let mut mentioned_only: Vec<&BrandInfo> = brand_infos
        .iter()
        .filter(|b| !b.is_recommended && b.section_index >= 0)
        .collect();
    mentioned_only.sort_by_key(|b| b.section_index);

    let mut rank_for: std::collections::HashMap<&str, u8> = std::collections::HashMap::new();
    let mut rank = 1u8;
    for b in &recommended {
        rank_for.insert(&b.brand, rank.min(5));
        rank = rank.saturating_add(1);
    }
    for b in &mentioned_only {
        rank_for.insert(&b.brand, 5);
    }
    for b in brand_infos.iter().filter(|b| b.section_index < 0) {
        rank_for.insert(&b.brand, 0);
    }

    let mut results: Vec<RankResult> = brand_infos
        .iter()
        .map(|info| {
            let rank_position = *rank_for.get(info.brand.as_str()).unwrap_or(&0);
            let snippet_text = match info.first_char_pos {
                Some(pos) => snippet::extract(text, pos),
                None => String::new(),
            };
            RankResult {
                brand: info.brand.clone(),
                rank_position,
                snippet: snippet_text,
                section_index: info.section_index,
                is_recommended: info.is_recommended,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        let ka = if a.rank_position > 0 { a.rank_position as u32 } else { 999 };
        let kb = if b.rank_position > 0 { b.rank_position as u32 } else { 999 };
        ka.cmp(&kb).then_with(|| a.brand.cmp(&b.brand))
    });

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brands(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_brand_list_returns_empty() {
        assert!(extract("some text", &[]).is_empty());
    }

    #[test]
    fn empty_text_returns_rank_zero_per_brand() {
        let results = extract("", &brands(&["Levoit", "Dyson"]));
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.rank_position == 0));
    }

    /// S1 — numbered list, three recommended brands.
    #[test]
    fn s1_numbered_list_ranking() {
        let text = "1. Levoit purifies air quietly.\n2. Dyson is sleek and modern.\n3. Coway has great filters.\nHoneywell is not typically mentioned.";
        let names = brands(&["Levoit", "Dyson", "Coway", "Honeywell"]);
        let results = extract(text, &names);

        let by_brand = |b: &str| results.iter().find(|r| r.brand == b).unwrap();

        assert_eq!(by_brand("Levoit").rank_position, 1);
        assert_eq!(by_brand("Dyson").rank_position, 2);
        assert_eq!(by_brand("Coway").rank_position, 3);
        assert_eq!(by_brand("Honeywell").rank_position, 5);

        for b in ["Levoit", "Dyson", "Coway", "Honeywell"] {
            assert!(by_brand(b).snippet.contains(b), "snippet missing brand {b}");
        }
        assert!(by_brand("Levoit").is_recommended);
        assert!(by_brand("Dyson").is_recommended);
        assert!(by_brand("Coway").is_recommended);
        assert!(!by_brand("Honeywell").is_recommended);
    }

    #[test]
    fn absent_brands_sort_alphabetically_after_ranked_ones() {
        let text = "1. Zephyr is the best choice.\nNothing else is mentioned here at all in this text.";
        let names = brands(&["Zephyr", "Aardvark", "Banana"]);
        let results = extract(text, &names);
        assert_eq!(results[0].brand, "Zephyr");
        assert_eq!(results[1].brand, "Aardvark");
        assert_eq!(results[2].brand, "Banana");
    }

    #[test]
    fn recommendation_phrase_is_detected() {
        let text = "After reviewing several options, we recommend Levoit for most households.";
        assert!(is_recommendation(text, "Levoit"));
    }

    #[test]
    fn mention_without_recommendation_language_is_not_recommended() {
        let text = "Levoit also makes air purifiers, among many other brands in this market.";
        assert!(!is_recommendation(text, "Levoit"));
    }
}
