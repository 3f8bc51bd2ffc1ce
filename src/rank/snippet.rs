//! ±N-char context window extraction with word-boundary snapping.

const DEFAULT_RADIUS: usize = 200;

/// Extracts a snippet of `radius` chars around a byte `position`, snapping
/// both ends outward to the nearest whitespace so the snippet never begins
/// or ends mid-word. Operates on chars (not bytes) for the radius count,
/// since `position` itself is a byte offset into `text`.
pub fn extract(text: &str, position: usize) -> String {
    extract_with_radius(text, position, DEFAULT_RADIUS)
}

pub fn extract_with_radius(text: &str, position: usize, radius: usize) -> String {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let total_chars = chars.len();

    // Map the byte position to a char index.
    let char_idx = chars
        .iter()
        .position(|(byte_idx, _)| *byte_idx >= position)
        .unwrap_or(total_chars);

    let raw_start = char_idx.saturating_sub(radius);
    let raw_end = (char_idx + radius).min(total_chars);

    let start = if raw_start > 0 {
        snap_forward(&chars, raw_start)
    } else {
        0
    };
    let end = if raw_end < total_chars {
        snap_backward(&chars, raw_end)
    } else {
        total_chars
    };

    let start_byte = chars.get(start).map(|(b, _)| *b).unwrap_or(text.len());
    let end_byte = chars.get(end).map(|(b, _)| *b).unwrap_or(text.len());

    let mut snippet = text[start_byte..end_byte].trim().to_string();
    if start > 0 {
        snippet = format!("...{snippet}");
    }
    if end < total_chars {
        snippet = format!("{snippet}...");
    }
    snippet
}

fn snap_forward(chars: &[(usize, char)], mut pos: usize) -> usize {
    while pos < chars.len() && !chars[pos].1.is_whitespace() {
        pos += 1;
    }
    while pos < chars.len() && chars[pos].1.is_whitespace() {
        pos += 1;
    }
    pos
}

fn snap_backward(chars: &[(usize, char)], mut pos: usize) -> usize {
    while pos > 0 && !chars[pos - 1].1.is_whitespace() {
        pos -= 1;
    }
    while pos > 0 && chars[pos - 1].1.is_whitespace() {
        pos -= 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_produces_empty_snippet() {
        assert_eq!(extract("", 0), "");
    }

    #[test]
    fn short_text_has_no_ellipsis() {
        let text = "Levoit is great.";
        let pos = text.find("Levoit").unwrap();
        let snippet = extract(text, pos);
        assert_eq!(snippet, "Levoit is great.");
    }

    #[test]
    fn long_text_snaps_to_word_boundaries_with_ellipsis() {
        let prefix = "word ".repeat(100);
        let suffix = "word ".repeat(100);
        let text = format!("{prefix}Levoit{suffix}");
        let pos = text.find("Levoit").unwrap();
        let snippet = extract(&text, pos);
        assert!(snippet.starts_with("..."));
        assert!(snippet.ends_with("..."));
        assert!(snippet.contains("Levoit"));
        assert!(!snippet.contains("  "));
    }
}
