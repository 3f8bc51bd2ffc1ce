//! Per-platform search-URL construction (SPEC_FULL.md §6 URL templates).

use crate::models::Platform;

/// Builds the request URL the scraper service is handed for a given
/// platform and query text. The scraper service itself drives the actual
/// browser/API call against the platform; this core only forms the request.
pub fn search_url(platform: Platform, query_text: &str) -> String {
    let encoded = urlencoding_compatible_encode(query_text);
    match platform {
        Platform::Chatgpt => format!("https://chatgpt.com/search?q={encoded}"),
        Platform::Perplexity => format!("https://www.perplexity.ai/search?q={encoded}"),
        Platform::GoogleAi => format!("https://www.google.com/search?q={encoded}"),
    }
}

/// Minimal `application/x-www-form-urlencoded`-style percent-encoding,
/// avoiding an extra dependency for the handful of characters a search
/// query can contain.
fn urlencoding_compatible_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
