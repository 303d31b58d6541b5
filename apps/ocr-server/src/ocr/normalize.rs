//! Model output cleanup
//!
//! Vision models like to wrap their answer in code fences or open with a
//! canned sentence. Both are stripped before the text reaches the caller.

/// Boilerplate openers, compared case-insensitively
const BOILERPLATE_PREFIXES: &[&str] = &[
    "Here is the extracted text:",
    "Here is the text from the image:",
    "Here's the extracted text:",
    "The text in the image is:",
    "Text extracted from image:",
    "The extracted text is:",
];

/// Strip code fences and boilerplate prefixes from model output
pub fn clean_extracted_text(raw: &str) -> String {
    let mut text = raw.trim();

    loop {
        let before = text.len();
        text = strip_fences(text);
        text = strip_prefix(text);
        if text.len() == before {
            break;
        }
    }

    text.to_string()
}

fn strip_fences(text: &str) -> &str {
    let mut text = text;

    if let Some(rest) = text.strip_prefix("```") {
        // Opening fence may carry a language tag: ```text
        text = match rest.find('\n') {
            Some(newline) if is_fence_tag(&rest[..newline]) => &rest[newline + 1..],
            None if is_fence_tag(rest) => "",
            _ => rest,
        };
    }

    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

fn is_fence_tag(tag: &str) -> bool {
    tag.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn strip_prefix(text: &str) -> &str {
    for prefix in BOILERPLATE_PREFIXES {
        if let Some(head) = text.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                return text[prefix.len()..].trim();
            }
        }
    }
    text
}
