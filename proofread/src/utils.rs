use std::time::{SystemTime, UNIX_EPOCH};

const PREVIEW_CHARS: usize = 50;

/// Returns the current time as milliseconds since Unix epoch.
pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

/// Length in characters, not bytes.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Short single-line excerpt of `text` for log lines.
pub fn preview(text: &str) -> String {
    let flattened: String = text
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .take(PREVIEW_CHARS)
        .collect();

    if char_len(text) > PREVIEW_CHARS {
        format!("{flattened}...")
    } else {
        flattened
    }
}

/// Checks if a character ends a sentence.
pub fn is_terminal_punctuation(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_len_counts_multibyte_characters_once() {
        assert_eq!(char_len("héllo"), 5);
        assert_eq!(char_len("你好"), 2);
    }

    #[test]
    fn preview_truncates_and_flattens() {
        let text = format!("line one\nline two {}", "x".repeat(80));
        let excerpt = preview(&text);

        assert!(excerpt.starts_with("line one line two"));
        assert!(excerpt.ends_with("..."));
        assert!(!excerpt.contains('\n'));
    }
}
