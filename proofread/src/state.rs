use tokio::time::Instant;

/// Text captured at one moment. Two snapshots are equal when their text is.
#[derive(Debug, Clone)]
pub struct TextSnapshot {
    text: String,
    captured_at: Instant,
}

impl TextSnapshot {
    pub fn new(text: impl Into<String>) -> Self {
        Self::captured_at(text, Instant::now())
    }

    pub fn captured_at(text: impl Into<String>, captured_at: Instant) -> Self {
        Self {
            text: text.into(),
            captured_at,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn captured(&self) -> Instant {
        self.captured_at
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl PartialEq for TextSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for TextSnapshot {}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn snapshots_compare_by_text_only() {
        let now = Instant::now();
        let first = TextSnapshot::captured_at("same text", now);
        let later = TextSnapshot::captured_at("same text", now + Duration::from_secs(5));

        assert_eq!(first, later);
        assert_ne!(first, TextSnapshot::captured_at("other text", now));
    }
}
