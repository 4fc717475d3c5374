use std::fmt;

use crate::state::TextSnapshot;
use crate::utils::char_len;

/// Inclusive length window a candidate must fall in, in characters of the
/// trimmed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthBounds {
    pub min_chars: usize,
    pub max_chars: usize,
}

impl LengthBounds {
    pub const CLIPBOARD: Self = Self {
        min_chars: 20,
        max_chars: 5_000,
    };
    pub const LIVE_INPUT: Self = Self {
        min_chars: 10,
        max_chars: 10_000,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    Duplicate,
    TooShort { chars: usize, min: usize },
    TooLong { chars: usize, max: usize },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Duplicate => write!(f, "same as last snapshot"),
            Self::TooShort { chars, min } => write!(f, "too short ({chars} < {min})"),
            Self::TooLong { chars, max } => write!(f, "too long ({chars} > {max})"),
        }
    }
}

/// Filters trivial and repeated text before it reaches the debouncer.
#[derive(Debug, Clone)]
pub struct DedupGate {
    bounds: LengthBounds,
    last_snapshot: Option<String>,
}

impl DedupGate {
    pub fn new(bounds: LengthBounds) -> Self {
        Self {
            bounds,
            last_snapshot: None,
        }
    }

    /// Records `text` as already seen without admitting it.
    pub fn seed(&mut self, text: impl Into<String>) {
        self.last_snapshot = Some(text.into());
    }

    pub fn last_snapshot(&self) -> Option<&str> {
        self.last_snapshot.as_deref()
    }

    pub fn reset(&mut self) {
        self.last_snapshot = None;
    }

    /// Admits `text` as a new candidate, updating the last snapshot right away
    /// so repeats inside the same burst are rejected.
    pub fn admit(&mut self, text: &str) -> Result<TextSnapshot, Rejection> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Rejection::Empty);
        }
        if self.last_snapshot.as_deref() == Some(text) {
            return Err(Rejection::Duplicate);
        }

        let chars = char_len(trimmed);
        if chars < self.bounds.min_chars {
            return Err(Rejection::TooShort {
                chars,
                min: self.bounds.min_chars,
            });
        }
        if chars > self.bounds.max_chars {
            return Err(Rejection::TooLong {
                chars,
                max: self.bounds.max_chars,
            });
        }

        self.last_snapshot = Some(text.to_string());
        Ok(TextSnapshot::new(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_rejected_and_not_remembered() {
        let mut gate = DedupGate::new(LengthBounds::CLIPBOARD);

        let result = gate.admit("short");
        assert_eq!(result, Err(Rejection::TooShort { chars: 5, min: 20 }));
        assert_eq!(gate.last_snapshot(), None);
    }

    #[test]
    fn nothing_below_the_minimum_is_ever_admitted() {
        let mut gate = DedupGate::new(LengthBounds::CLIPBOARD);
        for len in 1..LengthBounds::CLIPBOARD.min_chars {
            let text = "a".repeat(len);
            assert!(matches!(gate.admit(&text), Err(Rejection::TooShort { .. })));
        }
    }

    #[test]
    fn blank_text_is_empty() {
        let mut gate = DedupGate::new(LengthBounds::LIVE_INPUT);
        assert_eq!(gate.admit(" \n\t ").unwrap_err(), Rejection::Empty);
    }

    #[test]
    fn overlong_text_is_rejected() {
        let mut gate = DedupGate::new(LengthBounds::CLIPBOARD);
        let text = "a".repeat(5_001);
        assert!(matches!(
            gate.admit(&text),
            Err(Rejection::TooLong {
                chars: 5_001,
                max: 5_000
            })
        ));
    }

    #[test]
    fn repeated_text_is_admitted_once() {
        let mut gate = DedupGate::new(LengthBounds::CLIPBOARD);
        let text = "The quick brown fox jumps over the lazy dog.";

        let admitted = gate.admit(text).expect("first sighting is admitted");
        assert_eq!(admitted.text(), text);
        assert_eq!(gate.last_snapshot(), Some(text));
        assert_eq!(gate.admit(text).unwrap_err(), Rejection::Duplicate);
    }

    #[test]
    fn seeded_text_counts_as_seen() {
        let mut gate = DedupGate::new(LengthBounds::CLIPBOARD);
        let text = "Already on the clipboard when monitoring began.";
        gate.seed(text);

        assert_eq!(gate.admit(text).unwrap_err(), Rejection::Duplicate);
        gate.reset();
        assert!(gate.admit(text).is_ok());
    }

    #[test]
    fn bounds_are_inclusive() {
        let mut gate = DedupGate::new(LengthBounds {
            min_chars: 3,
            max_chars: 5,
        });
        assert!(gate.admit("abc").is_ok());
        assert!(gate.admit("abcde").is_ok());
    }
}
