//! Output budgeting for text that crosses an isolation boundary.
//!
//! Token counts are estimated with a fixed characters-per-token ratio, not
//! a tokenizer. Text over budget keeps its head and tail and loses the
//! middle.

/// Characters assumed per token when no ratio is configured.
pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

/// Room reserved around the elision marker out of each half.
const MARKER_RESERVE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputBudgeter {
    chars_per_token: usize,
}

impl Default for OutputBudgeter {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_TOKEN)
    }
}

impl OutputBudgeter {
    /// A zero ratio is treated as one character per token.
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }

    pub fn chars_per_token(&self) -> usize {
        self.chars_per_token
    }

    /// The character budget for `max_tokens`.
    pub fn max_chars(&self, max_tokens: u32) -> usize {
        self.chars_per_token.saturating_mul(max_tokens as usize)
    }

    /// Bound `text` to roughly `max_tokens`.
    ///
    /// Text within budget is returned unchanged. Otherwise the result is
    /// `head + marker + tail`, each side `max_chars / 2 - 50` characters,
    /// and the marker states how many characters over budget the input was.
    pub fn truncate(&self, text: &str, max_tokens: u32) -> String {
        let max_chars = self.max_chars(max_tokens);
        let len = text.chars().count();
        if len <= max_chars {
            return text.to_string();
        }

        let keep = (max_chars / 2).saturating_sub(MARKER_RESERVE);
        let removed = len - max_chars;
        let head: String = text.chars().take(keep).collect();
        let tail: String = text.chars().skip(len - keep).collect();
        format!("{head}\n\n... [{removed} characters truncated] ...\n\n{tail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Generous upper bound on the marker's length.
    const MARKER_OVERHEAD: usize = 64;

    #[test]
    fn text_within_budget_is_unchanged() {
        let budgeter = OutputBudgeter::default();
        for len in [0, 1, 199, 200] {
            let text = "x".repeat(len);
            assert_eq!(budgeter.truncate(&text, 50), text);
        }
    }

    #[test]
    fn long_text_is_bounded() {
        let budgeter = OutputBudgeter::default();
        for (len, tokens) in [(201, 50), (10_000, 50), (1_000_000, 2000), (500, 10)] {
            let text = "y".repeat(len);
            let out = budgeter.truncate(&text, tokens);
            assert!(
                out.chars().count() <= 4 * tokens as usize + MARKER_OVERHEAD,
                "len={len} tokens={tokens} out={}",
                out.chars().count()
            );
        }
    }

    #[test]
    fn keeps_head_and_tail_and_reports_removed() {
        let text: String = ('a'..='z').cycle().take(1000).collect();
        let out = OutputBudgeter::default().truncate(&text, 100);
        // max_chars 400, keep 150, removed 600
        assert!(out.starts_with(&text[..150]));
        assert!(out.ends_with(&text[850..]));
        assert!(out.contains("[600 characters truncated]"));
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let text = "é🦀".repeat(300);
        let out = OutputBudgeter::default().truncate(&text, 50);
        assert!(out.contains("characters truncated"));
        assert!(out.starts_with("é🦀"));
    }

    #[test]
    fn tiny_budget_still_has_marker() {
        let out = OutputBudgeter::default().truncate(&"z".repeat(100), 5);
        assert!(out.contains("[80 characters truncated]"));
        assert!(!out.contains('z'));
    }

    #[test]
    fn ratio_is_configurable() {
        let budgeter = OutputBudgeter::new(2);
        assert_eq!(budgeter.max_chars(50), 100);
        let text = "q".repeat(150);
        assert_ne!(budgeter.truncate(&text, 50), text);
        assert_eq!(OutputBudgeter::default().truncate(&text, 50), text);
        assert_eq!(OutputBudgeter::new(0).chars_per_token(), 1);
    }
}
