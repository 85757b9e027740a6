use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static EXCESS_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank-line regex"));

/// Normalize extracted text before pagination: NFC, LF line endings, at most
/// one blank line between paragraphs, no leading or trailing spaces per line.
pub fn clean_text(raw: &str) -> String {
    let normalized: String = raw.nfc().collect();
    let unified = normalized.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed_lines = unified
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    EXCESS_BLANK_LINES
        .replace_all(&trimmed_lines, "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_blank_runs_and_trims_lines() {
        let raw = "  Chapter One \r\n\r\n\r\n\r\n   It began.\r\nThen   \n\n\n";
        assert_eq!(clean_text(raw), "Chapter One\n\nIt began.\nThen");
    }

    #[test]
    fn composes_to_nfc() {
        let decomposed = "Cafe\u{301}";
        assert_eq!(clean_text(decomposed), "Caf\u{e9}");
    }

    #[test]
    fn blank_input_stays_empty() {
        assert_eq!(clean_text(" \n \r\n "), "");
    }
}
