//! Text splitting helpers for speech alignment.

use std::ops::Range;

/// One sentence-like slice of a page, located by char offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceSpan {
    pub text: String,
    /// Half-open range in char (not byte) indices of the source text.
    pub chars: Range<usize>,
}

/// Lightweight sentence splitter based on punctuation and line breaks.
///
/// A terminator (`.`, `!`, `?`, `…`) only ends a sentence when followed by
/// whitespace or the end of the text, so "3.14" stays whole. Trailing closing
/// quotes and brackets stay with their sentence. Each span is trimmed and
/// blank spans are dropped.
pub fn sentence_spans(text: &str) -> Vec<SentenceSpan> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let ch = chars[i];
        if ch == '\n' {
            push_trimmed(&chars, start..i, &mut spans);
            start = i + 1;
            i += 1;
            continue;
        }
        if is_terminator(ch) {
            let mut end = i + 1;
            while end < chars.len() && (is_terminator(chars[end]) || is_closer(chars[end])) {
                end += 1;
            }
            if end == chars.len() || chars[end].is_whitespace() {
                push_trimmed(&chars, start..end, &mut spans);
                start = end;
            }
            i = end;
            continue;
        }
        i += 1;
    }
    push_trimmed(&chars, start..chars.len(), &mut spans);
    spans
}

fn push_trimmed(chars: &[char], range: Range<usize>, out: &mut Vec<SentenceSpan>) {
    let mut start = range.start;
    let mut end = range.end;
    while start < end && chars[start].is_whitespace() {
        start += 1;
    }
    while end > start && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    if start == end {
        return;
    }
    out.push(SentenceSpan {
        text: chars[start..end].iter().collect(),
        chars: start..end,
    });
}

fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '…')
}

fn is_closer(ch: char) -> bool {
    matches!(ch, '"' | '\'' | '”' | '’' | ')' | ']' | '»')
}

/// Count words the way reading-time estimates expect.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
