//! Pagination for reflowable text.
//!
//! Pages are greedy slices of roughly `approx_chars_per_page` characters. A
//! slice backs off to the last whitespace inside it so no word is split; when
//! the slice holds no whitespace at all it is hard-cut at the limit. The
//! whitespace run at a cut belongs to neither page, so re-inserting it between
//! pages reproduces the input exactly.

use std::ops::Range;

/// Split `text` into page texts. Empty input yields a single empty page.
pub fn paginate(text: &str, approx_chars_per_page: usize) -> Vec<String> {
    page_spans(text, approx_chars_per_page)
        .into_iter()
        .map(|span| text[span].to_string())
        .collect()
}

/// Byte ranges of each page within `text`, in order.
pub fn page_spans(text: &str, approx_chars_per_page: usize) -> Vec<Range<usize>> {
    let limit = approx_chars_per_page.max(1);
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let n = chars.len();
    if n == 0 {
        return vec![0..0];
    }

    let byte_at = |idx: usize| chars.get(idx).map(|(b, _)| *b).unwrap_or(text.len());
    let is_space = |idx: usize| chars[idx].1.is_whitespace();

    let mut spans = Vec::new();
    let mut start = 0usize;
    while start < n {
        if n - start <= limit {
            spans.push(byte_at(start)..text.len());
            break;
        }

        let cut = start + limit;
        let boundary = (start + 1..=cut).rev().find(|&idx| is_space(idx));
        match boundary {
            Some(ws) => {
                let mut end = ws;
                while end > start + 1 && is_space(end - 1) {
                    end -= 1;
                }
                let mut next = ws;
                while next < n && is_space(next) {
                    next += 1;
                }
                spans.push(byte_at(start)..byte_at(end));
                start = next;
            }
            None => {
                spans.push(byte_at(start)..byte_at(cut));
                start = cut;
            }
        }
    }
    spans
}
