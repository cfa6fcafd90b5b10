//! Byte-bounded text helpers.
//!
//! Compression previews and captured process output must stay bounded
//! regardless of input size. All truncation here is UTF-8 safe: cuts land on
//! char boundaries, so a preview of a multi-byte string never panics.

/// Largest char-boundary index at or below `max`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut idx = max;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// First at-most-`max` bytes of `s`, cut on a char boundary.
pub fn truncate_bytes(s: &str, max: usize) -> &str {
    &s[..floor_char_boundary(s, max)]
}

/// Last at-most-`max` bytes of `s`, cut on a char boundary.
pub fn tail_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while start < s.len() && !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

/// Number of lines in `s`, counting a trailing partial line.
pub fn line_count(s: &str) -> usize {
    if s.is_empty() {
        return 0;
    }
    s.lines().count()
}

/// Head and tail of `s` joined by an omission marker stating what was cut.
///
/// Returns `s` unchanged when nothing would be omitted, so the output is
/// never longer than the input.
pub fn head_tail_preview(s: &str, head: usize, tail: usize) -> String {
    if s.len() <= head + tail {
        return s.to_string();
    }
    let head_part = truncate_bytes(s, head);
    let tail_part = tail_bytes(s, tail);
    let omitted_bytes = s.len() - head_part.len() - tail_part.len();
    let omitted_lines = line_count(s).saturating_sub(line_count(head_part) + line_count(tail_part));
    format!(
        "{}\n... [omitted {} bytes, {} lines] ...\n{}",
        head_part, omitted_bytes, omitted_lines, tail_part
    )
}
