//! Display-safe string helpers shared by the classifier and the renderer.

/// Drop control characters so captured bytes cannot move the cursor or
/// change terminal state.
pub fn sanitize_for_display(s: &str) -> String {
    s.chars().filter(|c| !c.is_control()).collect()
}

/// Cap `s` at `max_len` characters, replacing the tail with `...` when it is
/// cut. Counts characters, not bytes.
pub fn truncate_with_ellipsis(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Right-pad with spaces to `width` characters. Longer strings are returned
/// unchanged.
pub fn pad_to(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + width - len);
    out.push_str(s);
    out.extend(std::iter::repeat(' ').take(width - len));
    out
}
