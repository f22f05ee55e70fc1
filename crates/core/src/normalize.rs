//! v1 text normalizer (spec.md §4.1).
//!
//! Rules, applied in order: trim; collapse internal whitespace runs to a
//! single space; lowercase; strip a trailing run of `.,;:!?`. Internal
//! punctuation is preserved. The version tag is pinned — any behavior
//! change needs a new `normalization_spec_version`, never a silent edit.
//!
//! spec.md's `ErrInvalidArgument` for "non-string input" is enforced here by
//! the type system (`&str`) rather than at runtime; it resurfaces at the
//! host boundary in `crucible-cli` when untyped JSON is decoded.

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

pub fn normalize(text: &str) -> String {
    let trimmed = text.trim();

    let mut collapsed = String::with_capacity(trimmed.len());
    let mut last_was_space = false;
    for ch in trimmed.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                collapsed.push(' ');
                last_was_space = true;
            }
        } else {
            collapsed.push(ch);
            last_was_space = false;
        }
    }

    let lowered = collapsed.to_lowercase();
    lowered.trim_end_matches(TRAILING_PUNCTUATION).to_string()
}
