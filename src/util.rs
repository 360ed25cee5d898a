use std::iter::repeat;
use std::path::{Path, PathBuf};

use base64::engine::GeneralPurpose;
use base64::Engine;

pub fn find_first_subpath<P: AsRef<Path>, F: Fn(&Path) -> bool>(
    root: impl AsRef<Path>,
    subpaths: &[P],
    search: F,
) -> Option<PathBuf> {
    subpaths
        .iter()
        .zip(repeat(root.as_ref()))
        .map(|(b, a)| a.join(b))
        .find(|it: &PathBuf| search(it))
}

/// Standard padded alphabet, same as the payload of a `data:` URL.
pub fn base64_engine() -> GeneralPurpose {
    base64::engine::GeneralPurpose::new(
        &base64::alphabet::STANDARD,
        base64::engine::GeneralPurposeConfig::new(),
    )
}

pub fn encode_base64(bytes: impl AsRef<[u8]>) -> String {
    base64_engine().encode(bytes)
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

pub fn normalize_email(email: impl AsRef<str>) -> String {
    email.as_ref().trim().to_lowercase()
}

/// Trimmed value or `None` when blank.
pub fn non_blank(value: Option<impl AsRef<str>>) -> Option<String> {
    value
        .map(|it| it.as_ref().trim().to_string())
        .filter(|it| !it.is_empty())
}
