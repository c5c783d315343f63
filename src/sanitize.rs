pub const MAX_NAME_CHARS: usize = 200;

const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

fn strip_forbidden(text: &str) -> String {
    text.chars().filter(|ch| !FORBIDDEN.contains(ch)).collect()
}

fn cap_chars(text: &str) -> String {
    text.chars().take(MAX_NAME_CHARS).collect()
}

/// Title to file-name stem: forbidden path characters removed, trimmed,
/// at most [`MAX_NAME_CHARS`] characters.
#[must_use]
pub fn clean_filename(text: &str) -> String {
    let stripped = strip_forbidden(text);
    cap_chars(stripped.trim())
}

/// Like [`clean_filename`], with spaces turned into underscores.
#[must_use]
pub fn clean_folder_name(text: &str) -> String {
    let stripped = strip_forbidden(text).replace(' ', "_");
    cap_chars(stripped.trim())
}
