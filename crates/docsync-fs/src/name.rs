//! File-name sanitising
//!
//! Document titles come from loosely structured metadata. They are turned
//! into a single path component that cannot escape the sync directory.

/// Make `stem` safe to use as a single file-name component.
///
/// Path separators and control characters become `_`, leading dots are
/// stripped (no hidden files, no `..`), and surrounding whitespace is
/// trimmed. Returns an empty string if nothing usable remains.
pub fn sanitize_stem(stem: &str) -> String {
    let replaced: String = stem
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    replaced
        .trim_start_matches(|c: char| c == '.' || c.is_whitespace())
        .trim_end()
        .to_string()
}

/// Make a file extension safe: keeps a single leading dot and drops
/// anything that could not appear in one path component.
pub fn sanitize_extension(ext: &str) -> String {
    let body: String = ext
        .trim()
        .trim_start_matches('.')
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '.') && !c.is_control() && !c.is_whitespace())
        .collect();
    if body.is_empty() {
        String::new()
    } else {
        format!(".{}", body)
    }
}
