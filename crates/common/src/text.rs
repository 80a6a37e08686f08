/// Character-safe prefix of `s`, suffixed with `...` when something was cut.
pub fn preview(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Last path segment of a blob name without the `.pdf` extension.
pub fn display_name(blob_name: &str) -> &str {
    let file = blob_name.rsplit('/').next().unwrap_or(blob_name);
    file.strip_suffix(".pdf").unwrap_or(file)
}
