//! Output filename rules

/// Longest file stem component we produce
pub const MAX_NAME_LEN: usize = 200;

const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Remove characters that are invalid in filenames on common platforms,
/// collapse whitespace and cap the length.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !INVALID_CHARS.contains(c) && !c.is_control())
        .collect();

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(MAX_NAME_LEN).collect();

    // Truncation can leave a trailing space, and Windows rejects trailing dots
    truncated.trim_end_matches([' ', '.']).to_string()
}

/// "Artist - Title" stem for a downloaded track
pub fn output_stem(artist: &str, title: &str) -> String {
    let artist = match sanitize_filename(artist) {
        a if a.is_empty() => "Unknown Artist".to_string(),
        a => a,
    };
    let title = match sanitize_filename(title) {
        t if t.is_empty() => "Unknown Title".to_string(),
        t => t,
    };
    format!("{artist} - {title}")
}
