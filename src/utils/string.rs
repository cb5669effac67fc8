//! Text helpers for user-submitted fields

/// Truncate to at most `max_chars` characters, appending "..." when cut.
///
/// Counts characters rather than bytes so multi-byte text never splits
/// inside a code point.
///
/// ```
/// use stackshare_core::utils::string::truncate_at_char_boundary;
///
/// assert_eq!(truncate_at_char_boundary("hello world", 5), "hello...");
/// assert_eq!(truncate_at_char_boundary("hello", 10), "hello");
/// ```
pub fn truncate_at_char_boundary(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// Trim a form field, mapping empty input to `None`
pub fn blank_to_none(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Extension of an uploaded file name, lowercased (`"photo.JPG"` -> `"jpg"`)
pub fn file_extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_untouched() {
        assert_eq!(truncate_at_char_boundary("Felt great", 140), "Felt great");
    }

    #[test]
    fn test_truncate_exact_length() {
        assert_eq!(truncate_at_char_boundary("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_multibyte() {
        let text = "Schlaf → besser 😴😴😴";
        let result = truncate_at_char_boundary(text, 8);
        assert_eq!(result, "Schlaf →...");
    }

    #[test]
    fn test_truncate_long_note() {
        let note = "x".repeat(300);
        let result = truncate_at_char_boundary(&note, 140);
        assert_eq!(result.chars().count(), 143);
        assert!(result.ends_with("..."));
    }

    #[test]
    fn test_blank_to_none() {
        assert_eq!(blank_to_none(None), None);
        assert_eq!(blank_to_none(Some("   ".to_string())), None);
        assert_eq!(
            blank_to_none(Some("  Magnesium ".to_string())),
            Some("Magnesium".to_string())
        );
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("photo.JPG"), Some("jpg".to_string()));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension(".hidden"), None);
        assert_eq!(file_extension("bad.p/ng"), None);
    }
}
