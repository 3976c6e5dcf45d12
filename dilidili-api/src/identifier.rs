//! Extraction of video identifiers from user input.

use regex::Regex;
use url::Url;

/// Extracts a `BV…` identifier from a bare id or a bilibili.com link.
///
/// Bare ids are returned as given (trimmed). For links, the first path
/// segment starting with `BV` wins; query strings and fragments are ignored.
/// Returns `None` for anything else.
pub fn extract_identifier(input: &str) -> Option<String> {
    let input = input.trim();
    if input.starts_with("BV") {
        return Some(input.to_string());
    }
    if !input.contains("bilibili.com") {
        return None;
    }

    let parsed = Url::parse(input).or_else(|_| Url::parse(&format!("https://{input}")));
    match parsed {
        Ok(url) => url
            .path_segments()?
            .find(|segment| segment.starts_with("BV"))
            .map(str::to_string),
        Err(e) => {
            tracing::debug!("Unparseable link {:?}: {}", input, e);
            let pattern = Regex::new(r"BV[0-9A-Za-z]+").ok()?;
            pattern.find(input).map(|m| m.as_str().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_identifier() {
        assert_eq!(
            extract_identifier("  BV1GJ411x7h7 \n"),
            Some("BV1GJ411x7h7".to_string())
        );
    }

    #[test]
    fn test_video_links() {
        assert_eq!(
            extract_identifier("https://www.bilibili.com/video/BV1GJ411x7h7"),
            Some("BV1GJ411x7h7".to_string())
        );
        assert_eq!(
            extract_identifier("https://www.bilibili.com/video/BV1GJ411x7h7/?p=2&t=30"),
            Some("BV1GJ411x7h7".to_string())
        );
        assert_eq!(
            extract_identifier("www.bilibili.com/video/BV1GJ411x7h7?spm_id_from=333"),
            Some("BV1GJ411x7h7".to_string())
        );
        assert_eq!(
            extract_identifier("https://m.bilibili.com/video/BV1GJ411x7h7#reply"),
            Some("BV1GJ411x7h7".to_string())
        );
    }

    #[test]
    fn test_free_text_mentioning_a_link() {
        assert_eq!(
            extract_identifier("watch bilibili.com BV1GJ411x7h7 later"),
            Some("BV1GJ411x7h7".to_string())
        );
    }

    #[test]
    fn test_rejected_inputs() {
        assert_eq!(extract_identifier(""), None);
        assert_eq!(extract_identifier("av170001"), None);
        assert_eq!(extract_identifier("https://example.com/video/BV1GJ411x7h7"), None);
        assert_eq!(extract_identifier("https://www.bilibili.com/video/av170001"), None);
    }
}
