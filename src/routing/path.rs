//! Raw URL → path segments.
//!
//! # Responsibilities
//! - Strip query string and fragment
//! - Trim leading/trailing slashes and split into non-empty segments
//! - Capture a trailing file extension (`/feed.xml` → `feed` + `xml`). The
//!   extension must start with a letter, so `3.14` and `v1.2` stay whole

/// A parsed request path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    segments: Vec<String>,
    extension: Option<String>,
}

impl Path {
    /// Parse a raw URL path. Accepts `/a/b`, `a/b/`, `/a/b?x=1#frag`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.split(['?', '#']).next().unwrap_or_default();
        let trimmed = raw.trim_start_matches('/').trim_end_matches('/');

        let mut segments: Vec<String> = trimmed
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let mut extension = None;
        if let Some(last) = segments.last_mut() {
            if let Some((stem, ext)) = split_extension(last) {
                extension = Some(ext.to_string());
                *last = stem.to_string();
            }
        }

        Self {
            segments,
            extension,
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn into_parts(self) -> (Vec<String>, Option<String>) {
        (self.segments, self.extension)
    }
}

fn split_extension(segment: &str) -> Option<(&str, &str)> {
    let (stem, ext) = segment.rsplit_once('.')?;
    let mut chars = ext.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    if stem.is_empty() || !starts_alpha || !chars.all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some((stem, ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_slashes_and_empty_segments() {
        let path = Path::parse("//blog//posts/42/");
        assert_eq!(path.segments(), &["blog", "posts", "42"]);
        assert_eq!(path.extension(), None);
    }

    #[test]
    fn test_query_and_fragment_dropped() {
        let path = Path::parse("/search/all?q=rust#top");
        assert_eq!(path.segments(), &["search", "all"]);
    }

    #[test]
    fn test_extension_captured() {
        let path = Path::parse("/blog/feed.rss");
        assert_eq!(path.segments(), &["blog", "feed"]);
        assert_eq!(path.extension(), Some("rss"));
    }

    #[test]
    fn test_numeric_suffix_is_not_an_extension() {
        let path = Path::parse("/blog/posts/3.14");
        assert_eq!(path.segments(), &["blog", "posts", "3.14"]);
        assert_eq!(path.extension(), None);

        let path = Path::parse("/releases/v1.2");
        assert_eq!(path.segments(), &["releases", "v1.2"]);
        assert_eq!(path.extension(), None);

        let path = Path::parse("/docs/readme.md5");
        assert_eq!(path.segments(), &["docs", "readme"]);
        assert_eq!(path.extension(), Some("md5"));
    }

    #[test]
    fn test_dotfile_keeps_text() {
        let path = Path::parse("/.well-known");
        assert_eq!(path.segments(), &[".well-known"]);
        assert_eq!(path.extension(), None);
    }

    #[test]
    fn test_root_is_empty() {
        assert!(Path::parse("/").segments().is_empty());
        assert!(Path::parse("").segments().is_empty());
    }
}
