//! URL normalization and chapter-number parsing
//!
//! Chapter lists are deduplicated by normalized URL, ordered by the chapter
//! number inferred from the URL or link text, and (when a listing only shows a
//! sample) extrapolated from the numeric identifier embedded in known chapter
//! URLs. The parsing helpers for all three live here.

use url::Url;

/// Normalizes a chapter or listing URL for deduplication
///
/// Drops the fragment and query, collapses a trailing slash in the path, and
/// rejects anything that is not http/https. Two links to the same chapter
/// through different anchors or tracking params normalize to the same string.
pub fn normalize_url(input: &str) -> Option<Url> {
    let resolved = Url::parse(input).ok()?;
    normalize(&resolved)
}

/// Resolves a possibly-relative href against a base, then normalizes it
pub fn resolve_and_normalize(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    if href.starts_with("javascript:") || href.starts_with("mailto:") || href.starts_with("data:")
    {
        return None;
    }
    let resolved = base.join(href).ok()?;
    normalize(&resolved)
}

fn normalize(url: &Url) -> Option<Url> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized.set_query(None);
    let mut path = normalized.path().to_owned();
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    normalized.set_path(&path);
    Some(normalized)
}

/// Extracts the work's slug from a listing URL
///
/// Handles the two shapes the sources use: a `/novel/{slug}` path segment and
/// a bare `/{slug}.html` page. Chapter links are matched back to their work by
/// comparing slugs, and sub-listing probe URLs are derived from the slug.
pub fn slug_of(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();

    if let Some(pos) = segments.iter().position(|s| *s == "novel") {
        if let Some(slug) = segments.get(pos + 1) {
            let slug = slug.trim_end_matches(".html");
            if !slug.is_empty() {
                return Some(slug.to_string());
            }
        }
    }

    let last = segments.last()?;
    let stem = last.trim_end_matches(".html");
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// Parses a chapter number out of a URL
///
/// Looks for a `chapter` marker followed by digits (`/chapter-12`,
/// `-chapter-12.html`, `chapter_12`), then falls back to an all-digit final
/// path segment (`/123.html`).
pub fn chapter_number_in_url(url: &str) -> Option<u32> {
    let lower = url.to_ascii_lowercase();

    let mut search_from = 0;
    while let Some(rel) = lower[search_from..].find("chapter") {
        let after = search_from + rel + "chapter".len();
        let rest = &lower[after..];
        let rest = rest.trim_start_matches(['-', '_', ' ', '/']);
        if let Some(num) = leading_number(rest) {
            return Some(num);
        }
        search_from = after;
    }

    // Bare numeric final segment, e.g. ".../123.html" or ".../123"
    let path_end = lower.split(['?', '#']).next().unwrap_or(&lower);
    let last = path_end.rsplit('/').next()?;
    let stem = last.trim_end_matches(".html");
    if !stem.is_empty() && stem.chars().all(|c| c.is_ascii_digit()) {
        return stem.parse().ok();
    }
    None
}

/// Parses a chapter number out of link text
///
/// Recognizes `Chapter 12`, `Ch. 12`, `Episode 12`, `Ep 12`, and the bare
/// leading-number format some listings use (`12 The Siege`).
pub fn chapter_number_in_text(text: &str) -> Option<u32> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();

    for keyword in ["chapter", "episode", "ch.", "ep.", "ch", "ep"] {
        if let Some(rest) = lower.strip_prefix(keyword) {
            let rest = rest.trim_start_matches([' ', '.', '-', '#', ':']);
            if let Some(num) = leading_number(rest) {
                return Some(num);
            }
        }
    }

    // "12 The Siege" or a bare "12"
    if lower.chars().next()?.is_ascii_digit() {
        let num = leading_number(&lower)?;
        let rest = lower.trim_start_matches(|c: char| c.is_ascii_digit());
        if rest.is_empty() || rest.starts_with(' ') {
            return Some(num);
        }
    }
    None
}

fn leading_number(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// A chapter URL split around its trailing numeric identifier
///
/// Some sources address chapters by an opaque numeric id rather than a
/// chapter number (`/book/771249/31365260296066405`). Splitting the URL
/// around that id lets the discoverer extrapolate sibling chapter URLs by
/// linear arithmetic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericIdUrl {
    pub prefix: String,
    pub id: i64,
    pub suffix: String,
}

impl NumericIdUrl {
    /// Rebuilds a URL with a different identifier
    pub fn with_id(&self, id: i64) -> String {
        format!("{}{}{}", self.prefix, id, self.suffix)
    }
}

/// Splits a URL around the last numeric run in its path
///
/// The run must end the path or be followed only by `.html` or a trailing
/// slash; digits inside the host or earlier segments are ignored. Returns
/// None when the id does not fit in an i64 or no such run exists.
pub fn split_numeric_id(url: &str) -> Option<NumericIdUrl> {
    let path_end = url.find(['?', '#']).unwrap_or(url.len());
    let (head, tail) = url.split_at(path_end);

    // Last run of digits in the path portion.
    let bytes = head.as_bytes();
    let mut end = None;
    let mut start = 0;
    let mut i = bytes.len();
    while i > 0 {
        i -= 1;
        if bytes[i].is_ascii_digit() {
            if end.is_none() {
                let after = &head[i + 1..];
                if !(after.is_empty() || after == ".html" || after == "/" || after == ".html/") {
                    continue;
                }
                end = Some(i + 1);
            }
            start = i;
        } else if end.is_some() {
            break;
        }
    }
    let end = end?;

    // Skip ids embedded in the host.
    if !head[..start].contains('/') || start == 0 {
        return None;
    }

    let id: i64 = head[start..end].parse().ok()?;
    Some(NumericIdUrl {
        prefix: head[..start].to_string(),
        id,
        suffix: format!("{}{}", &head[end..], tail),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_query_and_fragment() {
        let url = normalize_url("https://example.com/novel/abc?ref=home#top").unwrap();
        assert_eq!(url.as_str(), "https://example.com/novel/abc");
    }

    #[test]
    fn test_normalize_collapses_trailing_slash() {
        let a = normalize_url("https://example.com/novel/abc/").unwrap();
        let b = normalize_url("https://example.com/novel/abc").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_rejects_non_http() {
        assert!(normalize_url("ftp://example.com/file").is_none());
    }

    #[test]
    fn test_resolve_relative_href() {
        let base = Url::parse("https://example.com/novel/abc/").unwrap();
        let url = resolve_and_normalize("chapter-2.html", &base).unwrap();
        assert_eq!(url.as_str(), "https://example.com/novel/abc/chapter-2.html");
    }

    #[test]
    fn test_resolve_skips_special_schemes() {
        let base = Url::parse("https://example.com/").unwrap();
        assert!(resolve_and_normalize("javascript:void(0)", &base).is_none());
        assert!(resolve_and_normalize("mailto:a@b.com", &base).is_none());
        assert!(resolve_and_normalize("#latest", &base).is_none());
    }

    #[test]
    fn test_slug_from_novel_path() {
        let url = Url::parse("https://example.com/novel/shadow-slave/chapter-3.html").unwrap();
        assert_eq!(slug_of(&url).as_deref(), Some("shadow-slave"));
    }

    #[test]
    fn test_slug_from_html_page() {
        let url = Url::parse("https://example.com/shadow-slave.html").unwrap();
        assert_eq!(slug_of(&url).as_deref(), Some("shadow-slave"));
    }

    #[test]
    fn test_chapter_number_in_url_variants() {
        assert_eq!(
            chapter_number_in_url("https://x.com/novel/abc/chapter-12.html"),
            Some(12)
        );
        assert_eq!(
            chapter_number_in_url("https://x.com/abc-chapter-7"),
            Some(7)
        );
        assert_eq!(chapter_number_in_url("https://x.com/abc/301.html"), Some(301));
        assert_eq!(chapter_number_in_url("https://x.com/novel/abc"), None);
    }

    #[test]
    fn test_chapter_number_skips_bare_chapter_marker() {
        // "chapters" with no digits must not swallow the later marker
        assert_eq!(
            chapter_number_in_url("https://x.com/chapters/abc/chapter-4"),
            Some(4)
        );
    }

    #[test]
    fn test_chapter_number_in_text_variants() {
        assert_eq!(chapter_number_in_text("Chapter 12: The Fall"), Some(12));
        assert_eq!(chapter_number_in_text("ch. 3"), Some(3));
        assert_eq!(chapter_number_in_text("Episode 44"), Some(44));
        assert_eq!(chapter_number_in_text("17 Crimson Dawn"), Some(17));
        assert_eq!(chapter_number_in_text("  9  "), Some(9));
        assert_eq!(chapter_number_in_text("Prologue"), None);
        assert_eq!(chapter_number_in_text("2nd Anniversary"), None);
    }

    #[test]
    fn test_split_numeric_id() {
        let split = split_numeric_id("https://x.com/book/771249/31365260296066405").unwrap();
        assert_eq!(split.id, 31365260296066405);
        assert_eq!(split.prefix, "https://x.com/book/771249/");
        assert_eq!(split.suffix, "");
        assert_eq!(
            split.with_id(31365260296066505),
            "https://x.com/book/771249/31365260296066505"
        );
    }

    #[test]
    fn test_split_numeric_id_html_suffix() {
        let split = split_numeric_id("https://x.com/read/551.html").unwrap();
        assert_eq!(split.id, 551);
        assert_eq!(split.suffix, ".html");
    }

    #[test]
    fn test_split_numeric_id_requires_path_id() {
        assert!(split_numeric_id("https://x1.com/about").is_none());
        assert!(split_numeric_id("https://x.com/").is_none());
    }
}
