//! Chapter discovery
//!
//! Turns a listing page into an ordered list of [`ChapterRef`]s. Discovery
//! runs a fixed-priority rule registry over the listing markup, probes likely
//! sub-listing pages when the listing itself is thin, and extrapolates the
//! full range from a sparse sample when the listing only shows a handful of
//! chapters but reports a larger total.

use crate::config::ScrapeConfig;
use crate::model::ChapterRef;
use crate::scrape::fetcher::PageFetcher;
use crate::url::{
    chapter_number_in_text, chapter_number_in_url, resolve_and_normalize, slug_of,
    split_numeric_id, NumericIdUrl,
};
use crate::{Result, ScrapeError};
use scraper::{Html, Selector};
use url::Url;

/// Known chapter-list container selectors, most specific first
const CONTAINER_SELECTORS: [&str; 10] = [
    "#chapters a[href]",
    ".chapter-list a[href]",
    "ul.chapter-list li a[href]",
    "#chapterlist a[href]",
    "ul.list-chapter li a[href]",
    ".list-chapter a[href]",
    ".m-newest2 a[href]",
    ".ul-list5 a[href]",
    ".toc a[href]",
    "#toc a[href]",
];

/// A chapter link before ordering and index assignment
#[derive(Debug, Clone)]
struct Candidate {
    url: Url,
    title: String,
    /// Chapter number parsed from the URL or link text, when one exists
    number: Option<u32>,
    /// Position in which the link was first seen, for stable tie-breaking
    order: usize,
}

/// One way of finding chapter links on a listing page
trait DiscoveryRule {
    fn name(&self) -> &'static str;
    fn find(&self, doc: &Html, base: &Url) -> Vec<Candidate>;
}

/// Rule 1: anchors inside known chapter-list containers
struct KnownContainers;

impl DiscoveryRule for KnownContainers {
    fn name(&self) -> &'static str {
        "known-containers"
    }

    fn find(&self, doc: &Html, base: &Url) -> Vec<Candidate> {
        for selector_str in CONTAINER_SELECTORS {
            let Ok(selector) = Selector::parse(selector_str) else {
                continue;
            };
            let found: Vec<Candidate> = doc
                .select(&selector)
                .filter_map(|a| candidate_from_anchor(a.value().attr("href")?, &anchor_text(a), base))
                .collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }
}

/// Rule 2: any anchor whose href or text looks chapter-like
///
/// The fallback for listings with no recognizable container: every link on
/// the page is considered, filtered down to ones carrying a parseable
/// chapter number and pointing at the same work.
struct ChapterishAnchors;

impl DiscoveryRule for ChapterishAnchors {
    fn name(&self) -> &'static str {
        "chapterish-anchors"
    }

    fn find(&self, doc: &Html, base: &Url) -> Vec<Candidate> {
        let Ok(selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };
        let base_slug = slug_of(base);

        doc.select(&selector)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                let text = anchor_text(a);
                let candidate = candidate_from_anchor(href, &text, base)?;
                candidate.number?;

                // Stay on the same work when the listing URL carries a slug.
                if let (Some(base_slug), Some(link_slug)) = (&base_slug, slug_of(&candidate.url)) {
                    if !candidate.url.path().contains(base_slug.as_str()) && &link_slug != base_slug
                    {
                        return None;
                    }
                }
                Some(candidate)
            })
            .collect()
    }
}

fn anchor_text(a: scraper::ElementRef) -> String {
    a.text().collect::<String>().trim().to_string()
}

fn candidate_from_anchor(href: &str, text: &str, base: &Url) -> Option<Candidate> {
    let url = resolve_and_normalize(href, base)?;
    if url.as_str() == base.as_str() {
        return None;
    }
    // An explicit "chapter" marker in the URL is authoritative. Without
    // one, prefer the link text: a bare numeric URL segment is usually an
    // opaque page id, not the chapter's number.
    let url_number = chapter_number_in_url(url.as_str());
    let text_number = chapter_number_in_text(text);
    let number = if url.as_str().to_ascii_lowercase().contains("chapter") {
        url_number.or(text_number)
    } else {
        text_number.or(url_number)
    };
    let title = if text.is_empty() {
        match number {
            Some(n) => format!("Chapter {n}"),
            None => url.to_string(),
        }
    } else {
        text.to_string()
    };
    Some(Candidate {
        url,
        title,
        number,
        order: 0,
    })
}

/// Runs the rule registry over one parsed listing page
///
/// Rules run in priority order; the first rule that finds at least
/// `min_links` candidates short-circuits the rest. Below that threshold the
/// results of all rules are union-merged, deduplicated by normalized URL
/// with first-seen candidates winning.
fn candidates_from_html(html: &str, base: &Url, min_links: u32) -> Vec<Candidate> {
    let doc = Html::parse_document(html);
    let rules: [&dyn DiscoveryRule; 2] = [&KnownContainers, &ChapterishAnchors];

    let mut merged: Vec<Candidate> = Vec::new();
    for rule in rules {
        let found = rule.find(&doc, base);
        if !found.is_empty() {
            tracing::debug!(rule = rule.name(), links = found.len(), "discovery rule hit");
        }
        for candidate in found {
            if merged.iter().any(|c| c.url == candidate.url) {
                continue;
            }
            merged.push(candidate);
        }
        if merged.len() >= min_links as usize {
            break;
        }
    }

    for (order, candidate) in merged.iter_mut().enumerate() {
        candidate.order = order;
    }
    merged
}

/// Parses the chapter total a listing reports about itself
///
/// Looks for a count element first, then for a "<number> chapters" phrase
/// anywhere in the page text. The number must be separated from the word by
/// whitespace: link texts concatenate to runs like "Chapter 1Chapter 2",
/// where the digit of one link lands right before the "chapter" of the
/// next, and those never count.
fn reported_total(html: &str) -> Option<u32> {
    let doc = Html::parse_document(html);

    for selector_str in [".chapter-count", "#chapter-count", ".total-chapters"] {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(el) = doc.select(&selector).next() {
            let text = el.text().collect::<String>();
            let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
            if let Ok(n) = digits.parse() {
                return Some(n);
            }
        }
    }

    let text = doc.root_element().text().collect::<String>().to_ascii_lowercase();
    let mut best: Option<u32> = None;
    let mut from = 0;
    while let Some(rel) = text[from..].find("chapter") {
        let at = from + rel;
        let raw = &text[..at];
        let before = raw.trim_end();
        if before.len() < raw.len() {
            let digits: String = before
                .chars()
                .rev()
                .take_while(|c| c.is_ascii_digit())
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            if let Ok(n) = digits.parse::<u32>() {
                best = Some(best.map_or(n, |b: u32| b.max(n)));
            }
        }
        from = at + "chapter".len();
    }
    best
}

/// Orders candidates and assigns their permanent 1-based indices
///
/// Numbered candidates sort by chapter number; unnumbered ones keep their
/// discovery order after the numbered block. The assigned index is the
/// chapter's slot in the final document and never changes afterwards.
fn order_and_index(mut candidates: Vec<Candidate>, limit: u32) -> Vec<ChapterRef> {
    candidates.sort_by_key(|c| (c.number.unwrap_or(u32::MAX), c.order));
    candidates
        .into_iter()
        .take(limit as usize)
        .enumerate()
        .map(|(i, c)| ChapterRef::new(i as u32 + 1, c.title, c.url.to_string()))
        .collect()
}

/// Extrapolates a full chapter range from a sparse sample
///
/// Samples are numbered candidates whose URLs share the same numeric-id
/// pattern. Two or more samples fix the per-chapter id increment, and all
/// of them must lie on that line; a single sample assumes adjacent ids
/// (increment 1). Synthesized refs are flagged [`Inferred`]; the observed
/// samples keep their real titles and stay [`Observed`].
///
/// [`Inferred`]: crate::model::RefOrigin::Inferred
/// [`Observed`]: crate::model::RefOrigin::Observed
fn extrapolate_from_samples(candidates: &[Candidate], target: u32) -> Option<Vec<ChapterRef>> {
    let mut samples: Vec<(u32, NumericIdUrl, &Candidate)> = candidates
        .iter()
        .filter_map(|c| Some((c.number?, split_numeric_id(c.url.as_str())?, c)))
        .collect();
    samples.sort_by_key(|(n, _, _)| *n);
    samples.dedup_by_key(|(n, _, _)| *n);
    if samples.is_empty() {
        return None;
    }

    let (first_n, first_id) = {
        let (n, id, _) = &samples[0];
        (*n, id.clone())
    };

    let increment = if samples.len() == 1 {
        1
    } else {
        let (last_n, last_id, _) = samples.last()?;
        if first_id.prefix != last_id.prefix || first_id.suffix != last_id.suffix {
            return None;
        }

        let span = i64::from(*last_n) - i64::from(first_n);
        let id_span = last_id.id.checked_sub(first_id.id)?;
        if span == 0 || id_span % span != 0 {
            return None;
        }
        let increment = id_span / span;
        if increment == 0 {
            return None;
        }

        // Every sample must lie on the same line.
        for (n, id, _) in &samples {
            let expected = first_id
                .id
                .checked_add(increment.checked_mul(i64::from(*n) - i64::from(first_n))?)?;
            if id.id != expected {
                return None;
            }
        }
        increment
    };

    let refs = (1..=target)
        .map(|n| {
            let id = first_id.id + increment * (i64::from(n) - i64::from(first_n));
            let url = first_id.with_id(id);
            match samples.iter().find(|(sn, _, _)| *sn == n) {
                Some((_, _, observed)) => ChapterRef::new(n, observed.title.clone(), url),
                None => ChapterRef::inferred(n, format!("Chapter {n}"), url),
            }
        })
        .collect();
    Some(refs)
}

/// URLs worth probing for a sub-listing page, derived from the work's slug
fn probe_urls(base: &Url) -> Vec<Url> {
    let mut candidates: Vec<String> = Vec::new();
    if let Some(slug) = slug_of(base) {
        candidates.push(format!("/novel/{slug}"));
        candidates.push(format!("/novel-chapters/{slug}.html"));
    }
    candidates.push(format!("{}/chapters", base.path().trim_end_matches('/')));

    let mut probes = Vec::new();
    for path in candidates {
        let Ok(url) = base.join(&path) else { continue };
        if url.as_str() != base.as_str() && !probes.contains(&url) {
            probes.push(url);
        }
    }
    probes
}

/// Discovers the chapter list for a work
///
/// Runs the rule registry over the listing, probes sub-listing pages when
/// the listing yields fewer than the configured minimum, and extrapolates
/// from a sparse sample when the listing reports more chapters than it
/// shows. The result is ordered, deduplicated, truncated to `limit`, and
/// indexed 1-based.
///
/// # Errors
///
/// [`ScrapeError::DiscoveryEmpty`] when no rule and no probe produces a
/// single chapter link.
pub async fn discover_chapters(
    listing_html: &str,
    base: &Url,
    fetcher: &dyn PageFetcher,
    config: &ScrapeConfig,
    limit: u32,
) -> Result<Vec<ChapterRef>> {
    let min_links = config.min_chapter_links;
    let mut candidates = candidates_from_html(listing_html, base, min_links);

    if candidates.len() < min_links as usize {
        for probe in probe_urls(base) {
            tracing::debug!(url = %probe, "probing sub-listing");
            let Ok(page) = fetcher.fetch(probe.as_str(), Some(base.as_str())).await else {
                continue;
            };
            if !(200..300).contains(&page.status) {
                continue;
            }
            let found = candidates_from_html(&page.body, base, min_links);
            for candidate in found {
                if candidates.iter().all(|c| c.url != candidate.url) {
                    candidates.push(candidate);
                }
            }
            for (order, candidate) in candidates.iter_mut().enumerate() {
                candidate.order = order;
            }
            if candidates.len() >= min_links as usize {
                break;
            }
        }
    }

    if candidates.is_empty() {
        return Err(ScrapeError::DiscoveryEmpty {
            url: base.to_string(),
        });
    }

    // A listing that reports more chapters than it links is a sparse sample.
    // Without a reported total there is nothing to extrapolate toward: the
    // listing is simply shorter than the requested limit.
    if let Some(total) = reported_total(listing_html) {
        let target = total.min(limit);
        if candidates.len() < target as usize {
            if let Some(refs) = extrapolate_from_samples(&candidates, target) {
                tracing::info!(
                    observed = candidates.len(),
                    total = refs.len(),
                    "extrapolated chapter range from sparse sample"
                );
                return Ok(refs);
            }
        }
    }

    Ok(order_and_index(candidates, limit))
}
