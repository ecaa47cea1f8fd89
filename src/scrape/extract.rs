//! Content extraction cascade
//!
//! No single extraction strategy works across sources, so a fixed-priority
//! cascade of independent strategies runs until one produces usable text.
//! Each strategy is a pure function over the parsed page with no shared
//! state, so every one can be unit-tested alone. Sanitization is a separate
//! pass applied to whatever a strategy returns.

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// Minimum sanitized body length for an extraction to count
const MIN_CONTENT_LEN: usize = 200;

/// Paragraphs shorter than this are navigation crumbs, not prose
const MIN_PARAGRAPH_LEN: usize = 20;

/// Body substrings that mark a page as serving no real content
const UNAVAILABLE_SENTINELS: [&str; 3] = [
    "[content unavailable",
    "no readable content",
    "chapter content not available",
];

/// Phrases that identify boilerplate paragraphs rather than prose
const BOILERPLATE_PHRASES: [&str; 8] = [
    "use arrow keys",
    "previous chapter",
    "next chapter",
    "prev chapter",
    "subscribe",
    "advertisement",
    "please support",
    "read latest chapters at",
];

/// Subtrees that never contain chapter prose
const SKIP_TAGS: [&str; 10] = [
    "script", "style", "nav", "header", "footer", "aside", "form", "iframe", "noscript", "button",
];

/// Known content-container selectors, most specific first
const CONTENT_SELECTORS: [&str; 9] = [
    "#chapter-content",
    ".chapter-content",
    ".chapter-body",
    ".chr-c",
    ".cha-words",
    ".text-content",
    "div.text",
    "article",
    ".content",
];

/// One way of turning a fetched page into chapter text
///
/// Pure: same document in, same paragraphs out, no shared mutable state.
/// Returns the raw candidate paragraphs; sanitization happens outside.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Extracts candidate paragraphs, or None when this strategy does not
    /// apply to the page
    fn extract(&self, doc: &Html) -> Option<Vec<String>>;
}

/// Strategy 1: known content-container selectors
///
/// The fast path for sources whose markup follows one of the common chapter
/// container conventions.
pub struct StructuralSelector;

impl ExtractionStrategy for StructuralSelector {
    fn name(&self) -> &'static str {
        "structural-selector"
    }

    fn extract(&self, doc: &Html) -> Option<Vec<String>> {
        for selector_str in CONTENT_SELECTORS {
            let Ok(selector) = Selector::parse(selector_str) else {
                continue;
            };
            let Some(container) = doc.select(&selector).next() else {
                continue;
            };

            let paragraphs = paragraphs_of(container);
            let total: usize = paragraphs.iter().map(String::len).sum();
            if total > 100 {
                return Some(paragraphs);
            }
        }
        None
    }
}

/// Strategy 2: paragraph-density scoring
///
/// Scores every block container by paragraph count times text length and
/// takes the paragraphs of the densest one. Finds the content column on
/// pages with unknown markup.
pub struct ParagraphDensity;

impl ExtractionStrategy for ParagraphDensity {
    fn name(&self) -> &'static str {
        "paragraph-density"
    }

    fn extract(&self, doc: &Html) -> Option<Vec<String>> {
        let blocks = Selector::parse("div, article, section, main").ok()?;
        let p = Selector::parse("p").ok()?;

        let mut best: Option<ElementRef> = None;
        let mut best_score = 0usize;

        for block in doc.select(&blocks) {
            let paragraph_count = block.select(&p).count();
            let text_len = visible_text(block).len();
            let score = paragraph_count * text_len;

            if score > best_score && text_len > 500 {
                best_score = score;
                best = Some(block);
            }
        }

        let best = best?;
        Some(
            best.select(&p)
                .map(|el| el.text().collect::<String>())
                .collect(),
        )
    }
}

/// Strategy 3: brute-force line harvesting
///
/// Last resort for pages with no usable structure at all: take every visible
/// text line of the body that is long enough to be prose.
pub struct BruteForceLines;

impl ExtractionStrategy for BruteForceLines {
    fn name(&self) -> &'static str {
        "brute-force-lines"
    }

    fn extract(&self, doc: &Html) -> Option<Vec<String>> {
        let body = Selector::parse("body").ok()?;
        let body = doc.select(&body).next()?;

        let lines: Vec<String> = visible_text(body)
            .lines()
            .map(str::trim)
            .filter(|line| line.len() > 30)
            .filter(|line| {
                let lower = line.to_ascii_lowercase();
                !["previous", "next", "chapter", "menu", "home"]
                    .iter()
                    .any(|prefix| lower.starts_with(prefix))
            })
            .map(str::to_string)
            .collect();

        if lines.len() < 5 {
            return None;
        }
        Some(lines)
    }
}

/// The fixed-priority strategy cascade
pub fn default_cascade() -> Vec<Box<dyn ExtractionStrategy>> {
    vec![
        Box::new(StructuralSelector),
        Box::new(ParagraphDensity),
        Box::new(BruteForceLines),
    ]
}

/// An accepted extraction
#[derive(Debug, Clone)]
pub struct Extracted {
    /// Chapter title from the page, when one was found
    pub title: Option<String>,

    /// Sanitized chapter body as paragraph markup
    pub body: String,

    /// Name of the strategy that produced the body
    pub strategy: &'static str,
}

/// Runs the cascade over a fetched page body
///
/// The first strategy whose sanitized output is long enough and free of
/// "unavailable" sentinels wins; None means the cascade is exhausted and the
/// chapter counts as an extraction failure.
pub fn extract_chapter(html: &str) -> Option<Extracted> {
    let doc = Html::parse_document(html);
    let title = extract_chapter_title(&doc);

    for strategy in default_cascade() {
        let Some(paragraphs) = strategy.extract(&doc) else {
            continue;
        };
        let paragraphs = sanitize_paragraphs(paragraphs);
        let text_len: usize = paragraphs.iter().map(String::len).sum();
        if text_len < MIN_CONTENT_LEN {
            continue;
        }

        let body = render_paragraphs(&paragraphs);
        let lower = body.to_ascii_lowercase();
        if UNAVAILABLE_SENTINELS.iter().any(|s| lower.contains(s)) {
            continue;
        }

        tracing::trace!(strategy = strategy.name(), text_len, "extraction accepted");
        return Some(Extracted {
            title,
            body,
            strategy: strategy.name(),
        });
    }

    None
}

/// Sanitization pass, independent of the producing strategy
///
/// Collapses whitespace, drops sub-threshold paragraphs, and drops known
/// boilerplate (navigation hints, prev/next links, subscribe prompts).
pub fn sanitize_paragraphs(paragraphs: Vec<String>) -> Vec<String> {
    paragraphs
        .into_iter()
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| p.len() >= MIN_PARAGRAPH_LEN)
        .filter(|p| {
            let lower = p.to_ascii_lowercase();
            !BOILERPLATE_PHRASES.iter().any(|phrase| lower.contains(phrase))
        })
        .collect()
}

fn render_paragraphs(paragraphs: &[String]) -> String {
    paragraphs
        .iter()
        .map(|p| format!("<p>{p}</p>"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extracts the chapter title from a chapter page
pub fn extract_chapter_title(doc: &Html) -> Option<String> {
    for selector_str in [".chapter-title", "h1.chapter-title", "h1", "h2"] {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(el) = doc.select(&selector).next() {
            let title = el.text().collect::<String>().trim().to_string();
            if !title.is_empty() {
                return Some(title);
            }
        }
    }
    None
}

/// Extracts the work title from a listing page
///
/// Tries the usual heading conventions, then the og:title meta (trimming the
/// site-name suffix sites append after " - " or " | ").
pub fn extract_work_title(doc: &Html) -> Option<String> {
    for selector_str in ["h1.novel-title", ".novel-info h1", ".title", "h1"] {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(el) = doc.select(&selector).next() {
            let title = el.text().collect::<String>().trim().to_string();
            if !title.is_empty() {
                return Some(title);
            }
        }
    }

    let og = Selector::parse(r#"meta[property="og:title"]"#).ok()?;
    let content = doc.select(&og).next()?.value().attr("content")?;
    let title = content
        .split(" - ")
        .next()
        .unwrap_or(content)
        .split(" | ")
        .next()
        .unwrap_or(content)
        .trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Collects the text of a subtree, skipping non-content elements
fn visible_text(root: ElementRef) -> String {
    let mut out = String::new();
    collect_text(root, &mut out);
    out
}

fn collect_text(el: ElementRef, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => {
                if SKIP_TAGS.contains(&element.name()) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Paragraph texts of a container, falling back to its visible text when it
/// holds no `<p>` elements
fn paragraphs_of(container: ElementRef) -> Vec<String> {
    let Ok(p) = Selector::parse("p") else {
        return Vec::new();
    };
    let paragraphs: Vec<String> = container
        .select(&p)
        .map(|el| el.text().collect::<String>())
        .collect();

    if paragraphs.is_empty() {
        visible_text(container)
            .lines()
            .map(str::to_string)
            .collect()
    } else {
        paragraphs
    }
}
