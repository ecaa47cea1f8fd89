//! Document assembly and the raw HTML sink
//!
//! Workers write results into pre-assigned slots; assembly collapses those
//! slots into a [`Document`] whose chapter order is exactly discovery order.
//! The assembled document can be rendered to a single self-contained HTML
//! file, the input format the downstream packagers consume.

use crate::model::{
    ChapterContent, ChapterRef, ChapterStatus, Document, FailureReason, JobSummary,
};
use crate::Result;
use std::path::{Path, PathBuf};

/// Listing-page metadata attached to the assembled document
#[derive(Debug, Clone)]
pub struct DocumentMeta {
    pub title: String,
    pub author: String,
    pub cover_url: Option<String>,
}

impl Default for DocumentMeta {
    fn default() -> Self {
        Self {
            title: "Untitled".to_string(),
            author: "Unknown".to_string(),
            cover_url: None,
        }
    }
}

/// Collapses filled slots into the final document and its summary
///
/// `slots[i]` holds the result for `refs[i]`; a slot nothing wrote (which a
/// completed pass does not produce) becomes a zero-attempt placeholder so
/// the chapter keeps its position either way. The output order is slot
/// order, never completion order.
pub fn assemble(
    meta: DocumentMeta,
    refs: &[ChapterRef],
    slots: Vec<Option<ChapterContent>>,
) -> (Document, JobSummary) {
    let chapters: Vec<ChapterContent> = refs
        .iter()
        .zip(slots)
        .map(|(chapter, slot)| {
            slot.unwrap_or_else(|| {
                ChapterContent::placeholder(chapter.clone(), FailureReason::Blocked, 0)
            })
        })
        .collect();

    let summary = JobSummary::from_chapters(&chapters);
    let document = Document {
        title: meta.title,
        author: meta.author,
        cover_url: meta.cover_url,
        chapters,
    };
    (document, summary)
}

/// Renders the document as one self-contained HTML file
pub fn render_html(document: &Document) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", document.title));
    html.push_str(&format!(
        "<meta name=\"author\" content=\"{}\">\n",
        document.author
    ));
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<h1>{}</h1>\n", document.title));
    html.push_str(&format!("<p class=\"author\">by {}</p>\n", document.author));
    if let Some(cover) = &document.cover_url {
        html.push_str(&format!("<img class=\"cover\" src=\"{cover}\">\n"));
    }

    for content in &document.chapters {
        html.push_str(&format!(
            "<section class=\"chapter\" id=\"chapter-{}\">\n",
            content.chapter.index
        ));
        // Failed placeholders already carry their own heading.
        if content.status == ChapterStatus::Success {
            html.push_str(&format!("<h2>{}</h2>\n", content.chapter.title));
        }
        html.push_str(&content.body);
        html.push_str("\n</section>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Writes the rendered document under `dir`, creating it as needed
pub fn write_document(dir: &Path, document: &Document) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.html", filename_slug(&document.title)));
    std::fs::write(&path, render_html(document))?;
    tracing::info!(path = %path.display(), chapters = document.chapters.len(), "document written");
    Ok(path)
}

/// Filesystem-safe stem derived from the document title
fn filename_slug(title: &str) -> String {
    let slug: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    let collapsed = slug
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if collapsed.is_empty() {
        "book".to_string()
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(count: u32) -> Vec<ChapterRef> {
        (1..=count)
            .map(|n| ChapterRef::new(n, format!("Chapter {n}"), format!("https://x/{n}")))
            .collect()
    }

    fn success(chapter: &ChapterRef) -> ChapterContent {
        ChapterContent::success(chapter.clone(), format!("<p>body {}</p>", chapter.index), 1)
    }

    #[test]
    fn test_assemble_keeps_slot_order() {
        let refs = refs(4);
        // Slots filled out of completion order, as concurrent passes do
        let slots = vec![
            Some(success(&refs[0])),
            Some(ChapterContent::placeholder(
                refs[1].clone(),
                FailureReason::Timeout,
                13,
            )),
            Some(success(&refs[2])),
            Some(success(&refs[3])),
        ];

        let (document, summary) = assemble(DocumentMeta::default(), &refs, slots);

        for (i, content) in document.chapters.iter().enumerate() {
            assert_eq!(content.chapter.index as usize, i + 1);
        }
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failed_chapters[0].index, 2);
    }

    #[test]
    fn test_unfilled_slot_becomes_placeholder() {
        let refs = refs(2);
        let slots = vec![Some(success(&refs[0])), None];

        let (document, summary) = assemble(DocumentMeta::default(), &refs, slots);

        assert_eq!(document.chapters.len(), 2);
        assert_eq!(document.chapters[1].status, ChapterStatus::Failed);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_render_html_contains_chapters_in_order() {
        let refs = refs(3);
        let slots = refs.iter().map(|r| Some(success(r))).collect();
        let (document, _) = assemble(
            DocumentMeta {
                title: "Shadow of the Ridge".to_string(),
                author: "A. Writer".to_string(),
                cover_url: None,
            },
            &refs,
            slots,
        );

        let html = render_html(&document);
        assert!(html.contains("<title>Shadow of the Ridge</title>"));
        let first = html.find("id=\"chapter-1\"").unwrap();
        let second = html.find("id=\"chapter-2\"").unwrap();
        let third = html.find("id=\"chapter-3\"").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_write_document_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let refs = refs(1);
        let (document, _) = assemble(
            DocumentMeta {
                title: "My: Test / Book!".to_string(),
                ..DocumentMeta::default()
            },
            &refs,
            vec![Some(success(&refs[0]))],
        );

        let path = write_document(dir.path(), &document).unwrap();
        assert_eq!(path.file_name().unwrap(), "my-test-book.html");
        assert!(std::fs::read_to_string(path).unwrap().contains("body 1"));
    }

    #[test]
    fn test_filename_slug() {
        assert_eq!(filename_slug("Shadow of the Ridge"), "shadow-of-the-ridge");
        assert_eq!(filename_slug("  ??!  "), "book");
    }
}
