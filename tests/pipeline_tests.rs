//! Integration tests for the scraping pipeline
//!
//! These tests use wiremock to stand up a mock source site and run whole
//! jobs end-to-end: discovery, batched fetching with retries, the recovery
//! pass, and document assembly.

use std::sync::Arc;
use std::time::Duration;
use webtome::config::{Config, FetchConfig, OutputConfig, RetryConfig, ScrapeConfig};
use webtome::model::RefOrigin;
use webtome::scrape::{Coordinator, JobOptions, PageFetcher, RenderedFetcher};
use webtome::{ChapterStatus, ScrapeError};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration tuned for fast runs against a local mock
fn test_config() -> Config {
    Config {
        scrape: ScrapeConfig {
            max_chapters: 25,
            batch_size: 8,
            batch_pause_ms: 10,
            min_chapter_links: 5,
        },
        fetch: FetchConfig {
            timeout_secs: 5,
            max_redirects: 5,
            max_in_flight: 12,
            min_dispatch_interval_ms: 0,
            // Mock pages are small; the production floor would flag them all
            min_plausible_body: 50,
            render_settle_secs: 0,
        },
        retry: RetryConfig {
            pass1_attempts: 2,
            pass2_attempts: 2,
            second_pass_ceiling: 50,
        },
        output: OutputConfig {
            document_dir: "./books".to_string(),
            progress_interval_secs: 1,
        },
    }
}

fn chapter_page(n: u32) -> String {
    let prose =
        format!("Chapter {n} prose: the caravan crossed the ridge before the sun was fully up. ")
            .repeat(6);
    format!(
        "<html><body><h1>Chapter {n}: Waypoint</h1>\
         <div class=\"chapter-content\"><p>{prose}</p><p>{prose}</p></div></body></html>"
    )
}

fn listing_page(base: &str, chapters: u32) -> String {
    let links: String = (1..=chapters)
        .map(|n| format!("<li><a href=\"{base}/novel/ridge/chapter-{n}\">Chapter {n}</a></li>"))
        .collect();
    format!(
        "<html><body><h1 class=\"novel-title\">Shadow of the Ridge</h1>\
         <ul class=\"chapter-list\">{links}</ul></body></html>"
    )
}

async fn mount_listing(server: &MockServer, chapters: u32) {
    let body = listing_page(&server.uri(), chapters);
    Mock::given(method("GET"))
        .and(path("/novel/ridge"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_chapter(server: &MockServer, n: u32) {
    Mock::given(method("GET"))
        .and(path(format!("/novel/ridge/chapter-{n}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(chapter_page(n)))
        .mount(server)
        .await;
}

fn coordinator(config: Config) -> Coordinator {
    Coordinator::new(config).expect("coordinator construction")
}

fn job(server: &MockServer) -> JobOptions {
    JobOptions {
        url: format!("{}/novel/ridge", server.uri()),
        limit: Some(6),
        title_override: None,
    }
}

#[tokio::test]
async fn test_full_job_end_to_end() {
    let server = MockServer::start().await;
    mount_listing(&server, 6).await;
    for n in 1..=6 {
        mount_chapter(&server, n).await;
    }

    let outcome = coordinator(test_config()).run(job(&server)).await.unwrap();

    assert_eq!(outcome.document.title, "Shadow of the Ridge");
    // Author is the metadata collaborator's job; the pipeline leaves the
    // placeholder
    assert_eq!(outcome.document.author, "Unknown");
    assert_eq!(outcome.document.chapters.len(), 6);
    assert_eq!(outcome.summary.succeeded, 6);
    assert_eq!(outcome.summary.failed, 0);
    for (i, content) in outcome.document.chapters.iter().enumerate() {
        assert_eq!(content.chapter.index as usize, i + 1);
        assert!(content.body.contains(&format!("Chapter {} prose", i + 1)));
    }
}

#[tokio::test]
async fn test_document_order_unaffected_by_response_timing() {
    let server = MockServer::start().await;
    mount_listing(&server, 6).await;

    // Earlier chapters answer slower, so completion order is reversed.
    for n in 1..=6u32 {
        Mock::given(method("GET"))
            .and(path(format!("/novel/ridge/chapter-{n}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(chapter_page(n))
                    .set_delay(Duration::from_millis(u64::from(7 - n) * 40)),
            )
            .mount(&server)
            .await;
    }

    let outcome = coordinator(test_config()).run(job(&server)).await.unwrap();

    for (i, content) in outcome.document.chapters.iter().enumerate() {
        assert_eq!(content.chapter.index as usize, i + 1);
        assert!(content.is_success());
        assert!(content.body.contains(&format!("Chapter {} prose", i + 1)));
    }
}

#[tokio::test]
async fn test_permanent_failures_become_placeholders_in_position() {
    let server = MockServer::start().await;
    mount_listing(&server, 10).await;
    for n in [1u32, 3, 4, 6, 7, 8, 9, 10] {
        mount_chapter(&server, n).await;
    }
    for n in [2u32, 5] {
        Mock::given(method("GET"))
            .and(path(format!("/novel/ridge/chapter-{n}")))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
    }

    let mut config = test_config();
    // No recovery pass; these failures are permanent either way
    config.retry.second_pass_ceiling = 0;

    let outcome = coordinator(config)
        .run(JobOptions {
            url: format!("{}/novel/ridge", server.uri()),
            limit: Some(10),
            title_override: None,
        })
        .await
        .unwrap();

    assert_eq!(outcome.document.chapters.len(), 10);
    assert_eq!(outcome.summary.succeeded, 8);
    assert_eq!(outcome.summary.failed, 2);

    for failed_index in [2usize, 5] {
        let content = &outcome.document.chapters[failed_index - 1];
        assert_eq!(content.status, ChapterStatus::Failed);
        assert_eq!(content.chapter.index as usize, failed_index);
        // The placeholder keeps the source URL for manual follow-up
        assert!(content
            .body
            .contains(&format!("/novel/ridge/chapter-{failed_index}")));
    }

    let indices: Vec<u32> = outcome
        .summary
        .failed_chapters
        .iter()
        .map(|f| f.index)
        .collect();
    assert_eq!(indices, vec![2, 5]);
}

#[tokio::test]
async fn test_recovery_pass_rescues_transient_failure() {
    let server = MockServer::start().await;
    mount_listing(&server, 6).await;
    for n in [1u32, 2, 4, 5, 6] {
        mount_chapter(&server, n).await;
    }

    // Chapter 3 fails exactly as often as the first-pass budget, then
    // recovers. Blocked responses escalate to the rendered path, so each
    // attempt costs two requests.
    Mock::given(method("GET"))
        .and(path("/novel/ridge/chapter-3"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(4)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/novel/ridge/chapter-3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(chapter_page(3)))
        .mount(&server)
        .await;

    let outcome = coordinator(test_config()).run(job(&server)).await.unwrap();

    assert_eq!(outcome.summary.succeeded, 6);
    let third = &outcome.document.chapters[2];
    assert!(third.is_success());
    // Two first-pass attempts plus the recovering third
    assert_eq!(third.attempts, 3);
}

#[tokio::test]
async fn test_cancellation_stops_dispatch_and_yields_no_document() {
    let server = MockServer::start().await;
    mount_listing(&server, 6).await;
    for n in 1..=6u32 {
        Mock::given(method("GET"))
            .and(path(format!("/novel/ridge/chapter-{n}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(chapter_page(n))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;
    }

    let mut config = test_config();
    config.scrape.batch_size = 2;

    let coordinator = coordinator(config);
    let cancel = coordinator.cancel_flag();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel.cancel();
    });

    let result = coordinator.run(job(&server)).await;
    assert!(matches!(result, Err(ScrapeError::Cancelled)));

    // Batch one was in flight when the flag flipped; later batches never
    // dispatched.
    let chapter_requests = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().contains("/chapter-"))
        .count();
    assert!(chapter_requests <= 2, "got {chapter_requests} chapter requests");
}

#[tokio::test]
async fn test_empty_listing_is_a_job_error() {
    let server = MockServer::start().await;
    let body = format!(
        "<html><body><h1>Shadow of the Ridge</h1><p>{}</p></body></html>",
        "No chapters here. ".repeat(20)
    );
    Mock::given(method("GET"))
        .and(path("/novel/ridge"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let result = coordinator(test_config()).run(job(&server)).await;
    assert!(matches!(result, Err(ScrapeError::DiscoveryEmpty { .. })));
}

#[tokio::test]
async fn test_short_listing_without_reported_total_is_not_padded() {
    let server = MockServer::start().await;
    // 6 real chapters, no "N chapters" count anywhere, limit above both.
    mount_listing(&server, 6).await;
    for n in 1..=6 {
        mount_chapter(&server, n).await;
    }

    let outcome = coordinator(test_config())
        .run(JobOptions {
            url: format!("{}/novel/ridge", server.uri()),
            limit: Some(10),
            title_override: None,
        })
        .await
        .unwrap();

    // The work just ends at chapter 6; nothing gets synthesized to fill
    // the remaining limit.
    assert_eq!(outcome.document.chapters.len(), 6);
    assert_eq!(outcome.summary.succeeded, 6);
    assert!(outcome
        .document
        .chapters
        .iter()
        .all(|c| c.chapter.origin == RefOrigin::Observed));
}

#[tokio::test]
async fn test_sparse_listing_extrapolates_inferred_chapters() {
    let server = MockServer::start().await;
    let base = server.uri();

    // The listing links only chapters 1 and 40 but reports 40 chapters;
    // ids advance by 100 per chapter.
    let body = format!(
        "<html><body><h1 class=\"novel-title\">Shadow of the Ridge</h1>\
         <p>40 chapters</p>\
         <ul class=\"chapter-list\">\
         <li><a href=\"{base}/book/7/1000\">Chapter 1</a></li>\
         <li><a href=\"{base}/book/7/4900\">Chapter 40</a></li>\
         </ul></body></html>"
    );
    Mock::given(method("GET"))
        .and(path("/novel/ridge"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/book/7/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(chapter_page(1)))
        .mount(&server)
        .await;

    let outcome = coordinator(test_config())
        .run(JobOptions {
            url: format!("{base}/novel/ridge"),
            limit: Some(10),
            title_override: None,
        })
        .await
        .unwrap();

    assert_eq!(outcome.document.chapters.len(), 10);
    assert_eq!(outcome.summary.succeeded, 10);

    let refs: Vec<_> = outcome.document.chapters.iter().map(|c| &c.chapter).collect();
    assert_eq!(refs[0].origin, RefOrigin::Observed);
    assert!(refs[1..].iter().all(|r| r.origin == RefOrigin::Inferred));
    assert!(refs[1].url.ends_with("/book/7/1100"));
    assert!(refs[9].url.ends_with("/book/7/1900"));
}

#[tokio::test]
async fn test_progress_callback_receives_throttled_ticks() {
    let server = MockServer::start().await;
    mount_listing(&server, 6).await;
    for n in 1..=6 {
        mount_chapter(&server, n).await;
    }

    let ticks = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&ticks);
    let coordinator = Coordinator::new(test_config())
        .expect("coordinator construction")
        .with_progress(move |completed, total| {
            sink.lock().unwrap().push((completed, total));
        });

    coordinator.run(job(&server)).await.unwrap();

    let ticks = ticks.lock().unwrap();
    assert!(!ticks.is_empty());
    // The terminal tick always reaches the callback, throttle or not.
    assert_eq!(*ticks.last().unwrap(), (6, 6));
    assert!(ticks.windows(2).all(|pair| pair[0].0 <= pair[1].0));
}

#[tokio::test]
async fn test_rendered_fetch_settles_after_navigation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/novel/ridge"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let mut config = test_config();
    config.fetch.render_settle_secs = 1;
    let fetcher = RenderedFetcher::new(&config.fetch).unwrap();

    let url = format!("{}/novel/ridge", server.uri());
    let handle = tokio::spawn(async move { fetcher.fetch(&url, None).await });

    // The request goes out right away; only the settle window follows it.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    let page = handle.await.unwrap().unwrap();
    assert_eq!(page.status, 200);
}

#[tokio::test]
async fn test_title_override_wins_over_listing() {
    let server = MockServer::start().await;
    mount_listing(&server, 6).await;
    for n in 1..=6 {
        mount_chapter(&server, n).await;
    }

    let outcome = coordinator(test_config())
        .run(JobOptions {
            url: format!("{}/novel/ridge", server.uri()),
            limit: Some(6),
            title_override: Some("My Chosen Title".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(outcome.document.title, "My Chosen Title");
}
