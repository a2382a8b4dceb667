mod common;

use common::{Route, TestServer, ARTICLE_HTML};
use page_summarizer::{
    ContentLimits, DocumentLoader, FetcherConfig, HttpLoader, LoaderKind, SummarizeError,
};
use std::time::Duration;

#[tokio::test]
async fn test_loads_html_as_one_document() {
    let server = TestServer::start(vec![("/article", Route::html(ARTICLE_HTML))]).await;
    let loader = HttpLoader::new().unwrap();

    let docs = loader.load(&server.url("/article")).await.unwrap();

    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc.metadata.loader, LoaderKind::Http);
    assert_eq!(doc.metadata.source, server.url("/article"));
    assert_eq!(doc.metadata.title.as_deref(), Some("Understanding Ownership"));
    assert!(doc
        .page_content
        .contains("Ownership is the set of rules that govern how a program manages memory."));
    assert!(doc.page_content.contains("Moves transfer ownership\n\nBorrows lend access"));
    assert!(!doc.page_content.contains("console.log"));
    assert!(!doc.page_content.contains("font-family"));
}

#[tokio::test]
async fn test_plain_text_is_used_verbatim() {
    let server = TestServer::start(vec![(
        "/notes.txt",
        Route::text("  line one\n\nline two  \n"),
    )])
    .await;
    let loader = HttpLoader::new().unwrap();

    let docs = loader.load(&server.url("/notes.txt")).await.unwrap();

    assert_eq!(docs[0].page_content, "line one\n\nline two");
    assert!(docs[0].metadata.title.is_none());
}

#[tokio::test]
async fn test_missing_content_type_treated_as_html() {
    let mut route = Route::html("<html><body><p>No header here</p></body></html>");
    route.content_type = None;
    let server = TestServer::start(vec![("/", route)]).await;
    let loader = HttpLoader::new().unwrap();

    let docs = loader.load(&server.url("/")).await.unwrap();
    assert_eq!(docs[0].page_content, "No header here");
}

#[tokio::test]
async fn test_blank_page_is_empty_content() {
    let server = TestServer::start(vec![(
        "/blank",
        Route::html("<html><body><script>render()</script></body></html>"),
    )])
    .await;
    let loader = HttpLoader::new().unwrap();

    let err = loader.load(&server.url("/blank")).await.unwrap_err();
    assert!(matches!(err, SummarizeError::EmptyContent(url) if url.ends_with("/blank")));
}

#[tokio::test]
async fn test_status_errors() {
    let server = TestServer::start(vec![
        ("/forbidden", Route::status(403)),
        ("/broken", Route::status(503)),
    ])
    .await;
    let loader = HttpLoader::new().unwrap();

    match loader.load(&server.url("/missing")).await {
        Err(SummarizeError::NotFound(msg)) => assert!(msg.contains("/missing")),
        other => panic!("Expected NotFound, got {other:?}"),
    }
    assert!(matches!(
        loader.load(&server.url("/forbidden")).await,
        Err(SummarizeError::ClientError { status: 403, .. })
    ));
    assert!(matches!(
        loader.load(&server.url("/broken")).await,
        Err(SummarizeError::ServerError { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_content_type_and_size_limits() {
    let server = TestServer::start(vec![
        ("/file.pdf", Route::html("%PDF-1.7").with_content_type("application/pdf")),
        ("/big", Route::html("x".repeat(2048))),
    ])
    .await;
    let loader = HttpLoader::new_with_config(FetcherConfig {
        limits: ContentLimits {
            max_content_size: 1024,
            ..ContentLimits::default()
        },
        ..FetcherConfig::default()
    })
    .unwrap();

    assert!(matches!(
        loader.load(&server.url("/file.pdf")).await,
        Err(SummarizeError::InvalidContentType(ct)) if ct == "application/pdf"
    ));
    assert!(matches!(
        loader.load(&server.url("/big")).await,
        Err(SummarizeError::ContentTooLarge { size: 2048, limit: 1024 })
    ));
}

#[tokio::test]
async fn test_size_limit_applies_while_streaming() {
    let server = TestServer::start(vec![("/stream", Route::html("y".repeat(8 * 512)).chunked())]).await;
    let loader = HttpLoader::new_with_config(FetcherConfig {
        limits: ContentLimits {
            max_content_size: 1024,
            ..ContentLimits::default()
        },
        ..FetcherConfig::default()
    })
    .unwrap();

    match loader.load(&server.url("/stream")).await {
        Err(SummarizeError::ContentTooLarge { size, limit }) => {
            assert_eq!(limit, 1024);
            assert!(size > 1024 && size < 8 * 512, "stopped after {size} bytes");
        }
        other => panic!("Expected ContentTooLarge, got {other:?}"),
    }
}

#[tokio::test]
async fn test_chunked_body_within_limit() {
    let body = format!("<html><body><p>{}</p></body></html>", "word ".repeat(300));
    let server = TestServer::start(vec![("/stream", Route::html(body).chunked())]).await;
    let loader = HttpLoader::new().unwrap();

    let docs = loader.load(&server.url("/stream")).await.unwrap();
    assert_eq!(docs[0].page_content.split_whitespace().count(), 300);
}

#[tokio::test]
async fn test_timeout() {
    let server = TestServer::start(vec![(
        "/slow",
        Route::html("<p>late</p>").with_delay(Duration::from_secs(2)),
    )])
    .await;
    let loader = HttpLoader::new_with_config(FetcherConfig {
        timeout: Duration::from_millis(200),
        ..FetcherConfig::default()
    })
    .unwrap();

    assert!(matches!(
        loader.load(&server.url("/slow")).await,
        Err(SummarizeError::TimeoutError(_))
    ));
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let loader = HttpLoader::new().unwrap();
    let err = loader.load(&format!("http://{addr}/")).await.unwrap_err();
    assert!(matches!(err, SummarizeError::ConnectionError(_)));
}
