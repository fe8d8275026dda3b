//! Integration tests for the acquisition engine
//!
//! These tests use wiremock servers as mirrors and run search, catalog and
//! download end-to-end through the real HTTP transport.

use novel_harvest::config::{Config, StoreKind};
use novel_harvest::content::{Extractor, HtmlExtractor, TitleFilter};
use novel_harvest::crawler::{
    fetch_catalog, search, DownloadJob, DownloadRequest, HttpTransport, SingleResultAcquisition,
    StopSignal, Transport,
};
use novel_harvest::output::OutputFormat;
use novel_harvest::storage::{catalog_key, open_store, ProgressPublisher, Store, StoreExt};
use novel_harvest::{CatalogDocument, FetchError, HarvestError, TaskStatus};
use std::io::Read;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{header_exists, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const HITS_JSON: &str = r#"[
    {"articlename":"剑来","author":"烽火戏诸侯","url_list":"/book/1/","url_img":"/img/1.jpg","intro":"大千世界"},
    {"articlename":"剑来外传","author":"佚名","url_list":"/book/2/","url_img":"","intro":""}
]"#;

const CATALOG_HTML: &str = r#"
    <html><body>
      <div class="info">
        <h1>剑来</h1>
        <div class="small"><span>作者：烽火戏诸侯</span></div>
      </div>
      <div class="listmain"><dl>
        <dd><a href="/book/1/1.html">第一章 惊蛰</a></dd>
        <dd><a href="/book/1/2.html">第二章 开门</a></dd>
        <dd><a href="javascript:dd_show()">展开全部章节</a></dd>
        <dd><a href="/book/1/3.html">第三章 日出</a></dd>
        <dd><a href="/book/1/4.html">第四章 远游</a></dd>
      </dl></div>
    </body></html>
"#;

/// Serves every chapter page with its number in title and body
struct ChapterPages;

impl Respond for ChapterPages {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let n = request
            .url
            .path()
            .trim_start_matches("/book/1/")
            .trim_end_matches(".html")
            .to_string();
        ResponseTemplate::new(200).set_body_string(format!(
            "<html><body><h1>第{}章</h1><div id=\"chaptercontent\">第{}章正文\n<p>  </p>首页\n</div></body></html>",
            n, n
        ))
    }
}

/// Creates a test configuration pointing at the given mirrors
fn create_test_config(endpoints: &[&MockServer], dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.acquisition.endpoints = endpoints.iter().map(|server| server.uri()).collect();
    config.acquisition.max_retries_per_endpoint = 2;
    config.acquisition.retry_delay_ms = 0;
    config.acquisition.download_delay_ms = 0;
    config.acquisition.request_timeout_secs = 5;
    config.output.directory = dir.path().join("books").display().to_string();
    config.output.store = StoreKind::Sqlite;
    config.output.database_path = dir.path().join("harvest.db").display().to_string();
    config
}

fn transport(config: &Config) -> Arc<dyn Transport> {
    Arc::new(HttpTransport::from_config(&config.http, &config.acquisition).unwrap())
}

fn extractor(config: &Config) -> Arc<dyn Extractor> {
    Arc::new(HtmlExtractor::new(&config.selectors, TitleFilter::from_config(&config.filters)).unwrap())
}

#[tokio::test]
async fn test_search_fails_over_to_healthy_mirror() {
    let broken = MockServer::start().await;
    let healthy = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/user/search.html"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&broken)
        .await;

    Mock::given(method("GET"))
        .and(path("/user/search.html"))
        .and(query_param("q", "剑来"))
        .and(query_param("so", "undefined"))
        .and(header_exists("referer"))
        .respond_with(ResponseTemplate::new(200).set_body_string(HITS_JSON))
        .expect(1)
        .mount(&healthy)
        .await;

    let config = create_test_config(&[&broken, &healthy], &dir);
    let store = open_store(&config.output).unwrap();
    let acquisition =
        SingleResultAcquisition::from_config(&config, transport(&config), store.clone()).unwrap();

    let hits = search(&acquisition, "剑来").await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].url_list, "/book/1/");

    // A second search is answered from the store
    let again = search(&acquisition, "剑来").await.unwrap();
    assert_eq!(again, hits);
}

#[tokio::test]
async fn test_empty_sentinel_everywhere_exhausts() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    for server in [&first, &second] {
        Mock::given(method("GET"))
            .and(path("/user/search.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("1"))
            .expect(2)
            .mount(server)
            .await;
    }

    let config = create_test_config(&[&first, &second], &dir);
    let store = open_store(&config.output).unwrap();
    let acquisition =
        SingleResultAcquisition::from_config(&config, transport(&config), store.clone()).unwrap();

    let err = search(&acquisition, "无此书").await.unwrap_err();
    match err {
        HarvestError::Exhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 4);
            assert!(matches!(last_error, FetchError::EmptySentinel { .. }));
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_catalog_then_download_text_and_epub() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/user/search.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(HITS_JSON))
        .mount(&first)
        .await;
    Mock::given(method("GET"))
        .and(path("/book/1/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CATALOG_HTML))
        .mount(&first)
        .await;

    // Chapter 4 lands on the second mirror (position 3), which fails it
    Mock::given(method("GET"))
        .and(path("/book/1/4.html"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&second)
        .await;
    for server in [&first, &second] {
        Mock::given(method("GET"))
            .and(path_regex(r"^/book/1/\d+\.html$"))
            .respond_with(ChapterPages)
            .mount(server)
            .await;
    }

    let config = create_test_config(&[&first, &second], &dir);
    let store = open_store(&config.output).unwrap();
    let acquisition =
        SingleResultAcquisition::from_config(&config, transport(&config), store.clone()).unwrap();

    let catalog = fetch_catalog(&acquisition, extractor(&config), "剑来", 1)
        .await
        .unwrap();
    assert_eq!(catalog.novel_info.novel_title, "剑来");
    assert_eq!(catalog.novel_info.total_chapters, 4);
    let stored: CatalogDocument = store.get_json(&catalog_key("剑来")).unwrap().unwrap();
    assert_eq!(stored, catalog);

    let config = Arc::new(config);
    let job = DownloadJob::from_config(config.clone(), transport(&config), store.clone()).unwrap();

    let report = job
        .run(
            DownloadRequest {
                task_id: Some("txt-task".to_string()),
                ..DownloadRequest::new("剑来")
            },
            StopSignal::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.progress.status, TaskStatus::Completed);
    assert_eq!(report.progress.current, 4);
    assert_eq!(report.progress.percentage, 100);
    assert_eq!(report.progress.failed_chapters.len(), 1);
    assert!(report.progress.failed_chapters[0].ends_with("/book/1/4.html"));

    let text = std::fs::read_to_string(&report.output.unwrap().path).unwrap();
    assert!(text.starts_with("剑来\n作者：烽火戏诸侯\n"));
    assert!(text.contains("\u{3000}\u{3000}第2章正文"));
    assert!(!text.contains("首页"));

    let published = store.load_progress("txt-task").unwrap().unwrap();
    assert_eq!(published.status, TaskStatus::Completed);

    let report = job
        .run(
            DownloadRequest {
                start: 2,
                end: 3,
                format: OutputFormat::Epub,
                task_id: Some("epub-task".to_string()),
                ..DownloadRequest::new("剑来")
            },
            StopSignal::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.progress.status, TaskStatus::Completed);
    assert_eq!(report.progress.total, 2);
    assert!(report.progress.failed_chapters.is_empty());

    let output = report.output.unwrap();
    assert_eq!(output.chapters_written, 2);
    let file = std::fs::File::open(&output.path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut first_chapter = String::new();
    archive
        .by_name("OEBPS/chapter_00002.xhtml")
        .unwrap()
        .read_to_string(&mut first_chapter)
        .unwrap();
    assert!(first_chapter.contains("第2章正文"));
    assert!(archive.by_name("OEBPS/chapter_00004.xhtml").is_err());
}

#[tokio::test]
async fn test_download_without_catalog_publishes_failure() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = Arc::new(create_test_config(&[&server], &dir));
    let store: Arc<dyn Store> = open_store(&config.output).unwrap();
    let job = DownloadJob::from_config(config.clone(), transport(&config), store.clone()).unwrap();

    let err = job
        .run(
            DownloadRequest {
                task_id: Some("missing".to_string()),
                ..DownloadRequest::new("不存在")
            },
            StopSignal::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::CatalogMissing { .. }));
    let progress = store.load_progress("missing").unwrap().unwrap();
    assert_eq!(progress.status, TaskStatus::Failed);
    assert_eq!(progress.current, 0);
}
