use serde::Deserialize;

/// Main configuration structure for Novel-Harvest
///
/// Every section falls back to the defaults of the public mirror network,
/// so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Mirror selection, retry and concurrency settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Base URLs of the interchangeable mirrors, in failover order
    pub endpoints: Vec<String>,

    /// Index into `endpoints` where single-result lookups start
    #[serde(rename = "default-endpoint")]
    pub default_endpoint: usize,

    /// Attempts against one endpoint before failing over to the next
    #[serde(rename = "max-retries-per-endpoint")]
    pub max_retries_per_endpoint: u32,

    /// Pause between failover attempts (milliseconds)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Maximum chapter fetches in flight
    #[serde(rename = "request-concurrency")]
    pub request_concurrency: u32,

    /// Capacity of the output write queue
    #[serde(rename = "write-concurrency")]
    pub write_concurrency: u32,

    /// Delay before each chapter dispatch (milliseconds)
    #[serde(rename = "download-delay-ms")]
    pub download_delay_ms: u64,

    /// Scale the download delay by a random factor in [0.5, 1.5)
    #[serde(rename = "randomize-download-delay")]
    pub randomize_download_delay: bool,

    /// Per-request HTTP timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Wall-clock bound on a whole download job (seconds)
    #[serde(rename = "job-timeout-secs")]
    pub job_timeout_secs: u64,

    /// Only catalog entries whose path starts with this are downloaded; empty keeps all
    #[serde(rename = "chapter-path-prefix")]
    pub chapter_path_prefix: String,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            endpoints: [
                "https://www.97c286.cfd",
                "https://www.efebde4.cfd",
                "https://www.7535b44.cfd",
                "https://www.0ae247c57c.icu",
                "https://www.4a109.cfd",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            default_endpoint: 0,
            max_retries_per_endpoint: 3,
            retry_delay_ms: 3000,
            request_concurrency: 3,
            write_concurrency: 5,
            download_delay_ms: 2000,
            randomize_download_delay: true,
            request_timeout_secs: 30,
            job_timeout_secs: 3600,
            chapter_path_prefix: "/book/".to_string(),
        }
    }
}

/// Request header configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Pool of user agents, one is picked when the client is built
    #[serde(rename = "user-agents")]
    pub user_agents: Vec<String>,

    pub accept: String,

    /// Content codings the client negotiates and decodes (gzip, deflate, br)
    #[serde(rename = "accept-encoding")]
    pub accept_encoding: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agents: [
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/73.0.3683.75 Safari/537.36",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.12; rv:65.0) Gecko/20100101 Firefox/65.0",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/12.0.3 Safari/605.1.15",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/72.0.3626.121 Safari/537.36",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/64.0.3282.140 Safari/537.36 Edge/18.17763",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            accept: "application/json".to_string(),
            accept_encoding: "gzip, deflate".to_string(),
        }
    }
}

/// Keyword lists for the chapter title classifier and the content cleaner
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Navigation phrases rejected on exact match
    #[serde(rename = "invalid-chapter-keywords")]
    pub invalid_chapter_keywords: Vec<String>,

    /// Navigation prefixes rejected on prefix match
    #[serde(rename = "invalid-chapter-prefixes")]
    pub invalid_chapter_prefixes: Vec<String>,

    /// Author notes and announcements rejected on exact match
    #[serde(rename = "meta-note-keywords")]
    pub meta_note_keywords: Vec<String>,

    /// Content lines containing any of these are dropped
    #[serde(rename = "content-junk-keywords")]
    pub content_junk_keywords: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub(crate) const DEFAULT_INVALID_KEYWORDS: &[&str] = &[
    "展开全部章节",
    "展开",
    "收起",
    "---",
    "<<<",
    ">>>",
    "返回目录",
    "上一页",
    "下一页",
    "首页",
    "尾页",
    "点此报错",
    "加入书签",
    "收藏本站",
];

pub(crate) const DEFAULT_INVALID_PREFIXES: &[&str] = &["展开", "收起", "<<<", ">>>"];

pub(crate) const DEFAULT_META_NOTES: &[&str] = &["请假条", "单章感言", "作者有话说"];

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            invalid_chapter_keywords: strings(DEFAULT_INVALID_KEYWORDS),
            invalid_chapter_prefixes: strings(DEFAULT_INVALID_PREFIXES),
            meta_note_keywords: strings(DEFAULT_META_NOTES),
            content_junk_keywords: strings(DEFAULT_INVALID_KEYWORDS),
        }
    }
}

/// Book formatting settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Literal placed between chapters of the text output
    #[serde(rename = "chapter-separator")]
    pub chapter_separator: String,

    /// Prefix of every content paragraph
    #[serde(rename = "paragraph-indent")]
    pub paragraph_indent: String,

    /// Language tag written into EPUB metadata
    pub language: String,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            chapter_separator: "\n\n\n--------\n\n\n".to_string(),
            paragraph_indent: "\u{3000}\u{3000}".to_string(),
            language: "zh".to_string(),
        }
    }
}

/// CSS selectors used by the HTML extractor
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    #[serde(rename = "catalog-title")]
    pub catalog_title: String,

    #[serde(rename = "catalog-title-fallback")]
    pub catalog_title_fallback: String,

    #[serde(rename = "author-spans")]
    pub author_spans: String,

    /// Text marker preceding the author name inside an author span
    #[serde(rename = "author-marker")]
    pub author_marker: String,

    #[serde(rename = "chapter-links")]
    pub chapter_links: String,

    #[serde(rename = "chapter-title")]
    pub chapter_title: String,

    /// Content containers, tried in order until one yields text
    #[serde(rename = "chapter-content")]
    pub chapter_content: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            catalog_title: "h1".to_string(),
            catalog_title_fallback: ".info h1".to_string(),
            author_spans: ".small span".to_string(),
            author_marker: "作者：".to_string(),
            chapter_links: ".listmain dl dd a".to_string(),
            chapter_title: "h1".to_string(),
            chapter_content: strings(&["#chaptercontent", ".Readarea", ".ReadAjax_content"]),
        }
    }
}

/// Which durable store backs progress, caches and the task registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Sqlite,
    Files,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving books and, for the files store, documents
    pub directory: String,

    pub store: StoreKind,

    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "./output".to_string(),
            store: StoreKind::Sqlite,
            database_path: "./output/harvest.db".to_string(),
        }
    }
}
