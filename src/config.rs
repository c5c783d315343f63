use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use url::Url;

use crate::cli::RunArgs;
use crate::discovery::LinkStrategy;

pub const DEFAULT_SITE: &str = "https://www.sastra.org";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";
pub const DEFAULT_LINK_CLASS: &str = "ysl-lnk";
pub const PAGE_SIZE: u32 = 20;

const ENDPOINT_PATH: &str = "sastra/koleksi/koleksi.inx.php";
const LISTING_PATH: &str = "koleksi";
const SESSION_TAG: &str = "koleksi";
const SESSION_ID: &str = "691aa8f9f3caa";

#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub base: Url,
    pub endpoint: Url,
    pub session_tag: String,
    pub session_id: String,
    pub user_agent: String,
}

impl SiteConfig {
    pub fn new(base: Url) -> anyhow::Result<Self> {
        if base.scheme() != "http" && base.scheme() != "https" {
            anyhow::bail!("site must be http/https: {base}");
        }
        let endpoint = base.join(ENDPOINT_PATH).context("build discovery endpoint url")?;
        Ok(Self {
            base,
            endpoint,
            session_tag: SESSION_TAG.to_owned(),
            session_id: SESSION_ID.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        })
    }

    pub fn listing_url(&self, category_id: u32, subcategory_id: u32) -> anyhow::Result<Url> {
        let mut url = self.base.join(LISTING_PATH).context("build listing url")?;
        url.query_pairs_mut()
            .append_pair("cid", &category_id.to_string())
            .append_pair("sid", &subcategory_id.to_string());
        Ok(url)
    }

    /// Headers the AJAX endpoint expects from its own listing page.
    pub fn ajax_headers(&self, category_id: u32, subcategory_id: u32) -> anyhow::Result<HeaderMap> {
        let referer = self.listing_url(category_id, subcategory_id)?;
        let mut headers = self.browser_headers()?;
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(
            REFERER,
            HeaderValue::from_str(referer.as_str()).context("referer header value")?,
        );
        Ok(headers)
    }

    pub fn page_headers(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = self.browser_headers()?;
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        Ok(headers)
    }

    fn browser_headers(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent).context("user-agent header value")?,
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        Ok(headers)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delays {
    pub page: Duration,
    pub item: Duration,
    pub subcategory: Duration,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            page: Duration::from_secs(1),
            item: Duration::from_secs(2),
            subcategory: Duration::from_secs(5),
        }
    }
}

impl Delays {
    #[must_use]
    pub fn none() -> Self {
        Self {
            page: Duration::ZERO,
            item: Duration::ZERO,
            subcategory: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub out_dir: PathBuf,
    pub log_file: PathBuf,
    pub progress_file: PathBuf,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("data_naskah_sastra_org"),
            log_file: PathBuf::from("scraping_log.csv"),
            progress_file: PathBuf::from("scraping_progress.json"),
        }
    }
}

/// Everything a run needs, fixed before the first request.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub site: SiteConfig,
    pub link_strategy: LinkStrategy,
    pub page_size: u32,
    pub delays: Delays,
    pub timeout: Duration,
    pub output: OutputPaths,
    pub max_items_per_subcategory: Option<usize>,
}

impl ScrapeConfig {
    pub fn new(site: Url) -> anyhow::Result<Self> {
        Ok(Self {
            site: SiteConfig::new(site)?,
            link_strategy: LinkStrategy::MarkerClassMatch(DEFAULT_LINK_CLASS.to_owned()),
            page_size: PAGE_SIZE,
            delays: Delays::default(),
            timeout: Duration::from_secs(30),
            output: OutputPaths::default(),
            max_items_per_subcategory: None,
        })
    }

    pub fn from_args(args: &RunArgs) -> anyhow::Result<Self> {
        let site = Url::parse(&args.site).context("parse --site")?;
        let mut config = Self::new(site)?;

        config.link_strategy = if args.link_prefix.is_empty() {
            LinkStrategy::MarkerClassMatch(args.link_class.clone())
        } else {
            LinkStrategy::PathPrefixMatch(args.link_prefix.clone())
        };
        config
            .link_strategy
            .validate()
            .context("check link strategy")?;
        config.delays = Delays {
            page: Duration::from_millis(args.page_delay_ms),
            item: Duration::from_millis(args.item_delay_ms),
            subcategory: Duration::from_millis(args.subcategory_delay_ms),
        };
        config.timeout = Duration::from_secs(args.timeout_secs.max(1));
        config.output = OutputPaths {
            out_dir: PathBuf::from(&args.out),
            log_file: PathBuf::from(&args.log_file),
            progress_file: PathBuf::from(&args.progress_file),
        };
        config.max_items_per_subcategory = args.max_items_per_subcategory;

        Ok(config)
    }
}
