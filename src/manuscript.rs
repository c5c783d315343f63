use std::path::{Path, PathBuf};

use anyhow::Context as _;
use url::Url;

use crate::config::SiteConfig;
use crate::extract::extract_manuscript;
use crate::http::{FetchError, HttpFetch, get_success};
use crate::sanitize::clean_filename;

const RULE_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManuscriptRecord {
    pub title: String,
    pub source_url: String,
    pub content: String,
}

impl ManuscriptRecord {
    /// `<NNNN>_<title>.txt` with a 1-based index.
    #[must_use]
    pub fn file_name(&self, index: usize) -> String {
        format!("{index:04}_{}.txt", clean_filename(&self.title))
    }

    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "Judul: {}\nURL: {}\n{}\n\n{}",
            self.title,
            self.source_url,
            "=".repeat(RULE_WIDTH),
            self.content
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("invalid item url {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("build request headers: {0:#}")]
    Headers(anyhow::Error),
}

pub async fn fetch_item<F: HttpFetch + ?Sized>(
    fetcher: &F,
    site: &SiteConfig,
    url: &str,
) -> Result<ManuscriptRecord, ItemError> {
    let parsed = Url::parse(url).map_err(|source| ItemError::Url {
        url: url.to_owned(),
        source,
    })?;
    let headers = site.page_headers().map_err(ItemError::Headers)?;

    let response = get_success(fetcher, &parsed, &headers).await?;
    let extracted = extract_manuscript(&response.text());

    Ok(ManuscriptRecord {
        title: extracted.title,
        source_url: url.to_owned(),
        content: extracted.content,
    })
}

/// Writes one item file, replacing any file a previous attempt left behind.
pub fn write_record(dir: &Path, index: usize, record: &ManuscriptRecord) -> anyhow::Result<PathBuf> {
    let path = dir.join(record.file_name(index));
    std::fs::write(&path, record.render())
        .with_context(|| format!("write manuscript: {}", path.display()))?;
    Ok(path)
}
