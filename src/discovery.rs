use std::collections::HashSet;

use anyhow::Context as _;
use scraper::{Html, Selector};
use serde::Serialize;
use serde::ser::{SerializeMap as _, Serializer};
use url::Url;

use crate::config::{ScrapeConfig, SiteConfig};
use crate::http::{HttpFetch, get_success};

/// How item links are recognized in a listing fragment.
///
/// The two strategies disagree on edge cases (menu links under the same
/// path, items filed under another path), so they stay separate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStrategy {
    /// `<a class="...">` carrying the listing's item-link class.
    MarkerClassMatch(String),
    /// Any `<a href>` containing one of these path fragments.
    PathPrefixMatch(Vec<String>),
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingQuery {
    cs: &'static str,
    fc: u32,
    fs: u32,
    nr: u32,
    ps: u32,
    sk: &'static str,
    sl: u32,
    el: &'static str,
}

impl ListingQuery {
    pub fn new(category_id: u32, subcategory_id: u32, page_size: u32, offset: u32) -> Self {
        Self {
            cs: "adens",
            fc: category_id,
            fs: subcategory_id,
            nr: page_size,
            ps: offset,
            sk: "",
            sl: 2,
            el: "judul",
        }
    }
}

/// The `param` document of one AJAX call. Key order is part of the wire
/// format, so it is serialized by hand instead of through a map.
#[derive(Debug, Clone)]
pub struct AjaxQuery<'a> {
    pub session_tag: &'a str,
    pub session_id: &'a str,
    pub listing: ListingQuery,
}

impl Serialize for AjaxQuery<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("sn", self.session_tag)?;
        map.serialize_entry("ui", self.session_id)?;
        map.serialize_entry("us", &0)?;
        map.serialize_entry(self.session_tag, &self.listing)?;
        map.end()
    }
}

pub fn discovery_url(
    site: &SiteConfig,
    page_size: u32,
    category_id: u32,
    subcategory_id: u32,
    offset: u32,
) -> anyhow::Result<Url> {
    let query = AjaxQuery {
        session_tag: &site.session_tag,
        session_id: &site.session_id,
        listing: ListingQuery::new(category_id, subcategory_id, page_size, offset),
    };
    let param = serde_json::to_string(&query).context("serialize discovery query")?;

    let mut url = site.endpoint.clone();
    url.query_pairs_mut().clear().append_pair("param", &param);
    Ok(url)
}

impl LinkStrategy {
    /// Checks that the strategy can select anchors before any request is made.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self {
            Self::MarkerClassMatch(class) => {
                let is_single_class = !class.is_empty()
                    && class
                        .chars()
                        .all(|ch| ch.is_alphanumeric() || ch == '-' || ch == '_');
                if !is_single_class {
                    anyhow::bail!("link class must be a single CSS class name: {class:?}");
                }
            }
            Self::PathPrefixMatch(prefixes) => {
                if prefixes.iter().any(|p| p.trim().is_empty()) {
                    anyhow::bail!("link prefix must not be empty");
                }
            }
        }
        link_selector(self).map(|_| ())
    }
}

fn link_selector(strategy: &LinkStrategy) -> anyhow::Result<Selector> {
    let css = match strategy {
        LinkStrategy::MarkerClassMatch(class) => format!("a.{class}[href]"),
        LinkStrategy::PathPrefixMatch(_) => "a[href]".to_owned(),
    };
    Selector::parse(&css).map_err(|err| anyhow::anyhow!("invalid link selector {css:?}: {err}"))
}

fn resolve_href(base: &Url, href: &str) -> Option<String> {
    if href.starts_with("http") {
        return Some(href.to_owned());
    }
    base.join(href).ok().map(|url| url.to_string())
}

/// Item links of one listing fragment, in document order. Duplicates are
/// kept; the caller owns de-duplication.
pub fn extract_links(html: &str, base: &Url, strategy: &LinkStrategy) -> anyhow::Result<Vec<String>> {
    let selector = link_selector(strategy)?;
    let document = Html::parse_fragment(html);

    let links = document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter(|href| match strategy {
            LinkStrategy::MarkerClassMatch(_) => true,
            LinkStrategy::PathPrefixMatch(prefixes) => {
                prefixes.iter().any(|prefix| href.contains(prefix.as_str()))
            }
        })
        .filter_map(|href| resolve_href(base, href))
        .collect();

    Ok(links)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryPage {
    pub offset: u32,
    pub item_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A page brought no link that was not already collected.
    Exhausted,
    /// A page could not be fetched or read; the links so far are kept.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLinks {
    pub urls: Vec<String>,
    pub pages_fetched: usize,
    pub stop: StopReason,
}

pub struct Discovery<'a, F: ?Sized> {
    fetcher: &'a F,
    config: &'a ScrapeConfig,
}

impl<'a, F: HttpFetch + ?Sized> Discovery<'a, F> {
    pub fn new(fetcher: &'a F, config: &'a ScrapeConfig) -> Self {
        Self { fetcher, config }
    }

    /// Walks the listing from offset 0 until a page yields no new link.
    ///
    /// Never fails: a broken page ends the walk and the links gathered so
    /// far are returned with [`StopReason::Failed`].
    pub async fn discover(&self, category_id: u32, subcategory_id: u32) -> DiscoveredLinks {
        let mut seen: HashSet<String> = HashSet::new();
        let mut urls: Vec<String> = Vec::new();
        let mut offset = 0_u32;
        let mut pages_fetched = 0_usize;

        loop {
            if pages_fetched > 0 {
                tokio::time::sleep(self.config.delays.page).await;
            }

            let page = match self.fetch_page(category_id, subcategory_id, offset).await {
                Ok(page) => page,
                Err(err) => {
                    tracing::warn!(
                        category_id,
                        subcategory_id,
                        offset,
                        collected = urls.len(),
                        ?err,
                        "discovery page failed; keeping partial result"
                    );
                    return DiscoveredLinks {
                        urls,
                        pages_fetched,
                        stop: StopReason::Failed(format!("{err:#}")),
                    };
                }
            };
            pages_fetched += 1;

            let before = urls.len();
            for url in page.item_urls {
                if seen.insert(url.clone()) {
                    urls.push(url);
                }
            }
            let new_links = urls.len() - before;

            tracing::info!(offset, new_links, total = urls.len(), "discovery page");

            if new_links == 0 {
                return DiscoveredLinks {
                    urls,
                    pages_fetched,
                    stop: StopReason::Exhausted,
                };
            }

            offset = offset.saturating_add(self.config.page_size);
        }
    }

    pub async fn fetch_page(
        &self,
        category_id: u32,
        subcategory_id: u32,
        offset: u32,
    ) -> anyhow::Result<DiscoveryPage> {
        let site = &self.config.site;
        let url = discovery_url(
            site,
            self.config.page_size,
            category_id,
            subcategory_id,
            offset,
        )?;
        let headers = site.ajax_headers(category_id, subcategory_id)?;

        tracing::debug!(%url, "fetch discovery page");
        let response = get_success(self.fetcher, &url, &headers).await?;
        let item_urls = extract_links(&response.text(), &site.base, &self.config.link_strategy)
            .context("extract item links")?;

        Ok(DiscoveryPage { offset, item_urls })
    }
}
