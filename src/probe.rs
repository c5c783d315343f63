use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context as _;
use scraper::{Html, Selector};
use url::Url;

use crate::cli::ProbeArgs;
use crate::config::{PAGE_SIZE, ScrapeConfig};
use crate::discovery::{LinkStrategy, discovery_url, extract_links};
use crate::http::{HttpFetch, ReqwestFetcher, get_success};
use crate::taxonomy;

const SHOWN_LINKS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub url: String,
    pub bytes: usize,
    pub anchors: usize,
    pub path_patterns: Vec<(String, usize)>,
    pub marker_links: Vec<String>,
    pub prefix_links: Vec<String>,
    pub prefixes: Vec<String>,
}

/// `/kisah-cerita-dan-kronikal/` for "Kisah, Cerita dan Kronikal".
#[must_use]
pub fn category_path_prefix(category_name: &str) -> String {
    let slug = category_name
        .to_lowercase()
        .chars()
        .filter(|ch| ch.is_alphanumeric() || ch.is_whitespace() || *ch == '-')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    format!("/{slug}/")
}

pub async fn run(args: ProbeArgs) -> anyhow::Result<()> {
    let site = Url::parse(&args.site).context("parse --site")?;
    let mut config = ScrapeConfig::new(site)?;
    config.timeout = std::time::Duration::from_secs(args.timeout_secs.max(1));
    let fetcher = ReqwestFetcher::new(config.timeout)?;

    let prefixes = if args.link_prefix.is_empty() {
        taxonomy::builtin()
            .iter()
            .find(|c| c.category_id == args.category_id)
            .map(|c| vec![category_path_prefix(&c.category_name)])
            .unwrap_or_default()
    } else {
        args.link_prefix.clone()
    };

    let (report, html) = probe(&fetcher, &config, &args, prefixes).await?;
    print_report(&report);

    if let Some(path) = args.save_html.as_deref() {
        let path = PathBuf::from(path);
        std::fs::write(&path, html)
            .with_context(|| format!("write probe html: {}", path.display()))?;
        println!("raw response saved to {}", path.display());
    }

    Ok(())
}

pub async fn probe<F: HttpFetch + ?Sized>(
    fetcher: &F,
    config: &ScrapeConfig,
    args: &ProbeArgs,
    prefixes: Vec<String>,
) -> anyhow::Result<(ProbeReport, String)> {
    let url = discovery_url(
        &config.site,
        PAGE_SIZE,
        args.category_id,
        args.subcategory_id,
        args.offset,
    )?;
    let headers = config
        .site
        .ajax_headers(args.category_id, args.subcategory_id)?;

    tracing::info!(%url, "probe discovery page");
    let response = get_success(fetcher, &url, &headers)
        .await
        .context("fetch discovery page")?;
    let html = response.text();

    let (anchors, path_patterns) = anchor_patterns(&html, &config.site.base)?;
    let marker_links = extract_links(
        &html,
        &config.site.base,
        &LinkStrategy::MarkerClassMatch(args.link_class.clone()),
    )?;
    let prefix_links = if prefixes.is_empty() {
        Vec::new()
    } else {
        extract_links(
            &html,
            &config.site.base,
            &LinkStrategy::PathPrefixMatch(prefixes.clone()),
        )?
    };

    let report = ProbeReport {
        url: url.to_string(),
        bytes: response.body.len(),
        anchors,
        path_patterns,
        marker_links,
        prefix_links,
        prefixes,
    };
    Ok((report, html))
}

fn anchor_patterns(html: &str, base: &Url) -> anyhow::Result<(usize, Vec<(String, usize)>)> {
    let selector =
        Selector::parse("a[href]").map_err(|err| anyhow::anyhow!("anchor selector: {err}"))?;
    let document = Html::parse_fragment(html);
    let host = base.host_str().unwrap_or_default();

    let mut anchors = 0_usize;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for href in document.select(&selector).filter_map(|a| a.value().attr("href")) {
        anchors += 1;
        let pattern = if let Some(path) = href.strip_prefix('/') {
            format!("/{}", path.split('/').next().unwrap_or_default())
        } else if !host.is_empty() && href.contains(host) {
            "full_url".to_owned()
        } else {
            "other".to_owned()
        };
        *counts.entry(pattern).or_default() += 1;
    }

    let mut patterns = counts.into_iter().collect::<Vec<_>>();
    patterns.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok((anchors, patterns))
}

fn print_report(report: &ProbeReport) {
    println!("url: {}", report.url);
    println!("response: {} bytes, {} anchors", report.bytes, report.anchors);

    println!("path patterns:");
    for (pattern, count) in &report.path_patterns {
        println!("  {pattern:30} {count}");
    }

    println!("marker class match: {} links", report.marker_links.len());
    for link in report.marker_links.iter().take(SHOWN_LINKS) {
        println!("  {link}");
    }

    if report.prefixes.is_empty() {
        println!("path prefix match: no prefix known for this category");
    } else {
        println!(
            "path prefix match ({}): {} links",
            report.prefixes.join(", "),
            report.prefix_links.len()
        );
        for link in report.prefix_links.iter().take(SHOWN_LINKS) {
            println!("  {link}");
        }
    }
}
