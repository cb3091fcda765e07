use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{BitAnd, BitOr};
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Urls of internal extension bindings. These never count toward coverage.
pub const EXTENSION_BINDINGS_URL_PREFIX: &str = "extensions::";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageType(u8);

impl CoverageType {
    pub const NONE: CoverageType = CoverageType(0);
    pub const CSS: CoverageType = CoverageType(1 << 0);
    pub const JAVASCRIPT: CoverageType = CoverageType(1 << 1);
    pub const JAVASCRIPT_COARSE: CoverageType = CoverageType(1 << 2);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn intersects(self, other: CoverageType) -> bool {
        !(self & other).is_empty()
    }

    pub fn label(self) -> &'static str {
        if self.intersects(CoverageType::CSS) && self.intersects(CoverageType::JAVASCRIPT | CoverageType::JAVASCRIPT_COARSE) {
            "CSS+JS"
        } else if self.intersects(CoverageType::CSS) {
            "CSS"
        } else if self.intersects(CoverageType::JAVASCRIPT) {
            "JS (per function)"
        } else if self.intersects(CoverageType::JAVASCRIPT_COARSE) {
            "JS (per block)"
        } else {
            "-"
        }
    }
}

impl BitOr for CoverageType {
    type Output = CoverageType;

    fn bitor(self, rhs: CoverageType) -> CoverageType {
        CoverageType(self.0 | rhs.0)
    }
}

impl BitAnd for CoverageType {
    type Output = CoverageType;

    fn bitand(self, rhs: CoverageType) -> CoverageType {
        CoverageType(self.0 & rhs.0)
    }
}

/// Type filter choices offered to users: everything, CSS, or any JavaScript.
impl FromStr for CoverageType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(CoverageType::NONE),
            "css" => Ok(CoverageType::CSS),
            "js" | "javascript" => Ok(CoverageType::JAVASCRIPT | CoverageType::JAVASCRIPT_COARSE),
            _ => Err(format!("Unknown coverage type filter: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRange {
    pub start: u64,
    pub end: u64,
}

/// One entry of an incremental coverage update batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageUpdate {
    pub url: String,
    pub type_flags: CoverageType,
    #[serde(default)]
    pub is_content_script: bool,
    pub total_size: u64,
    pub unused_size: u64,
    #[serde(default)]
    pub ranges: Vec<CoverageRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlCoverageInfo {
    url: String,
    type_flags: CoverageType,
    is_content_script: bool,
    total_size: u64,
    unused_size: u64,
    used_ranges: Vec<CoverageRange>,
}

impl UrlCoverageInfo {
    fn new(update: &CoverageUpdate) -> Self {
        Self {
            url: update.url.clone(),
            type_flags: update.type_flags,
            is_content_script: update.is_content_script,
            total_size: update.total_size,
            unused_size: update.unused_size,
            used_ranges: update.ranges.clone(),
        }
    }

    fn overwrite(&mut self, update: &CoverageUpdate) {
        self.type_flags = update.type_flags;
        self.total_size = update.total_size;
        self.unused_size = update.unused_size;
        self.used_ranges.clone_from(&update.ranges);
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn type_flags(&self) -> CoverageType {
        self.type_flags
    }

    pub fn is_content_script(&self) -> bool {
        self.is_content_script
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn unused_size(&self) -> u64 {
        self.unused_size
    }

    pub fn used_size(&self) -> u64 {
        self.total_size - self.unused_size
    }

    pub fn used_ranges(&self) -> &[CoverageRange] {
        &self.used_ranges
    }
}

/// Visibility settings for coverage records. Passed explicitly to
/// [`visible`] and [`CoverageAggregator::summarize`].
#[derive(Debug, Clone, Default)]
pub struct CoverageFilter {
    text: Option<Regex>,
    pub type_mask: CoverageType,
    pub include_content_scripts: bool,
}

impl CoverageFilter {
    /// Sets a case-insensitive plain-text url filter. An empty string clears it.
    pub fn set_text(&mut self, text: &str) -> Result<()> {
        self.text = if text.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(&regex::escape(text))
                    .case_insensitive(true)
                    .build()?,
            )
        };
        Ok(())
    }

    pub fn with_text(mut self, text: &str) -> Result<Self> {
        self.set_text(text)?;
        Ok(self)
    }

    pub fn with_type_mask(mut self, type_mask: CoverageType) -> Self {
        self.type_mask = type_mask;
        self
    }

    pub fn with_content_scripts(mut self, include: bool) -> Self {
        self.include_content_scripts = include;
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_ref().map(Regex::as_str)
    }
}

pub fn visible(info: &UrlCoverageInfo, ignore_text_filter: bool, filter: &CoverageFilter) -> bool {
    if info.url.starts_with(EXTENSION_BINDINGS_URL_PREFIX) {
        return false;
    }
    if info.is_content_script && !filter.include_content_scripts {
        return false;
    }
    if !filter.type_mask.is_empty() && !info.type_flags.intersects(filter.type_mask) {
        return false;
    }

    match &filter.text {
        Some(pattern) if !ignore_text_filter => pattern.is_match(&info.url),
        _ => true,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageSummary {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub unused_bytes: u64,
    pub percent_used: u32,
}

impl CoverageSummary {
    fn from_totals(total_bytes: u64, unused_bytes: u64) -> Self {
        let used_bytes = total_bytes - unused_bytes;
        let percent_used = if total_bytes > 0 {
            (100.0 * used_bytes as f64 / total_bytes as f64).round() as u32
        } else {
            0
        };

        Self {
            used_bytes,
            total_bytes,
            unused_bytes,
            percent_used,
        }
    }
}

#[derive(Debug, Default)]
pub struct CoverageAggregator {
    entries: HashMap<String, UrlCoverageInfo>,
}

impl CoverageAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one update batch. Values for a known url are replaced, not
    /// added to. Returns the number of entries applied.
    pub fn apply_update_batch(&mut self, batch: &[CoverageUpdate]) -> usize {
        let mut applied = 0;

        for update in batch {
            if update.unused_size > update.total_size {
                warn!(
                    action = "skip",
                    component = "coverage_update",
                    url = %update.url,
                    total_size = update.total_size,
                    unused_size = update.unused_size,
                    "Unused size exceeds total size"
                );
                continue;
            }

            match self.entries.get_mut(&update.url) {
                Some(info) => info.overwrite(update),
                None => {
                    debug!(action = "track", component = "coverage_update", url = %update.url, "New coverage url");
                    self.entries
                        .insert(update.url.clone(), UrlCoverageInfo::new(update));
                }
            }
            applied += 1;
        }

        applied
    }

    pub fn summarize(&self, filter: &CoverageFilter) -> CoverageSummary {
        let (total, unused) = self
            .entries
            .values()
            .filter(|info| visible(info, false, filter))
            .fold((0u64, 0u64), |(total, unused), info| {
                (total + info.total_size, unused + info.unused_size)
            });

        CoverageSummary::from_totals(total, unused)
    }

    /// Records passing `filter`, largest unused size first.
    pub fn visible_entries(&self, filter: &CoverageFilter) -> Vec<&UrlCoverageInfo> {
        let mut visible_entries: Vec<&UrlCoverageInfo> = self
            .entries
            .values()
            .filter(|info| visible(info, false, filter))
            .collect();
        visible_entries.sort_by(|a, b| {
            b.unused_size
                .cmp(&a.unused_size)
                .then_with(|| a.url.cmp(&b.url))
        });
        visible_entries
    }

    pub fn get(&self, url: &str) -> Option<&UrlCoverageInfo> {
        self.entries.get(url)
    }

    pub fn entries(&self) -> impl Iterator<Item = &UrlCoverageInfo> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

/// Owns the coverage records together with the active filter, and recomputes
/// the summary after every batch and every filter change.
#[derive(Debug, Default)]
pub struct CoverageMonitor {
    aggregator: CoverageAggregator,
    filter: CoverageFilter,
    summary: CoverageSummary,
}

impl CoverageMonitor {
    pub fn new(filter: CoverageFilter) -> Self {
        Self {
            aggregator: CoverageAggregator::new(),
            filter,
            summary: CoverageSummary::default(),
        }
    }

    pub fn on_update_batch(&mut self, batch: &[CoverageUpdate]) -> CoverageSummary {
        let start_time = Instant::now();
        let applied = self.aggregator.apply_update_batch(batch);
        let summary = self.refresh();

        info!(
            action = "update",
            component = "coverage_monitor",
            batch_size = batch.len(),
            applied,
            tracked_urls = self.aggregator.len(),
            used_bytes = summary.used_bytes,
            total_bytes = summary.total_bytes,
            duration_ms = start_time.elapsed().as_millis(),
            "Coverage batch applied"
        );

        summary
    }

    pub fn set_text_filter(&mut self, text: &str) -> Result<CoverageSummary> {
        self.filter.set_text(text)?;
        Ok(self.refresh())
    }

    pub fn set_type_filter(&mut self, type_mask: CoverageType) -> CoverageSummary {
        self.filter.type_mask = type_mask;
        self.refresh()
    }

    pub fn set_include_content_scripts(&mut self, include: bool) -> CoverageSummary {
        self.filter.include_content_scripts = include;
        self.refresh()
    }

    /// Drops every record, e.g. when the inspected page navigates.
    pub fn clear(&mut self) -> CoverageSummary {
        info!(
            action = "reset",
            component = "coverage_monitor",
            tracked_urls = self.aggregator.len(),
            "Clearing coverage records"
        );
        self.aggregator.reset();
        self.refresh()
    }

    pub fn summary(&self) -> CoverageSummary {
        self.summary
    }

    pub fn visible_entries(&self) -> Vec<&UrlCoverageInfo> {
        self.aggregator.visible_entries(&self.filter)
    }

    pub fn aggregator(&self) -> &CoverageAggregator {
        &self.aggregator
    }

    pub fn filter(&self) -> &CoverageFilter {
        &self.filter
    }

    fn refresh(&mut self) -> CoverageSummary {
        self.summary = self.aggregator.summarize(&self.filter);
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(url: &str, type_flags: CoverageType, total_size: u64, unused_size: u64) -> CoverageUpdate {
        CoverageUpdate {
            url: url.to_string(),
            type_flags,
            is_content_script: false,
            total_size,
            unused_size,
            ranges: Vec::new(),
        }
    }

    fn content_script(url: &str, total_size: u64, unused_size: u64) -> CoverageUpdate {
        CoverageUpdate {
            is_content_script: true,
            ..update(url, CoverageType::JAVASCRIPT, total_size, unused_size)
        }
    }

    #[test]
    fn later_batches_overwrite_totals() {
        let mut aggregator = CoverageAggregator::new();
        aggregator.apply_update_batch(&[update("https://a.test/app.js", CoverageType::JAVASCRIPT, 100, 40)]);
        aggregator.apply_update_batch(&[update("https://a.test/app.js", CoverageType::JAVASCRIPT, 100, 10)]);

        let summary = aggregator.summarize(&CoverageFilter::default());
        assert_eq!(summary.total_bytes, 100);
        assert_eq!(summary.unused_bytes, 10);
        assert_eq!(summary.used_bytes, 90);
        assert_eq!(summary.percent_used, 90);
        assert_eq!(aggregator.len(), 1);
    }

    #[test]
    fn applying_a_batch_twice_is_idempotent() {
        let batch = vec![
            update("https://a.test/site.css", CoverageType::CSS, 500, 125),
            update("https://a.test/app.js", CoverageType::JAVASCRIPT_COARSE, 300, 0),
        ];

        let mut once = CoverageAggregator::new();
        once.apply_update_batch(&batch);
        let mut twice = CoverageAggregator::new();
        twice.apply_update_batch(&batch);
        twice.apply_update_batch(&batch);

        for info in once.entries() {
            assert_eq!(twice.get(info.url()), Some(info));
        }
        assert_eq!(once.len(), twice.len());
        assert_eq!(
            once.summarize(&CoverageFilter::default()),
            twice.summarize(&CoverageFilter::default())
        );
    }

    #[test]
    fn sizes_stay_consistent() {
        let mut aggregator = CoverageAggregator::new();
        let applied = aggregator.apply_update_batch(&[
            update("https://a.test/ok.js", CoverageType::JAVASCRIPT, 10, 3),
            update("https://a.test/bad.js", CoverageType::JAVASCRIPT, 10, 30),
        ]);

        assert_eq!(applied, 1);
        assert!(aggregator.get("https://a.test/bad.js").is_none());
        for info in aggregator.entries() {
            assert!(info.unused_size() <= info.total_size());
            assert_eq!(info.used_size() + info.unused_size(), info.total_size());
        }
    }

    #[test]
    fn reset_clears_summary() {
        let mut aggregator = CoverageAggregator::new();
        aggregator.apply_update_batch(&[update("https://a.test/app.js", CoverageType::JAVASCRIPT, 100, 40)]);
        aggregator.reset();

        let summary = aggregator.summarize(&CoverageFilter::default());
        assert_eq!(summary, CoverageSummary::default());
        assert_eq!(summary.percent_used, 0);
        assert!(aggregator.is_empty());
    }

    #[test]
    fn extension_bindings_are_always_hidden() {
        let info = UrlCoverageInfo::new(&update("extensions::foo", CoverageType::JAVASCRIPT, 10, 0));
        let permissive = CoverageFilter::default()
            .with_content_scripts(true)
            .with_type_mask(CoverageType::JAVASCRIPT)
            .with_text("foo")
            .unwrap();

        assert!(!visible(&info, true, &permissive));
        assert!(!visible(&info, false, &permissive));
        assert!(!visible(&info, false, &CoverageFilter::default()));
    }

    #[test]
    fn content_scripts_follow_setting() {
        let info = UrlCoverageInfo::new(&content_script("chrome-extension://abc/inject.js", 10, 5));

        assert!(!visible(&info, false, &CoverageFilter::default()));
        assert!(visible(&info, false, &CoverageFilter::default().with_content_scripts(true)));
    }

    #[test]
    fn content_script_flag_is_fixed_at_first_observation() {
        let mut aggregator = CoverageAggregator::new();
        aggregator.apply_update_batch(&[content_script("https://a.test/x.js", 10, 5)]);
        aggregator.apply_update_batch(&[update("https://a.test/x.js", CoverageType::JAVASCRIPT, 10, 2)]);

        let info = aggregator.get("https://a.test/x.js").unwrap();
        assert!(info.is_content_script());
        assert_eq!(info.unused_size(), 2);
    }

    #[test]
    fn type_mask_filters_by_flags() {
        let css = UrlCoverageInfo::new(&update("https://a.test/site.css", CoverageType::CSS, 10, 5));
        let js = UrlCoverageInfo::new(&update("https://a.test/app.js", CoverageType::JAVASCRIPT_COARSE, 10, 5));
        let js_filter = CoverageFilter::default().with_type_mask("js".parse().unwrap());

        assert!(!visible(&css, false, &js_filter));
        assert!(visible(&js, false, &js_filter));
    }

    #[test]
    fn text_filter_is_plain_and_case_insensitive() {
        let info = UrlCoverageInfo::new(&update("https://a.test/Vendor.min.js", CoverageType::JAVASCRIPT, 10, 5));
        let filter = CoverageFilter::default().with_text("vendor.MIN").unwrap();
        let dotted = CoverageFilter::default().with_text("vendor.m*").unwrap();

        assert!(visible(&info, false, &filter));
        assert!(!visible(&info, false, &dotted));
        assert!(visible(&info, true, &dotted));
    }

    #[test]
    fn percent_is_rounded() {
        let mut aggregator = CoverageAggregator::new();
        aggregator.apply_update_batch(&[update("https://a.test/a.css", CoverageType::CSS, 3, 1)]);
        assert_eq!(aggregator.summarize(&CoverageFilter::default()).percent_used, 67);
    }

    #[test]
    fn monitor_recomputes_on_filter_changes() {
        let mut monitor = CoverageMonitor::default();
        let summary = monitor.on_update_batch(&[
            update("https://a.test/site.css", CoverageType::CSS, 200, 100),
            update("https://a.test/app.js", CoverageType::JAVASCRIPT, 100, 0),
        ]);
        assert_eq!(summary.total_bytes, 300);

        let summary = monitor.set_type_filter(CoverageType::CSS);
        assert_eq!(summary.total_bytes, 200);
        assert_eq!(summary.percent_used, 50);

        let summary = monitor.set_text_filter("nothing-matches").unwrap();
        assert_eq!(summary.total_bytes, 0);
        assert!(monitor.visible_entries().is_empty());

        monitor.set_text_filter("").unwrap();
        monitor.set_type_filter(CoverageType::NONE);
        let urls: Vec<_> = monitor.visible_entries().iter().map(|info| info.url()).collect();
        assert_eq!(urls, vec!["https://a.test/site.css", "https://a.test/app.js"]);

        assert_eq!(monitor.clear(), CoverageSummary::default());
    }
}
