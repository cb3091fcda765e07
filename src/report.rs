use std::path::Path;

use crate::coverage::{CoverageMonitor, CoverageType};
use crate::node_styles::{ColorBucket, FrequencyTable};
use crate::overview::CombinedSummary;
use crate::selectors::SelectorCategory;
use crate::utils::{format_bytes, format_number};

fn print_palette(title: &str, bucket: &ColorBucket, top: usize) {
    if bucket.is_empty() {
        return;
    }

    let mut sorted: Vec<_> = bucket.iter().collect();
    sorted.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

    println!("\n{} ({} unique):", title, format_number(bucket.len() as u64));
    for (color, nodes) in sorted.iter().take(top) {
        println!("- {}: {} elements", color, format_number(nodes.len() as u64));
    }
}

fn print_frequencies(title: &str, table: &FrequencyTable, top: usize) {
    if table.is_empty() {
        return;
    }

    let mut sorted: Vec<(&String, &u32)> = table.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    println!("\n{}:", title);
    for (value, count) in sorted.iter().take(top) {
        println!("- {}: {} occurrences", value, format_number(u64::from(**count)));
    }
}

pub fn print_overview(summary: &CombinedSummary, capture: &Path, top: usize) {
    let stats = &summary.global_style_stats;

    println!("\n--- CSS Overview: {} ---", capture.display());
    println!("Elements: {}", format_number(summary.element_count as u64));
    println!("External stylesheets: {}", format_number(stats.external_sheets as u64));
    println!("Inline style elements: {}", format_number(stats.inline_styles as u64));
    println!("Style rules: {}", format_number(stats.style_rules as u64));
    println!("Media queries: {}", format_number(summary.media_queries.len() as u64));

    println!("\nSelectors:");
    for category in SelectorCategory::ALL {
        println!(
            "- {}: {}",
            category.label(),
            format_number(stats.stats.get(category) as u64)
        );
    }

    print_palette("Background colors", &summary.background_colors, top);
    print_palette("Text colors", &summary.text_colors, top);
    print_palette("Fill colors", &summary.fill_colors, top);
    print_palette("Border colors", &summary.border_colors, top);

    print_frequencies("Font sizes", &summary.font_sizes, top);
    print_frequencies("Font weights", &summary.font_weights, top);

    if !summary.media_queries.is_empty() {
        println!("\nMedia queries:");
        for query in &summary.media_queries {
            println!("- {}", query.text);
        }
    }
}

pub fn print_coverage(monitor: &CoverageMonitor, top: Option<usize>) {
    let summary = monitor.summary();
    let filter = monitor.filter();

    println!("\n--- Coverage ---");
    if let Some(text) = filter.text() {
        println!("URL filter: {}", text);
    }
    if filter.type_mask != CoverageType::NONE {
        println!("Type filter: {}", filter.type_mask.label());
    }
    println!(
        "{} of {} ({}%) used so far. {} unused.",
        format_bytes(summary.used_bytes),
        format_bytes(summary.total_bytes),
        summary.percent_used,
        format_bytes(summary.unused_bytes)
    );

    let entries = monitor.visible_entries();
    let shown = top.unwrap_or(entries.len()).min(entries.len());
    println!("\nUrls ({} of {}):", shown, entries.len());
    for info in entries.iter().take(shown) {
        let percent_unused = if info.total_size() > 0 {
            (100.0 * info.unused_size() as f64 / info.total_size() as f64).round() as u32
        } else {
            0
        };
        println!(
            "- {} [{}]: {} total, {} unused ({}%)",
            info.url(),
            info.type_flags().label(),
            format_bytes(info.total_size()),
            format_bytes(info.unused_size()),
            percent_unused
        );
    }
}
