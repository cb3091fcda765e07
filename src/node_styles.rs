use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{debug, info};

use crate::color::Color;
use crate::error::{Error, Result};
use crate::snapshot::{BackendNodeId, LayoutBox, StringIndex, StyleSlot, StyleSnapshot};

pub type ColorBucket = BTreeMap<String, BTreeSet<BackendNodeId>>;
pub type FrequencyTable = BTreeMap<String, u32>;

const SVG_PAINTABLE_NODES: [&str; 11] = [
    "altGlyph", "circle", "ellipse", "path", "polygon", "polyline", "rect", "text", "textPath",
    "tref", "tspan",
];

const BORDER_SIDES: [(StyleSlot, StyleSlot); 4] = [
    (StyleSlot::BorderTopWidth, StyleSlot::BorderTopColor),
    (StyleSlot::BorderBottomWidth, StyleSlot::BorderBottomColor),
    (StyleSlot::BorderLeftWidth, StyleSlot::BorderLeftColor),
    (StyleSlot::BorderRightWidth, StyleSlot::BorderRightColor),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStyleStats {
    pub background_colors: ColorBucket,
    pub text_colors: ColorBucket,
    pub fill_colors: ColorBucket,
    pub border_colors: ColorBucket,
    pub font_sizes: FrequencyTable,
    pub font_weights: FrequencyTable,
}

impl NodeStyleStats {
    pub fn merge(&mut self, other: NodeStyleStats) {
        merge_buckets(&mut self.background_colors, other.background_colors);
        merge_buckets(&mut self.text_colors, other.text_colors);
        merge_buckets(&mut self.fill_colors, other.fill_colors);
        merge_buckets(&mut self.border_colors, other.border_colors);
        merge_counts(&mut self.font_sizes, other.font_sizes);
        merge_counts(&mut self.font_weights, other.font_weights);
    }

    fn record_box(&mut self, snapshot: &StyleSnapshot, layout_box: &LayoutBox<'_>) {
        let node_id = layout_box.node_id;
        let slot = |slot: StyleSlot| layout_box.slot(slot);
        let value = |slot: StyleSlot| snapshot.string(layout_box.slot(slot));

        store_color_at(snapshot, slot(StyleSlot::BackgroundColor), node_id, &mut self.background_colors);
        store_color_at(snapshot, slot(StyleSlot::Color), node_id, &mut self.text_colors);

        if snapshot
            .string(layout_box.node_name)
            .is_some_and(is_svg_paintable)
        {
            store_color_at(snapshot, slot(StyleSlot::Fill), node_id, &mut self.fill_colors);
        }

        for (width_slot, color_slot) in BORDER_SIDES {
            if value(width_slot) != Some("0px") {
                store_color_at(snapshot, slot(color_slot), node_id, &mut self.border_colors);
            }
        }

        if let Some(font_size) = value(StyleSlot::FontSize) {
            *self.font_sizes.entry(font_size.to_string()).or_insert(0) += 1;
        }

        if let Some(font_weight) = value(StyleSlot::FontWeight) {
            *self.font_weights.entry(font_weight.to_string()).or_insert(0) += 1;
        }
    }
}

fn merge_buckets(into: &mut ColorBucket, from: ColorBucket) {
    for (color, nodes) in from {
        into.entry(color).or_default().extend(nodes);
    }
}

fn merge_counts(into: &mut FrequencyTable, from: FrequencyTable) {
    for (value, count) in from {
        *into.entry(value).or_insert(0) += count;
    }
}

pub fn is_svg_paintable(node_name: &str) -> bool {
    SVG_PAINTABLE_NODES.contains(&node_name)
}

/// Adds `node_id` under the canonical form of `color_text`.
///
/// Absent values, unparseable values and fully transparent colors leave the
/// bucket untouched.
pub fn store_color(color_text: Option<&str>, node_id: BackendNodeId, bucket: &mut ColorBucket) {
    let Some(color_text) = color_text else {
        return;
    };

    let Some(color) = Color::parse(color_text) else {
        debug!(action = "skip", component = "color_parse", value = color_text, "Unparseable color");
        return;
    };

    if color.is_transparent() {
        return;
    }

    bucket.entry(color.canonical()).or_default().insert(node_id);
}

/// Resolves a raw slot index and stores its color, see [`store_color`].
pub fn store_color_at(
    snapshot: &StyleSnapshot,
    index: StringIndex,
    node_id: BackendNodeId,
    bucket: &mut ColorBucket,
) {
    store_color(snapshot.string(index), node_id, bucket);
}

pub fn aggregate_snapshot(snapshot: &StyleSnapshot) -> Result<NodeStyleStats> {
    let start_time = Instant::now();
    info!(
        action = "start",
        component = "node_style_aggregation",
        document_count = snapshot.documents.len(),
        string_count = snapshot.strings.len(),
        "Starting node style aggregation"
    );

    if let Some(position) = snapshot.documents.iter().position(|doc| !doc.is_consistent()) {
        return Err(Error::MalformedSnapshot(format!(
            "document {} has mismatched layout nodeIndex and styles lengths",
            position
        )));
    }

    let partials: Vec<(NodeStyleStats, usize)> = snapshot
        .documents
        .par_iter()
        .fold(
            || (NodeStyleStats::default(), 0usize),
            |(mut stats, mut skipped), document| {
                for layout_box in document.layout_boxes() {
                    match layout_box {
                        Some(layout_box) => stats.record_box(snapshot, &layout_box),
                        None => skipped += 1,
                    }
                }
                (stats, skipped)
            },
        )
        .collect();

    let mut all_stats = NodeStyleStats::default();
    let mut boxes_skipped = 0;
    for (stats, skipped) in partials {
        all_stats.merge(stats);
        boxes_skipped += skipped;
    }

    info!(
        action = "complete",
        component = "node_style_aggregation",
        background_colors = all_stats.background_colors.len(),
        text_colors = all_stats.text_colors.len(),
        fill_colors = all_stats.fill_colors.len(),
        border_colors = all_stats.border_colors.len(),
        boxes_skipped,
        duration_ms = start_time.elapsed().as_millis(),
        "Node style aggregation completed"
    );

    Ok(all_stats)
}
