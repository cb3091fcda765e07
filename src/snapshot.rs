use serde::{Deserialize, Serialize};

pub type BackendNodeId = i64;

/// Index into [`StyleSnapshot::strings`]. The transport encodes "not
/// computed" as `-1`; that decodes to `StringIndex(None)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct StringIndex(Option<u32>);

impl StringIndex {
    pub const ABSENT: StringIndex = StringIndex(None);

    pub fn new(index: u32) -> Self {
        StringIndex(Some(index))
    }

    pub fn get(self) -> Option<usize> {
        self.0.map(|index| index as usize)
    }
}

impl From<i64> for StringIndex {
    fn from(raw: i64) -> Self {
        StringIndex(u32::try_from(raw).ok())
    }
}

impl From<StringIndex> for i64 {
    fn from(index: StringIndex) -> Self {
        index.0.map_or(-1, i64::from)
    }
}

/// Computed style slots captured per layout box, in request order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleSlot {
    BackgroundColor,
    Color,
    Fill,
    BorderTopWidth,
    BorderTopColor,
    BorderBottomWidth,
    BorderBottomColor,
    BorderLeftWidth,
    BorderLeftColor,
    BorderRightWidth,
    BorderRightColor,
    FontSize,
    FontWeight,
}

impl StyleSlot {
    pub const ALL: [StyleSlot; 13] = [
        StyleSlot::BackgroundColor,
        StyleSlot::Color,
        StyleSlot::Fill,
        StyleSlot::BorderTopWidth,
        StyleSlot::BorderTopColor,
        StyleSlot::BorderBottomWidth,
        StyleSlot::BorderBottomColor,
        StyleSlot::BorderLeftWidth,
        StyleSlot::BorderLeftColor,
        StyleSlot::BorderRightWidth,
        StyleSlot::BorderRightColor,
        StyleSlot::FontSize,
        StyleSlot::FontWeight,
    ];

    pub fn property_name(self) -> &'static str {
        match self {
            StyleSlot::BackgroundColor => "background-color",
            StyleSlot::Color => "color",
            StyleSlot::Fill => "fill",
            StyleSlot::BorderTopWidth => "border-top-width",
            StyleSlot::BorderTopColor => "border-top-color",
            StyleSlot::BorderBottomWidth => "border-bottom-width",
            StyleSlot::BorderBottomColor => "border-bottom-color",
            StyleSlot::BorderLeftWidth => "border-left-width",
            StyleSlot::BorderLeftColor => "border-left-color",
            StyleSlot::BorderRightWidth => "border-right-width",
            StyleSlot::BorderRightColor => "border-right-color",
            StyleSlot::FontSize => "font-size",
            StyleSlot::FontWeight => "font-weight",
        }
    }

    /// The computed style list sent with a snapshot capture request.
    pub fn computed_styles() -> Vec<&'static str> {
        Self::ALL.iter().map(|slot| slot.property_name()).collect()
    }

    fn position(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTable {
    pub backend_node_id: Vec<BackendNodeId>,
    pub node_name: Vec<StringIndex>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutTable {
    pub node_index: Vec<usize>,
    pub styles: Vec<Vec<StringIndex>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub nodes: NodeTable,
    pub layout: LayoutTable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleSnapshot {
    pub documents: Vec<DocumentSnapshot>,
    pub strings: Vec<String>,
}

impl StyleSnapshot {
    pub fn string(&self, index: StringIndex) -> Option<&str> {
        index
            .get()
            .and_then(|i| self.strings.get(i))
            .map(String::as_str)
    }
}

/// One laid-out box, resolved against its node table.
#[derive(Debug, Clone, Copy)]
pub struct LayoutBox<'a> {
    pub node_id: BackendNodeId,
    pub node_name: StringIndex,
    styles: &'a [StringIndex],
}

impl LayoutBox<'_> {
    pub fn slot(&self, slot: StyleSlot) -> StringIndex {
        self.styles
            .get(slot.position())
            .copied()
            .unwrap_or(StringIndex::ABSENT)
    }
}

impl DocumentSnapshot {
    /// Resolves each layout entry to its node. Entries pointing outside the
    /// node table come back as `None`.
    pub fn layout_boxes(&self) -> impl Iterator<Item = Option<LayoutBox<'_>>> {
        self.layout
            .node_index
            .iter()
            .zip(&self.layout.styles)
            .map(move |(&node_index, styles)| {
                Some(LayoutBox {
                    node_id: *self.nodes.backend_node_id.get(node_index)?,
                    node_name: self
                        .nodes
                        .node_name
                        .get(node_index)
                        .copied()
                        .unwrap_or(StringIndex::ABSENT),
                    styles,
                })
            })
    }

    pub fn is_consistent(&self) -> bool {
        self.layout.node_index.len() == self.layout.styles.len()
    }
}
