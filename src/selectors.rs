use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

const SELECTOR_WHITESPACE: [char; 5] = ['\t', '\n', '\x0C', '\r', ' '];
const NON_SIMPLE_MARKERS: [char; 9] = ['#', '.', ':', '[', ']', '|', '+', '>', '~'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorCategory {
    Type,
    Class,
    Id,
    Universal,
    Attribute,
    NonSimple,
}

impl SelectorCategory {
    pub const ALL: [SelectorCategory; 6] = [
        SelectorCategory::Type,
        SelectorCategory::Class,
        SelectorCategory::Id,
        SelectorCategory::Universal,
        SelectorCategory::Attribute,
        SelectorCategory::NonSimple,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SelectorCategory::Type => "Type selectors",
            SelectorCategory::Class => "Class selectors",
            SelectorCategory::Id => "ID selectors",
            SelectorCategory::Universal => "Universal selectors",
            SelectorCategory::Attribute => "Attribute selectors",
            SelectorCategory::NonSimple => "Non-simple selectors",
        }
    }
}

/// Classifies a single whitespace-free selector token.
pub fn classify_selector(selector: &str) -> SelectorCategory {
    match selector.chars().next() {
        Some('.') => SelectorCategory::Class,
        Some('#') => SelectorCategory::Id,
        Some('*') => SelectorCategory::Universal,
        Some('[') => SelectorCategory::Attribute,
        _ if selector.contains(NON_SIMPLE_MARKERS) => SelectorCategory::NonSimple,
        _ => SelectorCategory::Type,
    }
}

/// Splits rule selector text into groups on `,` and each group into
/// selectors on runs of whitespace.
pub fn split_selectors(selector_text: &str) -> impl Iterator<Item = &str> {
    selector_text.split(',').flat_map(|group| {
        group
            .split(SELECTOR_WHITESPACE)
            .filter(|selector| !selector.is_empty())
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorStats {
    pub type_selectors: BTreeSet<String>,
    pub class: BTreeSet<String>,
    pub id: BTreeSet<String>,
    pub universal: BTreeSet<String>,
    pub attribute: BTreeSet<String>,
    pub non_simple: BTreeSet<String>,
}

impl SelectorStats {
    pub fn insert(&mut self, selector: &str) -> SelectorCategory {
        let category = classify_selector(selector);
        self.set_mut(category).insert(selector.to_string());
        category
    }

    pub fn set(&self, category: SelectorCategory) -> &BTreeSet<String> {
        match category {
            SelectorCategory::Type => &self.type_selectors,
            SelectorCategory::Class => &self.class,
            SelectorCategory::Id => &self.id,
            SelectorCategory::Universal => &self.universal,
            SelectorCategory::Attribute => &self.attribute,
            SelectorCategory::NonSimple => &self.non_simple,
        }
    }

    fn set_mut(&mut self, category: SelectorCategory) -> &mut BTreeSet<String> {
        match category {
            SelectorCategory::Type => &mut self.type_selectors,
            SelectorCategory::Class => &mut self.class,
            SelectorCategory::Id => &mut self.id,
            SelectorCategory::Universal => &mut self.universal,
            SelectorCategory::Attribute => &mut self.attribute,
            SelectorCategory::NonSimple => &mut self.non_simple,
        }
    }

    pub fn counts(&self) -> SelectorCounts {
        SelectorCounts {
            type_selectors: self.type_selectors.len(),
            class: self.class.len(),
            id: self.id.len(),
            universal: self.universal.len(),
            attribute: self.attribute.len(),
            non_simple: self.non_simple.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorCounts {
    #[serde(rename = "type")]
    pub type_selectors: usize,
    pub class: usize,
    pub id: usize,
    pub universal: usize,
    pub attribute: usize,
    pub non_simple: usize,
}

impl SelectorCounts {
    pub fn get(&self, category: SelectorCategory) -> usize {
        match category {
            SelectorCategory::Type => self.type_selectors,
            SelectorCategory::Class => self.class,
            SelectorCategory::Id => self.id,
            SelectorCategory::Universal => self.universal,
            SelectorCategory::Attribute => self.attribute,
            SelectorCategory::NonSimple => self.non_simple,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStyleStats {
    pub style_rules: usize,
    pub inline_styles: usize,
    pub external_sheets: usize,
    pub stats: SelectorCounts,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CssRule {
    pub selector_text: Option<String>,
}

/// A stylesheet as exposed by the page. `rules` is `None` when the page
/// refused access to them (cross-origin sheets).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleSheet {
    pub href: Option<String>,
    #[serde(default)]
    pub rules: Option<Vec<CssRule>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetAccessError {
    pub href: Option<String>,
}

impl fmt::Display for SheetAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.href {
            Some(href) => write!(f, "rules of stylesheet {} are not readable", href),
            None => write!(f, "rules of inline stylesheet are not readable"),
        }
    }
}

impl std::error::Error for SheetAccessError {}

impl StyleSheet {
    pub fn is_external(&self) -> bool {
        self.href.is_some()
    }

    pub fn rules(&self) -> Result<&[CssRule], SheetAccessError> {
        self.rules.as_deref().ok_or_else(|| SheetAccessError {
            href: self.href.clone(),
        })
    }
}

pub fn classify_style_sheets(sheets: &[StyleSheet]) -> GlobalStyleStats {
    let start_time = Instant::now();
    info!(
        action = "start",
        component = "selector_classification",
        sheet_count = sheets.len(),
        "Starting stylesheet classification"
    );

    let mut result = GlobalStyleStats::default();
    let mut selectors = SelectorStats::default();
    let mut sheets_skipped = 0;

    for sheet in sheets {
        if sheet.is_external() {
            result.external_sheets += 1;
        } else {
            result.inline_styles += 1;
        }

        let rules = match sheet.rules() {
            Ok(rules) => rules,
            Err(e) => {
                debug!(action = "skip", component = "stylesheet", error = %e, "Skipping unreadable stylesheet");
                sheets_skipped += 1;
                continue;
            }
        };

        for selector_text in rules.iter().filter_map(|rule| rule.selector_text.as_deref()) {
            result.style_rules += 1;
            for selector in split_selectors(selector_text) {
                selectors.insert(selector);
            }
        }
    }

    result.stats = selectors.counts();

    info!(
        action = "complete",
        component = "selector_classification",
        style_rules = result.style_rules,
        inline_styles = result.inline_styles,
        external_sheets = result.external_sheets,
        sheets_skipped,
        duration_ms = start_time.elapsed().as_millis(),
        "Stylesheet classification completed"
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(text: &str) -> CssRule {
        CssRule {
            selector_text: Some(text.to_string()),
        }
    }

    #[test]
    fn classifies_mixed_selector_list() {
        let mut stats = SelectorStats::default();
        for selector in split_selectors(".a, #b, * , [c], div, div.e:hover") {
            stats.insert(selector);
        }

        let set = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<BTreeSet<_>>();
        assert_eq!(stats.class, set(&[".a"]));
        assert_eq!(stats.id, set(&["#b"]));
        assert_eq!(stats.universal, set(&["*"]));
        assert_eq!(stats.attribute, set(&["[c]"]));
        assert_eq!(stats.type_selectors, set(&["div"]));
        assert_eq!(stats.non_simple, set(&["div.e:hover"]));
    }

    #[test]
    fn every_selector_lands_in_exactly_one_category() {
        let mut stats = SelectorStats::default();
        let selectors = ["a", ".b", "#c", "*", "[d]", "e>f", "g~h", "i|j", "k+l", "m:n", "::before", ">"];
        for selector in selectors {
            let category = stats.insert(selector);
            let hits = SelectorCategory::ALL
                .iter()
                .filter(|c| stats.set(**c).contains(selector))
                .count();
            assert_eq!(hits, 1, "{} in {:?}", selector, category);
        }
        assert_eq!(stats.counts().non_simple, 7);
    }

    #[test]
    fn splits_on_all_selector_whitespace() {
        let tokens: Vec<_> = split_selectors("ul\tli,\n p \x0C a\r\nb").collect();
        assert_eq!(tokens, vec!["ul", "li", "p", "a", "b"]);
    }

    #[test]
    fn counts_sheets_and_skips_unreadable_rules() {
        let sheets = vec![
            StyleSheet {
                href: Some("https://cdn.example/site.css".to_string()),
                rules: None,
            },
            StyleSheet {
                href: None,
                rules: Some(vec![rule(".a, .b"), CssRule::default(), rule(".a div")]),
            },
            StyleSheet {
                href: Some("https://example.com/app.css".to_string()),
                rules: Some(vec![rule("#main > p")]),
            },
        ];

        let stats = classify_style_sheets(&sheets);

        assert_eq!(stats.external_sheets, 2);
        assert_eq!(stats.inline_styles, 1);
        assert_eq!(stats.style_rules, 3);
        assert_eq!(stats.stats.class, 2);
        assert_eq!(stats.stats.type_selectors, 2);
        assert_eq!(stats.stats.id, 1);
        assert_eq!(stats.stats.non_simple, 1);
    }

    #[test]
    fn unreadable_sheet_reports_access_error() {
        let sheet = StyleSheet {
            href: Some("https://other.example/x.css".to_string()),
            rules: None,
        };
        assert!(sheet.rules().is_err());
    }
}
