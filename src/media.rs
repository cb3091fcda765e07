use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaQuerySource {
    MediaRule,
    ImportRule,
    LinkedSheet,
    InlineSheet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaQueryEntry {
    pub text: String,
    pub source: MediaQuerySource,
}

/// Drops queries that come from `<link media=...>` attributes, keeping only
/// declared media rules.
pub fn declared_media_queries(queries: Vec<MediaQueryEntry>) -> Vec<MediaQueryEntry> {
    queries
        .into_iter()
        .filter(|query| query.source != MediaQuerySource::LinkedSheet)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linked_sheet_queries_are_dropped() {
        let queries: Vec<MediaQueryEntry> = serde_json::from_str(
            r#"[
                {"text": "screen and (max-width: 600px)", "source": "mediaRule"},
                {"text": "print", "source": "linkedSheet"},
                {"text": "(prefers-color-scheme: dark)", "source": "importRule"}
            ]"#,
        )
        .unwrap();

        let declared = declared_media_queries(queries);

        assert_eq!(declared.len(), 2);
        assert!(declared.iter().all(|q| q.source != MediaQuerySource::LinkedSheet));
        assert_eq!(declared[0].text, "screen and (max-width: 600px)");
    }
}
