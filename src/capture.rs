use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::coverage::CoverageUpdate;
use crate::error::{Error, Result};
use crate::media::MediaQueryEntry;
use crate::overview::{DomNode, InspectorBackend};
use crate::selectors::StyleSheet;
use crate::snapshot::{StyleSlot, StyleSnapshot};

/// A page state saved to disk, served back as an [`InspectorBackend`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedPage {
    #[serde(default)]
    pub document: Option<Vec<DomNode>>,
    #[serde(default)]
    pub snapshot: StyleSnapshot,
    #[serde(default)]
    pub style_sheets: Vec<StyleSheet>,
    #[serde(default)]
    pub media_queries: Vec<MediaQueryEntry>,
}

impl CapturedPage {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read capture file {:?}", path))?;
        let page: CapturedPage = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse capture file {:?}", path))?;

        info!(
            action = "loaded",
            component = "capture_file",
            file_path = ?path,
            documents = page.snapshot.documents.len(),
            style_sheets = page.style_sheets.len(),
            "Loaded captured page"
        );
        Ok(page)
    }
}

impl InspectorBackend for CapturedPage {
    async fn flattened_document(&self) -> Result<Option<Vec<DomNode>>> {
        Ok(self.document.clone())
    }

    async fn capture_snapshot(&self, computed_styles: &[&str]) -> Result<StyleSnapshot> {
        if computed_styles.len() != StyleSlot::ALL.len() {
            return Err(Error::backend(
                "capture_snapshot",
                format!(
                    "expected {} computed styles, got {}",
                    StyleSlot::ALL.len(),
                    computed_styles.len()
                ),
            ));
        }
        Ok(self.snapshot.clone())
    }

    async fn style_sheets(&self) -> Result<Vec<StyleSheet>> {
        Ok(self.style_sheets.clone())
    }

    async fn media_queries(&self) -> Result<Vec<MediaQueryEntry>> {
        Ok(self.media_queries.clone())
    }
}

/// Reads coverage update batches from a JSON-lines file, one batch (a JSON
/// array of updates) per line. Blank lines and `#` comments are ignored.
pub fn load_update_batches(path: &Path) -> anyhow::Result<Vec<Vec<CoverageUpdate>>> {
    let start_time = Instant::now();
    if !path.exists() {
        anyhow::bail!("Coverage update file not found: {:?}", path);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read coverage update file {:?}", path))?;

    let mut batches = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<Vec<CoverageUpdate>>(line) {
            Ok(batch) => batches.push(batch),
            Err(e) => anyhow::bail!("Invalid coverage batch at line {}: {}", line_num + 1, e),
        }
    }

    info!(
        action = "loaded",
        component = "coverage_updates",
        batch_count = batches.len(),
        file_path = ?path,
        duration_ms = start_time.elapsed().as_millis(),
        "Loaded coverage update batches"
    );
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_batches_line_by_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# recorded coverage").unwrap();
        writeln!(
            file,
            r#"[{{"url": "https://a.test/app.js", "typeFlags": 2, "totalSize": 100, "unusedSize": 40}}]"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"[{{"url": "https://a.test/app.js", "typeFlags": 2, "totalSize": 100, "unusedSize": 10, "ranges": [{{"start": 0, "end": 90}}]}}]"#
        )
        .unwrap();

        let batches = load_update_batches(file.path()).unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1][0].unused_size, 10);
        assert_eq!(batches[1][0].ranges.len(), 1);
        assert!(!batches[0][0].is_content_script);
    }

    #[test]
    fn reports_the_offending_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[]").unwrap();
        writeln!(file, "{{not json").unwrap();

        let err = load_update_batches(file.path()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn parses_captured_page() {
        let page: CapturedPage = serde_json::from_str(
            r#"{
                "document": [{"backendNodeId": 1, "nodeName": "HTML"}],
                "snapshot": {"documents": [], "strings": []},
                "styleSheets": [{"href": null, "rules": [{"selectorText": ".a"}]}],
                "mediaQueries": [{"text": "print", "source": "mediaRule"}]
            }"#,
        )
        .unwrap();

        assert_eq!(page.document.as_ref().map(Vec::len), Some(1));
        assert_eq!(page.style_sheets[0].rules().unwrap().len(), 1);
        assert_eq!(page.media_queries.len(), 1);
    }
}
