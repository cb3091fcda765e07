use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::media::{declared_media_queries, MediaQueryEntry};
use crate::node_styles::{aggregate_snapshot, ColorBucket, FrequencyTable, NodeStyleStats};
use crate::selectors::{classify_style_sheets, GlobalStyleStats, StyleSheet};
use crate::snapshot::{BackendNodeId, StyleSlot, StyleSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomNode {
    pub backend_node_id: BackendNodeId,
    pub node_name: String,
}

/// Transport that answers the requests of one overview run.
///
/// Every method is an independent suspension point; the controller issues
/// all of them at once and waits for every answer.
#[allow(async_fn_in_trait)]
pub trait InspectorBackend {
    /// Flattened node list of the inspected document, `None` when the target
    /// has no document.
    async fn flattened_document(&self) -> Result<Option<Vec<DomNode>>>;

    async fn capture_snapshot(&self, computed_styles: &[&str]) -> Result<StyleSnapshot>;

    async fn style_sheets(&self) -> Result<Vec<StyleSheet>>;

    async fn media_queries(&self) -> Result<Vec<MediaQueryEntry>>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedSummary {
    pub background_colors: ColorBucket,
    pub text_colors: ColorBucket,
    pub fill_colors: ColorBucket,
    pub border_colors: ColorBucket,
    pub global_style_stats: GlobalStyleStats,
    pub font_sizes: FrequencyTable,
    pub font_weights: FrequencyTable,
    pub media_queries: Vec<MediaQueryEntry>,
    pub element_count: usize,
}

impl CombinedSummary {
    fn merge(
        nodes: Vec<DomNode>,
        global_style_stats: GlobalStyleStats,
        node_styles: NodeStyleStats,
        media_queries: Vec<MediaQueryEntry>,
    ) -> Self {
        Self {
            background_colors: node_styles.background_colors,
            text_colors: node_styles.text_colors,
            fill_colors: node_styles.fill_colors,
            border_colors: node_styles.border_colors,
            global_style_stats,
            font_sizes: node_styles.font_sizes,
            font_weights: node_styles.font_weights,
            media_queries,
            element_count: nodes.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverviewEvent {
    Started,
    Completed,
    Cancelled,
    Abandoned(String),
    Reset,
}

/// Shared cancellation flag for the active run. Setting it does not stop
/// outstanding requests; it only keeps their results from being published.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct OverviewController {
    state: RunState,
    cancel: CancelHandle,
    summary: Option<CombinedSummary>,
    listeners: Vec<UnboundedSender<OverviewEvent>>,
}

impl Default for OverviewController {
    fn default() -> Self {
        Self::new()
    }
}

impl OverviewController {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            cancel: CancelHandle::default(),
            summary: None,
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn summary(&self) -> Option<&CombinedSummary> {
        self.summary.as_ref()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<OverviewEvent> {
        let (tx, rx) = unbounded_channel();
        self.listeners.push(tx);
        rx
    }

    pub fn reset(&mut self) {
        self.state = RunState::Idle;
        self.summary = None;
        self.cancel.clear();
        self.dispatch(OverviewEvent::Reset);
    }

    /// Runs one overview. Returns the published summary, or `None` when the
    /// run was cancelled before the merge.
    pub async fn start<B: InspectorBackend>(&mut self, backend: &B) -> Result<Option<&CombinedSummary>> {
        self.reset();
        self.state = RunState::Running;
        self.dispatch(OverviewEvent::Started);

        let start_time = Instant::now();
        info!(action = "start", component = "overview", "Starting CSS overview");

        let computed_styles = StyleSlot::computed_styles();
        let (nodes, global_style_stats, node_styles, media_queries) = futures::join!(
            backend.flattened_document(),
            async {
                let sheets = backend.style_sheets().await?;
                Ok::<_, Error>(classify_style_sheets(&sheets))
            },
            async {
                let snapshot = backend.capture_snapshot(&computed_styles).await?;
                aggregate_snapshot(&snapshot)
            },
            async { Ok::<_, Error>(declared_media_queries(backend.media_queries().await?)) },
        );

        let merged = (|| {
            let nodes = nodes?.ok_or(Error::MissingDocument)?;
            Ok::<_, Error>((nodes, global_style_stats?, node_styles?, media_queries?))
        })();

        let (nodes, global_style_stats, node_styles, media_queries) = match merged {
            Ok(results) => results,
            Err(e) => {
                warn!(action = "abandon", component = "overview", error = %e, "Overview run abandoned");
                self.state = RunState::Idle;
                self.dispatch(OverviewEvent::Abandoned(e.to_string()));
                return Err(e);
            }
        };

        if self.cancel.is_cancelled() {
            info!(
                action = "cancel",
                component = "overview",
                duration_ms = start_time.elapsed().as_millis(),
                "Overview cancelled, discarding results"
            );
            self.state = RunState::Idle;
            self.dispatch(OverviewEvent::Cancelled);
            return Ok(None);
        }

        let summary = CombinedSummary::merge(nodes, global_style_stats, node_styles, media_queries);
        info!(
            action = "complete",
            component = "overview",
            element_count = summary.element_count,
            style_rules = summary.global_style_stats.style_rules,
            media_queries = summary.media_queries.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "CSS overview completed"
        );

        self.state = RunState::Completed;
        self.summary = Some(summary);
        self.dispatch(OverviewEvent::Completed);
        Ok(self.summary.as_ref())
    }

    fn dispatch(&mut self, event: OverviewEvent) {
        self.listeners
            .retain(|listener| listener.send(event.clone()).is_ok());
    }
}
