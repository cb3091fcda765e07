pub mod args;
pub mod capture;
pub mod color;
pub mod coverage;
pub mod error;
pub mod export;
pub mod media;
pub mod node_styles;
pub mod overview;
pub mod report;
pub mod selectors;
pub mod snapshot;
pub mod utils;

pub use args::Args;
pub use capture::CapturedPage;
pub use color::Color;
pub use coverage::{CoverageAggregator, CoverageFilter, CoverageMonitor, CoverageSummary};
pub use error::{Error, Result};
pub use overview::{CombinedSummary, InspectorBackend, OverviewController};
