// Configuration loading

pub mod pipeline;

pub use pipeline::{AreaReportFormat, ConfigError, PipelineConfig, ResolvedPaths};
