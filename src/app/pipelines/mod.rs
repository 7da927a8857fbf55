pub mod stats_pipeline;

pub use stats_pipeline::{LoadedRun, StatsOptions, StatsPipeline};
