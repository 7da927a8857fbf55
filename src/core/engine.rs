use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::time::Instant;

/// Runs a pipeline's extract, transform and load phases in order.
pub struct Engine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> Engine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        let start = Instant::now();
        self.monitor.log_stats("Start");

        // Extract
        tracing::debug!("Loading training logs...");
        let raw_data = self.pipeline.extract().await?;
        self.monitor.log_stats("Extract");

        // Transform
        tracing::debug!("Aggregating series...");
        let transformed = self.pipeline.transform(raw_data).await?;
        self.monitor.log_stats("Transform");

        // Load
        tracing::debug!("Writing tables...");
        let output_path = self.pipeline.load(transformed).await?;
        self.monitor.log_final_stats();

        tracing::debug!("Pipeline finished in {:?}", start.elapsed());
        Ok(output_path)
    }
}
