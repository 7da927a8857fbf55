use crate::domain::model::Step;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Where models and statistics live on disk.
pub trait ConfigProvider: Send + Sync {
    fn storage_root(&self) -> &str;

    fn models_dir(&self) -> PathBuf {
        PathBuf::from(self.storage_root()).join("models")
    }

    fn model_dir(&self, model: &str) -> PathBuf {
        self.models_dir().join(model)
    }

    fn stats_dir(&self) -> PathBuf {
        PathBuf::from(self.storage_root()).join("stats")
    }
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Extracted: Send;
    type Transformed: Send;

    async fn extract(&self) -> Result<Self::Extracted>;
    async fn transform(&self, data: Self::Extracted) -> Result<Self::Transformed>;
    async fn load(&self, result: Self::Transformed) -> Result<String>;
}

/// A single task environment a student is trained on.
pub trait Environment: Send {
    type Observation;

    fn id(&self) -> &str;
    fn reset(&mut self) -> Result<Self::Observation>;
    fn step(&mut self, action: usize) -> Result<Step<Self::Observation>>;
}

/// Estimates learning progress per environment from episode returns.
pub trait LpComputer: Send {
    fn update(&mut self, env_id: usize, returnn: f64) -> &[f64];
    fn lps(&self) -> &[f64];
}

/// Turns non-negative attention values into a sampling distribution.
pub trait DistComputer: Send {
    fn compute(&self, attention: &[f64]) -> Vec<f64>;
}
