pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::cli::LocalStorage;
#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::pipelines::StatsPipeline;
pub use core::curriculum::Curriculum;
pub use core::engine::Engine;
pub use core::teacher::{CurriculumTeacher, TeacherConfig};
pub use utils::error::{CurriculumError, Result};
