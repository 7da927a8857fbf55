pub mod addition;
pub mod attention;
pub mod curriculum;
pub mod dist;
pub mod engine;
pub mod lp;
pub mod menv;
pub mod stats;
pub mod teacher;
pub mod training_log;
pub mod vocab;

pub use crate::domain::model::{LogRow, LogTable, StatTable, Step};
pub use crate::domain::ports::{
    ConfigProvider, DistComputer, Environment, LpComputer, Pipeline, Storage,
};
pub use crate::utils::error::Result;
