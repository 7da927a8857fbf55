pub mod grid;
pub mod pipelines;
pub mod runner;
pub mod simulate;
