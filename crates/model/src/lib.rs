pub mod core;
pub mod execution;
pub mod progress;
pub mod records;
