pub mod error;
pub mod errors_log;
pub mod lock;
pub mod metrics;
pub mod progress;
pub mod recovery;
pub mod state;
