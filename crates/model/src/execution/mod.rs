pub mod checkpoint;
pub mod error_record;
pub mod errors;
pub mod lock;
pub mod run;
