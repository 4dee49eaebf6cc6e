pub mod erp;
pub mod error;
pub mod file;
