pub mod error;
pub mod orchestrator;

#[cfg(test)]
mod tests;
