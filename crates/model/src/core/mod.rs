pub mod entity;
pub mod identifiers;
