// Cross-module scenario tests backed by in-memory collaborators

pub mod helpers;
pub mod unit;
