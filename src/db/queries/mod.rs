//! Database queries

pub mod component;
pub mod project;
