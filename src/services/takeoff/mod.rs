//! Takeoff CSV import pipeline
//!
//! `importer` drives the other stages:
//! columns → validator (with drawing + vocabulary) → identity → store.

pub mod columns;
pub mod drawing;
pub mod error;
pub mod identity;
pub mod importer;
pub mod store;
pub mod validator;
pub mod vocabulary;

pub use identity::{ComponentDraft, IdentityScope};
pub use importer::{validate_takeoff, TakeoffImporter};
pub use store::{create_component_store, ComponentStore};
