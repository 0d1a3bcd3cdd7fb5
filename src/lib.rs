//! Loads subject metadata, sample identifiers, transcript/protein/metabolite
//! abundance matrices and metabolite annotations into a SQLite database and
//! answers the nine standard cohort queries over it.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod loader;
pub mod output;
pub mod plot;
pub mod query;
pub mod schema;
pub mod store;
