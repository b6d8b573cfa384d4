//! Regdoc - hybrid retrieval for document question answering
//!
//! Indexes extracted pages of regulatory documents into per-document
//! collections and retrieves grounding passages for a question by fusing the
//! store's own top-k search with a dense re-embedding of the whole document.

pub mod cli;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod naming;
pub mod retrieval;
pub mod store;

pub use error::{RegdocError, Result};
