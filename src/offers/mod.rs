//! Offer resolution and extraction: which post to read, which of its images
//! hold tables, what the tables say, and how rows become scheme records.

pub mod assets;
pub mod normalizer;
pub mod resolver;
pub mod tables;

pub use assets::AssetFilter;
pub use normalizer::{Provenance, normalize, placeholder};
pub use resolver::SourceResolver;
pub use tables::{HttpTableRecognizer, TableExtractor, TableRecognizer};
