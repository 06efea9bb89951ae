//! Result Hydration
//!
//! Transforms the flat joined rows of a SELECT into a nested object graph:
//! entities deduplicated by primary key, relations reconstituted, output as
//! associative maps or as manager-bound records.

pub mod hydrator;

pub use hydrator::Hydrator;
