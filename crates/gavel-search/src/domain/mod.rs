//! Field rules and mappings for the search projection.

pub mod mapping;
pub mod validation;
