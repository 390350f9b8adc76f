//! Config composition: defaults, sources, and the merge order between them.

pub mod merge_policy;
pub mod service;
