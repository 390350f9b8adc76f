//! Path Resolver
//!
//! Pure mapping from a document's `(file_name, uuid)` pair to its local and
//! remote locations, URL classification, and the canonical path form used
//! for every equality comparison in the registry.

mod identifier;
mod normalize;
mod resolver;

pub use identifier::UuidGrammar;
pub use normalize::normalize_path;
pub use resolver::{PathResolver, ResolvedLocations, StorageTier};
