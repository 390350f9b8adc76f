//! Discovery Pipeline
//!
//! Folds two independent, asynchronously arriving sources into the record
//! store: a one-shot scan of the local documents directory, and a long-lived
//! remote metadata search that delivers an initial batch followed by
//! incremental updates. Discovery only ever adds or updates records.

mod container_search;
mod local_scan;
mod merge;
mod pipeline;
mod remote;

pub use container_search::ContainerSearch;
pub use local_scan::{DirectoryScanner, LocalEntry, LocalScanSource};
pub use merge::{MergeOutcome, Observation, ObservationSource};
pub use pipeline::{DiscoveryPipeline, EnrollReport};
pub use remote::{MetadataItem, RemoteBatch, RemoteQuery, RemoteSearchSource};
