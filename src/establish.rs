//! Establishment State Machine
//!
//! Drives one record from a known identity to an open document:
//! `Discovered -> Establishing -> Ready`, with `Recovering` and `Failed` side
//! branches. Results are delivered through a `Continuation`; the caller never
//! waits on storage.

mod continuation;
mod machine;

pub use continuation::{Continuation, EstablishResult, EstablishedDocument};
pub use machine::Establisher;
pub(crate) use machine::{close_quietly, Attempt};
