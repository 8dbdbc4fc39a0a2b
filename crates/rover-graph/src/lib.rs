//! Graph query and content boundary for Rover.
//!
//! The filesystem layer never talks to a blob server directly. It consumes
//! two narrow collaborator traits defined here:
//!
//! - [`GraphQueryClient`] -- describe, claim history and attribute search
//! - [`ContentFetcher`] -- opens sequential readers over file content
//!
//! # Implementations
//!
//! - [`InMemoryGraph`] -- claim-replaying graph for tests and fixture-backed
//!   mounts, with call counters and fault injection
//!
//! # Design Rules
//!
//! 1. The graph is append-only: permanode state is derived by replaying claims.
//! 2. Describe is batch and depth-bounded; unresolvable refs are omitted, not errors.
//! 3. Every query may block; callers decide what locks they hold across it.
//! 4. All failures are propagated as [`GraphError`], never swallowed.

pub mod error;
pub mod fixture;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{GraphError, GraphResult};
pub use fixture::GraphFixture;
pub use memory::{CallCounts, Fault, InMemoryGraph};
pub use object::{BlobHasher, StoredFile};
pub use traits::{ContentFetcher, ContentReader, GraphQueryClient};
