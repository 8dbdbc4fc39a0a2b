//! Foundation types for Rover.
//!
//! This crate provides the value types shared by the graph client boundary
//! and the filesystem layer. Every other Rover crate depends on
//! `rover-types`.
//!
//! # Key Types
//!
//! - [`ObjectRef`] -- Content-addressed blob identifier (BLAKE3 hash)
//! - [`ClaimTime`] -- UTC timestamp carried by claims, renderable as a sortable name
//! - [`Claim`] -- Immutable, timestamped attribute mutation against a permanode
//! - [`PermanodeAttrs`] -- Replayed attribute state of a permanode
//! - [`DescribedBlob`] -- Snapshot of one blob's metadata as resolved by a describe query

pub mod attrs;
pub mod claim;
pub mod describe;
pub mod error;
pub mod object;
pub mod temporal;

pub use attrs::PermanodeAttrs;
pub use claim::{Claim, ClaimKind};
pub use describe::{
    BlobKind, DescribeRequest, DescribedBlob, DescribedPermanode, Description, FileInfo,
    WithAttrHit,
};
pub use error::TypeError;
pub use object::ObjectRef;
pub use temporal::ClaimTime;
