//! # Holojam Shared
//!
//! Types used by every participant in a Holojam space: the tracker that
//! multicasts poses, the nodes that consume and mirror them, and the
//! collector that gathers locally-owned objects.
//!
//! ## Rule
//!
//! This crate must never open a socket or spawn a thread. Transport code
//! belongs in `holojam_networking`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod math;

pub use constants::{
    BUFFER_CAPACITY, COLLECTOR_PORT, MOTIVE_PORT, MULTICAST_GROUP, NONMOTIVE_PORT,
    STALENESS_TIMEOUT_MS,
};
pub use math::{Quaternion, Vec3};
