//! Store service layer
//!
//! The façade that composes confinement, permissions, ownership and a
//! storage backend into the public bucket/object API.

pub mod store;


pub use store::{Authority, Store};
