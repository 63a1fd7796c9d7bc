//! Query construction for the secure store.
//!
//! A [`Query`] is the criteria mapping submitted to the store for exactly
//! one operation. [`QueryBuilder`] derives it from the immutable
//! [`crate::Configuration`], the target [`crate::Platform`] and the per-call
//! key and payload.

pub mod attr;
mod builder;
mod value;

pub use builder::{QueryBuilder, UpdateQuery};
pub use value::{AttributeValue, Query};
