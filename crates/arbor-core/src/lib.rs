//! Arbor Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout Arbor:
//! - The persistent state tree (`Value`, `Tree`, `KeyPath`)
//! - Opaque action identifiers (`ActionId`, `make_actions`)
//! - The error taxonomy (`ArborError`, `ArborResult`)

pub mod action;
pub mod error;
pub mod value;

pub use action::*;
pub use error::*;
pub use value::*;
