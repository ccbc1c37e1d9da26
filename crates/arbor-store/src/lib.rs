//! Arbor Store - Flux-style state container
//!
//! This crate implements the state/event engine:
//! - The `Arbor` context: global state tree, store registry, event bus
//!   and notification scheduling behind one composition root
//! - Named `Store` façades over slices of the state tree
//! - Action dispatch with optional per-store targeting
//! - Immediate or deferred (coalescing) change notification
//!
//! ```
//! use arbor_store::{make_actions, Arbor, Value};
//!
//! let arbor = Arbor::new();
//! let todos = arbor.create_store("todos").unwrap();
//! let actions = make_actions(["add"]);
//!
//! todos.add_listener(&actions["add"], |store, payload| {
//!     store.set("last", payload.clone()).unwrap();
//! });
//!
//! arbor.dispatch(&actions["add"], "write docs", None).unwrap();
//! assert_eq!(
//!     todos.get("last", Value::Null).unwrap().as_str(),
//!     Some("write docs"),
//! );
//! ```

pub mod bus;
pub mod config;
pub mod context;
pub mod store;

pub use bus::*;
pub use config::*;
pub use context::*;
pub use store::*;

pub use arbor_core::{
    make_actions, ActionId, ActionSet, ArborError, ArborResult, KeyPath, Tree, Value,
};
