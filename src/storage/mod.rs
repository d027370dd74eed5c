//! File system storage management
//!
//! Handles path resolution, containment checks, and file operations.

pub mod operations;
pub mod results;
pub mod validation;

pub use results::{ListEntry, StoreTarget};
pub use validation::{
    ensure_contained, is_contained, normalize_virtual, resolve_and_validate, resolve_virtual,
    virtual_to_real,
};
