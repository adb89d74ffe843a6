//! Wire format spoken with the companion extension.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Inspector → Extension | One command |
//! | `Response` | Extension → Inspector | Its answer, or READY |
//!
//! # Command Naming
//!
//! Methods are `module.methodName`, e.g. `script.evaluate` or
//! `storage.deleteCookie`.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Commands and [`Cookie`] |
//! | `request` | Envelopes |

// ============================================================================
// Submodules
// ============================================================================

/// Commands.
pub mod command;

/// Request and response envelopes.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{BrowsingContextCommand, Command, Cookie, ScriptCommand, StorageCommand};
pub use request::{Request, Response, ResponseStatus};
