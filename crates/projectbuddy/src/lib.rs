//! Project documents with an AI writing assistant.
//!
//! The crate stores projects on disk, drafts their first version with a
//! model, opens conversations about them, and exports them for word
//! processors. It also includes a CLI tool for using in the terminal.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod export;
mod project;
mod session;
mod store;

pub use project::{Category, Project};
pub use session::{ProjectSession, ProjectSessionBuilder};
pub use store::ProjectStore;

/// Re-exports of [`buddy_core`] crate.
pub mod core {
    pub use buddy_core::*;
}
