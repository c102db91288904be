//! Core logic of the document assistant: request assembly, streaming
//! model calls, and the session that owns a document's conversation.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod context;
pub mod conversation;
pub mod document;
pub mod draft;
mod error;
mod model_client;
mod session;
pub mod store;

pub use error::{Error, ErrorKind};
pub use session::{Session, SessionBuilder, SessionSnapshot};
