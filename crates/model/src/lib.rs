//! A provider-neutral protocol for conversational text generation.
//!
//! This crate describes what a chat request looks like and how a
//! streamed response is consumed, so that the conversation logic never
//! depends on a particular model vendor. The transport crates implement
//! these traits for concrete endpoints.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
