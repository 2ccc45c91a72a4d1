//! Vessel Core - shared error taxonomy and process identity
//!
//! This crate provides the types exchanged between the namespace layer and
//! whatever supervises the processes it creates.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::ProcessHandle;
