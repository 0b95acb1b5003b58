//! Types shared by the PeopleSuite crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
