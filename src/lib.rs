pub mod common;
pub mod consensus;
pub mod network;

pub use common::error::{Error, Result};
