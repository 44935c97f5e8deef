pub mod client;
pub mod codec;
pub mod executor;
pub mod log;
pub mod message;
pub mod peers;
pub mod processor;
pub mod sequence;
pub mod store;

pub use client::*;
pub use executor::*;
pub use log::*;
pub use message::*;
pub use peers::*;
pub use processor::*;
pub use sequence::*;
pub use store::*;
