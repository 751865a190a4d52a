#![forbid(unsafe_code)]

pub mod access;
pub mod error;
pub mod model;
pub mod time;

pub use access::{AccessError, AccessPolicy};
pub use error::Error;
pub use time::Clock;
