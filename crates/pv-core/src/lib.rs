pub mod config;
pub mod error;
pub mod time;

pub use error::{PvError, PvResult};
