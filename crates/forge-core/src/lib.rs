pub mod atomic;
pub mod config;
pub mod consistency;
pub mod error;
pub mod events;
pub mod git;
pub mod io;
pub mod lock;
pub mod migration;
pub mod paths;
pub mod store;
pub mod structure;
pub mod template;
pub mod types;

pub use error::{ForgeError, Result};
