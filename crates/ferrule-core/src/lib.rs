pub mod command;
pub mod config;
pub mod error;
pub mod paths;
pub mod project;
pub mod types;

pub use command::{Command, RawCommand, SUPPORTED_COMMANDS};
pub use config::FerruleConfig;
pub use error::BridgeError;
pub use paths::FerrulePaths;
pub use project::ProjectRoot;
pub use types::*;
