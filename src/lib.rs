pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use config::{GlobalSettings, IniConfig, LogFormat};
pub use core::{Step, StepRunner};
pub use utils::error::{BaleenError, Result};
