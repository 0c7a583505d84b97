pub mod runner;

pub use crate::domain::ports::{Step, Storage};
pub use crate::utils::error::Result;
pub use runner::{run_bounded, StepRunner};
