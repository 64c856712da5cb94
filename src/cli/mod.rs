//! Command-line interface module.

mod args;
mod run;

pub use args::{Cli, Commands, Task};
pub use run::run_task;
