pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod remote;
pub mod runner;
pub mod ssh;
pub mod target;

pub use cli::Cli;
pub use config::Config;
pub use error::{Error, Result};
pub use plan::PlanBuilder;
pub use remote::{CommandResult, Remote, ScriptInvocation};
pub use runner::{Step, TaskRunner};
pub use target::RemoteTarget;
