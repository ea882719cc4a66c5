// Job engine: probing, command construction, process supervision - independent of the CLI

pub mod core;
pub mod hardware;
pub mod probe;
pub mod runner;
pub mod worker;

pub use core::*;
pub use hardware::Platform;
pub use runner::{EngineSettings, JobRequest, JobRunner, JobTicket};
