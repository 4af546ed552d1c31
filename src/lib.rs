pub mod cli;
pub mod color;
pub mod config;
pub mod error;
pub mod kubernetes;
pub mod sink;
pub mod supervisor;
pub mod tail;
pub mod target;
pub mod watcher;

pub use color::{ColorAssigner, ColorPair};
pub use config::Config;
pub use error::Error;
pub use sink::Sink;
pub use supervisor::Supervisor;
pub use tail::{PodLogClient, Tail, TailOptions};
pub use target::Target;
pub use watcher::{ContainerState, PodEvent};
