//! Background download worker driven by command/event channels

pub mod actor;
pub mod messages;

pub use actor::{Backend, BackendHandle};
pub use messages::{BackendCommand, BackendEvent, DownloadOptions};
