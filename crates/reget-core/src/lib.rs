//! reget core - resumable download engine
//!
//! Ranged HTTP fetches with chunked streaming, a process-wide bandwidth cap,
//! durable progress in SQLite, cooperative pause/resume with undo/redo, and
//! lazy paginated task listing.

mod commands;
mod engine;
mod error;
mod manager;
mod pager;
mod policy;
mod store;

pub use commands::{ActionKind, CommandHistory, TaskAction};
pub use engine::{HttpDownloader, ProgressSink, StopSignal, TransferOutcome};
pub use error::RegetError;
pub use manager::DownloadManager;
pub use pager::{FilteredTasks, TaskPages};
pub use policy::BandwidthPolicy;
pub use store::TaskStore;

pub use reget_types::{Task, TaskStatus};
