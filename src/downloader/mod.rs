pub mod assets;
pub mod coordinator;
pub mod engine;
pub mod startup;
pub mod sweep;
pub mod transfer;

pub use coordinator::{CoordinatorError, DownloadCoordinator, DownloadRequest};
pub use engine::{DownloadEngine, DownloadEvent, EngineCommand};
pub use startup::StartupQueue;
pub use transfer::TransferError;
