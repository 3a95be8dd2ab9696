//! Incremental synchronization of the payment ledger

pub mod discovery;
pub mod orchestrator;
pub mod scheduler;
pub mod writer;

pub use discovery::WalletDiscovery;
pub use orchestrator::{CycleReport, SyncOrchestrator, WalletReport};
pub use scheduler::{run_once, run_scheduler};
pub use writer::{classify, IdempotentWriter, SyncPass, WriteOutcome};
