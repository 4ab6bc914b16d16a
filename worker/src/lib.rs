pub mod client;
pub mod config;
pub mod worker;

pub use client::{AckOutcome, CoordinatorClient};
pub use config::WorkerConfig;
pub use worker::{Worker, WorkerExit};
