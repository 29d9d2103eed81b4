//! Background workers of the signal pipeline.
//!
//! Two stages run as independent loops over Redis lists:
//!
//! - [`SignalProcessor`] drains `signals:queue`, resolves recipients and
//!   forwards a [`common::ProcessedSignal`] to `signals:processed`.
//! - [`NotificationDispatcher`] drains `signals:processed`, records triggered
//!   alarms and sends one notification per matching subscriber.
//!
//! Both are driven by [`PollingWorker`], which owns the dequeue loop, idle
//! back-off and shutdown handling.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod poller;
pub mod processor;

pub use config::WorkerConfig;
pub use dispatcher::{DispatchSummary, NotificationDispatcher};
pub use error::{Result, WorkerError};
pub use poller::{PollConfig, PollOutcome, PollingWorker, StageHandler};
pub use processor::SignalProcessor;
