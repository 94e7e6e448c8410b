//! Notification side channel for project alerts.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - A tracing-backed log channel
//! - Minijinja template rendering for notification messages
//! - Dispatcher that routes notifications to configured channels
//!
//! Delivery is best effort: failures are reported in [`DispatchResult`]s and
//! logged, never propagated to the alert engine.

pub mod dispatcher;
pub mod log;
pub mod templating;
pub mod traits;

pub use dispatcher::Dispatcher;
pub use log::LogNotifier;
pub use templating::{AlertContext, TemplateContext, TemplateRenderer};
pub use traits::{DispatchResult, Notification, Notifier, NotifyError};
