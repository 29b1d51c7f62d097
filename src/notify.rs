// src/notify.rs

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Seam for the transient, non-blocking user notification. Every controller
/// reports success and failure through this; nothing here is fatal.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: ToastLevel, message: &str);
}

/// Default notifier: routes toasts to the tracing pipeline.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: ToastLevel, message: &str) {
        match level {
            ToastLevel::Info | ToastLevel::Success => info!(target: "toast", "{}", message),
            ToastLevel::Warning => warn!(target: "toast", "{}", message),
            ToastLevel::Error => error!(target: "toast", "{}", message),
        }
    }
}

#[cfg(test)]
pub(crate) struct RecordingNotifier {
    events: std::sync::Mutex<Vec<(ToastLevel, String)>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<(ToastLevel, String)> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, level: ToastLevel, message: &str) {
        self.events.lock().unwrap().push((level, message.to_string()));
    }
}
