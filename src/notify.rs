//! Notification service handed to the upload session

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn label(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }
}

/// Non-blocking user notifications (toasts)
pub trait Notifier: Send + Sync {
    fn notify(&self, level: Level, message: &str);
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    pub at: DateTime<Local>,
}

const MAX_TOASTS: usize = 8;

/// Keeps the latest notifications for the UI to render
#[derive(Debug, Default)]
pub struct ToastQueue {
    toasts: Mutex<VecDeque<Notification>>,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest notification younger than `max_age`
    pub fn current(&self, max_age: Duration) -> Option<Notification> {
        let toasts = self.toasts.lock().unwrap_or_else(|e| e.into_inner());
        let latest = toasts.back()?;
        let age = Local::now().signed_duration_since(latest.at);
        let max_age = chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::days(1));
        (age <= max_age).then(|| latest.clone())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.toasts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Notifier for ToastQueue {
    fn notify(&self, level: Level, message: &str) {
        match level {
            Level::Info => tracing::info!("{}", message),
            Level::Warning => tracing::warn!("{}", message),
            Level::Error => tracing::error!("{}", message),
        }

        let mut toasts = self.toasts.lock().unwrap_or_else(|e| e.into_inner());
        toasts.push_back(Notification {
            level,
            message: message.to_string(),
            at: Local::now(),
        });
        while toasts.len() > MAX_TOASTS {
            toasts.pop_front();
        }
    }
}
