use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A transient user-facing message (the toast a view shows once).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

/// Shared queue of notices raised by view models; the owner drains it per render.
#[derive(Debug, Clone, Default)]
pub struct Notices {
    inner: Arc<Mutex<Vec<Notice>>>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error | NoticeLevel::Warning => warn!(message = %notice.message, "notice"),
            _ => info!(message = %notice.message, "notice"),
        }
        if let Ok(mut queue) = self.inner.lock() {
            queue.push(notice);
        }
    }

    pub fn drain(&self) -> Vec<Notice> {
        self.inner
            .lock()
            .map(|mut queue| std::mem::take(&mut *queue))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_queue() {
        let notices = Notices::new();
        notices.push(Notice::error("Failed to load your food items"));
        let shared = notices.clone();
        assert_eq!(shared.drain().len(), 1);
        assert!(notices.drain().is_empty());
    }
}
