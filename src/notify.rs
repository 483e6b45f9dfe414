//! Transient, dismissible notifications (the "toast" surface).
//!
//! Workflow failures post here so that every failure has a user-visible
//! signal; the presentation layer drains or dismisses them.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub id: Uuid,
    pub level: NoticeLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct NoticeBoard {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&self, message: impl Into<String>) -> Uuid {
        self.push(NoticeLevel::Success, message.into())
    }

    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.push(NoticeLevel::Error, message.into())
    }

    fn push(&self, level: NoticeLevel, message: String) -> Uuid {
        let notice = Notice {
            id: Uuid::new_v4(),
            level,
            message,
            created_at: Utc::now(),
        };
        let id = notice.id;
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
        id
    }

    /// Currently visible notices, oldest first.
    pub fn active(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    /// Remove one notice. Returns false if it was already gone.
    pub fn dismiss(&self, id: Uuid) -> bool {
        self.notices
            .lock()
            .map(|mut notices| {
                let before = notices.len();
                notices.retain(|n| n.id != id);
                notices.len() != before
            })
            .unwrap_or(false)
    }

    /// Take every notice, leaving the board empty.
    pub fn drain(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|mut notices| std::mem::take(&mut *notices))
            .unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<Notice> {
        self.active()
            .into_iter()
            .filter(|n| n.level == NoticeLevel::Error)
            .collect()
    }
}
