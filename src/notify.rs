use std::sync::Mutex;

use tracing::{info, warn};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub description: String,
}

/// Transient notifications raised by hooks and forms. The front end drains
/// them after each action.
#[derive(Default)]
pub struct Notifier {
    pending: Mutex<Vec<Notice>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&self, title: impl Into<String>, description: impl Into<String>) {
        let notice = Notice {
            kind: NoticeKind::Success,
            title: title.into(),
            description: description.into(),
        };
        info!(title = %notice.title, "{}", notice.description);
        self.push(notice);
    }

    pub fn error(&self, title: impl Into<String>, description: impl Into<String>) {
        let notice = Notice {
            kind: NoticeKind::Error,
            title: title.into(),
            description: description.into(),
        };
        warn!(title = %notice.title, "{}", notice.description);
        self.push(notice);
    }

    fn push(&self, notice: Notice) {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notice);
    }

    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(
            &mut *self
                .pending
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_notices_in_order_and_empties() {
        let notifier = Notifier::new();
        notifier.success("Saved", "Reminder updated");
        notifier.error("Failed", "Try again");

        let notices = notifier.drain();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].kind, NoticeKind::Success);
        assert_eq!(notices[1].title, "Failed");
        assert!(notifier.drain().is_empty());
    }
}
