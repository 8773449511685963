use std::collections::VecDeque;
use std::time::{Duration, Instant};

use eframe::egui;
use egui_notify::{Anchor, Toast, Toasts};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    fn duration(self) -> Duration {
        Duration::from_secs(match self {
            Self::Info => 3,
            Self::Success => 4,
            Self::Warning => 5,
            Self::Error => 8,
        })
    }
}

const DEDUP_WINDOW: Duration = Duration::from_secs(2);
const MAX_RECENT: usize = 32;

/// Toast queue for non-fatal events: fallbacks, exports, reloads.
pub(super) struct Notices {
    toasts: Toasts,
    recent: VecDeque<(String, Instant)>,
}

impl Notices {
    pub(super) fn new() -> Self {
        Self {
            toasts: Toasts::new()
                .with_anchor(Anchor::TopRight)
                .with_margin(egui::vec2(8.0, 8.0)),
            recent: VecDeque::new(),
        }
    }

    pub(super) fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        let now = Instant::now();
        if self.is_duplicate(&message, now) {
            return;
        }

        self.recent.push_back((message.clone(), now));
        while self.recent.len() > MAX_RECENT {
            self.recent.pop_front();
        }

        let mut toast = match level {
            NoticeLevel::Info => Toast::info(message),
            NoticeLevel::Success => Toast::success(message),
            NoticeLevel::Warning => Toast::warning(message),
            NoticeLevel::Error => Toast::error(message),
        };
        toast.duration(Some(level.duration()));
        self.toasts.add(toast);
    }

    pub(super) fn info(&mut self, message: impl Into<String>) {
        self.notify(NoticeLevel::Info, message);
    }

    pub(super) fn success(&mut self, message: impl Into<String>) {
        self.notify(NoticeLevel::Success, message);
    }

    pub(super) fn warning(&mut self, message: impl Into<String>) {
        self.notify(NoticeLevel::Warning, message);
    }

    pub(super) fn error(&mut self, message: impl Into<String>) {
        self.notify(NoticeLevel::Error, message);
    }

    fn is_duplicate(&mut self, message: &str, now: Instant) -> bool {
        self.recent
            .retain(|(_, at)| now.duration_since(*at) < Duration::from_secs(60));
        self.recent
            .iter()
            .any(|(recent, at)| recent == message && now.duration_since(*at) < DEDUP_WINDOW)
    }

    pub(super) fn show(&mut self, ctx: &egui::Context) {
        self.toasts.show(ctx);
    }
}
