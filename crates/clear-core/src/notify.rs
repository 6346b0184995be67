use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(1200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub kind: ToastKind,
    pub duration: Duration,
    pub shown_at: Instant,
}

impl Toast {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.shown_at) >= self.duration
    }
}

#[derive(Debug, Default)]
struct Queue {
    next_id: u64,
    toasts: Vec<Toast>,
}

/// Transient user notifications shared by the API client and the stores.
#[derive(Debug, Clone)]
pub struct Notifier {
    queue: Arc<Mutex<Queue>>,
    duration: Duration,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_TOAST_DURATION)
    }
}

impl Notifier {
    pub fn new(duration: Duration) -> Self {
        Self {
            queue: Arc::new(Mutex::new(Queue::default())),
            duration,
        }
    }

    pub fn show(&self, message: impl Into<String>, kind: ToastKind) -> u64 {
        let message = message.into();
        let mut queue = self.queue.lock();
        let id = queue.next_id;
        queue.next_id += 1;
        debug!(id, ?kind, message = %message, "toast");
        queue.toasts.push(Toast {
            id,
            message,
            kind,
            duration: self.duration,
            shown_at: Instant::now(),
        });
        id
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.show(message, ToastKind::Success)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.show(message, ToastKind::Error)
    }

    pub fn remove(&self, id: u64) {
        self.queue.lock().toasts.retain(|toast| toast.id != id);
    }

    /// Toasts still within their display duration.
    pub fn active(&self) -> Vec<Toast> {
        let now = Instant::now();
        let mut queue = self.queue.lock();
        queue.toasts.retain(|toast| !toast.is_expired(now));
        queue.toasts.clone()
    }

    /// Everything queued so far, regardless of age. Empties the queue.
    pub fn drain(&self) -> Vec<Toast> {
        std::mem::take(&mut self.queue.lock().toasts)
    }
}
