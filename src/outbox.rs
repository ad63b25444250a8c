//! Polled event outbox
//!
//! Tagged text events flow from the execution thread back to the host
//! through this FIFO. The host polls destructively, one entry per call;
//! there is no blocking and no backpressure.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Semantic tag prefixes for outbox messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTag {
    /// Navigation completed successfully
    Loaded,
    /// Initialization or navigation failure
    Error,
    /// In-page call from script (bridge or private scheme)
    FromJs,
    /// Hook pattern matched a navigation
    Hooked,
    /// Navigation was allowed to start
    Started,
    /// Navigation completed with an HTTP error status
    HttpError,
    /// Cookie query result
    Cookies,
}

impl EventTag {
    /// The literal prefix the host dispatches on
    pub fn prefix(self) -> &'static str {
        match self {
            EventTag::Loaded => "CallOnLoaded:",
            EventTag::Error => "CallOnError:",
            EventTag::FromJs => "CallFromJS:",
            EventTag::Hooked => "CallOnHooked:",
            EventTag::Started => "CallOnStarted:",
            EventTag::HttpError => "CallOnHttpError:",
            EventTag::Cookies => "CallOnCookies:",
        }
    }
}

/// Thread-safe FIFO of tagged host-visible events
#[derive(Debug, Default)]
pub struct Outbox {
    queue: Mutex<VecDeque<String>>,
}

impl Outbox {
    /// Create an empty outbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tagged event
    pub fn push(&self, tag: EventTag, body: &str) {
        let mut queue = self.queue.lock();
        queue.push_back(format!("{}{}", tag.prefix(), body));
    }

    /// Pop the oldest event, or None when empty
    pub fn poll(&self) -> Option<String> {
        self.queue.lock().pop_front()
    }

    /// Number of undelivered events
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether the outbox has no undelivered events
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
