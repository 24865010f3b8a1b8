use std::collections::VecDeque;

/// What happened to a submitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Same name as the previous submission; dropped.
    Duplicate,
    /// Held until the next flush.
    Buffered,
    /// Passed straight through to the sink.
    Sent,
}

/// Dedup and buffering layer between the classifier and the sink.
///
/// The host is known to fire some events twice in a row, so an event whose
/// name equals the previously submitted one is dropped. Until stream metadata
/// arrives, events are held so custom dimensions reach the collector first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventGate {
    cache_enabled: bool,
    buffer: VecDeque<String>,
    last_event_reported: Option<String>,
}

impl Default for EventGate {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            buffer: VecDeque::new(),
            last_event_reported: None,
        }
    }
}

impl EventGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit<F>(&mut self, name: &str, send: F) -> GateOutcome
    where
        F: FnOnce(&str),
    {
        if self.last_event_reported.as_deref() == Some(name) {
            return GateOutcome::Duplicate;
        }
        self.last_event_reported = Some(name.to_string());

        if self.cache_enabled {
            self.buffer.push_back(name.to_string());
            GateOutcome::Buffered
        } else {
            send(name);
            GateOutcome::Sent
        }
    }

    /// Send every buffered event in submission order. Caching stays as it is.
    pub fn flush<F>(&mut self, mut send: F) -> usize
    where
        F: FnMut(&str),
    {
        let count = self.buffer.len();
        while let Some(name) = self.buffer.pop_front() {
            send(&name);
        }
        count
    }

    /// Switch to pass-through mode.
    pub fn disable_cache(&mut self) {
        self.cache_enabled = false;
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    pub fn buffered(&self) -> impl Iterator<Item = &str> {
        self.buffer.iter().map(String::as_str)
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn last_event_reported(&self) -> Option<&str> {
        self.last_event_reported.as_deref()
    }
}
