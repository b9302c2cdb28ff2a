use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry key whose handlers receive every dispatched message.
pub const WILDCARD: &str = "*";

/// Message callback, invoked with `(topic, payload)`.
pub type Handler = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Topic-to-handler table. Registrations accumulate; nothing is ever removed.
#[derive(Default)]
pub struct Registry {
    topics: HashMap<String, Vec<Handler>>,
    catch_all: Vec<Handler>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when this is the first handler for `topic`.
    pub fn insert(&mut self, topic: &str, handler: Handler) -> bool {
        let handlers = self.topics.entry(topic.to_string()).or_default();
        handlers.push(handler);
        handlers.len() == 1
    }

    pub fn insert_catch_all(&mut self, handler: Handler) {
        self.catch_all.push(handler);
    }

    /// Handlers for a message on `topic`: catch-all handlers first, then the
    /// exact-topic handlers, each group in registration order.
    pub fn handlers_for(&self, topic: &str) -> Vec<Handler> {
        let exact = self.topics.get(topic).map(Vec::as_slice).unwrap_or_default();
        self.catch_all.iter().chain(exact).cloned().collect()
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn handler_count(&self) -> usize {
        self.catch_all.len() + self.topics.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.handler_count() == 0
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("topics", &self.topics())
            .field("catch_all", &self.catch_all.len())
            .finish()
    }
}
