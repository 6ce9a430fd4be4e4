//! Queue naming and routing-key bindings.

use std::collections::HashMap;
use std::fmt;

use gavel_core::bus::RoutingKey;
use gavel_core::event::EventKind;

/// Short name of the authoritative auction service.
pub const AUCTION_SERVICE: &str = "auction";
/// Short name of the derived search service.
pub const SEARCH_SERVICE: &str = "search";

/// Name of a durable queue: `<producer>-<consumer>-<event-kind>`, kebab-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueName(String);

impl QueueName {
    /// Builds a queue name from its three parts.
    #[must_use]
    pub fn new(producer: &str, consumer: &str, kind: &str) -> Self {
        Self(kebab_case(&format!("{producer}-{consumer}-{kind}")))
    }

    /// Queue on which `consumer` receives `kind` events from `producer`.
    #[must_use]
    pub fn for_events(producer: &str, consumer: &str, kind: EventKind) -> Self {
        Self::new(producer, consumer, kind.as_str())
    }

    /// Queue on which `consumer` receives faults raised by `producer` while
    /// handling `kind` events.
    #[must_use]
    pub fn for_faults(producer: &str, consumer: &str, kind: EventKind) -> Self {
        Self::new(
            producer,
            consumer,
            &RoutingKey::fault(kind).to_string(),
        )
    }

    /// Wraps an already-formatted name, e.g. one read back from storage.
    #[must_use]
    pub fn from_raw(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Converts `PascalCase`, `snake_case` or spaced text to kebab-case.
#[must_use]
pub fn kebab_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut prev_lower_or_digit = false;
    for ch in input.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower_or_digit {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower_or_digit = false;
        } else if ch.is_ascii_alphanumeric() {
            out.push(ch);
            prev_lower_or_digit = true;
        } else {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            prev_lower_or_digit = false;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Which queues receive which routing keys.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    bindings: HashMap<RoutingKey, Vec<QueueName>>,
}

impl Topology {
    /// Creates a topology with no bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `queue` to `key`. Binding the same pair twice is a no-op.
    #[must_use]
    pub fn bind(mut self, key: RoutingKey, queue: QueueName) -> Self {
        let queues = self.bindings.entry(key).or_default();
        if !queues.contains(&queue) {
            queues.push(queue);
        }
        self
    }

    /// Queues bound to `key`.
    #[must_use]
    pub fn queues_for(&self, key: RoutingKey) -> &[QueueName] {
        self.bindings.get(&key).map_or(&[], Vec::as_slice)
    }

    /// The standard wiring: the search service consumes every auction event
    /// kind, the auction service consumes the faults search raises for each.
    #[must_use]
    pub fn auction_search() -> Self {
        EventKind::ALL.into_iter().fold(Self::new(), |topology, kind| {
            topology
                .bind(
                    RoutingKey::event(kind),
                    QueueName::for_events(AUCTION_SERVICE, SEARCH_SERVICE, kind),
                )
                .bind(
                    RoutingKey::fault(kind),
                    QueueName::for_faults(SEARCH_SERVICE, AUCTION_SERVICE, kind),
                )
        })
    }
}
