// widgetdesk-core/src/event.rs
use crossbeam::channel::{Receiver, Sender, unbounded};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Topic published after a widget instance has been created and activated
pub const TOPIC_WIDGET_ACTIVATED: &str = "widget.activated";
/// Topic published after a widget instance has been closed and dropped
pub const TOPIC_WIDGET_DEACTIVATED: &str = "widget.deactivated";
/// Topic published after the widget directory was scanned again
pub const TOPIC_WIDGET_RESCANNED: &str = "widget.rescanned";
/// Topic published when the UI language changes
pub const TOPIC_LOCALE_CHANGED: &str = "locale.changed";
/// Topic used by monitoring widgets for periodic system metrics
pub const TOPIC_SYSTEM_METRICS: &str = "system.metrics";

/// Event payload - can be any type
#[derive(Clone)]
pub struct EventPayload(Arc<dyn Any + Send + Sync>);

impl EventPayload {
    pub fn new<T: Any + Send + Sync>(data: T) -> Self {
        Self(Arc::new(data))
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::downcast(self.0.clone()).ok()
    }
}

/// Event with topic and payload
#[derive(Clone)]
pub struct Event {
    pub topic: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new<T: Any + Send + Sync>(topic: impl Into<String>, data: T) -> Self {
        Self {
            topic: topic.into(),
            payload: EventPayload::new(data),
        }
    }
}

/// Subscription handle - dropping this unsubscribes
pub struct Subscription {
    id: usize,
    bus: Arc<EventBusInner>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut subs = self
            .bus
            .subscriptions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subs.remove(&self.id);
    }
}

struct EventBusInner {
    subscriptions: RwLock<HashMap<usize, (String, Sender<Event>)>>,
    next_id: AtomicUsize,
}

/// Topic-based pub/sub shared by the host, the lifecycle manager and widgets
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                subscriptions: RwLock::new(HashMap::new()),
                next_id: AtomicUsize::new(0),
            }),
        }
    }

    /// Publish an event to all matching subscribers
    pub fn publish(&self, event: Event) {
        let subs = self
            .inner
            .subscriptions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for (pattern, tx) in subs.values() {
            if Self::topic_matches(&event.topic, pattern) {
                // Subscriber may already be gone
                let _ = tx.send(event.clone());
            }
        }
    }

    /// Subscribe to topics with wildcard support
    /// Returns (Subscription, Receiver) - drop Subscription to unsubscribe
    pub fn subscribe(&self, pattern: impl Into<String>) -> (Subscription, Receiver<Event>) {
        let (tx, rx) = unbounded();
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);

        self.inner
            .subscriptions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, (pattern.into(), tx));

        let sub = Subscription {
            id,
            bus: self.inner.clone(),
        };

        (sub, rx)
    }

    /// Check if topic matches pattern (supports * wildcard)
    fn topic_matches(topic: &str, pattern: &str) -> bool {
        if topic == pattern {
            return true;
        }

        let topic_parts: Vec<&str> = topic.split('.').collect();
        let pattern_parts: Vec<&str> = pattern.split('.').collect();

        if pattern_parts.len() > topic_parts.len() {
            return false;
        }

        for (i, pattern_part) in pattern_parts.iter().enumerate() {
            if *pattern_part == "*" {
                // Trailing wildcard swallows the rest of the topic
                if i == pattern_parts.len() - 1 {
                    return true;
                }
                continue;
            }

            if topic_parts[i] != *pattern_part {
                return false;
            }
        }

        pattern_parts.len() == topic_parts.len()
    }
}

/// Payload of `widget.activated` / `widget.deactivated`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetLifecycle {
    pub name: String,
    pub instance_id: u64,
}

/// Payload of `widget.rescanned`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetsRescanned {
    pub available: Vec<String>,
    pub removed: Vec<String>,
}

/// Payload of `locale.changed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleChanged {
    pub language: String,
}

/// Payload of `system.metrics`
#[derive(Debug, Clone)]
pub struct SystemMetrics {
    pub cpu_usage: f32,
    pub memory_used: u64,
    pub memory_total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_matching() {
        assert!(EventBus::topic_matches("widget.activated", "widget.activated"));
        assert!(EventBus::topic_matches("widget.activated", "widget.*"));
        assert!(EventBus::topic_matches("system.metrics.cpu", "system.*"));
        assert!(!EventBus::topic_matches("locale.changed", "widget.*"));
        assert!(!EventBus::topic_matches("widget", "widget.activated"));
        assert!(EventBus::topic_matches("any.thing.here", "*"));
    }

    #[test]
    fn test_pubsub() {
        let bus = EventBus::new();
        let (_sub, rx) = bus.subscribe("widget.*");

        bus.publish(Event::new(
            TOPIC_WIDGET_ACTIVATED,
            WidgetLifecycle {
                name: "clock".to_string(),
                instance_id: 7,
            },
        ));

        let event = rx.recv().unwrap();
        assert_eq!(event.topic, TOPIC_WIDGET_ACTIVATED);

        let received: Arc<WidgetLifecycle> = event.payload.downcast().unwrap();
        assert_eq!(received.name, "clock");
        assert_eq!(received.instance_id, 7);
    }

    #[test]
    fn test_wrong_downcast_is_none() {
        let event = Event::new(TOPIC_LOCALE_CHANGED, 42u32);
        assert!(event.payload.downcast::<LocaleChanged>().is_none());
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let (sub, rx) = bus.subscribe(TOPIC_LOCALE_CHANGED);

        bus.publish(Event::new(
            TOPIC_LOCALE_CHANGED,
            LocaleChanged {
                language: "nl".to_string(),
            },
        ));
        assert!(rx.recv().is_ok());

        drop(sub);

        bus.publish(Event::new(
            TOPIC_LOCALE_CHANGED,
            LocaleChanged {
                language: "en".to_string(),
            },
        ));
        assert!(rx.recv().is_err());
    }
}
