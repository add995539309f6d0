//! Query lifecycle events
//!
//! The executor reports four notifications to an injected [`EventSink`]:
//! `pre_build`, `pre_execute`, `post_execute` and `post_error`. The default
//! sink does nothing. [`EventEmitter`] dispatches them to named, prioritized
//! handlers for callers that want several listeners.

use crate::database::connection::ConnectionInfo;
use crate::query_builder::QuerySpec;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Event names used by [`EventEmitter`]
pub mod names {
    pub const PRE_BUILD: &str = "query.pre_build";
    pub const PRE_EXECUTE: &str = "query.pre_execute";
    pub const POST_EXECUTE: &str = "query.post_execute";
    pub const POST_ERROR: &str = "query.post_error";
}

/// Payload handed to every notification
#[derive(Debug, Clone, Serialize)]
pub struct QueryEvent {
    /// One of the [`names`] constants
    pub event: &'static str,
    pub connection: ConnectionInfo,
    /// `None` for raw SQL passed to `execute_raw`
    pub spec: Option<QuerySpec>,
    /// Set once the SQL is built
    pub sql: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Set on `post_execute` and `post_error`
    pub elapsed: Option<Duration>,
    pub error: Option<String>,
}

impl QueryEvent {
    pub fn new(event: &'static str, connection: ConnectionInfo, spec: Option<QuerySpec>) -> Self {
        Self {
            event,
            connection,
            spec,
            sql: None,
            started_at: Utc::now(),
            elapsed: None,
            error: None,
        }
    }

    /// Same payload under another event name
    pub fn stage(&self, event: &'static str) -> Self {
        Self {
            event,
            ..self.clone()
        }
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn elapsed_ms(&self) -> Option<f64> {
        self.elapsed.map(|d| d.as_secs_f64() * 1000.0)
    }
}

/// Receiver of query lifecycle notifications
pub trait EventSink: Send + Sync {
    fn pre_build(&self, _event: &QueryEvent) {}

    fn pre_execute(&self, _event: &QueryEvent) {}

    fn post_execute(&self, _event: &QueryEvent) {}

    fn post_error(&self, _event: &QueryEvent) {}
}

/// Sink that ignores everything (the executor default)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {}

/// Sink that forwards notifications to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn pre_execute(&self, event: &QueryEvent) {
        log::debug!(
            "[{}] executing: {}",
            event.connection.backend,
            event.sql.as_deref().unwrap_or("")
        );
    }

    fn post_execute(&self, event: &QueryEvent) {
        log::debug!(
            "[{}] done in {:.2}ms",
            event.connection.backend,
            event.elapsed_ms().unwrap_or_default()
        );
    }

    fn post_error(&self, event: &QueryEvent) {
        log::warn!(
            "[{}] failed after {:.2}ms: {}",
            event.connection.backend,
            event.elapsed_ms().unwrap_or_default(),
            event.error.as_deref().unwrap_or("unknown error")
        );
    }
}

/// Event handler function type
pub type EventHandlerFn = Arc<dyn Fn(&QueryEvent) + Send + Sync>;

/// Priority for event handler execution (lower values execute first)
pub type Priority = i32;

/// Unique identifier for event handlers
pub type HandlerId = usize;

struct EventHandler {
    id: HandlerId,
    handler: EventHandlerFn,
    once: bool,
}

/// Dispatches events to named handlers in priority order
pub struct EventEmitter {
    handlers: HashMap<String, BTreeMap<Priority, Vec<EventHandler>>>,
    next_id: HandlerId,
    executed_once: Mutex<HashSet<HandlerId>>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            next_id: 1,
            executed_once: Mutex::new(HashSet::new()),
        }
    }

    /// Register an event handler with default priority (0)
    pub fn on<F>(&mut self, event: &str, handler: F) -> HandlerId
    where
        F: Fn(&QueryEvent) + Send + Sync + 'static,
    {
        self.register(event, 0, Arc::new(handler), false)
    }

    /// Register an event handler with specific priority
    pub fn on_priority<F>(&mut self, event: &str, priority: Priority, handler: F) -> HandlerId
    where
        F: Fn(&QueryEvent) + Send + Sync + 'static,
    {
        self.register(event, priority, Arc::new(handler), false)
    }

    /// Register a handler that runs on the first matching event only
    pub fn once<F>(&mut self, event: &str, handler: F) -> HandlerId
    where
        F: Fn(&QueryEvent) + Send + Sync + 'static,
    {
        self.register(event, 0, Arc::new(handler), true)
    }

    fn register(
        &mut self,
        event: &str,
        priority: Priority,
        handler: EventHandlerFn,
        once: bool,
    ) -> HandlerId {
        let id = self.next_id;
        self.next_id += 1;

        self.handlers
            .entry(event.to_string())
            .or_default()
            .entry(priority)
            .or_default()
            .push(EventHandler { id, handler, once });

        log::debug!(
            "Registered {}handler for '{}' with priority {} (id: {})",
            if once { "one-time " } else { "" },
            event,
            priority,
            id
        );
        id
    }

    /// Remove an event handler by ID
    pub fn off(&mut self, event: &str, handler_id: HandlerId) -> bool {
        if let Some(priorities) = self.handlers.get_mut(event) {
            for handlers in priorities.values_mut() {
                if let Some(pos) = handlers.iter().position(|h| h.id == handler_id) {
                    handlers.remove(pos);
                    return true;
                }
            }
        }
        false
    }

    /// Remove all handlers for an event
    pub fn clear(&mut self, event: &str) {
        self.handlers.remove(event);
    }

    pub fn has_handlers(&self, event: &str) -> bool {
        self.handler_count(event) > 0
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers
            .get(event)
            .map(|p| p.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Run the handlers registered for `event.event`; returns how many ran
    pub fn emit(&self, event: &QueryEvent) -> usize {
        let Some(priorities) = self.handlers.get(event.event) else {
            return 0;
        };

        let mut executed = 0;
        for handlers in priorities.values() {
            for handler in handlers {
                if handler.once {
                    let mut seen = self
                        .executed_once
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    if !seen.insert(handler.id) {
                        continue;
                    }
                }
                (handler.handler)(event);
                executed += 1;
            }
        }
        executed
    }
}

impl EventSink for EventEmitter {
    fn pre_build(&self, event: &QueryEvent) {
        self.emit(event);
    }

    fn pre_execute(&self, event: &QueryEvent) {
        self.emit(event);
    }

    fn post_execute(&self, event: &QueryEvent) {
        self.emit(event);
    }

    fn post_error(&self, event: &QueryEvent) {
        self.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::types::DatabaseBackend;

    fn event(name: &'static str) -> QueryEvent {
        QueryEvent::new(
            name,
            ConnectionInfo::new(DatabaseBackend::SQLite, "sqlite::memory:"),
            None,
        )
    }

    #[test]
    fn test_handlers_run_in_priority_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut emitter = EventEmitter::new();

        let o = order.clone();
        emitter.on_priority(names::POST_EXECUTE, 10, move |_| o.lock().unwrap().push("late"));
        let o = order.clone();
        emitter.on_priority(names::POST_EXECUTE, -5, move |_| o.lock().unwrap().push("early"));

        assert_eq!(emitter.emit(&event(names::POST_EXECUTE)), 2);
        assert_eq!(*order.lock().unwrap(), vec!["early", "late"]);
    }

    #[test]
    fn test_once_and_off() {
        let mut emitter = EventEmitter::new();
        emitter.once(names::PRE_BUILD, |_| {});
        let id = emitter.on(names::PRE_BUILD, |_| {});

        assert_eq!(emitter.emit(&event(names::PRE_BUILD)), 2);
        assert_eq!(emitter.emit(&event(names::PRE_BUILD)), 1);

        assert!(emitter.off(names::PRE_BUILD, id));
        assert!(!emitter.off(names::PRE_BUILD, id));
        assert_eq!(emitter.emit(&event(names::PRE_BUILD)), 0);
    }

    #[test]
    fn test_sink_dispatch_uses_event_name() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let mut emitter = EventEmitter::new();
        let e = errors.clone();
        emitter.on(names::POST_ERROR, move |ev| {
            e.lock().unwrap().push(ev.error.clone().unwrap_or_default())
        });

        let sink: Arc<dyn EventSink> = Arc::new(emitter);
        sink.post_execute(&event(names::POST_EXECUTE));
        sink.post_error(&event(names::POST_ERROR).with_error("boom"));

        assert_eq!(*errors.lock().unwrap(), vec!["boom".to_string()]);
    }

    #[test]
    fn test_event_stage_keeps_payload() {
        let base = event(names::PRE_BUILD).with_sql("SELECT 1");
        let next = base.stage(names::PRE_EXECUTE);
        assert_eq!(next.event, names::PRE_EXECUTE);
        assert_eq!(next.sql.as_deref(), Some("SELECT 1"));
        assert_eq!(
            base.with_elapsed(Duration::from_millis(3)).elapsed_ms(),
            Some(3.0)
        );
    }
}
