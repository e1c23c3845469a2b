//! Shared utilities for lifecycle integration tests.

#![allow(dead_code)]

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use node_lifecycle::lifecycle::{NodeContext, Stoppable};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Hook invocation kinds, in the order a full lifecycle produces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Prepare,
    Start,
    Stop,
    ChildrenStopped,
    Completed,
}

/// Shared, ordered log of hook invocations.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<(Hook, String)>>>);

impl Journal {
    pub fn record(&self, hook: Hook, name: &str) {
        self.0.lock().unwrap().push((hook, name.to_string()));
    }

    /// Names recorded for `hook`, in invocation order.
    pub fn names(&self, hook: Hook) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, _)| *h == hook)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn entries(&self) -> Vec<(Hook, String)> {
        self.0.lock().unwrap().clone()
    }
}

/// A component that records every hook and completes synchronously.
pub struct Recorder {
    journal: Journal,
}

impl Recorder {
    pub fn new(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: journal.clone(),
        })
    }
}

impl Stoppable for Recorder {
    fn on_prepare(&self, ctx: &NodeContext) {
        self.journal.record(Hook::Prepare, ctx.name());
    }

    fn on_start(&self, ctx: &NodeContext) {
        self.journal.record(Hook::Start, ctx.name());
    }

    fn on_stop(&self, ctx: &NodeContext) {
        self.journal.record(Hook::Stop, ctx.name());
        self.journal.record(Hook::Completed, ctx.name());
        ctx.signal_completion();
    }

    fn on_children_stopped(&self, ctx: &NodeContext) {
        self.journal.record(Hook::ChildrenStopped, ctx.name());
    }
}

/// A tracing layer that keeps the message of every WARN event.
#[derive(Debug, Clone, Default)]
pub struct WarnCapture(Arc<Mutex<Vec<String>>>);

impl WarnCapture {
    pub fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.messages().iter().filter(|m| m.contains(needle)).count()
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for WarnCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            self.0.lock().unwrap().push(visitor.0);
        }
    }
}

/// Run `f` with `capture` installed as this thread's subscriber.
pub fn with_warnings<T>(capture: &WarnCapture, f: impl FnOnce() -> T) -> T {
    use tracing_subscriber::layer::SubscriberExt;

    let subscriber = tracing_subscriber::registry().with(capture.clone());
    tracing::subscriber::with_default(subscriber, f)
}
