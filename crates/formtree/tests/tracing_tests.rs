#![forbid(unsafe_code)]

//! Structured logging of the store and controller.
//!
//! Reducer faults never surface as errors from `dispatch`; these tests assert
//! on the captured log instead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use formtree::{
    Action, ControllerOptions, Field, FieldTree, FieldsUpdate, FormController, FormData,
    FormEvent, FormStore, FormTarget,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

// ============================================================================
// Test Infrastructure
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedSpan {
    name: String,
    fields: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    fields: HashMap<String, String>,
    span: Option<String>,
}

impl CapturedEvent {
    fn message(&self) -> &str {
        self.fields.get("message").map_or("", String::as_str)
    }
}

/// A tracing Layer that records spans and events.
struct Capture {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

struct CaptureHandle {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CaptureHandle {
    fn spans(&self) -> Vec<CapturedSpan> {
        self.spans.lock().unwrap().clone()
    }

    fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    fn events_at(&self, level: tracing::Level) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.level == level)
            .collect()
    }
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S> tracing_subscriber::Layer<S> for Capture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        _id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);
        self.spans.lock().unwrap().push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            fields: visitor.0.into_iter().collect(),
        });
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let span = ctx
            .event_span(event)
            .map(|span_ref| span_ref.name().to_string());
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            fields: visitor.0.into_iter().collect(),
            span,
        });
    }
}

fn with_capture<F: FnOnce()>(f: F) -> CaptureHandle {
    let spans = Arc::new(Mutex::new(Vec::new()));
    let events = Arc::new(Mutex::new(Vec::new()));
    let layer = Capture {
        spans: spans.clone(),
        events: events.clone(),
    };
    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::with_default(subscriber, f);
    CaptureHandle { spans, events }
}

struct StaticTarget(FormData);

impl FormTarget for StaticTarget {
    fn form_data(&self) -> FormData {
        self.0.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn dispatch_opens_a_span_per_action() {
    let handle = with_capture(|| {
        let mut store = FormStore::new("test", Field::string().into(), None).unwrap();
        store.dispatch(Action::Mount {
            data: FormData::new().with("test", "x"),
        });
        store.dispatch(Action::Reset {
            data: FormData::new(),
        });
    });
    let actions: Vec<String> = handle
        .spans()
        .into_iter()
        .filter(|span| span.name == "form_dispatch")
        .filter_map(|span| span.fields.get("action").cloned())
        .collect();
    assert_eq!(actions, vec!["Mount", "Reset"]);
}

#[test]
fn commits_are_logged_inside_the_dispatch_span() {
    let handle = with_capture(|| {
        let mut store = FormStore::new("test", Field::string().into(), None).unwrap();
        store.dispatch(Action::Mount {
            data: FormData::new().with("test", "x"),
        });
    });
    let commit = handle
        .events_at(tracing::Level::DEBUG)
        .into_iter()
        .find(|event| event.message() == "form state committed")
        .expect("commit event");
    assert_eq!(commit.span.as_deref(), Some("form_dispatch"));
    assert_eq!(commit.fields.get("states").map(String::as_str), Some("1"));
}

#[test]
fn reducer_fault_is_logged_and_state_kept() {
    let shared = Field::string();
    let mut kept = None;
    let handle = with_capture(|| {
        let mut store = FormStore::new("test", FieldTree::record([("a", shared.clone().into())]), None)
            .unwrap();
        let before = Arc::clone(store.state());
        let after = store.dispatch(Action::SetFields(FieldsUpdate::Replace(FieldTree::record([
            ("a", shared.clone().into()),
            ("b", shared.clone().into()),
        ]))));
        kept = Some(Arc::ptr_eq(&before, &after));
    });
    assert_eq!(kept, Some(true));

    let errors = handle.events_at(tracing::Level::ERROR);
    assert_eq!(errors.len(), 1);
    let error = &errors[0];
    assert_eq!(error.fields.get("action").map(String::as_str), Some("SetFields"));
    assert!(
        error
            .fields
            .get("error")
            .is_some_and(|e| e.contains("appears at both")),
        "unexpected error fields: {:?}",
        error.fields
    );
}

#[test]
fn no_change_means_no_commit_log() {
    let handle = with_capture(|| {
        let mut store = FormStore::new("test", Field::string().into(), None).unwrap();
        let data = FormData::new().with("test", "x");
        store.dispatch(Action::Mount { data: data.clone() });
        store.dispatch(Action::Mount { data });
    });
    let commits = handle
        .events()
        .into_iter()
        .filter(|event| event.message() == "form state committed")
        .count();
    assert_eq!(commits, 1);
}

#[test]
fn ignored_change_events_are_logged() {
    let handle = with_capture(|| {
        let fields = FieldTree::record([("a", Field::string().into())]);
        let mut controller = FormController::new(ControllerOptions::new("test", fields)).unwrap();
        controller.mount(std::rc::Rc::new(StaticTarget(
            FormData::new().with("test.a", "x"),
        )));
        controller
            .handle_event(FormEvent::Change {
                name: "test.nope".into(),
            })
            .unwrap();
        controller
            .handle_event(FormEvent::Change {
                name: "other.a".into(),
            })
            .unwrap();
    });
    let warnings = handle.events_at(tracing::Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].fields.get("name").map(String::as_str), Some("test.nope"));
    assert!(
        handle
            .events_at(tracing::Level::TRACE)
            .iter()
            .any(|event| event.fields.get("name").map(String::as_str) == Some("other.a"))
    );
}

#[test]
fn debug_state_dump_has_one_event_per_field() {
    let handle = with_capture(|| {
        let fields = FieldTree::record([("a", Field::string().into()), ("b", Field::number().into())]);
        let store = FormStore::new("test", fields, None).unwrap();
        store.log_debug_state();
    });
    let field_events = handle
        .events()
        .into_iter()
        .filter(|event| event.message() == "field state")
        .count();
    assert_eq!(field_events, 3);
}
