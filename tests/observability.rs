//! Checks the structured events emitted by the task layer.
//!
//! Events are emitted on unit threads, so they are captured with a global
//! layer and filtered by task id.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use taskline::{BatchActionTask, ResultTask, SubstrateBuilder, TaskId};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, registry};

#[derive(Debug, Clone)]
struct Captured {
    level: Level,
    message: String,
    fields: HashMap<String, String>,
}

#[derive(Clone, Default)]
struct CaptureLayer {
    events: Arc<Mutex<Vec<Captured>>>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut FieldVisitor(&mut fields));

        let message = fields.remove("message").unwrap_or_default();
        self.events.lock().unwrap().push(Captured {
            level: *event.metadata().level(),
            message,
            fields,
        });
    }
}

struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0
            .insert(field.name().to_string(), format!("{value:?}"));
    }
}

fn capture() -> &'static CaptureLayer {
    static LAYER: OnceLock<CaptureLayer> = OnceLock::new();

    LAYER.get_or_init(|| {
        let layer = CaptureLayer::default();
        registry().with(layer.clone()).init();
        layer
    })
}

fn events_for(task: TaskId) -> Vec<Captured> {
    let task = task.to_string();

    capture()
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|event| event.fields.get("task") == Some(&task))
        .cloned()
        .collect()
}

#[test]
fn test_group_failure_emits_cascade_warning() {
    capture();
    let substrate = SubstrateBuilder::new().build();

    let batch = BatchActionTask::of(&substrate, 0..6, 2, |n| {
        if n == 2 {
            return Err("bad record".into());
        }
        taskline::sleep(Duration::from_secs(2))?;
        Ok(())
    });
    batch.wait();
    assert!(substrate.await_idle(Duration::from_secs(5)));

    let events = events_for(batch.id());
    let cascade = events
        .iter()
        .find(|event| event.message == "cascading cancellation after group failure")
        .expect("cascade event emitted");

    assert_eq!(cascade.level, Level::WARN);
    assert_eq!(cascade.fields.get("group").map(String::as_str), Some("1"));
    assert_eq!(cascade.fields.get("attempted").map(String::as_str), Some("2"));
    assert_eq!(cascade.fields.get("cancelled").map(String::as_str), Some("2"));

    assert!(
        events
            .iter()
            .any(|event| event.level == Level::WARN && event.message == "task failed")
    );
}

#[test]
fn test_task_failure_is_logged_once() {
    capture();
    let substrate = SubstrateBuilder::new().build();

    let task = ResultTask::<u32>::of(&substrate, || Err("unreachable host".into()));
    assert_eq!(task.get(), None);

    let failures: Vec<_> = events_for(task.id())
        .into_iter()
        .filter(|event| event.message == "task failed")
        .collect();

    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures[0].fields.get("error").map(String::as_str),
        Some("unit of work failed: unreachable host")
    );
}
