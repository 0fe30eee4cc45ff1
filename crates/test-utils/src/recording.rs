use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use fieldflow::errors::TaskError;
use fieldflow::exec::{SharedRunnable, from_fn};
use fieldflow::types::FieldMap;

/// What a recorded runnable did, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Finished(String),
}

/// Shared log for runnables built with [`Recorder::wrap`].
///
/// Records start/finish events and the inputs each task was called with,
/// so tests can assert on ordering and on what a task saw on the bus.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
    inputs: Arc<Mutex<BTreeMap<String, FieldMap>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `f` so every call is recorded under `task`.
    ///
    /// `Finished` is recorded whether `f` succeeds or fails; a panicking `f`
    /// leaves only `Started`.
    pub fn wrap<F>(&self, task: &str, f: F) -> SharedRunnable
    where
        F: Fn(&FieldMap, &FieldMap) -> Result<FieldMap, TaskError> + Send + Sync + 'static,
    {
        let name = task.to_string();
        let events = Arc::clone(&self.events);
        let inputs_seen = Arc::clone(&self.inputs);

        from_fn(move |ctx, inputs| {
            events.lock().unwrap().push(Event::Started(name.clone()));
            inputs_seen
                .lock()
                .unwrap()
                .insert(name.clone(), inputs.clone());

            let result = f(ctx, inputs);

            events.lock().unwrap().push(Event::Finished(name.clone()));
            result
        })
    }

    /// Recorded runnable returning fixed values.
    pub fn emit(&self, task: &str, values: FieldMap) -> SharedRunnable {
        self.wrap(task, move |_, _| Ok(values.clone()))
    }

    /// Recorded runnable that sleeps before returning fixed values.
    pub fn slow_emit(&self, task: &str, delay: Duration, values: FieldMap) -> SharedRunnable {
        self.wrap(task, move |_, _| {
            thread::sleep(delay);
            Ok(values.clone())
        })
    }

    /// Recorded runnable that always fails with `msg`.
    pub fn failing(&self, task: &str, msg: &str) -> SharedRunnable {
        let msg = msg.to_string();
        self.wrap(task, move |_, _| Err(TaskError::failed(msg.clone())))
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Tasks that started, in start order.
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started(name) => Some(name),
                Event::Finished(_) => None,
            })
            .collect()
    }

    pub fn ran(&self, task: &str) -> bool {
        self.events()
            .iter()
            .any(|e| matches!(e, Event::Started(name) if name == task))
    }

    /// Inputs `task` was last called with.
    pub fn inputs_of(&self, task: &str) -> Option<FieldMap> {
        self.inputs.lock().unwrap().get(task).cloned()
    }

    /// True if `first` finished before `second` started.
    pub fn finished_before(&self, first: &str, second: &str) -> bool {
        let events = self.events();
        let finished = events
            .iter()
            .position(|e| matches!(e, Event::Finished(name) if name == first));
        let started = events
            .iter()
            .position(|e| matches!(e, Event::Started(name) if name == second));
        matches!((finished, started), (Some(f), Some(s)) if f < s)
    }
}
