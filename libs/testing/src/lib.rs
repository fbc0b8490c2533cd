//! Shared test support for the harness's own test suites.
//!
//! Provides a scripted wiremock responder that emulates a remote resource
//! converging through a sequence of states, and a tracing initializer for
//! test binaries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use wiremock::{Request, Respond, ResponseTemplate};

/// Responds with a predetermined sequence of templates; the final template
/// repeats once the script is exhausted.
///
/// Emulates a resource converging through states: mount one of these on a
/// status endpoint and each poll observes the next scripted state.
#[derive(Clone)]
pub struct ScriptedResponder {
    steps: Arc<Mutex<Vec<ResponseTemplate>>>,
    polls: Arc<AtomicUsize>,
}

impl ScriptedResponder {
    pub fn new(steps: Vec<ResponseTemplate>) -> Self {
        assert!(!steps.is_empty(), "script needs at least one step");
        Self {
            steps: Arc::new(Mutex::new(steps)),
            polls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Script of JSON bodies, all served with status 200.
    pub fn json_states(states: Vec<serde_json::Value>) -> Self {
        Self::new(
            states
                .into_iter()
                .map(|body| ResponseTemplate::new(200).set_body_json(body))
                .collect(),
        )
    }

    /// Number of requests observed so far.
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl Respond for ScriptedResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let index = self.polls.fetch_add(1, Ordering::SeqCst);
        let steps = self.steps.lock().unwrap();
        steps[index.min(steps.len() - 1)].clone()
    }
}

/// Install a tracing subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,nimbus_convergence=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
