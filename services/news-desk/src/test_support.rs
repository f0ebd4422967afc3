//! Scripted generation backend and app state for router tests

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use generation::{BackendError, ChatMessage, ClientFactory, GenerationClient};
use key_pool::{KeyPool, KeyRotator, RotationSettings};
use news_store::JsonFileStore;

use crate::service::{AppState, ServiceMetrics};

/// Reply used once the script runs out.
pub const DEFAULT_REPLY: &str = "# સ્ક્રિપ્ટ શીર્ષક\n\nસમાચાર લખાણ";

/// Replies handed out in order, plus a log of every call.
#[derive(Default)]
pub struct Script {
    replies: Mutex<VecDeque<generation::Result<String>>>,
    calls: Mutex<Vec<(String, Vec<ChatMessage>)>>,
}

impl Script {
    pub fn push_ok(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Ok(text.to_owned()));
    }

    pub fn push_err(&self, error: BackendError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    /// `(key, messages)` for each invocation, in order.
    pub fn calls(&self) -> Vec<(String, Vec<ChatMessage>)> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self, key: &str, messages: &[ChatMessage]) -> generation::Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((key.to_owned(), messages.to_vec()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(DEFAULT_REPLY.to_owned()))
    }
}

struct ScriptedClient {
    key: String,
    script: Arc<Script>,
}

impl GenerationClient for ScriptedClient {
    fn invoke<'a>(
        &'a self,
        messages: &'a [ChatMessage],
    ) -> Pin<Box<dyn Future<Output = generation::Result<String>> + Send + 'a>> {
        Box::pin(async move { self.script.next(&self.key, messages) })
    }
}

pub struct ScriptedFactory {
    pub script: Arc<Script>,
}

impl ClientFactory for ScriptedFactory {
    fn create(&self, api_key: &str) -> Arc<dyn GenerationClient> {
        Arc::new(ScriptedClient {
            key: api_key.to_owned(),
            script: self.script.clone(),
        })
    }
}

/// App state over a scripted backend and a store in `dir`.
pub async fn test_state(dir: &std::path::Path, keys: &[&str]) -> (AppState, Arc<Script>) {
    let script = Arc::new(Script::default());
    let pool = KeyPool::new(
        keys.iter().map(|k| (*k).to_owned()).collect(),
        Duration::from_secs(60),
    )
    .unwrap();
    let rotator = KeyRotator::new(
        Arc::new(pool),
        Arc::new(ScriptedFactory {
            script: script.clone(),
        }),
        RotationSettings {
            retry_budget: 3,
            backoff: Duration::ZERO,
        },
    );
    let store = JsonFileStore::load(dir.join("news.json")).await.unwrap();
    let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new()
        .build_recorder()
        .handle();

    let state = AppState {
        rotator: Arc::new(rotator),
        store: Arc::new(store),
        metrics: ServiceMetrics::new(),
        prometheus,
    };
    (state, script)
}
