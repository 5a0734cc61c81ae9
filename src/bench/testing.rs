//! Scripted in-memory relay used by the benchmark tests.

use crate::error::TransportError;
use crate::traits::{RelayTransport, Transfer};
use crate::types::Endpoint;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

type Reply = Result<Transfer, TransportError>;
type ScriptFn = Box<dyn Fn(Duration, &str) -> Reply + Send + Sync>;

enum Script {
    Reply(ScriptFn),
    Hang,
}

pub fn mb() -> u64 {
    1024 * 1024
}

/// A transfer that measures exactly `speed` MB/s.
pub fn transfer_at(speed: f64) -> Transfer {
    Transfer {
        bytes: mb(),
        elapsed: Duration::from_secs_f64(1.0 / speed),
    }
}

/// Endpoints without a script time out.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<(String, Duration, String)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixed(self, endpoint: &str, reply: Reply) -> Self {
        self.script(endpoint, move |_, _| reply.clone())
    }

    /// Answers at `speed` once the timeout reaches `needs`, times out before.
    pub fn slow(self, endpoint: &str, needs: Duration, speed: f64) -> Self {
        self.script(endpoint, move |timeout, _| {
            if timeout >= needs {
                Ok(transfer_at(speed))
            } else {
                Err(TransportError::Timeout)
            }
        })
    }

    /// Different speeds for the bulk payload and the ranking payload.
    pub fn by_payload(self, endpoint: &str, small: Reply, large: Reply) -> Self {
        self.script(endpoint, move |_, url| {
            if url.contains("download_1") {
                large.clone()
            } else {
                small.clone()
            }
        })
    }

    pub fn hang(mut self, endpoint: &str) -> Self {
        self.scripts.insert(endpoint.to_string(), Script::Hang);
        self
    }

    pub fn script<F>(mut self, endpoint: &str, f: F) -> Self
    where
        F: Fn(Duration, &str) -> Reply + Send + Sync + 'static,
    {
        self.scripts
            .insert(endpoint.to_string(), Script::Reply(Box::new(f)));
        self
    }

    /// (endpoint, timeout, url) of every download, in call order.
    pub fn calls(&self) -> Vec<(String, Duration, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, endpoint: &str) -> usize {
        self.calls().iter().filter(|(e, _, _)| e == endpoint).count()
    }
}

#[async_trait]
impl RelayTransport for ScriptedTransport {
    async fn download(&self, endpoint: &Endpoint, url: &str, timeout: Duration) -> Reply {
        let key = endpoint.to_string();
        self.calls
            .lock()
            .unwrap()
            .push((key.clone(), timeout, url.to_string()));

        match self.scripts.get(&key) {
            Some(Script::Reply(f)) => f(timeout, url),
            Some(Script::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TransportError::Timeout)
            }
            None => Err(TransportError::Timeout),
        }
    }
}
