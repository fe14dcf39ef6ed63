//! Test doubles shared by the worker and dispatcher tests

use async_trait::async_trait;
use parking_lot::Mutex;
use purger_client::{Connector, ProxyError, PurgeConnection, PurgeResponse, StatusCode};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Scripted answer to one purge attempt
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Status(u16),
    /// Transport failure
    Fail,
    /// Never completes
    Hang,
    /// Waits for [`ScriptedConnector::release`], then answers with the status
    Gated(u16),
}

struct Shared {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: Mutex<Vec<String>>,
    gate: Semaphore,
}

/// Connector whose connections answer from a script, then from a fallback
pub struct ScriptedConnector {
    shared: Arc<Shared>,
    connects: AtomicUsize,
    fail_connect: bool,
    connect_gate: Option<Semaphore>,
}

impl ScriptedConnector {
    pub fn new(script: Vec<Reply>, fallback: Reply) -> Self {
        Self {
            shared: Arc::new(Shared {
                script: Mutex::new(script.into()),
                fallback,
                calls: Mutex::new(Vec::new()),
                gate: Semaphore::new(0),
            }),
            connects: AtomicUsize::new(0),
            fail_connect: false,
            connect_gate: None,
        }
    }

    /// Every connection attempt fails
    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Connections are not handed out until [`Self::open_connections`]
    pub fn paused(mut self) -> Self {
        self.connect_gate = Some(Semaphore::new(0));
        self
    }

    pub fn open_connections(&self) {
        if let Some(gate) = &self.connect_gate {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Let one gated reply complete
    pub fn release(&self) {
        self.shared.gate.add_permits(1);
    }

    /// URLs purged so far, in the order the requests were sent
    pub fn calls(&self) -> Vec<String> {
        self.shared.calls.lock().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, _destination: &str) -> Result<Box<dyn PurgeConnection>, ProxyError> {
        if let Some(gate) = &self.connect_gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| ProxyError::Unavailable(e.to_string()))?;
        }

        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(ProxyError::Unavailable("connection refused".to_string()));
        }

        Ok(Box::new(ScriptedConnection {
            shared: self.shared.clone(),
        }))
    }
}

struct ScriptedConnection {
    shared: Arc<Shared>,
}

#[async_trait]
impl PurgeConnection for ScriptedConnection {
    async fn purge(&self, url: &str, _verb: &str) -> Result<PurgeResponse, ProxyError> {
        self.shared.calls.lock().push(url.to_string());
        let reply = self
            .shared
            .script
            .lock()
            .pop_front()
            .unwrap_or(self.shared.fallback);

        let status = match reply {
            Reply::Status(status) => status,
            Reply::Fail => {
                return Err(ProxyError::Unavailable("connection reset".to_string()));
            }
            Reply::Hang => std::future::pending().await,
            Reply::Gated(status) => {
                self.shared.gate.acquire().await.unwrap().forget();
                status
            }
        };

        Ok(PurgeResponse {
            status: StatusCode::from_u16(status).unwrap(),
            x_cache: String::new(),
            x_error: String::new(),
        })
    }
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// In-memory sink for log lines emitted during a test
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
