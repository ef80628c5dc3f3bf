//! Shared helpers for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use logship::intercept::OutputChannel;
use logship::prelude::*;
use logship::proto::{IngestEventRequest, IngestEventResponse};
use logship::types::render_args;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Install a fmt subscriber once so agent internals show up with `RUST_LOG`
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Transport that records every request and answers from a script
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<IngestEventRequest>>,
    failures: Mutex<VecDeque<bool>>,
    delay: Mutex<Option<Duration>>,
    closes: AtomicUsize,
    after_close: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call
    pub fn fail_next(&self) {
        self.failures.lock().push_back(true);
    }

    /// Make every call wait this long before answering
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<IngestEventRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Messages of every request, in arrival order
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.requests
            .lock()
            .iter()
            .map(|request| request.logs.iter().map(|log| log.message.clone()).collect())
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Calls that arrived after the transport was closed
    pub fn calls_after_close(&self) -> usize {
        self.after_close.load(Ordering::SeqCst)
    }

    /// Poll until `count` requests arrived or `within` elapsed
    pub async fn wait_for_requests(&self, count: usize, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.request_count() >= count {
                return true;
            }
            sleep(Duration::from_millis(5)).await;
        }
        self.request_count() >= count
    }
}

#[async_trait]
impl IngestionTransport for RecordingTransport {
    async fn ingest_log_batch(&self, request: IngestEventRequest) -> Result<IngestEventResponse> {
        if self.close_count() > 0 {
            self.after_close.fetch_add(1, Ordering::SeqCst);
        }

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            sleep(delay).await;
        }

        self.requests.lock().push(request);
        let fail = self.failures.lock().pop_front().unwrap_or(false);
        if fail {
            return Err(LogShipError::Rpc(tonic::Status::unavailable("ingestion offline")));
        }
        Ok(IngestEventResponse { success: true })
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Host output sink keeping every line
#[derive(Default)]
pub struct HostSink {
    pub lines: Mutex<Vec<(OutputChannel, String)>>,
}

impl HostSink {
    pub fn lines_on(&self, channel: OutputChannel) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, line)| line.clone())
            .collect()
    }
}

impl OutputSink for HostSink {
    fn emit(&self, channel: OutputChannel, args: &[LogArg]) {
        self.lines.lock().push((channel, render_args(args)));
    }
}

pub fn config(batch_size: usize, flush_interval: Duration) -> AgentConfig {
    AgentConfig::builder("checkout-service", "secret-token")
        .batch_size(batch_size)
        .flush_interval(flush_interval)
        .shutdown_timeout(Duration::from_secs(2))
        .build()
        .unwrap()
}
