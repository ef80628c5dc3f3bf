//! The shipping agent: capture, buffer, flush and lifecycle.
//!
//! ```text
//!   host output ──> Console ──> capturing sink ──> LogBuffer
//!                                                   │
//!                    threshold reached / timer tick │ take() (atomic detach)
//!                                                   v
//!                                          flush task (tracked)
//!                                                   │
//!                                                   v
//!                                  IngestionClient ──> IngestionTransport
//! ```
//!
//! Delivery is at-most-once: a batch that fails to deliver is reported on the
//! host's original output sink and dropped. Flushes triggered by the size
//! threshold and by the timer may overlap; each owns a disjoint batch because
//! the buffer is detached before any network I/O starts.

pub mod buffer;
pub mod scheduler;
pub mod stats;

pub use buffer::LogBuffer;
pub use scheduler::FlushScheduler;
pub use stats::{AgentStats, StatsSnapshot};

use crate::client::{GrpcTransport, IngestionClient, IngestionTransport};
use crate::config::AgentConfig;
use crate::intercept::{pass_through, CaptureLayer, Console, Interceptor, OutputSink, Recorder};
use crate::proto::IngestEventResponse;
use crate::types::{CapturedLog, LogArg, LogLevel, LogMetadata};
use crate::{LogShipError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Lifecycle of an [`Agent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Built, timer running, not intercepting yet
    Constructed,
    /// Interception has been started at least once
    Active,
    /// Closed; terminal
    Closed,
}

/// Result of one flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending, no request was made
    Empty,
    /// The batch of this many records was accepted
    Delivered(usize),
    /// Delivery failed and the batch of this many records was dropped
    Dropped(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
    Threshold,
    Timer,
    Manual,
    Shutdown,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushTrigger::Threshold => write!(f, "threshold"),
            FlushTrigger::Timer => write!(f, "timer"),
            FlushTrigger::Manual => write!(f, "manual"),
            FlushTrigger::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Everything a flush task needs, cheap to clone into it
#[derive(Clone)]
struct Delivery {
    client: IngestionClient,
    diagnostics: Arc<dyn OutputSink>,
    stats: Arc<AgentStats>,
}

impl Delivery {
    async fn deliver(&self, batch: Vec<CapturedLog>, trigger: FlushTrigger) -> FlushOutcome {
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }

        let records = batch.len();
        let started = Instant::now();

        match self.client.send(&batch).await {
            Ok(_) => {
                self.stats.record_delivered(records);
                debug!(
                    %trigger,
                    records,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Flushed batch"
                );
                FlushOutcome::Delivered(records)
            }
            Err(e) => {
                self.stats.record_dropped(records);
                warn!(%trigger, records, error = %e, "Flush failed, batch dropped");
                self.report(format!("logship: failed to deliver {} log records: {}", records, e));
                FlushOutcome::Dropped(records)
            }
        }
    }

    /// Write to the diagnostic sink with capture suppressed, so the report is
    /// never shipped even if that sink is another agent's capturing wrapper
    fn report(&self, message: String) {
        pass_through(|| self.diagnostics.error(&[LogArg::Text(message)]));
    }
}

/// State shared between the agent handle, the capture path and flush tasks
pub(crate) struct AgentCore {
    config: AgentConfig,
    buffer: LogBuffer,
    delivery: Delivery,
    runtime: Handle,
    flushes: TaskTracker,
    intercepting: AtomicBool,
    closed: AtomicBool,
    hostname: String,
    pid: u32,
}

impl AgentCore {
    /// Detach the pending records and deliver them on a tracked task
    fn spawn_flush(&self, trigger: FlushTrigger) {
        // Taken before the detach so close waits for a batch that is
        // detached but not yet spawned.
        let token = self.flushes.token();
        let batch = self.buffer.take();
        if batch.is_empty() {
            return;
        }

        let delivery = self.delivery.clone();
        self.runtime.spawn(async move {
            delivery.deliver(batch, trigger).await;
            drop(token);
        });
    }

    fn on_tick(&self) {
        if !self.buffer.is_empty() {
            self.spawn_flush(FlushTrigger::Timer);
        }
    }

    async fn flush_now(&self, trigger: FlushTrigger) -> FlushOutcome {
        let _token = self.flushes.token();
        let batch = self.buffer.take();
        self.delivery.deliver(batch, trigger).await
    }
}

impl Recorder for AgentCore {
    fn record(&self, level: LogLevel, message: String, mut metadata: LogMetadata) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let log = CapturedLog::new(level, message);
        metadata.insert("timestamp_ms".to_string(), log.timestamp.timestamp_millis().into());
        metadata.insert("hostname".to_string(), self.hostname.clone().into());
        metadata.insert("pid".to_string(), self.pid.into());
        let log = CapturedLog { metadata, ..log };

        let Some(pending) = self.buffer.push(log) else {
            return;
        };
        self.delivery.stats.record_capture();
        if pending >= self.config.batch_size {
            self.spawn_flush(FlushTrigger::Threshold);
        }
    }

    fn is_intercepting(&self) -> bool {
        self.intercepting.load(Ordering::Acquire) && !self.closed.load(Ordering::Acquire)
    }
}

/// Assembles an [`Agent`] from its configuration and collaborators
pub struct AgentBuilder {
    config: AgentConfig,
    console: Option<Arc<Console>>,
    transport: Option<Arc<dyn IngestionTransport>>,
    diagnostics: Option<Arc<dyn OutputSink>>,
    runtime: Option<Handle>,
}

impl AgentBuilder {
    /// Start from a configuration
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            console: None,
            transport: None,
            diagnostics: None,
            runtime: None,
        }
    }

    /// Output surface to intercept. Defaults to a fresh stdout/stderr console.
    pub fn console(mut self, console: Arc<Console>) -> Self {
        self.console = Some(console);
        self
    }

    /// Transport to deliver through. Defaults to a lazily connected [`GrpcTransport`].
    pub fn transport(mut self, transport: Arc<dyn IngestionTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sink for delivery diagnostics. Defaults to the console's sink at build
    /// time; reports are written with capture suppressed, so a sink that is
    /// itself being intercepted does not ship them.
    pub fn diagnostics(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    /// Runtime that runs the timer and flush tasks. Defaults to the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Validate the configuration, wire the components and start the flush timer
    pub fn build(self) -> Result<Agent> {
        let config = self.config;
        config.validate()?;

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| {
                LogShipError::Config(
                    "Agent must be built inside a Tokio runtime or given a runtime handle".to_string(),
                )
            })?,
        };

        let transport: Arc<dyn IngestionTransport> = match self.transport {
            Some(transport) => transport,
            None => {
                let _guard = runtime.enter();
                Arc::new(GrpcTransport::connect_lazy(&config)?)
            }
        };

        let console = self.console.unwrap_or_default();
        let diagnostics = self.diagnostics.unwrap_or_else(|| console.current());

        let core = Arc::new(AgentCore {
            buffer: LogBuffer::new(),
            delivery: Delivery {
                client: IngestionClient::new(&config, transport),
                diagnostics,
                stats: Arc::new(AgentStats::default()),
            },
            runtime: runtime.clone(),
            flushes: TaskTracker::new(),
            intercepting: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            hostname: gethostname::gethostname().to_string_lossy().to_string(),
            pid: std::process::id(),
            config,
        });

        let ticking = Arc::downgrade(&core);
        let scheduler = FlushScheduler::start(core.config.flush_interval(), &runtime, move || {
            if let Some(core) = ticking.upgrade() {
                core.on_tick();
            }
        });

        let recorder: Arc<dyn Recorder> = core.clone();
        let interceptor = Interceptor::new(Arc::clone(&console), recorder);

        info!(
            service_id = %core.config.service_id,
            endpoint = %core.config.endpoint,
            batch_size = core.config.batch_size,
            flush_interval_ms = core.config.flush_interval_ms,
            "Log shipping agent started"
        );

        Ok(Agent {
            core,
            interceptor,
            scheduler,
            lifecycle: Mutex::new(LifecycleState::Constructed),
        })
    }
}

/// An embedded log-shipping agent.
///
/// Build one with [`Agent::builder`], call [`Agent::start_intercepting`] to begin
/// capturing the console's output and [`Agent::close`] to shut down. A closed
/// agent cannot be restarted.
pub struct Agent {
    core: Arc<AgentCore>,
    interceptor: Interceptor,
    scheduler: FlushScheduler,
    lifecycle: Mutex<LifecycleState>,
}

impl Agent {
    /// Start assembling an agent
    pub fn builder(config: AgentConfig) -> AgentBuilder {
        AgentBuilder::new(config)
    }

    /// Install the capturing hooks. Calling it while already intercepting is a no-op.
    pub fn start_intercepting(&self) -> Result<()> {
        let mut state = self.lifecycle.lock();
        if *state == LifecycleState::Closed {
            return Err(LogShipError::Closed);
        }

        self.interceptor.install();
        self.core.intercepting.store(true, Ordering::Release);
        *state = LifecycleState::Active;
        Ok(())
    }

    /// Restore the original output hooks. Safe to call at any time.
    pub fn stop_intercepting(&self) {
        let _state = self.lifecycle.lock();
        self.core.intercepting.store(false, Ordering::Release);
        self.interceptor.uninstall();
    }

    /// Whether the capturing hooks are installed
    pub fn is_intercepting(&self) -> bool {
        self.interceptor.is_installed()
    }

    /// Send one record directly, bypassing the buffer
    pub async fn ingest_one(
        &self,
        message: impl Into<String>,
        level: LogLevel,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<IngestEventResponse> {
        let mut log = CapturedLog::new(level, message);
        if let Some(timestamp) = timestamp {
            log = log.with_timestamp(timestamp);
        }
        self.ingest_many(&[log]).await
    }

    /// Send exactly these records directly, bypassing the buffer.
    ///
    /// Unlike buffered flushes, failures are returned to the caller.
    pub async fn ingest_many(&self, records: &[CapturedLog]) -> Result<IngestEventResponse> {
        if self.core.closed.load(Ordering::Acquire) {
            return Err(LogShipError::Closed);
        }
        self.core.delivery.client.send(records).await
    }

    /// Flush whatever is pending now and wait for the attempt to finish
    pub async fn flush(&self) -> FlushOutcome {
        self.core.flush_now(FlushTrigger::Manual).await
    }

    /// Snapshot of the records captured but not yet flushed
    pub fn pending(&self) -> Vec<CapturedLog> {
        self.core.buffer.snapshot()
    }

    /// The output surface this agent intercepts
    pub fn console(&self) -> Arc<Console> {
        Arc::clone(self.interceptor.console())
    }

    /// A `tracing` layer that captures events while this agent is intercepting
    pub fn tracing_layer(&self) -> CaptureLayer {
        let core: Weak<AgentCore> = Arc::downgrade(&self.core);
        CaptureLayer::new(core)
    }

    /// Delivery counters
    pub fn stats(&self) -> StatsSnapshot {
        self.core.delivery.stats.snapshot()
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        *self.lifecycle.lock()
    }

    /// The configuration the agent was built with
    pub fn config(&self) -> &AgentConfig {
        &self.core.config
    }

    /// Shut down: stop the timer, restore the hooks, flush what remains and
    /// release the transport.
    ///
    /// Waits for the final flush and any flush already in flight, bounded by
    /// `shutdown_timeout_ms`. Failures are reported on the diagnostic sink and
    /// never prevent shutdown. Returns the outcome of the final flush; a second
    /// call is a no-op returning [`FlushOutcome::Empty`].
    pub async fn close(&self) -> FlushOutcome {
        let batch = {
            let mut state = self.lifecycle.lock();
            if *state == LifecycleState::Closed {
                return FlushOutcome::Empty;
            }
            *state = LifecycleState::Closed;
            self.core.closed.store(true, Ordering::Release);
            self.core.intercepting.store(false, Ordering::Release);
            // Everything captured before this point goes into the final flush.
            self.core.buffer.seal()
        };

        self.scheduler.stop().await;
        self.interceptor.uninstall();

        let deadline = self.core.config.shutdown_timeout();
        let started = Instant::now();
        let records = batch.len();
        let outcome = match tokio::time::timeout(
            deadline,
            self.core.delivery.deliver(batch, FlushTrigger::Shutdown),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                self.core.delivery.stats.record_dropped(records);
                warn!(records, "Final flush timed out during close");
                self.core.delivery.report(format!(
                    "logship: final flush of {} log records timed out during close",
                    records
                ));
                FlushOutcome::Dropped(records)
            }
        };

        self.core.flushes.close();
        let remaining = deadline.saturating_sub(started.elapsed());
        if tokio::time::timeout(remaining, self.core.flushes.wait()).await.is_err() {
            warn!(
                in_flight = self.core.flushes.len(),
                "In-flight flushes did not finish before the shutdown timeout"
            );
            self.core.delivery.report(
                "logship: in-flight flushes did not finish before shutdown".to_string(),
            );
        }

        if let Err(e) = self.core.delivery.client.close().await {
            warn!(error = %e, "Failed to close ingestion transport");
            self.core
                .delivery
                .report(format!("logship: failed to close ingestion transport: {}", e));
        }

        info!(?outcome, "Log shipping agent closed");
        outcome
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        if *self.lifecycle.get_mut() != LifecycleState::Closed {
            self.core.closed.store(true, Ordering::Release);
            self.interceptor.uninstall();
            let pending = self.core.buffer.len();
            if pending > 0 {
                warn!(pending, "Agent dropped without close, pending records lost");
            }
        }
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("service_id", &self.core.config.service_id)
            .field("state", &self.state())
            .field("pending", &self.core.buffer.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intercept::tests::MemorySink;
    use crate::intercept::OutputChannel;
    use crate::log_args;
    use crate::proto::IngestEventRequest;
    use async_trait::async_trait;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingTransport {
        requests: Mutex<Vec<IngestEventRequest>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl IngestionTransport for CountingTransport {
        async fn ingest_log_batch(&self, request: IngestEventRequest) -> Result<IngestEventResponse> {
            self.requests.lock().push(request);
            if self.fail.load(Ordering::SeqCst) {
                return Err(LogShipError::Rpc(tonic::Status::unavailable("down")));
            }
            Ok(IngestEventResponse { success: true })
        }
    }

    fn agent_with(batch_size: usize) -> (Agent, Arc<CountingTransport>, Arc<MemorySink>) {
        let transport = Arc::new(CountingTransport::default());
        let host = Arc::new(MemorySink::default());
        let config = AgentConfig::builder("svc", "token")
            .batch_size(batch_size)
            .flush_interval(Duration::from_secs(60))
            .build()
            .unwrap();
        let agent = Agent::builder(config)
            .console(Arc::new(Console::new(host.clone())))
            .transport(transport.clone())
            .build()
            .unwrap();
        (agent, transport, host)
    }

    #[test]
    fn test_build_requires_runtime() {
        let config = AgentConfig::builder("svc", "token").build().unwrap();
        let result = Agent::builder(config)
            .transport(Arc::new(CountingTransport::default()))
            .build();
        assert!(matches!(result, Err(LogShipError::Config(_))));
    }

    #[tokio::test]
    async fn test_capture_metadata() {
        let (agent, _, _) = agent_with(100);
        agent.start_intercepting().unwrap();
        agent.console().log(&log_args!["hello", 1]);

        let pending = agent.pending();
        assert_eq!(pending.len(), 1);
        let log = &pending[0];
        assert_eq!(log.level, LogLevel::Info);
        assert_eq!(log.message, "hello 1");
        assert_eq!(log.metadata["source"], "console");
        assert_eq!(log.metadata["timestamp_ms"], log.timestamp.timestamp_millis());
        assert!(log.metadata.contains_key("hostname"));
        assert_eq!(log.metadata["pid"], std::process::id());
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let (agent, _, _) = agent_with(100);
        assert_eq!(agent.state(), LifecycleState::Constructed);

        agent.start_intercepting().unwrap();
        agent.start_intercepting().unwrap();
        assert_eq!(agent.state(), LifecycleState::Active);

        agent.close().await;
        assert_eq!(agent.state(), LifecycleState::Closed);
        assert!(matches!(agent.start_intercepting(), Err(LogShipError::Closed)));
        assert_eq!(agent.close().await, FlushOutcome::Empty);
    }

    #[tokio::test]
    async fn test_manual_flush_outcomes() {
        let (agent, transport, host) = agent_with(100);
        agent.start_intercepting().unwrap();
        assert_eq!(agent.flush().await, FlushOutcome::Empty);

        agent.console().info(&log_args!["a"]);
        assert_eq!(agent.flush().await, FlushOutcome::Delivered(1));

        transport.fail.store(true, Ordering::SeqCst);
        agent.console().info(&log_args!["b"]);
        assert_eq!(agent.flush().await, FlushOutcome::Dropped(1));
        assert!(agent.pending().is_empty());

        // The failure went to the host's own sink, and was not captured.
        let lines = host.lines.lock();
        let diagnostic = lines
            .iter()
            .find(|(channel, line)| *channel == OutputChannel::Error && line.contains("failed to deliver"));
        assert!(diagnostic.is_some());
        drop(lines);
        assert!(agent.pending().is_empty());

        let stats = agent.stats();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.dropped, 1);
    }

    #[tokio::test]
    async fn test_ingest_after_close_is_rejected() {
        let (agent, transport, _) = agent_with(100);
        agent.ingest_one("direct", LogLevel::Warn, None).await.unwrap();
        agent.close().await;

        let result = agent.ingest_one("late", LogLevel::Info, None).await;
        assert!(matches!(result, Err(LogShipError::Closed)));
        assert_eq!(transport.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_without_close_restores_console() {
        let (agent, _, host) = agent_with(100);
        let console = agent.console();
        agent.start_intercepting().unwrap();
        drop(agent);

        console.info(&log_args!["after drop"]);
        assert_eq!(host.lines.lock().len(), 1);
    }
}
