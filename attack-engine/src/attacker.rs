//! Attack scheduling, the elastic worker pool and chain execution
//!
//! One scheduling task asks the [`Pacer`] when the next hit is due and hands
//! a ticket to an idle worker. When no worker is idle and the pool is below
//! its ceiling, exactly one more worker is spawned. Each ticket becomes one
//! chain traversal and one [`HitResult`].

use crate::config::AttackerConfig;
use crate::error::{AttackError, AttackResult};
use crate::pacer::{Pace, Pacer};
use crate::result::{Headers, HitResult};
use crate::stop::StopSignal;
use crate::target::{Target, TargetChain, ValueCache};
use crate::targeter::Targeter;
use crate::ticket::{self, TicketReceiver, TicketSender, TrySendError};
use crate::transport::{build_client, ConnectionLimiter};
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, trace, warn};

/// Header carrying the attack name, sent only when the attack is named.
pub const ATTACK_HEADER: &str = "X-Barrage-Attack";
/// Header carrying the sequence number of the hit a request belongs to.
pub const SEQ_HEADER: &str = "X-Barrage-Seq";

/// Results buffered before workers wait on a slow consumer.
const RESULTS_BUFFER: usize = 1024;

/// Fires paced, possibly chained, HTTP requests with an elastic worker pool.
///
/// An attacker runs one attack at a time. Its stop signal is tripped when an
/// attack ends and stays tripped, so build a fresh attacker per attack.
#[derive(Debug, Clone)]
pub struct Attacker {
    client: reqwest::Client,
    limiter: ConnectionLimiter,
    stop: StopSignal,
    workers: u64,
    max_workers: u64,
    timeout: Duration,
    extract_field: Arc<str>,
}

impl Attacker {
    /// Create an attacker from a validated configuration.
    pub fn new(config: AttackerConfig) -> AttackResult<Self> {
        config.validate()?;
        let client = build_client(&config)?;
        Ok(Self {
            client,
            limiter: ConnectionLimiter::new(config.max_connections),
            stop: StopSignal::new(),
            workers: config.initial_workers(),
            max_workers: config.max_workers,
            timeout: config.timeout,
            extract_field: Arc::from(config.extract_field.as_str()),
        })
    }

    /// Start an attack and return the stream of its results.
    ///
    /// Runs until `duration` elapses (zero means no limit), the pacer says
    /// stop, the targeter fails, or [`Attacker::stop`] is called. The stream
    /// closes after every in-flight traversal has been emitted. Must be
    /// called from within a Tokio runtime.
    pub fn attack(
        &self,
        targeter: Arc<dyn Targeter>,
        pacer: impl Pacer + 'static,
        duration: Duration,
        name: impl Into<String>,
    ) -> ResultStream {
        let session = Arc::new(Session::new(name.into()));
        let (results_tx, results_rx) = mpsc::channel(RESULTS_BUFFER);
        let (tickets, ticket_rx) = ticket::channel();
        let size = Arc::new(AtomicU64::new(0));

        info!(
            attack = %session.name,
            workers = self.workers,
            max_workers = self.max_workers,
            duration_ms = duration.as_millis() as u64,
            rate = pacer.rate(Duration::ZERO),
            "Starting attack"
        );

        let hitter = Arc::new(Hitter {
            client: self.client.clone(),
            limiter: self.limiter.clone(),
            stop: self.stop.clone(),
            timeout: self.timeout,
            extract_field: Arc::clone(&self.extract_field),
            targeter,
            session: Arc::clone(&session),
        });

        let mut pool = WorkerPool {
            tasks: JoinSet::new(),
            size: Arc::clone(&size),
            hitter,
            tickets: ticket_rx,
            results: results_tx,
        };
        for _ in 0..self.workers {
            pool.spawn();
        }

        let scheduler = Scheduler {
            pool,
            tickets,
            stop: self.stop.clone(),
            max_workers: self.max_workers,
            duration,
            began: session.began,
        };
        tokio::spawn(scheduler.run(pacer, session));

        ResultStream {
            results: results_rx,
            workers: size,
        }
    }

    /// Request a graceful stop.
    ///
    /// Returns `true` if this call initiated the stop and `false` if one was
    /// already under way; callers use the latter to abort outright.
    pub fn stop(&self) -> bool {
        self.stop.stop()
    }

    /// Whether a stop has been requested or the last attack has ended.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }
}

/// Results of a running attack, in completion order.
#[derive(Debug)]
pub struct ResultStream {
    results: mpsc::Receiver<HitResult>,
    workers: Arc<AtomicU64>,
}

impl ResultStream {
    /// Next result, or `None` once the attack is over and drained.
    pub async fn recv(&mut self) -> Option<HitResult> {
        self.results.recv().await
    }

    /// Workers spawned so far in this attack.
    pub fn workers(&self) -> u64 {
        self.workers.load(Ordering::Acquire)
    }

    /// Adapt the results into a `Stream`.
    pub fn into_stream(self) -> ReceiverStream<HitResult> {
        ReceiverStream::new(self.results)
    }

    /// Drain the stream to the end.
    pub async fn collect(mut self) -> Vec<HitResult> {
        let mut collected = Vec::new();
        while let Some(result) = self.recv().await {
            collected.push(result);
        }
        collected
    }
}

/// Name, start instant and sequence counter of one attack.
#[derive(Debug)]
struct Session {
    name: String,
    began: Instant,
    began_at: DateTime<Utc>,
    seq: Mutex<u64>,
}

impl Session {
    fn new(name: String) -> Self {
        Self {
            name,
            began_at: Utc::now(),
            began: Instant::now(),
            seq: Mutex::new(0),
        }
    }

    /// Next sequence number with its timestamp.
    ///
    /// Both come out of the same critical section so that sequence order and
    /// timestamp order agree across workers. Timestamps are offsets from the
    /// session start measured on the monotonic clock.
    async fn stamp(&self) -> (u64, DateTime<Utc>, Instant) {
        let mut next = self.seq.lock().await;
        let now = Instant::now();
        let offset = chrono::Duration::from_std(now - self.began).unwrap_or_else(|_| chrono::Duration::zero());
        let seq = *next;
        *next += 1;
        (seq, self.began_at + offset, now)
    }
}

/// Everything a worker needs to turn a ticket into a result.
struct Hitter {
    client: reqwest::Client,
    limiter: ConnectionLimiter,
    stop: StopSignal,
    timeout: Duration,
    extract_field: Arc<str>,
    targeter: Arc<dyn Targeter>,
    session: Arc<Session>,
}

impl Hitter {
    async fn hit(&self) -> HitResult {
        let (seq, timestamp, started) = self.session.stamp().await;
        let mut result = HitResult::new(self.session.name.clone(), seq, timestamp);

        let outcome = self.traverse(&mut result).await;

        result.latency = started.elapsed();
        if let Err(err) = outcome {
            trace!(seq, error = %err, "Hit failed");
            result.error = Some(err.to_string());
        }
        result
    }

    async fn traverse(&self, result: &mut HitResult) -> AttackResult<()> {
        let mut chain = TargetChain::default();
        let decoded = self.targeter.decode(&mut chain).and_then(|()| {
            if chain.is_empty() {
                Err(AttackError::InvalidTarget {
                    reason: "targeter produced an empty chain".to_string(),
                })
            } else {
                Ok(())
            }
        });
        if let Err(err) = decoded {
            // Whatever a targeter fails with, it ends the attack.
            let err = if err.ends_attack() {
                err
            } else {
                AttackError::InvalidTarget {
                    reason: err.to_string(),
                }
            };
            if self.stop.stop() {
                warn!(attack = %self.session.name, error = %err, "Targeter failed, stopping attack");
            }
            return Err(err);
        }

        let mut cache = ValueCache::new();
        for step in &chain {
            self.send_step(step, &mut cache, result).await?;
        }
        Ok(())
    }

    async fn send_step(&self, step: &Target, cache: &mut ValueCache, result: &mut HitResult) -> AttackResult<()> {
        let url = step.resolve_url(cache, &self.extract_field);

        result.method = step.method.to_string();
        result.url = url.to_string();
        result.code = 0;
        result.bytes_in = 0;
        result.bytes_out = 0;
        result.body.clear();
        result.headers.clear();

        let parsed = reqwest::Url::parse(&url).map_err(|e| AttackError::RequestBuild {
            details: format!("{}: {}", url, e),
        })?;

        let mut request = self
            .client
            .request(step.method.clone(), parsed.clone())
            .headers(step.headers.clone());
        if !self.session.name.is_empty() {
            request = request.header(ATTACK_HEADER, self.session.name.as_str());
        }
        request = request.header(SEQ_HEADER, result.seq);
        if !step.body.is_empty() {
            request = request.body(step.body.clone());
        }

        let _slot = self.limiter.acquire(&parsed).await;
        let response = request
            .send()
            .await
            .map_err(|e| AttackError::from_transport(&e, self.timeout))?;
        result.bytes_out = step.body.len() as u64;

        let status = response.status();
        result.code = status.as_u16();
        result.headers = collect_headers(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|e| AttackError::from_transport(&e, self.timeout))?;
        result.bytes_in = body.len() as u64;
        result.body = body.to_vec();

        // A bad status is recorded but the chain carries on. Later steps do
        // not clear it.
        if !(200..400).contains(&result.code) {
            let err = AttackError::Status {
                status: status_line(status),
            };
            trace!(seq = result.seq, error = %err, "Step returned error status");
            result.error = Some(err.to_string());
        }

        if cache.extract(&self.extract_field, &result.body) {
            trace!(seq = result.seq, field = %self.extract_field, "Extracted value for next step");
        }
        Ok(())
    }
}

/// `404 Not Found`, or just the code for unregistered statuses.
fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

fn collect_headers(headers: &HeaderMap) -> Headers {
    let mut collected = Headers::new();
    for (name, value) in headers {
        collected
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    collected
}

struct WorkerPool {
    tasks: JoinSet<()>,
    size: Arc<AtomicU64>,
    hitter: Arc<Hitter>,
    tickets: TicketReceiver,
    results: mpsc::Sender<HitResult>,
}

impl WorkerPool {
    fn spawn(&mut self) {
        let id = self.size.fetch_add(1, Ordering::AcqRel);
        self.tasks.spawn(run_worker(
            id,
            Arc::clone(&self.hitter),
            self.tickets.clone(),
            self.results.clone(),
        ));
    }

    fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    /// Wait for every worker to exit, then close the result stream.
    async fn drain(self) {
        let WorkerPool { mut tasks, results, .. } = self;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Worker task failed: {}", e);
            }
        }
        drop(results);
    }
}

async fn run_worker(id: u64, hitter: Arc<Hitter>, tickets: TicketReceiver, results: mpsc::Sender<HitResult>) {
    trace!(worker = id, "Worker started");
    while tickets.recv().await.is_some() {
        let result = hitter.hit().await;
        if results.send(result).await.is_err() {
            if hitter.stop.stop() {
                debug!(worker = id, "Result stream dropped, stopping attack");
            }
            break;
        }
    }
    trace!(worker = id, "Worker exiting");
}

struct Scheduler {
    pool: WorkerPool,
    tickets: TicketSender,
    stop: StopSignal,
    max_workers: u64,
    duration: Duration,
    began: Instant,
}

impl Scheduler {
    async fn run(mut self, pacer: impl Pacer, session: Arc<Session>) {
        let mut hits: u64 = 0;

        let reason = loop {
            if self.stop.is_stopped() {
                break "stop requested";
            }

            let elapsed = self.began.elapsed();
            if !self.duration.is_zero() && elapsed > self.duration {
                break "duration elapsed";
            }

            let wait = match pacer.pace(elapsed, hits) {
                Pace::Stop => break "pacer stopped",
                Pace::Wait(wait) => wait,
            };
            if !wait.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = self.stop.stopped() => break "stop requested",
                }
            }

            if self.pool.size() < self.max_workers {
                match self.tickets.try_send() {
                    Ok(()) => {
                        hits += 1;
                        continue;
                    }
                    Err(TrySendError::Closed) => break "workers gone",
                    Err(TrySendError::Full) => {
                        // Every worker is busy: add one and wait for it below.
                        self.pool.spawn();
                        debug!(workers = self.pool.size(), "Worker pool grown");
                    }
                }
            }

            tokio::select! {
                biased;
                _ = self.stop.stopped() => break "stop requested",
                _ = self.deadline() => break "duration elapsed",
                sent = self.tickets.send() => match sent {
                    Ok(()) => hits += 1,
                    Err(_) => break "workers gone",
                },
            }
        };

        let Scheduler { pool, tickets, stop, .. } = self;
        drop(tickets);
        info!(
            attack = %session.name,
            hits,
            workers = pool.size(),
            reason,
            "Attack finished, draining workers"
        );
        pool.drain().await;
        stop.stop();
    }

    /// Resolves when the attack duration is up; never for unbounded attacks.
    async fn deadline(&self) {
        if self.duration.is_zero() {
            std::future::pending::<()>().await;
        } else {
            tokio::time::sleep_until(tokio::time::Instant::from_std(self.began + self.duration)).await;
        }
    }
}
