//! Sharded pipeline execution.
//!
//! Decoded events are dispatched to `N` worker tasks. Each worker owns its
//! own accumulator table and drains closed windows as *partial* accumulators
//! to a collector, which combines same-(window, country) partials with
//! [`CountryWindowAccumulator::merge`] and emits the final result once every
//! worker's low watermark has passed the window.
//!
//! Two dispatch policies:
//!
//! - [`PartitionPolicy::ByKey`]: events hash on country, so one worker owns
//!   each (country, window) pair outright and per-key arrival order holds.
//! - [`PartitionPolicy::RoundRobin`]: events spread evenly; the same
//!   (country, window) pair may accumulate partially on several workers and
//!   the collector's merge reconciles them. Per-key order is not preserved,
//!   which the count tolerates because merge is associative and commutative.
//!
//! Accumulators are never shared: a worker exclusively owns its table, and
//! the only cross-shard interaction is the merge of already-drained
//! partials on the collector side.

use crate::webtraffic::clock::{ProcessingTimeClock, SystemClock};
use crate::webtraffic::decoder::EventDecoder;
use crate::webtraffic::error::{JobError, JobResult};
use crate::webtraffic::event::WebTrafficEvent;
use crate::webtraffic::pipeline::tick_period;
use crate::webtraffic::sink::ResultSink;
use crate::webtraffic::source::RecordSource;
use crate::webtraffic::window::{
    assign_key, CountryWindowAccumulator, CountryWindowCounter, CountryWindowResult, WindowId,
};
use log::{debug, warn};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// How decoded events are assigned to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionPolicy {
    /// Hash on the country key; preserves per-key arrival order
    #[default]
    ByKey,
    /// Spread events evenly across workers regardless of key
    RoundRobin,
}

impl PartitionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionPolicy::ByKey => "by-key",
            PartitionPolicy::RoundRobin => "round-robin",
        }
    }
}

impl fmt::Display for PartitionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionPolicy {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "by-key" => Ok(PartitionPolicy::ByKey),
            "round-robin" => Ok(PartitionPolicy::RoundRobin),
            other => Err(JobError::config(format!(
                "unknown partitioning policy '{}' (expected 'by-key' or 'round-robin')",
                other
            ))),
        }
    }
}

/// Update sent from a worker to the collector.
enum WorkerUpdate {
    /// Closed partials plus the worker's new low watermark
    Progress {
        worker: usize,
        cutoff: WindowId,
        partials: Vec<(WindowId, CountryWindowAccumulator)>,
    },
    /// Worker drained everything and is going away
    Finished {
        worker: usize,
        partials: Vec<(WindowId, CountryWindowAccumulator)>,
    },
}

/// Pipeline that fans decoded events out to parallel window shards.
#[derive(Debug)]
pub struct ShardedPipeline<C = SystemClock>
where
    C: ProcessingTimeClock + Clone + Send + 'static,
{
    decoder: EventDecoder,
    window_size: Duration,
    shards: usize,
    policy: PartitionPolicy,
    clock: C,
}

impl ShardedPipeline<SystemClock> {
    /// Sharded pipeline over wall-clock processing time
    pub fn new(window_size: Duration, shards: usize, policy: PartitionPolicy) -> JobResult<Self> {
        Self::with_clock(window_size, shards, policy, SystemClock::new())
    }
}

impl<C> ShardedPipeline<C>
where
    C: ProcessingTimeClock + Clone + Send + 'static,
{
    /// Sharded pipeline over an explicit clock, for deterministic runs
    pub fn with_clock(
        window_size: Duration,
        shards: usize,
        policy: PartitionPolicy,
        clock: C,
    ) -> JobResult<Self> {
        if shards == 0 {
            return Err(JobError::config("shard count must be at least 1"));
        }
        // Validate the window length up front rather than inside a worker.
        CountryWindowCounter::new(window_size)?;

        Ok(Self {
            decoder: EventDecoder::new(),
            window_size,
            shards,
            policy,
            clock,
        })
    }

    /// Consume the source until it runs dry, dispatching events to workers
    /// and emitting merged window results into the sink.
    pub async fn run<S, K>(&self, source: &mut S, sink: &mut K) -> JobResult<()>
    where
        S: RecordSource,
        K: ResultSink,
    {
        let tick = tick_period(self.window_size);
        // Updates are unbounded so a worker can never stall on reporting
        // while the dispatcher is itself waiting on that worker's queue.
        let (update_tx, mut update_rx) = mpsc::unbounded_channel::<WorkerUpdate>();

        let mut event_txs = Vec::with_capacity(self.shards);
        let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(self.shards);
        for worker in 0..self.shards {
            let (event_tx, event_rx) = mpsc::channel::<WebTrafficEvent>(1024);
            let counter = CountryWindowCounter::new(self.window_size)?;
            workers.push(tokio::spawn(worker_loop(
                worker,
                counter,
                self.clock.clone(),
                tick,
                event_rx,
                update_tx.clone(),
            )));
            event_txs.push(event_tx);
        }
        drop(update_tx);

        let mut collector = Collector::new(self.shards);
        let mut round_robin = 0usize;

        loop {
            tokio::select! {
                polled = source.next_record() => match polled {
                    Some(Ok(raw)) => {
                        let event = match self.decoder.decode(&raw) {
                            Ok(event) => event,
                            Err(reason) => {
                                warn!("dropping undecodable record {:?}: {}", raw, reason);
                                continue;
                            }
                        };
                        let shard = match self.policy {
                            PartitionPolicy::ByKey => key_shard(assign_key(&event), self.shards),
                            PartitionPolicy::RoundRobin => {
                                round_robin = (round_robin + 1) % self.shards;
                                round_robin
                            }
                        };
                        if event_txs[shard].send(event).await.is_err() {
                            return Err(JobError::application(format!(
                                "window shard {} stopped unexpectedly",
                                shard
                            )));
                        }
                    }
                    Some(Err(err)) => warn!("record source error, skipping poll: {}", err),
                    None => break,
                },
                Some(update) = update_rx.recv() => {
                    for result in collector.absorb(update) {
                        sink.emit(result).await?;
                    }
                }
            }
        }

        // Source is dry: closing the event channels makes each worker drain
        // its remaining windows and report Finished.
        drop(event_txs);
        while let Some(update) = update_rx.recv().await {
            for result in collector.absorb(update) {
                sink.emit(result).await?;
            }
        }
        for worker in workers {
            worker
                .await
                .map_err(|e| JobError::application(format!("window shard panicked: {}", e)))?;
        }
        Ok(())
    }
}

/// Stable shard assignment for a country key.
fn key_shard(key: &str, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}

/// One window shard: folds its share of events and reports closed partials.
async fn worker_loop<C: ProcessingTimeClock>(
    worker: usize,
    mut counter: CountryWindowCounter,
    clock: C,
    tick: Duration,
    mut events: mpsc::Receiver<WebTrafficEvent>,
    updates: mpsc::UnboundedSender<WorkerUpdate>,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_cutoff: Option<WindowId> = None;

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Some(event) => {
                    let now_ms = clock.now_millis();
                    if !report_progress(worker, &mut counter, now_ms, &mut last_cutoff, &updates) {
                        return;
                    }
                    counter.observe(&event, now_ms);
                }
                None => break,
            },
            _ = ticker.tick() => {
                let now_ms = clock.now_millis();
                if !report_progress(worker, &mut counter, now_ms, &mut last_cutoff, &updates) {
                    return;
                }
            }
        }
    }

    debug!("window shard {} draining and shutting down", worker);
    let partials = counter.drain_all();
    let _ = updates.send(WorkerUpdate::Finished { worker, partials });
}

/// Drain expired windows and push the worker's watermark forward.
///
/// Returns `false` once the collector is gone and the worker should stop.
fn report_progress(
    worker: usize,
    counter: &mut CountryWindowCounter,
    now_ms: i64,
    last_cutoff: &mut Option<WindowId>,
    updates: &mpsc::UnboundedSender<WorkerUpdate>,
) -> bool {
    let cutoff = WindowId::containing(now_ms, counter.window_size_ms());
    let partials = counter.drain_expired(now_ms);

    // Quiet shards still report, otherwise the collector's watermark stalls.
    let advanced = last_cutoff.map_or(true, |last| cutoff > last);
    if partials.is_empty() && !advanced {
        return true;
    }
    *last_cutoff = Some(cutoff);
    updates
        .send(WorkerUpdate::Progress {
            worker,
            cutoff,
            partials,
        })
        .is_ok()
}

/// Merges partial accumulators from all workers and releases a window once
/// every worker's watermark has passed it.
struct Collector {
    cutoffs: Vec<Option<WindowId>>,
    finished: Vec<bool>,
    pending: BTreeMap<WindowId, BTreeMap<String, CountryWindowAccumulator>>,
}

impl Collector {
    fn new(shards: usize) -> Self {
        Self {
            cutoffs: vec![None; shards],
            finished: vec![false; shards],
            pending: BTreeMap::new(),
        }
    }

    /// Fold one worker update in and return whatever became complete.
    fn absorb(&mut self, update: WorkerUpdate) -> Vec<CountryWindowResult> {
        match update {
            WorkerUpdate::Progress {
                worker,
                cutoff,
                partials,
            } => {
                self.merge_partials(partials);
                let entry = &mut self.cutoffs[worker];
                *entry = Some(entry.map_or(cutoff, |last| last.max(cutoff)));
            }
            WorkerUpdate::Finished { worker, partials } => {
                self.merge_partials(partials);
                self.finished[worker] = true;
            }
        }
        self.drain_complete()
    }

    fn merge_partials(&mut self, partials: Vec<(WindowId, CountryWindowAccumulator)>) {
        for (window, accumulator) in partials {
            let per_country = self.pending.entry(window).or_default();
            match per_country.remove(&accumulator.country) {
                Some(existing) => {
                    let merged = existing.merge(accumulator);
                    per_country.insert(merged.country.clone(), merged);
                }
                None => {
                    per_country.insert(accumulator.country.clone(), accumulator);
                }
            }
        }
    }

    fn drain_complete(&mut self) -> Vec<CountryWindowResult> {
        // Low watermark across live workers: every window strictly below it
        // has been drained by all of them.
        let mut watermark: Option<WindowId> = None;
        for (cutoff, finished) in self.cutoffs.iter().zip(&self.finished) {
            if *finished {
                continue;
            }
            match cutoff {
                // A live worker that has not reported yet pins everything.
                None => return Vec::new(),
                Some(cutoff) => {
                    watermark = Some(watermark.map_or(*cutoff, |w| w.min(*cutoff)));
                }
            }
        }

        let complete = match watermark {
            // All workers finished; everything pending is complete.
            None => std::mem::take(&mut self.pending),
            Some(watermark) => {
                let still_pending = self.pending.split_off(&watermark);
                std::mem::replace(&mut self.pending, still_pending)
            }
        };

        let mut results = Vec::new();
        for (window, per_country) in complete {
            for (_, accumulator) in per_country {
                results.push(CountryWindowResult {
                    country: accumulator.country,
                    count: accumulator.count,
                    window,
                });
            }
        }
        results
    }
}
