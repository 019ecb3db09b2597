//! Single-owner pipeline: source → decode → window → sink.
//!
//! The pipeline is an explicit context object built once at startup and
//! handed its collaborators; no stage reaches for globals. Records flow one
//! way, and nothing downstream feeds back into a stage.

use crate::webtraffic::clock::{ProcessingTimeClock, SystemClock};
use crate::webtraffic::decoder::EventDecoder;
use crate::webtraffic::error::JobResult;
use crate::webtraffic::sink::ResultSink;
use crate::webtraffic::source::RecordSource;
use crate::webtraffic::window::CountryWindowCounter;
use log::{debug, warn};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Floor and ceiling for the idle window-close tick
const MIN_TICK: Duration = Duration::from_millis(10);
const MAX_TICK: Duration = Duration::from_secs(1);

/// Drives decoding and windowed counting over one record source.
///
/// Every (country, window) accumulator is exclusively owned by this
/// pipeline; for sharded execution over the same source see
/// [`crate::webtraffic::shard::ShardedPipeline`].
#[derive(Debug)]
pub struct Pipeline<C: ProcessingTimeClock = SystemClock> {
    decoder: EventDecoder,
    counter: CountryWindowCounter,
    clock: C,
    tick: Duration,
}

impl Pipeline<SystemClock> {
    /// Pipeline over wall-clock processing time
    pub fn new(window_size: Duration) -> JobResult<Self> {
        Self::with_clock(window_size, SystemClock::new())
    }
}

impl<C: ProcessingTimeClock> Pipeline<C> {
    /// Pipeline over an explicit clock, for deterministic runs
    pub fn with_clock(window_size: Duration, clock: C) -> JobResult<Self> {
        Ok(Self {
            decoder: EventDecoder::new(),
            counter: CountryWindowCounter::new(window_size)?,
            clock,
            tick: tick_period(window_size),
        })
    }

    /// The windowing state, mainly for stats
    pub fn counter(&self) -> &CountryWindowCounter {
        &self.counter
    }

    /// Consume the source until it runs dry, emitting window results into
    /// the sink as processing time passes window bounds.
    ///
    /// Windows also close while the source is quiet, on an internal tick.
    /// When the source ends (bounded sources only), still-open windows are
    /// flushed so every folded event is accounted for.
    pub async fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> JobResult<()>
    where
        S: RecordSource,
        K: ResultSink,
    {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                polled = source.next_record() => match polled {
                    Some(Ok(raw)) => self.handle_record(&raw, sink).await?,
                    Some(Err(err)) => warn!("record source error, skipping poll: {}", err),
                    None => break,
                },
                _ = ticker.tick() => {
                    self.close_expired_into(sink).await?;
                }
            }
        }

        debug!("record source exhausted, flushing open windows");
        for result in self.counter.flush() {
            sink.emit(result).await?;
        }
        Ok(())
    }

    /// Process one raw record at the current processing time.
    ///
    /// Expired windows close before the record is folded, so a record can
    /// never land in a window that its own arrival already expired.
    async fn handle_record<K: ResultSink>(&mut self, raw: &str, sink: &mut K) -> JobResult<()> {
        let now_ms = self.clock.now_millis();
        for result in self.counter.close_expired(now_ms) {
            sink.emit(result).await?;
        }

        match self.decoder.decode(raw) {
            Ok(event) => {
                self.counter.observe(&event, now_ms);
            }
            Err(reason) => {
                warn!("dropping undecodable record {:?}: {}", raw, reason);
            }
        }
        Ok(())
    }

    async fn close_expired_into<K: ResultSink>(&mut self, sink: &mut K) -> JobResult<()> {
        let now_ms = self.clock.now_millis();
        for result in self.counter.close_expired(now_ms) {
            sink.emit(result).await?;
        }
        Ok(())
    }
}

/// Close windows at roughly twice per window, within sane bounds, so an
/// idle source still sees timely emissions.
pub(crate) fn tick_period(window_size: Duration) -> Duration {
    (window_size / 2).clamp(MIN_TICK, MAX_TICK)
}
