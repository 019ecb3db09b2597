//! Keyed tumbling-window aggregation.
//!
//! Non-overlapping fixed-size windows that advance by their full size.
//!
//! Example: 15-second tumbling windows
//! ```text
//! [00:00-00:15) [00:15-00:30) [00:30-00:45)
//! ```
//!
//! Each window covers the half-open interval `[n*W, (n+1)*W)` in
//! processing-time milliseconds. Within a window, events are folded into one
//! accumulator per country; a window closes once processing time passes its
//! upper bound, and every (country, window) pair is emitted exactly once.

use crate::webtraffic::error::{JobError, JobResult};
use crate::webtraffic::event::WebTrafficEvent;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

/// Partitioning key of an event: exactly its country, case-sensitive.
pub fn assign_key(event: &WebTrafficEvent) -> &str {
    &event.country
}

/// Index of one tumbling window on the processing-time axis.
///
/// Window `n` covers `[n*W, (n+1)*W)` for window size `W` in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowId(i64);

impl WindowId {
    /// The window containing the given processing-time instant
    pub fn containing(at_ms: i64, window_size_ms: i64) -> Self {
        WindowId(at_ms.div_euclid(window_size_ms))
    }

    /// Window index on the time axis
    pub fn index(&self) -> i64 {
        self.0
    }

    /// Inclusive lower bound of the window, in milliseconds
    pub fn start_ms(&self, window_size_ms: i64) -> i64 {
        self.0.saturating_mul(window_size_ms)
    }

    /// Exclusive upper bound of the window, in milliseconds
    pub fn end_ms(&self, window_size_ms: i64) -> i64 {
        self.0.saturating_add(1).saturating_mul(window_size_ms)
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Partial aggregation state for one country within one window.
///
/// Created when the first event for a (country, window) pair arrives,
/// updated by each subsequent matching event, and consumed when the window
/// closes. An accumulator is exclusively owned by the shard that created it;
/// [`merge`](CountryWindowAccumulator::merge) is the only cross-shard
/// interaction and consumes both inputs rather than mutating in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryWindowAccumulator {
    pub country: String,
    pub count: u64,
}

impl CountryWindowAccumulator {
    /// Fresh accumulator with an empty country and a zero count
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into this accumulator.
    ///
    /// Sets the country from the event (idempotent once all events share the
    /// same key within a window, which keyed routing guarantees) and bumps
    /// the count.
    pub fn fold(&mut self, event: &WebTrafficEvent) {
        self.country.clone_from(&event.country);
        self.count += 1;
    }

    /// Combine two partial accumulators for the same (country, window) pair.
    ///
    /// Associative and commutative in the count, so partials produced by
    /// parallel shards can be combined in any order.
    pub fn merge(self, other: Self) -> Self {
        Self {
            country: self.country,
            count: self.count + other.count,
        }
    }
}

/// Final, immutable count for one (country, window) pair.
///
/// Emitted exactly once, when the window closes. Windows in which a country
/// saw no events produce no result for that country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryWindowResult {
    pub country: String,
    pub count: u64,
    pub window: WindowId,
}

impl fmt::Display for CountryWindowResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.country, self.count)
    }
}

/// Keyed tumbling-window counter over web-traffic events.
///
/// Maintains one accumulator per (country, window) pair for every window
/// that is still open. The owner drives it with three calls:
///
/// - [`observe`](Self::observe) folds an event at its arrival time
/// - [`close_expired`](Self::close_expired) drains every window whose upper
///   bound lies at or before the given processing time
/// - [`flush`](Self::flush) drains whatever is still open, for bounded runs
///
/// Events that arrive for an already-closed window are dropped; there is no
/// allowed lateness and no retraction of emitted results.
#[derive(Debug)]
pub struct CountryWindowCounter {
    /// Window size in milliseconds
    window_size_ms: i64,

    /// Open windows, keyed by window then country
    windows: BTreeMap<WindowId, HashMap<String, CountryWindowAccumulator>>,

    /// Lowest window id still accepting events; anything below is closed
    min_open: Option<WindowId>,

    /// Number of late events dropped so far
    late_drops: u64,
}

impl CountryWindowCounter {
    /// Create a counter with the given window length.
    ///
    /// A zero-length window is a configuration error.
    pub fn new(window_size: Duration) -> JobResult<Self> {
        if window_size.is_zero() {
            return Err(JobError::config("window length must be a positive duration"));
        }
        let window_size_ms = i64::try_from(window_size.as_millis())
            .map_err(|_| JobError::config("window length overflows the time axis"))?;

        Ok(Self {
            window_size_ms,
            windows: BTreeMap::new(),
            min_open: None,
            late_drops: 0,
        })
    }

    /// Window size in milliseconds
    pub fn window_size_ms(&self) -> i64 {
        self.window_size_ms
    }

    /// Fold one event, observed at `arrival_ms` processing time.
    ///
    /// Returns `false` when the event is late for an already-closed window
    /// and was dropped.
    pub fn observe(&mut self, event: &WebTrafficEvent, arrival_ms: i64) -> bool {
        let window = WindowId::containing(arrival_ms, self.window_size_ms);

        if let Some(min_open) = self.min_open {
            if window < min_open {
                self.late_drops += 1;
                debug!(
                    "dropping late event for country '{}': window {} already closed",
                    event.country, window
                );
                return false;
            }
        }

        self.windows
            .entry(window)
            .or_default()
            .entry(event.country.clone())
            .or_default()
            .fold(event);
        true
    }

    /// Close every window whose upper bound lies at or before `now_ms` and
    /// return its results.
    ///
    /// Results come out ordered by window, then by country. A window is
    /// closed at most once: later calls with the same (or an earlier) time
    /// emit nothing, and events arriving for it afterwards are dropped as
    /// late.
    pub fn close_expired(&mut self, now_ms: i64) -> Vec<CountryWindowResult> {
        Self::finalize(self.drain_expired(now_ms))
    }

    /// Drain every still-open window, regardless of the clock.
    ///
    /// Used when a bounded source runs dry, so every folded event is
    /// accounted for. An unbounded source never reaches this.
    pub fn flush(&mut self) -> Vec<CountryWindowResult> {
        Self::finalize(self.drain_all())
    }

    /// Like [`close_expired`](Self::close_expired), but hands back the raw
    /// partial accumulators instead of finalized results.
    ///
    /// This is the shard-side half of parallel execution: each shard drains
    /// its partials and a collector combines same-(window, country) partials
    /// with [`CountryWindowAccumulator::merge`] before finalizing.
    pub fn drain_expired(&mut self, now_ms: i64) -> Vec<(WindowId, CountryWindowAccumulator)> {
        // Window n ends at (n+1)*W, so everything below the window
        // containing `now_ms` has expired.
        let cutoff = WindowId::containing(now_ms, self.window_size_ms);
        self.min_open = Some(self.min_open.map_or(cutoff, |min_open| min_open.max(cutoff)));

        let open = self.windows.split_off(&cutoff);
        let closed = std::mem::replace(&mut self.windows, open);
        Self::sorted_partials(closed)
    }

    /// Like [`flush`](Self::flush), but hands back partial accumulators
    pub fn drain_all(&mut self) -> Vec<(WindowId, CountryWindowAccumulator)> {
        if let Some(last) = self.windows.keys().next_back().copied() {
            // Keep close-once semantics: anything drained is closed for good.
            let past_last = WindowId(last.0.saturating_add(1));
            self.min_open = Some(self.min_open.map_or(past_last, |m| m.max(past_last)));
        }
        let closed = std::mem::take(&mut self.windows);
        Self::sorted_partials(closed)
    }

    /// Number of windows currently open
    pub fn open_windows(&self) -> usize {
        self.windows.len()
    }

    /// Number of late events dropped so far
    pub fn late_drops(&self) -> u64 {
        self.late_drops
    }

    fn sorted_partials(
        closed: BTreeMap<WindowId, HashMap<String, CountryWindowAccumulator>>,
    ) -> Vec<(WindowId, CountryWindowAccumulator)> {
        let mut partials = Vec::new();
        for (window, accumulators) in closed {
            let mut per_country: Vec<(String, CountryWindowAccumulator)> =
                accumulators.into_iter().collect();
            per_country.sort_by(|(a, _), (b, _)| a.cmp(b));
            partials.extend(per_country.into_iter().map(|(_, acc)| (window, acc)));
        }
        partials
    }

    fn finalize(partials: Vec<(WindowId, CountryWindowAccumulator)>) -> Vec<CountryWindowResult> {
        partials
            .into_iter()
            .map(|(window, accumulator)| CountryWindowResult {
                country: accumulator.country,
                count: accumulator.count,
                window,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webtraffic::event::WebTrafficEvent;

    fn event(country: &str) -> WebTrafficEvent {
        WebTrafficEvent::with_country(country)
    }

    fn counter(window_size_ms: u64) -> CountryWindowCounter {
        CountryWindowCounter::new(Duration::from_millis(window_size_ms)).unwrap()
    }

    #[test]
    fn test_window_id_boundaries() {
        // W - 1 and W land in consecutive windows
        let w = 15_000;
        assert_eq!(WindowId::containing(w - 1, w), WindowId(0));
        assert_eq!(WindowId::containing(w, w), WindowId(1));

        // alignment inside a later window
        assert_eq!(WindowId::containing(75_000, 60_000), WindowId(1));
        assert_eq!(WindowId(1).start_ms(60_000), 60_000);
        assert_eq!(WindowId(1).end_ms(60_000), 120_000);
    }

    #[test]
    fn test_zero_window_size_is_rejected() {
        let err = CountryWindowCounter::new(Duration::ZERO).unwrap_err();
        assert!(matches!(err, JobError::Config { .. }));
    }

    #[test]
    fn test_fold_counts_and_sets_country() {
        let mut acc = CountryWindowAccumulator::new();
        assert_eq!(acc.country, "");
        assert_eq!(acc.count, 0);

        acc.fold(&event("Spain"));
        acc.fold(&event("Spain"));
        assert_eq!(acc.country, "Spain");
        assert_eq!(acc.count, 2);
    }

    #[test]
    fn test_merge_is_associative_and_commutative() {
        let acc = |count| CountryWindowAccumulator {
            country: "X".to_string(),
            count,
        };
        let (a, b, c) = (acc(1), acc(2), acc(4));

        let left = a.clone().merge(b.clone()).merge(c.clone());
        let right = a.clone().merge(b.clone().merge(c.clone()));
        assert_eq!(left, right);

        assert_eq!(a.clone().merge(b.clone()).count, b.merge(a).count);
    }

    #[test]
    fn test_counter_counts_within_one_window() {
        let mut counter = counter(15_000);
        for _ in 0..5 {
            assert!(counter.observe(&event("X"), 1_000));
        }

        let results = counter.close_expired(15_000);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].country, "X");
        assert_eq!(results[0].count, 5);
        assert_eq!(results[0].window, WindowId(0));
    }

    #[test]
    fn test_close_is_exactly_once() {
        let mut counter = counter(15_000);
        counter.observe(&event("Spain"), 1_000);

        assert_eq!(counter.close_expired(15_000).len(), 1);
        assert!(counter.close_expired(15_000).is_empty());
        assert!(counter.close_expired(30_000).is_empty());
    }

    #[test]
    fn test_no_zero_count_results() {
        let mut counter = counter(15_000);
        counter.observe(&event("Spain"), 1_000);

        // Spain is quiet in window 1; only window 0 produces a result.
        assert_eq!(counter.close_expired(15_000).len(), 1);
        assert!(counter.close_expired(45_000).is_empty());
    }

    #[test]
    fn test_events_split_across_boundary() {
        let mut counter = counter(15_000);
        counter.observe(&event("Spain"), 14_999);
        counter.observe(&event("Spain"), 15_000);

        let first = counter.close_expired(15_000);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].window, WindowId(0));
        assert_eq!(first[0].count, 1);

        let second = counter.close_expired(30_000);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].window, WindowId(1));
        assert_eq!(second[0].count, 1);
    }

    #[test]
    fn test_late_events_are_dropped() {
        let mut counter = counter(15_000);
        counter.observe(&event("Italy"), 1_000);
        assert_eq!(counter.close_expired(15_000).len(), 1);

        // Window 0 is closed; an event stamped inside it must not reopen it.
        assert!(!counter.observe(&event("Italy"), 14_000));
        assert_eq!(counter.late_drops(), 1);
        assert!(counter.close_expired(30_000).is_empty());
    }

    #[test]
    fn test_results_ordered_by_window_then_country() {
        let mut counter = counter(15_000);
        counter.observe(&event("France"), 1_000);
        counter.observe(&event("Spain"), 2_000);
        counter.observe(&event("Spain"), 3_000);
        counter.observe(&event("Italy"), 16_000);

        let results = counter.close_expired(30_000);
        let labels: Vec<String> = results.iter().map(|r| r.to_string()).collect();
        assert_eq!(labels, vec!["(France,1)", "(Spain,2)", "(Italy,1)"]);
        assert_eq!(results[0].window, WindowId(0));
        assert_eq!(results[2].window, WindowId(1));
    }

    #[test]
    fn test_flush_drains_open_windows() {
        let mut counter = counter(15_000);
        counter.observe(&event("Spain"), 1_000);
        counter.observe(&event("France"), 16_000);

        let results = counter.flush();
        assert_eq!(results.len(), 2);
        assert_eq!(counter.open_windows(), 0);

        // Flushed windows stay closed.
        assert!(!counter.observe(&event("Spain"), 1_000));
    }
}
