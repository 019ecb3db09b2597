//! Result sink seam.
//!
//! The pipeline hands every closed (country, count) result to a sink and
//! does not care whether it prints, stores, or forwards them.

use crate::webtraffic::error::JobResult;
use crate::webtraffic::window::CountryWindowResult;
use async_trait::async_trait;

/// Receives window results as they are produced.
#[async_trait]
pub trait ResultSink: Send {
    async fn emit(&mut self, result: CountryWindowResult) -> JobResult<()>;
}

/// Prints each result to stdout as `(country,count)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        StdoutSink
    }
}

#[async_trait]
impl ResultSink for StdoutSink {
    async fn emit(&mut self, result: CountryWindowResult) -> JobResult<()> {
        println!("{}", result);
        Ok(())
    }
}

/// Collects results in memory, for tests and bounded runs.
#[derive(Debug, Default)]
pub struct MemoryResultSink {
    results: Vec<CountryWindowResult>,
}

impl MemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results collected so far, in emission order
    pub fn results(&self) -> &[CountryWindowResult] {
        &self.results
    }

    /// Consume the sink and return everything it collected
    pub fn into_results(self) -> Vec<CountryWindowResult> {
        self.results
    }
}

#[async_trait]
impl ResultSink for MemoryResultSink {
    async fn emit(&mut self, result: CountryWindowResult) -> JobResult<()> {
        self.results.push(result);
        Ok(())
    }
}
