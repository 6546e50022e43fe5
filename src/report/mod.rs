//! Consumers of decoded measurements

pub mod tsv;

pub use tsv::TsvReport;

use crate::{error::Result, record::ResultRecord};

/// Receives every measurement of a run, in arrival order
pub trait ResultSink {
    fn report(&mut self, record: &ResultRecord) -> Result<()>;

    /// Called once after the termination marker has been seen
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: ResultSink + ?Sized> ResultSink for &mut S {
    fn report(&mut self, record: &ResultRecord) -> Result<()> {
        (**self).report(record)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Keeps every reported record in memory
#[derive(Debug, Clone, Default)]
pub struct CollectSink {
    records: Vec<ResultRecord>,
    finished: bool,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_records(self) -> Vec<ResultRecord> {
        self.records
    }
}

impl ResultSink for CollectSink {
    fn report(&mut self, record: &ResultRecord) -> Result<()> {
        self.records.push(*record);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
