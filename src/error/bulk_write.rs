#![allow(missing_docs)]

use std::collections::HashMap;

use crate::{
    error::{WriteConcernError, WriteError},
    results::{SummaryBulkWriteResult, VerboseBulkWriteResult},
};

/// The partial results of a [`Client::bulk_write`](../../struct.Client.html#method.bulk_write)
/// operation that failed partway through execution. The variant matches whichever result type
/// the bulk write was configured to return.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum PartialBulkWriteResult {
    /// Summary counts only, returned when verbose results were not requested.
    Summary(SummaryBulkWriteResult),
    /// Per-operation results, returned when verbose results were requested.
    Verbose(VerboseBulkWriteResult),
}

impl PartialBulkWriteResult {
    fn merge(&mut self, other: Self) {
        match (self, other) {
            (Self::Summary(current), Self::Summary(other)) => current.merge(other),
            (Self::Verbose(current), Self::Verbose(other)) => current.merge(other),
            // The two variants are only ever constructed from the same bulk write, so they never
            // actually mix; if they somehow did, keep whatever was already accumulated.
            _ => {}
        }
    }
}

/// An error that occurred while executing a [`Client::bulk_write`](../../struct.Client.html#method.bulk_write)
/// operation.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct ClientBulkWriteError {
    /// The write concern errors that occurred.
    pub write_concern_errors: Vec<WriteConcernError>,

    /// The write errors that occurred, keyed by the index of the write model that caused them.
    pub write_errors: HashMap<usize, WriteError>,

    /// The results of any operations that were successfully completed before the error was
    /// encountered.
    pub partial_result: Option<PartialBulkWriteResult>,
}

impl ClientBulkWriteError {
    pub(crate) fn merge(&mut self, other: ClientBulkWriteError) {
        self.write_concern_errors.extend(other.write_concern_errors);
        self.write_errors.extend(other.write_errors);
        if let Some(other_partial_result) = other.partial_result {
            self.merge_partial_result(other_partial_result);
        }
    }

    pub(crate) fn merge_partial_result(&mut self, other_partial_result: PartialBulkWriteResult) {
        match self.partial_result {
            Some(ref mut partial_result) => partial_result.merge(other_partial_result),
            None => self.partial_result = Some(other_partial_result),
        }
    }
}
