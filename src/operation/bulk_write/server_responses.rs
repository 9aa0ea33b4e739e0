use serde::Deserialize;

use crate::{error::WriteConcernError, error::WriteError, operation::CursorInfo};

/// The top-level response to the bulkWrite command.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Response {
    pub(super) cursor: CursorInfo,

    #[serde(flatten)]
    pub(super) summary: SummaryInfo,

    #[serde(rename = "writeConcernError")]
    pub(super) write_concern_error: Option<WriteConcernError>,
}

/// The summary information contained within the top-level response to the bulkWrite command.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SummaryInfo {
    pub(super) n_errors: i64,
    pub(super) n_inserted: i64,
    pub(super) n_matched: i64,
    pub(super) n_modified: i64,
    pub(super) n_upserted: i64,
    pub(super) n_deleted: i64,
}

/// The structure of the response for a single operation within the results cursor.
#[derive(Debug, Deserialize)]
pub(super) struct SingleOperationResponse {
    #[serde(rename = "idx")]
    pub(super) index: usize,

    #[serde(flatten)]
    pub(super) result: SingleOperationResult,
}

/// The structure of the non-index fields for a single operation within the results cursor.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum SingleOperationResult {
    // This variant must be listed first; an error response doesn't have an "ok" field while a
    // success response does, so attempting success first would silently swallow errors.
    Error(WriteError),
    #[serde(rename_all = "camelCase")]
    Success {
        n: u64,
        n_modified: Option<u64>,
        upserted: Option<UpsertedId>,
    },
}

/// The structure of the inserted ID for an upserted document.
#[derive(Debug, Deserialize)]
pub(super) struct UpsertedId {
    #[serde(rename = "_id")]
    pub(super) id: crate::bson::Bson,
}
