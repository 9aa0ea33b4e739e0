mod server_responses;

use std::{collections::HashMap, marker::PhantomData};

use crate::{
    bson::{doc, from_slice, Bson, Document},
    cmap::{Command, RawCommandResponse, StreamDescription},
    error::{
        bulk_write::ClientBulkWriteError,
        ErrorKind,
        Result,
        WriteConcernError,
    },
    operation::{append_options, OperationWithDefaults, Retryability},
    options::{BulkWriteOptions, WriteConcern, WriteModel},
    results::{BulkWriteResult, DeleteResult, InsertOneResult, UpdateResult},
};

use server_responses::{Response, SingleOperationResult};

/// Executes a single batch of a `bulkWrite` command over `models`, starting at `offset` within
/// the overall list of models the caller is working through. `R` determines whether summary
/// counts or full per-operation results are requested from and parsed out of the server.
pub(crate) struct BulkWrite<'a, R> {
    models: &'a [WriteModel],
    offset: usize,
    options: Option<BulkWriteOptions>,
    /// The number of models from `models` that were included in the last built command. Read by
    /// the caller after `execute_operation` returns to know how far execution progressed.
    pub(crate) n_attempted: usize,
    _result: PhantomData<R>,
}

impl<'a, R: BulkWriteResult> BulkWrite<'a, R> {
    pub(crate) fn new(
        models: &'a [WriteModel],
        offset: usize,
        options: Option<&BulkWriteOptions>,
    ) -> Self {
        Self {
            models,
            offset,
            options: options.cloned(),
            n_attempted: 0,
            _result: PhantomData,
        }
    }
}

impl<'a, R: BulkWriteResult> OperationWithDefaults for BulkWrite<'a, R> {
    type O = R;
    type Command = Document;

    const NAME: &'static str = "bulkWrite";

    fn build(&mut self, description: &StreamDescription) -> Result<Command<Self::Command>> {
        let max_batch = description.max_write_batch_size as usize;

        let mut ops = Vec::new();
        let mut ns_info = Vec::new();
        let mut ns_index_map: HashMap<&str, usize> = HashMap::new();

        let mut n_attempted = 0;
        for model in self.models.iter().take(max_batch) {
            let ns = model.namespace();
            let key = ns.coll.as_str();
            let ns_index = match ns_index_map.get(key) {
                Some(index) => *index,
                None => {
                    let index = ns_info.len();
                    ns_info.push(doc! { "ns": format!("{}.{}", ns.db, ns.coll) });
                    ns_index_map.insert(key, index);
                    index
                }
            };

            let mut op_doc = model.to_document()?;
            op_doc.insert(model.operation_name(), ns_index as i64);
            ops.push(op_doc);

            n_attempted += 1;
        }
        self.n_attempted = n_attempted;

        let mut body = doc! {
            Self::NAME: 1,
            "errorsOnly": R::errors_only(),
        };
        append_options(&mut body, self.options.as_ref())?;
        body.insert("ops", ops);
        body.insert("nsInfo", ns_info);

        Ok(Command::new(
            Self::NAME.to_string(),
            "admin".to_string(),
            body,
        ))
    }

    fn handle_response(
        &self,
        raw_response: RawCommandResponse,
        _description: &StreamDescription,
    ) -> Result<Self::O> {
        let response: Response = raw_response.body_utf8_lossy()?;

        let mut result = R::default();
        result.populate_summary_info(
            response.summary.n_inserted,
            response.summary.n_matched,
            response.summary.n_modified,
            response.summary.n_upserted,
            response.summary.n_deleted,
        );

        let mut write_errors = HashMap::new();
        for raw_doc in response.cursor.first_batch {
            let single: server_responses::SingleOperationResponse =
                from_slice(raw_doc.as_bytes())?;
            let absolute_index = self.offset + single.index;

            match single.result {
                SingleOperationResult::Error(err) => {
                    write_errors.insert(absolute_index, err);
                }
                SingleOperationResult::Success { n, n_modified, upserted } => {
                    let model = self.models.get(single.index);
                    match model {
                        Some(WriteModel::InsertOne { document, .. }) => {
                            let inserted_id = document.get("_id").cloned().unwrap_or(Bson::Null);
                            result.add_insert_result(absolute_index, InsertOneResult { inserted_id });
                        }
                        Some(WriteModel::UpdateOne { .. } | WriteModel::UpdateMany { .. } | WriteModel::ReplaceOne { .. }) => {
                            result.add_update_result(
                                absolute_index,
                                UpdateResult {
                                    matched_count: n,
                                    modified_count: n_modified.unwrap_or(0),
                                    upserted_id: upserted.map(|u| u.id),
                                },
                            );
                        }
                        Some(WriteModel::DeleteOne { .. } | WriteModel::DeleteMany { .. }) => {
                            result.add_delete_result(absolute_index, DeleteResult { deleted_count: n });
                        }
                        None => {}
                    }
                }
            }
        }

        let write_concern_error: Option<WriteConcernError> = response.write_concern_error;

        if !write_errors.is_empty() || write_concern_error.is_some() {
            return Err(ErrorKind::ClientBulkWrite(ClientBulkWriteError {
                write_errors,
                write_concern_errors: write_concern_error.into_iter().collect(),
                partial_result: Some(result.into_partial_result()),
            })
            .into());
        }

        Ok(result)
    }

    fn write_concern(&self) -> Option<&WriteConcern> {
        self.options.as_ref().and_then(|o| o.write_concern.as_ref())
    }

    fn retryability(&self) -> Retryability {
        Retryability::Write
    }
}
