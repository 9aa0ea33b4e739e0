use std::{collections::HashMap, marker::PhantomData};

use crate::{
    bson::{Bson, Document},
    error::{bulk_write::ClientBulkWriteError, Error, ErrorKind, Result},
    operation::bulk_write::BulkWrite as BulkWriteOperation,
    options::{BulkWriteOptions, WriteConcern, WriteModel},
    results::{BulkWriteResult, SummaryBulkWriteResult, VerboseBulkWriteResult},
    Client,
    ClientSession,
};

use super::{action_impl, option_setters};

impl Client {
    /// Executes the given batch of write operations, which may span multiple namespaces, as a
    /// single command to the server. Returns a summary of the effects of the writes; use
    /// [`BulkWrite::verbose_results`] to also get the per-operation results.
    pub fn bulk_write(&self, models: impl IntoIterator<Item = WriteModel>) -> BulkWrite<'_> {
        BulkWrite::new(self, models.into_iter().collect())
    }
}

#[cfg(any(feature = "sync", feature = "tokio-sync"))]
impl crate::sync::Client {
    /// Executes the given batch of write operations, which may span multiple namespaces, as a
    /// single command to the server.
    pub fn bulk_write(
        &self,
        models: impl IntoIterator<Item = WriteModel>,
    ) -> BulkWrite<'_> {
        self.async_client.bulk_write(models)
    }
}

/// Executes a batch of mixed write operations, created by calling [`Client::bulk_write`]. `await`
/// will return `Result<`[`SummaryBulkWriteResult`]`>` unless [`verbose_results`](Self::verbose_results)
/// is called, in which case it returns `Result<`[`VerboseBulkWriteResult`]`>`.
#[must_use]
pub struct BulkWrite<'a, R = SummaryBulkWriteResult> {
    client: &'a Client,
    models: Vec<WriteModel>,
    options: Option<BulkWriteOptions>,
    session: Option<&'a mut ClientSession>,
    _result: PhantomData<R>,
}

impl<'a> BulkWrite<'a, SummaryBulkWriteResult> {
    fn new(client: &'a Client, models: Vec<WriteModel>) -> Self {
        Self {
            client,
            models,
            options: None,
            session: None,
            _result: PhantomData,
        }
    }

    /// Requests that the per-operation results (inserted/updated/deleted document details) be
    /// returned in addition to the summary counts.
    pub fn verbose_results(self) -> BulkWrite<'a, VerboseBulkWriteResult> {
        BulkWrite {
            client: self.client,
            models: self.models,
            options: self.options,
            session: self.session,
            _result: PhantomData,
        }
    }
}

impl<'a, R> BulkWrite<'a, R> {
    option_setters!(options: BulkWriteOptions;
        ordered: bool,
        bypass_document_validation: bool,
        comment: Bson,
        let_vars: Document,
        write_concern: WriteConcern,
    );

    /// Use the provided session when running this operation.
    pub fn session(mut self, session: &'a mut ClientSession) -> BulkWrite<'a, R> {
        self.session = Some(session);
        self
    }

    fn is_ordered(&self) -> bool {
        self.options
            .as_ref()
            .and_then(|options| options.ordered)
            .unwrap_or(true)
    }
}

#[action_impl]
impl<'a, R: BulkWriteResult> Action for BulkWrite<'a, R> {
    type Future = BulkWriteFuture;

    async fn execute(mut self) -> Result<R> {
        if self.models.is_empty() {
            return Err(ErrorKind::InvalidArgument {
                message: "bulk_write must be provided at least one write operation".into(),
            }
            .into());
        }

        self.options
            .get_or_insert_with(Default::default)
            .verbose_results = Some(!R::errors_only());

        resolve_write_concern_with_session!(
            self.client,
            self.options,
            self.session.as_deref_mut()
        )?;

        let mut total_attempted = 0;
        let mut execution_status = ExecutionStatus::<R>::None;

        while total_attempted < self.models.len()
            && execution_status.should_continue(self.is_ordered())
        {
            let mut operation = BulkWriteOperation::<R>::new(
                &self.models[total_attempted..],
                total_attempted,
                self.options.as_ref(),
            );
            let result = self
                .client
                .execute_operation::<BulkWriteOperation<R>>(
                    &mut operation,
                    self.session.as_deref_mut(),
                )
                .await;
            total_attempted += operation.n_attempted;

            match result {
                Ok(result) => {
                    execution_status = execution_status.with_success(result);
                }
                Err(error) => {
                    execution_status = execution_status.with_failure(error);
                }
            }
        }

        match execution_status {
            ExecutionStatus::Success(result) => Ok(result),
            ExecutionStatus::Error(error) => Err(error),
            ExecutionStatus::None => unreachable!("models is non-empty"),
        }
    }
}

/// Tracks the outcome of a bulk write as its batches are executed. Starts at `None` and
/// transitions to either `Success` or `Error`, merging further batches into whichever state it's
/// already in.
enum ExecutionStatus<R> {
    Success(R),
    Error(Error),
    None,
}

impl<R: BulkWriteResult> ExecutionStatus<R> {
    fn with_success(self, result: R) -> Self {
        match self {
            Self::Success(mut current_result) => {
                current_result.merge(result);
                Self::Success(current_result)
            }
            Self::Error(mut current_error) => {
                let bulk_write_error = Self::get_current_bulk_write_error(&mut current_error);
                bulk_write_error.merge_partial_result(result.into_partial_result());
                Self::Error(current_error)
            }
            Self::None => Self::Success(result),
        }
    }

    fn with_failure(self, mut error: Error) -> Self {
        match self {
            Self::Success(current_result) => match *error.kind {
                ErrorKind::ClientBulkWrite(ref mut bulk_write_error) => {
                    bulk_write_error.merge_partial_result(current_result.into_partial_result());
                    Self::Error(error)
                }
                _ => {
                    let bulk_write_error: Error = ErrorKind::ClientBulkWrite(ClientBulkWriteError {
                        write_errors: HashMap::new(),
                        write_concern_errors: Vec::new(),
                        partial_result: Some(current_result.into_partial_result()),
                    })
                    .into();
                    Self::Error(bulk_write_error.with_source(error))
                }
            },
            Self::Error(mut current_error) => match *error.kind {
                ErrorKind::ClientBulkWrite(ref mut bulk_write_error) => {
                    let current_bulk_write_error =
                        Self::get_current_bulk_write_error(&mut current_error);
                    current_bulk_write_error.merge(std::mem::take(bulk_write_error));
                    Self::Error(current_error)
                }
                _ => Self::Error(current_error.with_source(error)),
            },
            Self::None => Self::Error(error),
        }
    }

    /// Gets the `ClientBulkWriteError` from a given `Error`. Should only be called when the error
    /// is known to be a `ClientBulkWrite` error.
    fn get_current_bulk_write_error(error: &mut Error) -> &mut ClientBulkWriteError {
        match *error.kind {
            ErrorKind::ClientBulkWrite(ref mut bulk_write_error) => bulk_write_error,
            _ => unreachable!(),
        }
    }

    /// Whether execution should continue with further batches given the current status.
    fn should_continue(&self, ordered: bool) -> bool {
        match self {
            Self::Error(ref error) => match *error.kind {
                ErrorKind::ClientBulkWrite(ref bulk_write_error) => {
                    let top_level_error_occurred = error.source.is_some();
                    let terminal_write_error_occurred =
                        ordered && !bulk_write_error.write_errors.is_empty();
                    !top_level_error_occurred && !terminal_write_error_occurred
                }
                _ => false,
            },
            _ => true,
        }
    }
}
