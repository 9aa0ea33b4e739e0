use serde::Deserialize;

use crate::{
    bson::{doc, Document, Timestamp},
    change_stream::{ChangeStreamData, WatchArgs},
    cmap::{Command, RawCommandResponse, StreamDescription},
    cursor::CursorSpecification,
    error::Result,
    operation::{append_options, Operation, Retryability},
    options::{SelectionCriteria, WriteConcern},
};

use super::Aggregate;

/// The `aggregate` command used to create a change stream, together with the dynamic resume
/// state (resume token / operation time) carried over from a previous stream when this one is
/// resuming after a resumable error.
pub(crate) struct ChangeStreamAggregate {
    aggregate: Aggregate,
    resume_data: Option<ChangeStreamData>,
}

impl ChangeStreamAggregate {
    pub(crate) fn new(args: &WatchArgs, resume_data: Option<ChangeStreamData>) -> Result<Self> {
        let mut options = args.options.clone().unwrap_or_default();

        // A resume takes priority over any resume/start options the user originally specified:
        // prefer the cached resume token, falling back to the operation time of the stream that
        // was interrupted.
        if let Some(data) = &resume_data {
            options.resume_after = None;
            options.start_after = None;
            options.start_at_operation_time = None;
            if let Some(token) = &data.resume_token {
                options.resume_after = Some(token.clone());
            } else {
                options.start_at_operation_time = data.initial_operation_time;
            }
        }

        let mut bson_options = Document::new();
        append_options(&mut bson_options, Some(&options))?;

        let mut pipeline = vec![doc! { "$changeStream": bson_options }];
        pipeline.extend(args.pipeline.iter().cloned());

        Ok(Self {
            aggregate: Aggregate::new(
                args.target.clone(),
                pipeline,
                Some(options.aggregate_options()),
            ),
            resume_data,
        })
    }
}

#[derive(Deserialize)]
struct OperationTimeBody {
    #[serde(rename = "operationTime")]
    operation_time: Option<Timestamp>,
}

impl Operation for ChangeStreamAggregate {
    type O = (CursorSpecification, ChangeStreamData);
    type Command = Document;

    const NAME: &'static str = "aggregate";

    fn build(&mut self, description: &StreamDescription) -> Result<Command> {
        self.aggregate.build(description)
    }

    fn extract_at_cluster_time(
        &self,
        response: &bson::RawDocument,
    ) -> Result<Option<bson::Timestamp>> {
        self.aggregate.extract_at_cluster_time(response)
    }

    fn handle_response(
        &self,
        response: RawCommandResponse,
        description: &StreamDescription,
    ) -> Result<Self::O> {
        let operation_time = response.body::<OperationTimeBody>()?.operation_time;
        let cursor_spec = self.aggregate.handle_response(response, description)?;

        let mut data = match &self.resume_data {
            Some(existing) => ChangeStreamData {
                initial_operation_time: existing.initial_operation_time,
                resume_token: existing.resume_token.clone(),
                resume_attempted: existing.resume_attempted,
                document_returned: existing.document_returned,
                implicit_session: None,
            },
            None => ChangeStreamData::default(),
        };
        if data.initial_operation_time.is_none() {
            data.initial_operation_time = operation_time;
        }

        Ok((cursor_spec, data))
    }

    fn handle_error(&self, error: crate::error::Error) -> Result<Self::O> {
        Err(error)
    }

    fn selection_criteria(&self) -> Option<&SelectionCriteria> {
        self.aggregate.selection_criteria()
    }

    fn is_acknowledged(&self) -> bool {
        self.aggregate.is_acknowledged()
    }

    fn write_concern(&self) -> Option<&WriteConcern> {
        self.aggregate.write_concern()
    }

    fn supports_read_concern(&self, description: &StreamDescription) -> bool {
        self.aggregate.supports_read_concern(description)
    }

    fn supports_sessions(&self) -> bool {
        self.aggregate.supports_sessions()
    }

    fn retryability(&self) -> Retryability {
        self.aggregate.retryability()
    }

    fn update_for_retry(&mut self) {
        self.aggregate.update_for_retry()
    }

    fn pinned_connection(&self) -> Option<&crate::cmap::conn::PinnedConnectionHandle> {
        self.aggregate.pinned_connection()
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn override_criteria(&self) -> crate::operation::OverrideCriteriaFn {
        self.aggregate.override_criteria()
    }
}
