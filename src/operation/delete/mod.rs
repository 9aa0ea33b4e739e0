#[cfg(test)]
mod test;

use bson::{doc, Bson, Document};

use crate::{
    cmap::{Command, RawCommandResponse, StreamDescription},
    error::{convert_bulk_errors, Result},
    operation::{
        append_options,
        remove_empty_write_concern,
        OperationWithDefaults,
        Retryability,
        WriteResponseBody,
    },
    options::{DeleteOptions, WriteConcern},
    results::DeleteResult,
    Namespace,
};

#[derive(Debug)]
pub(crate) struct Delete {
    ns: Namespace,
    filter: Document,
    limit: Option<u32>,
    options: Option<DeleteOptions>,
}

impl Delete {
    #[cfg(test)]
    fn empty() -> Self {
        Self::new(
            Namespace {
                db: String::new(),
                coll: String::new(),
            },
            Document::new(),
            None,
            None,
        )
    }

    pub(crate) fn new(
        ns: Namespace,
        filter: Document,
        limit: Option<u32>,
        options: Option<DeleteOptions>,
    ) -> Self {
        Self {
            ns,
            filter,
            limit,
            options,
        }
    }
}

impl OperationWithDefaults for Delete {
    type O = DeleteResult;
    type Command = Document;

    const NAME: &'static str = "delete";

    fn build(&mut self, _description: &StreamDescription) -> Result<Command<Self::Command>> {
        let mut body = doc! {
            Self::NAME: self.ns.coll.clone(),
        };

        let mut delete = doc! {
            "q": self.filter.clone(),
            "limit": self.limit.unwrap_or(0),
        };

        remove_empty_write_concern!(self.options);

        if let Some(ref options) = self.options {
            if let Some(ref collation) = options.collation {
                delete.insert("collation", bson::to_bson(collation)?);
            }

            if let Some(ref hint) = options.hint {
                delete.insert("hint", hint.clone().into_bson());
            }
        }

        append_options(&mut body, self.options.as_ref())?;

        body.insert("deletes", vec![Bson::Document(delete)]);

        Ok(Command::new(
            Self::NAME.to_string(),
            self.ns.db.clone(),
            body,
        ))
    }

    fn handle_response(
        &self,
        response: RawCommandResponse,
        _description: &StreamDescription,
    ) -> Result<Self::O> {
        let body: WriteResponseBody = response.body()?;
        body.validate().map_err(convert_bulk_errors)?;
        Ok(DeleteResult {
            deleted_count: body.n,
        })
    }

    fn write_concern(&self) -> Option<&WriteConcern> {
        self.options.as_ref().and_then(|o| o.write_concern.as_ref())
    }

    fn retryability(&self) -> Retryability {
        if self.limit == Some(1) {
            Retryability::Write
        } else {
            Retryability::None
        }
    }
}
