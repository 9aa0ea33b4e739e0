#[cfg(test)]
mod test;

use bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};

use crate::{
    bson_util,
    cmap::{Command, RawCommandResponse, StreamDescription},
    error::{convert_bulk_errors, ErrorKind, Result},
    operation::{append_options, remove_empty_write_concern, OperationWithDefaults, Retryability, WriteResponseBody},
    options::{UpdateModifications, UpdateOptions, WriteConcern},
    results::UpdateResult,
    Namespace,
};

/// Either a set of update modifications to apply to matching documents, or a serializable
/// replacement document. Deferring serialization of a replacement document until [`build`] avoids
/// an unnecessary clone on the common path where the caller already owns the document.
///
/// [`build`]: OperationWithDefaults::build
pub(crate) enum UpdateOrReplace<'a, R> {
    UpdateModifications(UpdateModifications),
    Replacement(&'a R),
}

impl<'a, R> From<UpdateModifications> for UpdateOrReplace<'a, R> {
    fn from(modifications: UpdateModifications) -> Self {
        Self::UpdateModifications(modifications)
    }
}

impl<'a, R: Serialize> From<&'a R> for UpdateOrReplace<'a, R> {
    fn from(replacement: &'a R) -> Self {
        Self::Replacement(replacement)
    }
}

impl<'a, R: Serialize> UpdateOrReplace<'a, R> {
    /// Validates and wraps a replacement document, erroring if it contains any top-level update
    /// operators.
    pub(crate) fn replacement(replacement: &'a R, human_readable_serialization: bool) -> Result<Self> {
        let doc = to_document(replacement, human_readable_serialization)?;
        check_replacement_document(&doc)?;
        Ok(Self::Replacement(replacement))
    }

    pub(crate) fn to_bson(&self, human_readable_serialization: bool) -> Result<Bson> {
        match self {
            Self::UpdateModifications(modifications) => Ok(modifications.to_bson()),
            Self::Replacement(replacement) => {
                Ok(Bson::Document(to_document(*replacement, human_readable_serialization)?))
            }
        }
    }
}

fn to_document<R: Serialize>(value: &R, human_readable_serialization: bool) -> Result<Document> {
    if human_readable_serialization {
        Ok(bson::to_document_with_options(
            value,
            bson::SerializerOptions::builder()
                .human_readable(true)
                .build(),
        )?)
    } else {
        Ok(bson::to_document(value)?)
    }
}

fn check_replacement_document(doc: &Document) -> Result<()> {
    if let Some(key) = bson_util::first_key(doc) {
        if key.starts_with('$') {
            return Err(ErrorKind::InvalidArgument {
                message: "replacement document must not have any top-level keys that start with \
                          '$'"
                    .to_string(),
            }
            .into());
        }
    }
    Ok(())
}

#[derive(Debug)]
pub(crate) struct Update {
    ns: Namespace,
    filter: Document,
    update: UpdateModifications,
    multi: Option<bool>,
    options: Option<UpdateOptions>,
}

impl Update {
    #[cfg(test)]
    fn empty() -> Self {
        Update {
            ns: Namespace {
                db: "".to_string(),
                coll: "".to_string(),
            },
            filter: Document::new(),
            update: UpdateModifications::Document(Document::new()),
            multi: None,
            options: None,
        }
    }

    pub(crate) fn with_update(
        ns: Namespace,
        filter: Document,
        update: UpdateModifications,
        multi: bool,
        options: Option<UpdateOptions>,
    ) -> Self {
        Self {
            ns,
            filter,
            update,
            multi: if multi { Some(true) } else { None },
            options,
        }
    }

    /// Constructs a replace-style update from a pre-serialized replacement document.
    pub(crate) fn with_replace_raw(
        ns: Namespace,
        filter: Document,
        replacement: bson::RawDocumentBuf,
        multi: bool,
        options: Option<UpdateOptions>,
    ) -> Result<Self> {
        let doc: Document = replacement.as_ref().try_into()?;
        check_replacement_document(&doc)?;
        Ok(Self::with_update(
            ns,
            filter,
            UpdateModifications::Document(doc),
            multi,
            options,
        ))
    }
}

impl OperationWithDefaults for Update {
    type O = UpdateResult;
    type Command = Document;

    const NAME: &'static str = "update";

    fn build(&mut self, _description: &StreamDescription) -> Result<Command<Self::Command>> {
        let mut body = doc! {
            Self::NAME: self.ns.coll.clone(),
        };

        let mut update = doc! {
            "q": self.filter.clone(),
            "u": self.update.to_bson(),
        };

        if let Some(ref mut options) = self.options {
            remove_empty_write_concern!(Some(options));

            if let Some(upsert) = options.upsert {
                update.insert("upsert", upsert);
            }

            if let Some(ref array_filters) = options.array_filters {
                update.insert("arrayFilters", bson_util::to_bson_array(array_filters));
            }

            if let Some(ref hint) = options.hint {
                update.insert("hint", hint.clone().into_bson());
            }

            if let Some(bypass_doc_validation) = options.bypass_document_validation {
                body.insert("bypassDocumentValidation", bypass_doc_validation);
            }

            if let Some(ref collation) = options.collation {
                update.insert("collation", bson::to_bson(collation)?);
            }
        };

        if let Some(multi) = self.multi {
            update.insert("multi", multi);
        }

        let write_concern = self.options.as_ref().and_then(|o| o.write_concern.as_ref());
        if let Some(write_concern) = write_concern {
            body.insert("writeConcern", bson::to_bson(write_concern)?);
        }

        body.insert("updates", vec![Bson::Document(update)]);

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
        let body: WriteResponseBody<UpdateBody> = response.body()?;
        body.validate().map_err(convert_bulk_errors)?;

        let matched_count = body.n;
        let modified_count = body.n_modified;
        let upserted_id = body
            .upserted
            .as_ref()
            .and_then(|v| v.first())
            .and_then(|doc| doc.get("_id"))
            .cloned();
        Ok(UpdateResult {
            matched_count,
            modified_count,
            upserted_id,
        })
    }

    fn write_concern(&self) -> Option<&WriteConcern> {
        self.options.as_ref().and_then(|o| o.write_concern.as_ref())
    }

    fn retryability(&self) -> Retryability {
        if self.multi == Some(true) {
            Retryability::None
        } else {
            Retryability::Write
        }
    }
}

#[derive(Deserialize)]
struct UpdateBody {
    #[serde(rename = "nModified")]
    n_modified: u64,
    upserted: Option<Vec<Document>>,
}

