use std::borrow::Borrow;

use bson::{Bson, RawDocumentBuf};
use serde::Serialize;

use crate::{
    coll::options::InsertManyOptions,
    error::{convert_bulk_errors, Result},
    operation::Insert as Op,
    options::WriteConcern,
    results::InsertManyResult,
    serde_util,
    Collection,
};

use super::{action_impl, option_setters, CollRef};

impl<T: Serialize> Collection<T> {
    /// Inserts the data in `docs` into the collection.
    ///
    /// Note that this method accepts both owned and borrowed values, so the input documents
    /// do not need to be cloned in order to be passed in.
    ///
    /// This operation will retry once upon failure if the connection and encountered error support
    /// retryability. See the documentation
    /// [here](https://www.mongodb.com/docs/manual/core/retryable-writes/) for more information on
    /// retryable writes.
    ///
    /// `await` will return `Result<InsertManyResult>`.
    pub fn insert_many(&self, docs: impl IntoIterator<Item = impl Borrow<T>>) -> InsertMany {
        let human_readable = self.human_readable_serialization();
        InsertMany {
            coll: CollRef::new(self),
            docs: docs
                .into_iter()
                .map(|v| serde_util::to_raw_document_buf_with_options(v.borrow(), human_readable))
                .collect(),
            options: None,
        }
    }
}

#[cfg(feature = "sync")]
impl<T: Serialize> crate::sync::Collection<T> {
    /// Inserts the data in `docs` into the collection.
    ///
    /// Note that this method accepts both owned and borrowed values, so the input documents
    /// do not need to be cloned in order to be passed in.
    ///
    /// This operation will retry once upon failure if the connection and encountered error support
    /// retryability. See the documentation
    /// [here](https://www.mongodb.com/docs/manual/core/retryable-writes/) for more information on
    /// retryable writes.
    ///
    /// [`run`](InsertMany::run) will return `Result<InsertManyResult>`.
    pub fn insert_many(&self, docs: impl IntoIterator<Item = impl Borrow<T>>) -> InsertMany {
        self.async_collection.insert_many(docs)
    }
}

/// Inserts the data in `docs` into a collection.  Construct with [`Collection::insert_many`].
#[must_use]
pub struct InsertMany<'a> {
    coll: CollRef<'a>,
    docs: Result<Vec<RawDocumentBuf>>,
    options: Option<InsertManyOptions>,
}

impl<'a> InsertMany<'a> {
    option_setters! { options: InsertManyOptions;
        bypass_document_validation: bool,
        ordered: bool,
        write_concern: WriteConcern,
        comment: Bson,
    }
}

#[action_impl]
impl<'a> Action for InsertMany<'a> {
    type Future = InsertManyFuture;

    async fn execute(mut self) -> Result<InsertManyResult> {
        resolve_write_concern_with_session!(self.coll, self.options, None::<&crate::ClientSession>)?;

        let docs = self.docs?;
        let docs: Vec<_> = docs.iter().map(|d| d.as_ref()).collect();

        let insert = Op::new(
            self.coll.namespace(),
            docs,
            self.options,
            self.coll.human_readable_serialization(),
        );
        self.coll
            .client()
            .execute_operation(insert, None)
            .await
            .map_err(convert_bulk_errors)
    }
}
