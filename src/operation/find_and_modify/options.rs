use std::time::Duration;

use bson::Document;
use serde::Serialize;
use typed_builder::TypedBuilder;

use crate::{
    bson_util,
    coll::options::{
        FindOneAndDeleteOptions,
        FindOneAndReplaceOptions,
        FindOneAndUpdateOptions,
        ReturnDocument,
    },
    collation::Collation,
    concern::WriteConcern,
};

use super::super::UpdateOrReplace;

/// Which kind of modification a `findAndModify` command should perform.
pub(crate) enum Modification<'a, R> {
    Delete,
    Update(UpdateOrReplace<'a, R>),
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Default, TypedBuilder, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FindAndModifyOptions {
    #[builder(default)]
    pub(crate) sort: Option<Document>,

    #[builder(default)]
    pub(crate) remove: Option<bool>,

    #[builder(default)]
    pub(crate) new: Option<bool>,

    #[builder(default)]
    pub(crate) upsert: Option<bool>,

    #[builder(default)]
    pub(crate) bypass_document_validation: Option<bool>,

    #[builder(default)]
    pub(crate) write_concern: Option<WriteConcern>,

    #[builder(default)]
    pub(crate) array_filters: Option<Vec<Document>>,

    #[builder(default)]
    #[serde(
        serialize_with = "bson_util::serialize_duration_as_i64_millis",
        rename = "maxTimeMS"
    )]
    pub(crate) max_time: Option<Duration>,

    #[builder(default)]
    #[serde(rename = "fields")]
    pub(crate) projection: Option<Document>,

    #[builder(default)]
    pub(crate) collation: Option<Collation>,
}

impl From<FindOneAndDeleteOptions> for FindAndModifyOptions {
    fn from(opts: FindOneAndDeleteOptions) -> Self {
        FindAndModifyOptions::builder()
            .collation(opts.collation)
            .max_time(opts.max_time)
            .projection(opts.projection)
            .sort(opts.sort)
            .remove(true)
            .write_concern(opts.write_concern)
            .build()
    }
}

impl From<FindOneAndReplaceOptions> for FindAndModifyOptions {
    fn from(opts: FindOneAndReplaceOptions) -> Self {
        FindAndModifyOptions::builder()
            .collation(opts.collation)
            .bypass_document_validation(opts.bypass_document_validation)
            .max_time(opts.max_time)
            .projection(opts.projection)
            .new(return_document_to_bool(opts.return_document))
            .sort(opts.sort)
            .upsert(opts.upsert)
            .write_concern(opts.write_concern)
            .build()
    }
}

impl From<FindOneAndUpdateOptions> for FindAndModifyOptions {
    fn from(opts: FindOneAndUpdateOptions) -> Self {
        FindAndModifyOptions::builder()
            .collation(opts.collation)
            .array_filters(opts.array_filters)
            .bypass_document_validation(opts.bypass_document_validation)
            .max_time(opts.max_time)
            .projection(opts.projection)
            .new(return_document_to_bool(opts.return_document))
            .sort(opts.sort)
            .upsert(opts.upsert)
            .write_concern(opts.write_concern)
            .build()
    }
}

fn return_document_to_bool(return_document: Option<ReturnDocument>) -> Option<bool> {
    if let Some(return_document) = return_document {
        return match return_document {
            ReturnDocument::After => Some(true),
            ReturnDocument::Before => Some(false),
        };
    }
    None
}
