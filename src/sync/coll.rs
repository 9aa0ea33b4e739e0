use crate::{
    options::{ReadConcern, SelectionCriteria, WriteConcern},
    Collection as AsyncCollection,
    Namespace,
};

/// `Collection` is the client-side abstraction of a MongoDB Collection. It can be used to perform
/// collection-level operations such as CRUD operations. A `Collection` can be obtained through a
/// [`Database`](super::Database) by calling [`Database::collection`](super::Database::collection)
/// or [`Database::collection_with_options`](super::Database::collection_with_options).
///
/// `Collection` uses [`std::sync::Arc`] internally, so it can safely be shared across threads.
#[derive(Clone, Debug)]
pub struct Collection<T>
where
    T: Send + Sync,
{
    pub(crate) async_collection: AsyncCollection<T>,
}

impl<T> Collection<T>
where
    T: Send + Sync,
{
    pub(crate) fn new(async_collection: AsyncCollection<T>) -> Self {
        Self { async_collection }
    }

    /// Gets a clone of the `Collection` with a different type `U`.
    pub fn clone_with_type<U: Send + Sync>(&self) -> Collection<U> {
        Collection::new(self.async_collection.clone_with_type())
    }

    /// Gets the name of the `Collection`.
    pub fn name(&self) -> &str {
        self.async_collection.name()
    }

    /// Gets the namespace of the `Collection`.
    pub fn namespace(&self) -> Namespace {
        self.async_collection.namespace()
    }

    /// Gets the selection criteria of the `Collection`.
    pub fn selection_criteria(&self) -> Option<&SelectionCriteria> {
        self.async_collection.selection_criteria()
    }

    /// Gets the read concern of the `Collection`.
    pub fn read_concern(&self) -> Option<&ReadConcern> {
        self.async_collection.read_concern()
    }

    /// Gets the write concern of the `Collection`.
    pub fn write_concern(&self) -> Option<&WriteConcern> {
        self.async_collection.write_concern()
    }
}
