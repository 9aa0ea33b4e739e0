use crate::{
    concern::{ReadConcern, WriteConcern},
    selection_criteria::SelectionCriteria,
    Database as AsyncDatabase,
};

use super::Collection;

/// `Database` is the client-side abstraction of a MongoDB database. It can be used to perform
/// database-level operations or to obtain handles to specific collections within the database. A
/// `Database` can only be obtained through a [`Client`](super::Client) by calling
/// [`Client::database`](super::Client::database) or
/// [`Client::database_with_options`](super::Client::database_with_options).
///
/// `Database` uses [`std::sync::Arc`] internally, so it can safely be shared across threads.
#[derive(Clone, Debug)]
pub struct Database {
    pub(crate) async_database: AsyncDatabase,
}

impl Database {
    pub(crate) fn new(async_database: AsyncDatabase) -> Self {
        Self { async_database }
    }

    /// Gets the name of the `Database`.
    pub fn name(&self) -> &str {
        self.async_database.name()
    }

    /// Gets the selection criteria of the `Database`.
    pub fn selection_criteria(&self) -> Option<&SelectionCriteria> {
        self.async_database.selection_criteria()
    }

    /// Gets the read concern of the `Database`.
    pub fn read_concern(&self) -> Option<&ReadConcern> {
        self.async_database.read_concern()
    }

    /// Gets the write concern of the `Database`.
    pub fn write_concern(&self) -> Option<&WriteConcern> {
        self.async_database.write_concern()
    }

    /// Gets a handle to a collection in this database with the provided name. The `Collection`
    /// options (e.g. read preference and write concern) will default to those of this
    /// `Database`.
    ///
    /// This method does not send or receive anything across the wire to the database, so it can
    /// be used repeatedly without incurring any costs from I/O.
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        Collection::new(self.async_database.collection(name))
    }

    /// Gets a handle to a collection in this database with the provided name. Operations done
    /// with this `Collection` will use the options specified by `options` and will otherwise
    /// default to those of this `Database`.
    pub fn collection_with_options<T: Send + Sync>(
        &self,
        name: &str,
        options: crate::coll::options::CollectionOptions,
    ) -> Collection<T> {
        Collection::new(self.async_database.collection_with_options(name, options))
    }
}
