use crate::{coll::options::DropCollectionOptions, db::options::DropDatabaseOptions, options::WriteConcern, ClientSession, Collection, Database};

use super::option_setters;

impl Database {
    /// Drops the database, deleting all data, collections, and indexes stored in it.
    ///
    /// `await` will return `Result<()>`.
    pub fn drop(&self) -> DropDatabase {
        DropDatabase {
            db: self,
            options: None,
            session: None,
        }
    }
}

#[cfg(any(feature = "sync", feature = "tokio-sync"))]
impl crate::sync::Database {
    /// Drops the database, deleting all data, collections, and indexes stored in it.
    ///
    /// [`run`](DropDatabase::run) will return `Result<()>`.
    pub fn drop(&self) -> DropDatabase {
        self.async_database.drop()
    }
}

impl<T> Collection<T> {
    /// Drops the collection, deleting all data, indexes, and associated metadata.
    ///
    /// `await` will return `Result<()>`.
    pub fn drop(&self) -> DropCollection<T> {
        DropCollection {
            coll: self,
            options: None,
            session: None,
        }
    }
}

#[cfg(any(feature = "sync", feature = "tokio-sync"))]
impl<T> crate::sync::Collection<T> {
    /// Drops the collection, deleting all data, indexes, and associated metadata.
    ///
    /// [`run`](DropCollection::run) will return `Result<()>`.
    pub fn drop(&self) -> DropCollection<T> {
        self.async_collection.drop()
    }
}

/// Drops the database, deleting all data, collections, and indexes stored in it.  Create by
/// calling [`Database::drop`] and execute with `await` (or [`run`](DropDatabase::run) if using
/// the sync client).
#[must_use]
pub struct DropDatabase<'a> {
    pub(crate) db: &'a Database,
    pub(crate) options: Option<DropDatabaseOptions>,
    pub(crate) session: Option<&'a mut ClientSession>,
}

impl<'a> DropDatabase<'a> {
    option_setters!(options: DropDatabaseOptions;
        /// The write concern for the operation.
        write_concern: WriteConcern,
    );

    /// Runs the drop using the provided session.
    pub fn session(mut self, value: impl Into<&'a mut ClientSession>) -> Self {
        self.session = Some(value.into());
        self
    }
}

/// Drops the collection, deleting all data, indexes, and associated metadata.  Create by calling
/// [`Collection::drop`] and execute with `await` (or [`run`](DropCollection::run) if using the
/// sync client).
#[must_use]
pub struct DropCollection<'a, T> {
    pub(crate) coll: &'a Collection<T>,
    pub(crate) options: Option<DropCollectionOptions>,
    pub(crate) session: Option<&'a mut ClientSession>,
}

impl<'a, T> DropCollection<'a, T> {
    option_setters!(options: DropCollectionOptions;
        /// The write concern for the operation.
        write_concern: WriteConcern,
    );

    /// Runs the drop using the provided session.
    pub fn session(mut self, value: impl Into<&'a mut ClientSession>) -> Self {
        self.session = Some(value.into());
        self
    }
}

// Action impl in src/db/action/drop.rs

// Action impl in src/coll/action/drop.rs
