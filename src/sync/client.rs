pub(crate) mod session;

use crate::{
    error::Result,
    options::{ClientOptions, DatabaseOptions, ReadConcern, SelectionCriteria, WriteConcern},
    runtime,
    Client as AsyncClient,
};

use super::Database;

/// This is the main entry point for the synchronous API. A `Client` is used to connect to a
/// MongoDB cluster. By default, it will monitor the topology of the cluster, keeping track of any
/// changes, such as servers being added or removed.
///
/// `Client` is a thin wrapper around the asynchronous [`crate::Client`] that drives it to
/// completion on an internal Tokio runtime.
///
/// `Client` uses [`std::sync::Arc`] internally, so it can safely be shared across threads.
#[derive(Clone, Debug)]
pub struct Client {
    pub(crate) async_client: AsyncClient,
}

impl From<AsyncClient> for Client {
    fn from(async_client: AsyncClient) -> Self {
        Self { async_client }
    }
}

impl Client {
    /// Creates a new `Client` connected to the cluster specified by `uri`. `uri` must be a valid
    /// MongoDB connection string.
    ///
    /// See the documentation on [`ClientOptions::parse`] for more details.
    pub fn with_uri_str(uri: impl AsRef<str>) -> Result<Self> {
        let async_client = runtime::block_on(AsyncClient::with_uri_str(uri.as_ref()))?;
        Ok(Self { async_client })
    }

    /// Creates a new `Client` connected to the cluster specified by `options`.
    pub fn with_options(options: ClientOptions) -> Result<Self> {
        let async_client = AsyncClient::with_options(options)?;
        Ok(Self { async_client })
    }

    /// Gets the default selection criteria the `Client` uses for operations.
    pub fn selection_criteria(&self) -> Option<&SelectionCriteria> {
        self.async_client.selection_criteria()
    }

    /// Gets the default read concern the `Client` uses for operations.
    pub fn read_concern(&self) -> Option<&ReadConcern> {
        self.async_client.read_concern()
    }

    /// Gets the default write concern the `Client` uses for operations.
    pub fn write_concern(&self) -> Option<&WriteConcern> {
        self.async_client.write_concern()
    }

    /// Gets a handle to a database specified by `name` in the cluster the `Client` is connected
    /// to. The `Database` options (e.g. read preference and write concern) will default to those
    /// of the `Client`.
    ///
    /// This method does not send or receive anything across the wire to the database, so it can
    /// be used repeatedly without incurring any costs from I/O.
    pub fn database(&self, name: &str) -> Database {
        Database::new(self.async_client.database(name))
    }

    /// Gets a handle to a database specified by `name` in the cluster the `Client` is connected
    /// to. Operations done with this `Database` will use the options specified by `options` by
    /// default and will otherwise default to those of the `Client`.
    pub fn database_with_options(&self, name: &str, options: DatabaseOptions) -> Database {
        Database::new(self.async_client.database_with_options(name, options))
    }

    /// Gets a handle to the default database specified in the `ClientOptions` or MongoDB
    /// connection string used to construct this `Client`.
    ///
    /// If no default database was specified, `None` will be returned.
    pub fn default_database(&self) -> Option<Database> {
        self.async_client.default_database().map(Database::new)
    }
}
