use bson::Document;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;

use crate::{
    error::Result,
    Cursor as AsyncCursor,
    SessionCursor as AsyncSessionCursor,
};

use super::ClientSession;

/// A `Cursor` streams the result of a query. When a query is made, a `Cursor` will be returned
/// with the first batch of results from the server; the documents will be returned as the
/// `Cursor` is iterated. When the batch is exhausted and if there are more results, the `Cursor`
/// will fetch the next batch of documents, and so forth until the results are exhausted. Note
/// that because of this batching, additional network I/O may occur on any given call to
/// `Cursor::next`. Because of this, a `Cursor` iterates over `Result<T>` items rather than simply
/// `T` items.
#[derive(Debug)]
pub struct Cursor<T = Document>
where
    T: DeserializeOwned,
{
    async_cursor: AsyncCursor<T>,
}

impl<T> Cursor<T>
where
    T: DeserializeOwned,
{
    pub(crate) fn new(async_cursor: AsyncCursor<T>) -> Self {
        Self { async_cursor }
    }
}

impl<T> Iterator for Cursor<T>
where
    T: DeserializeOwned + Unpin,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        super::TOKIO_RUNTIME.block_on(self.async_cursor.next())
    }
}

/// A `SessionCursor` is a cursor that was created with a [`ClientSession`] and must be iterated
/// using one. To iterate, use [`SessionCursor::next`]:
pub struct SessionCursor<T = Document>
where
    T: DeserializeOwned,
{
    async_cursor: AsyncSessionCursor<T>,
}

impl<T> SessionCursor<T>
where
    T: DeserializeOwned,
{
    pub(crate) fn new(async_cursor: AsyncSessionCursor<T>) -> Self {
        Self { async_cursor }
    }

    /// Retrieve the next result from the cursor. The session provided must be the same session
    /// used to create the cursor.
    pub fn next(&mut self, session: &mut ClientSession) -> Option<Result<T>> {
        super::TOKIO_RUNTIME.block_on(self.async_cursor.next(&mut session.async_client_session))
    }
}
