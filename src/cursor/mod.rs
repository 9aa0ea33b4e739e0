mod common;
pub(crate) mod session;

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures_core::{future::BoxFuture, Stream};
use serde::de::DeserializeOwned;

use crate::{
    client::options::ServerAddress,
    client::session::ClientSession,
    cmap::conn::PinnedConnectionHandle,
    error::Result,
    operation::GetMore,
    results::GetMoreResult,
    Client,
};

pub(crate) use common::{CursorInformation, CursorSpecification};
pub(crate) use common::{stream_poll_next, BatchValue, CursorStream, NextInBatchFuture};
use common::{GenericCursor, GetMoreProvider, GetMoreProviderResult, PinnedConnection};

#[cfg(test)]
use tokio::sync::oneshot;

/// A `Cursor` streams the result of a query. When a query is made, a `Cursor` will be returned
/// with the first batch of results from the server; the documents will be returned as the
/// `Cursor` is iterated. When the batch is exhausted and if there are more results, the `Cursor`
/// will fetch the next batch of documents, and so forth until the results are exhausted. Note
/// that because of this batching, additional network I/O may occur on any given call to
/// `Cursor::next`. Because of this, a `Cursor` iterates over `Result<T>` items rather than
/// simply `T` items.
///
/// If a `Cursor` is still open when it goes out of scope, it will automatically be closed via an
/// asynchronous `killCursors` command executed from its `Drop` implementation.
pub struct Cursor<T = crate::bson::Document>
where
    T: DeserializeOwned,
{
    client: Client,
    wrapped_cursor: GenericCursor<OwnedSessionGetMoreProvider, T>,
    drop_address: Option<ServerAddress>,
    #[cfg(test)]
    kill_watcher: Option<oneshot::Sender<()>>,
}

impl<T> Cursor<T>
where
    T: DeserializeOwned,
{
    pub(crate) fn new(
        client: Client,
        spec: CursorSpecification,
        session: Option<ClientSession>,
        pinned_connection: Option<PinnedConnectionHandle>,
    ) -> Self {
        let provider = OwnedSessionGetMoreProvider::new(&spec, session);
        Self {
            client: client.clone(),
            wrapped_cursor: GenericCursor::new(
                client,
                spec,
                PinnedConnection::new(pinned_connection),
                provider,
            ),
            drop_address: None,
            #[cfg(test)]
            kill_watcher: None,
        }
    }

    /// Update the type streamed values will be parsed as.
    pub(crate) fn with_type<D: DeserializeOwned>(self) -> Cursor<D> {
        Cursor {
            client: self.client,
            wrapped_cursor: self.wrapped_cursor.with_type(),
            drop_address: self.drop_address,
            #[cfg(test)]
            kill_watcher: self.kill_watcher,
        }
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.wrapped_cursor.is_exhausted()
    }

    pub(crate) fn address(&self) -> &ServerAddress {
        self.wrapped_cursor.address()
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn post_batch_resume_token(&self) -> Option<&crate::change_stream::event::ResumeToken> {
        self.wrapped_cursor.post_batch_resume_token()
    }

    /// Mark the address that a `killCursors` command should be sent to if this cursor is
    /// replaced by a new one created as part of a resume (the new cursor may live on a
    /// different server than the one whose connection was pinned to this one).
    pub(crate) fn set_drop_address(&mut self, address: ServerAddress) {
        self.drop_address = Some(address);
    }

    /// Take the implicit session owned by this cursor's `getMore` provider, if any, so it can be
    /// reused by a resumed cursor.
    pub(crate) fn take_implicit_session(&mut self) -> Option<ClientSession> {
        self.wrapped_cursor.provider_mut().take_session()
    }

    #[cfg(test)]
    pub(crate) fn set_kill_watcher(&mut self, tx: oneshot::Sender<()>) {
        self.kill_watcher = Some(tx);
    }

    #[cfg(test)]
    pub(crate) fn current_batch(&self) -> &std::collections::VecDeque<crate::bson::RawDocumentBuf> {
        self.wrapped_cursor.current_batch()
    }
}

impl<T> CursorStream for Cursor<T>
where
    T: DeserializeOwned,
{
    fn poll_next_in_batch(&mut self, cx: &mut Context<'_>) -> Poll<Result<BatchValue>> {
        self.wrapped_cursor.poll_next_in_batch(cx)
    }
}

impl<T> Stream for Cursor<T>
where
    T: DeserializeOwned + Unpin,
{
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        stream_poll_next(Pin::into_inner(self), cx)
    }
}

impl<T> Drop for Cursor<T>
where
    T: DeserializeOwned,
{
    fn drop(&mut self) {
        if self.wrapped_cursor.is_exhausted() {
            return;
        }

        let ns = self.wrapped_cursor.namespace().clone();
        let cursor_id = self.wrapped_cursor.id();
        let pinned = self.wrapped_cursor.pinned_connection().replicate();
        let drop_address = self.drop_address.clone();
        common::kill_cursor(
            self.client.clone(),
            &ns,
            cursor_id,
            pinned,
            drop_address,
            #[cfg(test)]
            self.kill_watcher.take(),
        );
    }
}

struct OwnedSessionGetMoreResult {
    get_more_result: Result<GetMoreResult>,
    session: Option<ClientSession>,
}

impl GetMoreProviderResult for OwnedSessionGetMoreResult {
    type Session = Option<ClientSession>;

    fn into_parts(self) -> (Result<GetMoreResult>, Self::Session) {
        (self.get_more_result, self.session)
    }

    fn exhausted(&self) -> bool {
        match &self.get_more_result {
            Ok(result) => result.exhausted,
            Err(e) => matches!(*e.kind, crate::error::ErrorKind::Command(ref c) if c.code == 43 || c.code == 237),
        }
    }
}

enum OwnedSessionGetMoreProvider {
    Executing(BoxFuture<'static, OwnedSessionGetMoreResult>),
    Idle(Option<ClientSession>),
    Done,
}

impl OwnedSessionGetMoreProvider {
    fn new(spec: &CursorSpecification, session: Option<ClientSession>) -> Self {
        if spec.id() == 0 {
            Self::Done
        } else {
            Self::Idle(session)
        }
    }

    fn take_session(&mut self) -> Option<ClientSession> {
        match self {
            Self::Idle(session) => session.take(),
            _ => None,
        }
    }
}

impl GetMoreProvider for OwnedSessionGetMoreProvider {
    type ResultType = OwnedSessionGetMoreResult;
    type GetMoreFuture = BoxFuture<'static, OwnedSessionGetMoreResult>;

    fn executing_future(&mut self) -> Option<&mut Self::GetMoreFuture> {
        match self {
            Self::Executing(ref mut future) => Some(future),
            _ => None,
        }
    }

    fn clear_execution(&mut self, session: Option<ClientSession>, exhausted: bool) {
        *self = if exhausted { Self::Done } else { Self::Idle(session) };
    }

    fn start_execution(
        &mut self,
        info: CursorInformation,
        client: Client,
        pinned_connection: Option<&PinnedConnectionHandle>,
    ) {
        let pinned_connection = pinned_connection.map(PinnedConnectionHandle::replicate);
        take_mut::take(self, |self_| match self_ {
            Self::Idle(mut session) => {
                let future = Box::pin(async move {
                    let get_more = GetMore::new(info, pinned_connection.as_ref());
                    let get_more_result = client.execute_operation(get_more, session.as_mut()).await;
                    OwnedSessionGetMoreResult {
                        get_more_result,
                        session,
                    }
                });
                Self::Executing(future)
            }
            other => other,
        })
    }
}
