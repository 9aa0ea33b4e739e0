use std::task::{Context, Poll};

use futures_core::future::BoxFuture;
use serde::de::DeserializeOwned;

use crate::{
    change_stream::event::ResumeToken,
    client::{options::ServerAddress, session::ClientSession},
    cmap::conn::PinnedConnectionHandle,
    error::Result,
    operation::GetMore,
    results::GetMoreResult,
    Client,
};

use super::common::{
    BatchValue,
    CursorInformation,
    CursorSpecification,
    CursorStream,
    GenericCursor,
    GetMoreProvider,
    GetMoreProviderResult,
    PinnedConnection,
};

/// A [`SessionCursor`] is a cursor that was created from a cursor-producing operation that was
/// run using a [`ClientSession`]. Unlike a regular [`Cursor`](crate::Cursor), a [`SessionCursor`]
/// must be iterated using a `ClientSession`, which is passed to each call to
/// [`next`](SessionCursor::next) / [`stream`](SessionCursor::stream).
///
/// If a [`SessionCursor`] is still open when it goes out of scope, it will automatically be
/// closed via an asynchronous `killCursors` command executed from its `Drop` implementation.
pub struct SessionCursor<T>
where
    T: DeserializeOwned,
{
    client: Client,
    info: CursorInformation,
    pinned_connection: PinnedConnection,
    drop_address: Option<ServerAddress>,
    initial_buffer: std::collections::VecDeque<crate::bson::RawDocumentBuf>,
    post_batch_resume_token: Option<ResumeToken>,
    exhausted: bool,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> SessionCursor<T>
where
    T: DeserializeOwned,
{
    pub(crate) fn new(
        client: Client,
        spec: CursorSpecification,
        pinned_connection: Option<PinnedConnectionHandle>,
    ) -> Self {
        let exhausted = spec.id() == 0;
        Self {
            client,
            info: spec.info,
            pinned_connection: PinnedConnection::new(pinned_connection),
            drop_address: None,
            initial_buffer: spec.initial_buffer,
            post_batch_resume_token: spec.post_batch_resume_token,
            exhausted,
            _phantom: std::marker::PhantomData,
        }
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub(crate) fn address(&self) -> &ServerAddress {
        &self.info.address
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn set_drop_address(&mut self, address: ServerAddress) {
        self.drop_address = Some(address);
    }

    /// Update the type streamed values will be parsed as.
    pub(crate) fn with_type<D: DeserializeOwned>(self) -> SessionCursor<D> {
        SessionCursor {
            client: self.client,
            info: self.info,
            pinned_connection: self.pinned_connection,
            drop_address: self.drop_address,
            initial_buffer: self.initial_buffer,
            post_batch_resume_token: self.post_batch_resume_token,
            exhausted: self.exhausted,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Borrow this cursor together with a session, returning a [`SessionCursorStream`] that can
    /// be used to poll for the next batch value without running afoul of the borrow checker.
    pub(crate) fn stream<'session>(
        &mut self,
        session: &'session mut ClientSession,
    ) -> SessionCursorStream<'_, 'session, T> {
        SessionCursorStream {
            generic_cursor: GenericCursor::new(
                self.client.clone(),
                CursorSpecification {
                    info: self.info.clone(),
                    initial_buffer: std::mem::take(&mut self.initial_buffer),
                    post_batch_resume_token: self.post_batch_resume_token.clone(),
                },
                self.pinned_connection.replicate(),
                ExplicitSessionGetMoreProvider::new(session),
            ),
            session_cursor: self,
        }
    }

    /// Retrieve the next result from the cursor.
    /// The session provided must be the same session used to create the cursor.
    pub(crate) async fn next(&mut self, session: &mut ClientSession) -> Option<Result<T>> {
        use futures_util::StreamExt;

        let mut stream = self.stream(session);
        stream.next().await
    }
}

impl<T> Drop for SessionCursor<T>
where
    T: DeserializeOwned,
{
    fn drop(&mut self) {
        if self.exhausted {
            return;
        }
        let ns = self.info.ns.clone();
        let cursor_id = self.info.id;
        let pinned = self.pinned_connection.replicate();
        let drop_address = self.drop_address.clone();
        super::common::kill_cursor(
            self.client.clone(),
            &ns,
            cursor_id,
            pinned,
            drop_address,
            #[cfg(test)]
            None,
        );
    }
}

/// A stream combining a [`SessionCursor`] with a borrowed [`ClientSession`] so that its values
/// can be accessed via the [`CursorStream`]/`futures::Stream` interfaces.
pub struct SessionCursorStream<'cursor, 'session, T = crate::bson::Document>
where
    T: DeserializeOwned,
{
    generic_cursor: GenericCursor<ExplicitSessionGetMoreProvider<'session>, T>,
    session_cursor: &'cursor mut SessionCursor<T>,
}

impl<'cursor, 'session, T> SessionCursorStream<'cursor, 'session, T>
where
    T: DeserializeOwned,
{
    pub(crate) fn post_batch_resume_token(&self) -> Option<&ResumeToken> {
        self.generic_cursor.post_batch_resume_token()
    }

    pub(crate) fn client(&self) -> &Client {
        self.generic_cursor.client()
    }
}

impl<'cursor, 'session, T> CursorStream for SessionCursorStream<'cursor, 'session, T>
where
    T: DeserializeOwned,
{
    fn poll_next_in_batch(&mut self, cx: &mut Context<'_>) -> Poll<Result<BatchValue>> {
        self.generic_cursor.poll_next_in_batch(cx)
    }
}

impl<'cursor, 'session, T> futures_core::Stream for SessionCursorStream<'cursor, 'session, T>
where
    T: DeserializeOwned + Unpin,
{
    type Item = Result<T>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        super::common::stream_poll_next(&mut *self, cx)
    }
}

impl<'cursor, 'session, T> Drop for SessionCursorStream<'cursor, 'session, T>
where
    T: DeserializeOwned,
{
    fn drop(&mut self) {
        self.session_cursor.exhausted = self.generic_cursor.is_exhausted();
        self.session_cursor.initial_buffer = std::mem::take(self.generic_cursor.current_batch_mut());
        self.session_cursor.post_batch_resume_token =
            self.generic_cursor.post_batch_resume_token().cloned();
        self.session_cursor
            .pinned_connection
            .update_from(self.generic_cursor.pinned_connection());
    }
}

struct ExplicitSessionGetMoreResult<'session> {
    get_more_result: Result<GetMoreResult>,
    session: &'session mut ClientSession,
}

impl<'session> GetMoreProviderResult for ExplicitSessionGetMoreResult<'session> {
    type Session = &'session mut ClientSession;

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

enum ExplicitSessionGetMoreProvider<'session> {
    Executing(BoxFuture<'session, ExplicitSessionGetMoreResult<'session>>),
    Idle(&'session mut ClientSession),
}

impl<'session> ExplicitSessionGetMoreProvider<'session> {
    fn new(session: &'session mut ClientSession) -> Self {
        Self::Idle(session)
    }
}

impl<'session> GetMoreProvider for ExplicitSessionGetMoreProvider<'session> {
    type ResultType = ExplicitSessionGetMoreResult<'session>;
    type GetMoreFuture = BoxFuture<'session, ExplicitSessionGetMoreResult<'session>>;

    fn executing_future(&mut self) -> Option<&mut Self::GetMoreFuture> {
        match self {
            Self::Executing(ref mut future) => Some(future),
            Self::Idle(_) => None,
        }
    }

    fn clear_execution(&mut self, session: &'session mut ClientSession, _exhausted: bool) {
        *self = Self::Idle(session);
    }

    fn start_execution(
        &mut self,
        info: CursorInformation,
        client: Client,
        pinned_connection: Option<&PinnedConnectionHandle>,
    ) {
        let pinned_connection = pinned_connection.map(PinnedConnectionHandle::replicate);
        take_mut::take(self, |self_| match self_ {
            Self::Idle(session) => {
                let future = Box::pin(async move {
                    let get_more = GetMore::new(info, pinned_connection.as_ref());
                    let get_more_result = client
                        .execute_operation(get_more, Some(&mut *session))
                        .await;
                    ExplicitSessionGetMoreResult {
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
