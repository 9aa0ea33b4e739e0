use std::{
    collections::VecDeque,
    marker::PhantomData,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use derivative::Derivative;
#[cfg(test)]
use tokio::sync::oneshot;

use crate::{
    bson::{Bson, Document, RawDocumentBuf},
    change_stream::event::ResumeToken,
    client::options::ServerAddress,
    cmap::conn::PinnedConnectionHandle,
    error::Result,
    operation::CursorInfo,
    results::GetMoreResult,
    Client,
    Namespace,
};

/// Static information about a cursor, used to drive subsequent `getMore` commands.
#[derive(Clone, Debug)]
pub(crate) struct CursorInformation {
    pub(crate) ns: Namespace,
    pub(crate) address: ServerAddress,
    pub(crate) id: i64,
    pub(crate) batch_size: Option<u32>,
    pub(crate) max_time: Option<Duration>,
    pub(crate) comment: Option<Bson>,
}

/// The specification returned by the command that created a cursor, used to construct the
/// `Cursor`/`SessionCursor` that will iterate over its results.
#[derive(Debug, Clone)]
pub(crate) struct CursorSpecification {
    pub(crate) info: CursorInformation,
    pub(crate) initial_buffer: VecDeque<RawDocumentBuf>,
    pub(crate) post_batch_resume_token: Option<ResumeToken>,
}

impl CursorSpecification {
    pub(crate) fn new(
        info: CursorInfo,
        address: ServerAddress,
        batch_size: impl Into<Option<u32>>,
        max_time: impl Into<Option<Duration>>,
        comment: impl Into<Option<Bson>>,
    ) -> Self {
        Self {
            info: CursorInformation {
                ns: info.ns,
                address,
                id: info.id,
                batch_size: batch_size.into(),
                max_time: max_time.into(),
                comment: comment.into(),
            },
            initial_buffer: info.first_batch,
            post_batch_resume_token: ResumeToken::from_raw(info.post_batch_resume_token),
        }
    }

    pub(crate) fn id(&self) -> i64 {
        self.info.id
    }

    #[cfg(test)]
    pub(crate) fn address(&self) -> &ServerAddress {
        &self.info.address
    }

    #[cfg(test)]
    pub(crate) fn batch_size(&self) -> Option<u32> {
        self.info.batch_size
    }
}

/// The outcome of asking a cursor-like stream for the next value in its current batch.
#[derive(Debug)]
pub(crate) enum BatchValue {
    /// A document was available in the current batch.
    Some { doc: RawDocumentBuf, is_last: bool },
    /// The current batch has been exhausted but the cursor is still alive.
    Empty,
    /// The cursor has no more results and will not be queried again.
    Exhausted,
}

/// A stream of raw documents driven one batch at a time. `Cursor` and the combination of
/// `SessionCursor` + a borrowed `ClientSession` both implement this so that `NextInBatchFuture`
/// and [`stream_poll_next`] can drive either uniformly.
pub(crate) trait CursorStream {
    fn poll_next_in_batch(&mut self, cx: &mut Context<'_>) -> Poll<Result<BatchValue>>;
}

/// A future that resolves to the next [`BatchValue`] produced by a [`CursorStream`], making at
/// most one `getMore` request.
pub(crate) struct NextInBatchFuture<'a, S: ?Sized> {
    stream: &'a mut S,
}

impl<'a, S: CursorStream + ?Sized> NextInBatchFuture<'a, S> {
    pub(crate) fn new(stream: &'a mut S) -> Self {
        Self { stream }
    }
}

impl<'a, S: CursorStream + Unpin + ?Sized> std::future::Future for NextInBatchFuture<'a, S> {
    type Output = Result<BatchValue>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.stream.poll_next_in_batch(cx)
    }
}

/// Drives a [`CursorStream`] as a `futures::Stream` of deserialized values, making as many
/// `getMore` requests as needed until a document is available or the cursor is exhausted.
pub(crate) fn stream_poll_next<S, T>(
    stream: &mut S,
    cx: &mut Context<'_>,
) -> Poll<Option<Result<T>>>
where
    S: CursorStream + Unpin,
    T: serde::de::DeserializeOwned,
{
    loop {
        match stream.poll_next_in_batch(cx) {
            Poll::Ready(Ok(BatchValue::Some { doc, .. })) => {
                return Poll::Ready(Some(
                    crate::bson::from_slice(doc.as_bytes()).map_err(Into::into),
                ));
            }
            Poll::Ready(Ok(BatchValue::Empty)) => continue,
            Poll::Ready(Ok(BatchValue::Exhausted)) => return Poll::Ready(None),
            Poll::Ready(Err(e)) => return Poll::Ready(Some(Err(e))),
            Poll::Pending => return Poll::Pending,
        }
    }
}

/// An internal cursor that buffers a batch of raw documents and fetches the next one via a
/// `GetMoreProvider` once the buffer is drained.
#[derive(Derivative)]
#[derivative(Debug)]
pub(super) struct GenericCursor<P, T>
where
    P: GetMoreProvider,
{
    #[derivative(Debug = "ignore")]
    provider: P,
    client: Client,
    info: CursorInformation,
    buffer: VecDeque<RawDocumentBuf>,
    exhausted: bool,
    pinned_connection: PinnedConnection,
    resume_token: Option<ResumeToken>,
    _phantom: PhantomData<T>,
}

impl<P, T> GenericCursor<P, T>
where
    P: GetMoreProvider,
{
    pub(super) fn new(
        client: Client,
        spec: CursorSpecification,
        pinned_connection: PinnedConnection,
        get_more_provider: P,
    ) -> Self {
        let exhausted = spec.id() == 0;
        Self {
            exhausted,
            client,
            provider: get_more_provider,
            buffer: spec.initial_buffer,
            resume_token: spec.post_batch_resume_token,
            info: spec.info,
            pinned_connection,
            _phantom: PhantomData,
        }
    }

    pub(super) fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub(super) fn id(&self) -> i64 {
        self.info.id
    }

    pub(super) fn namespace(&self) -> &Namespace {
        &self.info.ns
    }

    pub(super) fn address(&self) -> &ServerAddress {
        &self.info.address
    }

    pub(super) fn client(&self) -> &Client {
        &self.client
    }

    pub(super) fn pinned_connection(&self) -> &PinnedConnection {
        &self.pinned_connection
    }

    pub(super) fn set_pinned_connection(&mut self, pinned: PinnedConnection) {
        self.pinned_connection = pinned;
    }

    pub(super) fn post_batch_resume_token(&self) -> Option<&ResumeToken> {
        self.resume_token.as_ref()
    }

    pub(super) fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    #[cfg(test)]
    pub(super) fn current_batch(&self) -> &VecDeque<RawDocumentBuf> {
        &self.buffer
    }

    pub(super) fn current_batch_mut(&mut self) -> &mut VecDeque<RawDocumentBuf> {
        &mut self.buffer
    }

    fn start_get_more(&mut self) {
        let info = self.info.clone();
        let client = self.client.clone();
        self.provider
            .start_execution(info, client, self.pinned_connection.handle());
    }

    pub(super) fn with_type<D>(self) -> GenericCursor<P, D> {
        GenericCursor {
            exhausted: self.exhausted,
            client: self.client,
            provider: self.provider,
            buffer: self.buffer,
            info: self.info,
            pinned_connection: self.pinned_connection,
            resume_token: self.resume_token,
            _phantom: PhantomData,
        }
    }
}

impl<P, T> CursorStream for GenericCursor<P, T>
where
    P: GetMoreProvider,
{
    fn poll_next_in_batch(&mut self, cx: &mut Context<'_>) -> Poll<Result<BatchValue>> {
        loop {
            if let Some(future) = self.provider.executing_future() {
                match Pin::new(future).poll(cx) {
                    Poll::Ready(get_more_result) => {
                        let exhausted = get_more_result.exhausted();
                        if exhausted {
                            self.pinned_connection = PinnedConnection::Unpinned;
                        }
                        let (result, session) = get_more_result.into_parts();
                        if let Err(e) = &result {
                            if e.is_network_error() {
                                self.pinned_connection.invalidate();
                            }
                        }
                        self.exhausted = exhausted;
                        self.provider.clear_execution(session, exhausted);
                        let result = result?;
                        if let Some(token) = result.post_batch_resume_token {
                            self.resume_token = Some(token);
                        }
                        self.buffer = result.batch;
                    }
                    Poll::Pending => return Poll::Pending,
                }
            }

            return match self.buffer.pop_front() {
                Some(doc) => {
                    let is_last = self.buffer.is_empty();
                    Poll::Ready(Ok(BatchValue::Some { doc, is_last }))
                }
                None if self.exhausted => Poll::Ready(Ok(BatchValue::Exhausted)),
                None if self.pinned_connection.is_invalid() => Poll::Ready(Ok(BatchValue::Exhausted)),
                None => {
                    self.start_get_more();
                    Poll::Ready(Ok(BatchValue::Empty))
                }
            };
        }
    }
}

/// A trait implemented by objects that can provide batches of documents to a cursor via the
/// `getMore` command.
pub(super) trait GetMoreProvider: Unpin {
    type ResultType: GetMoreProviderResult;
    type GetMoreFuture: std::future::Future<Output = Self::ResultType> + Unpin;

    fn executing_future(&mut self) -> Option<&mut Self::GetMoreFuture>;

    fn clear_execution(
        &mut self,
        session: <Self::ResultType as GetMoreProviderResult>::Session,
        exhausted: bool,
    );

    fn start_execution(
        &mut self,
        info: CursorInformation,
        client: Client,
        pinned_connection: Option<&PinnedConnectionHandle>,
    );
}

/// Trait describing results returned from a `GetMoreProvider`.
pub(crate) trait GetMoreProviderResult {
    type Session;

    fn into_parts(self) -> (Result<GetMoreResult>, Self::Session);

    fn exhausted(&self) -> bool;
}

/// Tracks whether a cursor has a connection pinned to it, and whether that connection has been
/// flagged as unusable due to a network error (in which case no `killCursors` should be sent).
#[derive(Debug)]
pub(super) enum PinnedConnection {
    Valid(PinnedConnectionHandle),
    Invalid(PinnedConnectionHandle),
    Unpinned,
}

impl PinnedConnection {
    pub(super) fn new(handle: Option<PinnedConnectionHandle>) -> Self {
        match handle {
            Some(h) => Self::Valid(h),
            None => Self::Unpinned,
        }
    }

    /// Make a new `PinnedConnection` that refers to the same connection as this one. Use with
    /// care and only when "lending" a handle in a way that can't be expressed as a normal borrow.
    pub(super) fn replicate(&self) -> Self {
        match self {
            Self::Valid(h) => Self::Valid(h.replicate()),
            Self::Invalid(h) => Self::Invalid(h.replicate()),
            Self::Unpinned => Self::Unpinned,
        }
    }

    fn handle(&self) -> Option<&PinnedConnectionHandle> {
        match self {
            Self::Valid(h) | Self::Invalid(h) => Some(h),
            Self::Unpinned => None,
        }
    }

    fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }

    /// Adopt the valid/invalid state observed on another `PinnedConnection` referring to the
    /// same underlying connection (used to propagate invalidation discovered while driving a
    /// temporary [`GenericCursor`] back to the long-lived cursor that owns the pin).
    pub(super) fn update_from(&mut self, other: &Self) {
        match (self as &Self, other) {
            (Self::Valid(_), Self::Invalid(h)) => *self = Self::Invalid(h.replicate()),
            (Self::Invalid(_), Self::Unpinned) | (Self::Valid(_), Self::Unpinned) => {
                *self = Self::Unpinned
            }
            _ => {}
        }
    }

    fn invalidate(&mut self) {
        let invalid = match self {
            Self::Valid(h) => Some(h.replicate()),
            _ => None,
        };
        if let Some(h) = invalid {
            *self = Self::Invalid(h);
        }
    }
}

pub(super) fn kill_cursor(
    client: Client,
    ns: &Namespace,
    cursor_id: i64,
    pinned_conn: PinnedConnection,
    drop_address: Option<ServerAddress>,
    #[cfg(test)] kill_watcher: Option<oneshot::Sender<()>>,
) {
    if pinned_conn.is_invalid() {
        return;
    }
    let coll = client
        .database(ns.db.as_str())
        .collection::<Document>(ns.coll.as_str());
    let handle = pinned_conn.handle().map(PinnedConnectionHandle::replicate);
    crate::runtime::execute(async move {
        let _ = coll
            .kill_cursor(cursor_id, handle.as_ref(), drop_address)
            .await;
        #[cfg(test)]
        if let Some(tx) = kill_watcher {
            let _ = tx.send(());
        }
    });
}
