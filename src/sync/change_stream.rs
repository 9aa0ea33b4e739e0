use futures_util::StreamExt;
use serde::de::DeserializeOwned;

use crate::{
    change_stream::{
        event::ResumeToken,
        session::SessionChangeStream as AsyncSessionChangeStream,
        ChangeStream as AsyncChangeStream,
    },
    error::Result,
};

use super::ClientSession;

/// A `ChangeStream` streams the ongoing changes of its associated collection, database, or
/// deployment. `ChangeStream` instances are created by calling
/// [`run`](crate::action::Watch::run) on the action returned from `watch`.
///
/// `ChangeStream`s are "resumable", meaning that they can be restarted at a given place in the
/// stream of events. This is done automatically when the `ChangeStream` encounters certain
/// resumable errors, such as transient network failures. It can also be done manually by passing
/// a [`ResumeToken`] retrieved from a past event into either the `resume_after` or `start_after`
/// (4.2+) options used to create the `ChangeStream`.
///
/// A `ChangeStream` can be iterated like any other [`Iterator`].
pub struct ChangeStream<T>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    async_stream: AsyncChangeStream<T>,
}

impl<T> ChangeStream<T>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    pub(crate) fn new(async_stream: AsyncChangeStream<T>) -> Self {
        Self { async_stream }
    }

    /// Returns the cached resume token that can be used to resume after the most recently
    /// returned change.
    pub fn resume_token(&self) -> Option<ResumeToken> {
        self.async_stream.resume_token()
    }

    /// Update the type streamed values will be parsed as.
    pub fn with_type<D: DeserializeOwned + Unpin + Send + Sync>(self) -> ChangeStream<D> {
        ChangeStream {
            async_stream: self.async_stream.with_type(),
        }
    }

    /// Returns whether the change stream will continue to receive events.
    pub fn is_alive(&self) -> bool {
        self.async_stream.is_alive()
    }

    /// Retrieves the next result from the change stream, if any.
    ///
    /// Where calling `Iterator::next` will internally loop until a change document is received,
    /// this will make at most one request and return `None` if the returned document batch is
    /// empty. This method should be used when storing the resume token in order to ensure the
    /// most up to date token is received.
    pub fn next_if_any(&mut self) -> Result<Option<T>> {
        super::TOKIO_RUNTIME.block_on(self.async_stream.next_if_any())
    }
}

impl<T> Iterator for ChangeStream<T>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        super::TOKIO_RUNTIME.block_on(self.async_stream.next())
    }
}

/// A [`SessionChangeStream`] is a change stream that was created with a [`ClientSession`] and
/// must be iterated using one via [`SessionChangeStream::next`].
pub struct SessionChangeStream<T>
where
    T: DeserializeOwned + Unpin,
{
    async_stream: AsyncSessionChangeStream<T>,
}

impl<T> SessionChangeStream<T>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    pub(crate) fn new(async_stream: AsyncSessionChangeStream<T>) -> Self {
        Self { async_stream }
    }

    /// Returns the cached resume token that can be used to resume after the most recently
    /// returned change.
    pub fn resume_token(&self) -> Option<ResumeToken> {
        self.async_stream.resume_token()
    }

    /// Update the type streamed values will be parsed as.
    pub fn with_type<D: DeserializeOwned + Unpin + Send + Sync>(self) -> SessionChangeStream<D> {
        SessionChangeStream {
            async_stream: self.async_stream.with_type(),
        }
    }

    /// Retrieve the next result from the change stream. The session provided must be the same
    /// session used to create the change stream.
    pub fn next(&mut self, session: &mut ClientSession) -> Result<Option<T>> {
        super::TOKIO_RUNTIME.block_on(
            self.async_stream
                .next(&mut session.async_client_session),
        )
    }

    /// Returns whether the change stream will continue to receive events.
    pub fn is_alive(&self) -> bool {
        self.async_stream.is_alive()
    }

    /// Retrieve the next result from the change stream, if any.
    ///
    /// Where calling `next` will internally loop until a change document is received, this will
    /// make at most one request and return `None` if the returned document batch is empty. This
    /// method should be used when storing the resume token in order to ensure the most up to date
    /// token is received.
    pub fn next_if_any(&mut self, session: &mut ClientSession) -> Result<Option<T>> {
        super::TOKIO_RUNTIME.block_on(
            self.async_stream
                .next_if_any(&mut session.async_client_session),
        )
    }
}
