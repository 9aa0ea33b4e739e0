mod acknowledged_message;
mod async_read_ext;
mod async_write_ext;
#[cfg(any(
    feature = "aws-auth",
    feature = "azure-kms",
    feature = "gcp-kms",
    feature = "azure-oidc",
    feature = "gcp-oidc"
))]
mod http;
mod join_handle;
#[cfg(feature = "cert-key-password")]
mod pem;
#[cfg(feature = "dns-resolver")]
mod resolver;
pub(crate) mod stream;
mod sync_read_ext;
#[cfg(feature = "openssl-tls")]
mod tls_openssl;
#[cfg(feature = "rustls-tls")]
#[cfg_attr(feature = "openssl-tls", allow(unused))]
mod tls_rustls;
mod worker_handle;

use std::{future::Future, net::SocketAddr, time::Duration};

#[cfg(feature = "dns-resolver")]
pub(crate) use self::resolver::AsyncResolver;
pub(crate) use self::{
    acknowledged_message::{AcknowledgedMessage, AcknowledgmentReceiver, AcknowledgmentSender},
    async_read_ext::AsyncLittleEndianRead,
    async_write_ext::AsyncLittleEndianWrite,
    join_handle::AsyncJoinHandle,
    stream::AsyncStream,
    sync_read_ext::SyncLittleEndianRead,
    worker_handle::{WorkerHandle, WorkerHandleListener},
};
use crate::{error::Result, options::ServerAddress};
#[cfg(any(
    feature = "aws-auth",
    feature = "azure-kms",
    feature = "gcp-kms",
    feature = "azure-oidc",
    feature = "gcp-oidc"
))]
pub(crate) use http::HttpClient;
#[cfg(feature = "openssl-tls")]
use tls_openssl as tls;
#[cfg(all(feature = "rustls-tls", not(feature = "openssl-tls")))]
use tls_rustls as tls;
#[cfg(not(any(feature = "rustls-tls", feature = "openssl-tls")))]
compile_error!("At least one of the features 'rustls-tls' or 'openssl-tls' must be enabled.");

pub(crate) use tls::TlsConfig;

/// Spawn a task in the background to run a future.
///
/// This must be called from an async block
/// or function running on a runtime.
#[track_caller]
pub(crate) fn spawn<F, O>(fut: F) -> AsyncJoinHandle<O>
where
    F: Future<Output = O> + Send + 'static,
    O: Send + 'static,
{
    AsyncJoinHandle::spawn(fut)
}

/// Await on a future for a maximum amount of time before returning an error.
pub(crate) async fn timeout<F: Future>(timeout: Duration, future: F) -> Result<F::Output> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| std::io::ErrorKind::TimedOut.into())
}

pub(crate) async fn resolve_address(
    address: &ServerAddress,
) -> Result<impl Iterator<Item = SocketAddr>> {
    let socket_addrs = tokio::net::lookup_host(format!("{address}")).await?;
    Ok(socket_addrs)
}

/// Block the current thread until the given future resolves. Used by the sync API's hand-written
/// `run` methods that can't go through the `#[action_impl(sync = ...)]` wrapper.
#[cfg(any(feature = "sync", feature = "tokio-sync"))]
pub(crate) fn block_on<F: Future>(fut: F) -> F::Output {
    crate::sync::TOKIO_RUNTIME.block_on(fut)
}

/// Spawn a task to run a future to completion, ignoring its result. Used for background tasks
/// (e.g. server monitors) that run for the lifetime of the topology and are never joined.
#[track_caller]
pub(crate) fn execute<F>(fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let _: AsyncJoinHandle<()> = spawn(fut);
}

/// Sleeps for the given duration.
pub(crate) async fn delay_for(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Zero-sized handle providing method-call syntax over this module's free functions, retained for
/// call sites written before those functions existed as standalone items.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RuntimeHandle;

pub(crate) static RUNTIME: RuntimeHandle = RuntimeHandle;

impl RuntimeHandle {
    #[track_caller]
    pub(crate) fn spawn<F, O>(&self, fut: F) -> AsyncJoinHandle<O>
    where
        F: Future<Output = O> + Send + 'static,
        O: Send + 'static,
    {
        spawn(fut)
    }

    pub(crate) async fn timeout<F: Future>(&self, timeout_duration: Duration, future: F) -> Result<F::Output> {
        timeout(timeout_duration, future).await
    }

    pub(crate) async fn delay_for(&self, duration: Duration) {
        delay_for(duration).await
    }

    pub(crate) async fn resolve_address(
        &self,
        address: &ServerAddress,
    ) -> Result<impl Iterator<Item = SocketAddr>> {
        resolve_address(address).await
    }
}
