use std::time::Duration;

use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::{client::options::ClientOptions, serde_util};

/// Options used to configure a connection pool. These are set via the same-named fields on
/// [`ClientOptions`].
#[derive(Clone, Debug, Default, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPoolOptions {
    /// The maximum number of connections that the pool may have at a given time, including
    /// connections which are currently checked out of the pool.
    #[builder(default)]
    #[serde(rename = "maxPoolSize")]
    pub max_pool_size: Option<u32>,

    /// The minimum number of connections that the pool will maintain.
    #[builder(default)]
    #[serde(rename = "minPoolSize")]
    pub min_pool_size: Option<u32>,

    /// The amount of time that a connection may remain idle in the pool before being closed.
    #[builder(default)]
    #[serde(
        rename = "maxIdleTimeMS",
        default,
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis"
    )]
    pub max_idle_time: Option<Duration>,

    /// The amount of time that an operation will wait for a connection to become available
    /// before returning an error.
    #[builder(default)]
    #[serde(
        rename = "waitQueueTimeoutMS",
        default,
        deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis"
    )]
    pub wait_queue_timeout: Option<Duration>,
}

impl ConnectionPoolOptions {
    pub(crate) fn from_client_options(options: &ClientOptions) -> Self {
        Self {
            max_pool_size: options.max_pool_size,
            min_pool_size: options.min_pool_size,
            max_idle_time: options.max_idle_time,
            wait_queue_timeout: options.wait_queue_timeout(),
        }
    }

    /// Returns the subset of these options that are surfaced on [`PoolCreatedEvent`](
    /// crate::event::cmap::PoolCreatedEvent)s.
    pub(crate) fn to_event_options(&self) -> Self {
        self.clone()
    }
}
