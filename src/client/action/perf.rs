use crate::action::action_impl;

#[action_impl]
impl<'a> Action for crate::action::WarmConnectionPool<'a> {
    type Future = WarmConnectionPoolFuture;

    async fn execute(self) -> () {
        if !self
            .client
            .inner
            .options
            .min_pool_size
            .map_or(false, |s| s > 0)
        {
            return;
        }
        self.client.inner.topology.warm_pool().await;
    }
}
