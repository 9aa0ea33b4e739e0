use crate::{
    action::{action_impl, DropCollection},
    error::Result,
    operation::drop_collection as op,
};

#[action_impl]
impl<'a, T> Action for DropCollection<'a, T> {
    type Future = DropCollectionFuture;

    async fn execute(mut self) -> Result<()> {
        resolve_options!(self.coll, self.options, [write_concern]);

        let drop = op::DropCollection::new(self.coll.namespace(), self.options);
        self.coll.client()
            .execute_operation(drop, self.session.as_deref_mut())
            .await
    }
}
