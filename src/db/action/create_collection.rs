use crate::{
    action::{action_impl, CreateCollection},
    error::Result,
    operation::create as op,
    Namespace,
};

#[action_impl]
impl<'a> Action for CreateCollection<'a> {
    type Future = CreateCollectionFuture;

    async fn execute(mut self) -> Result<()> {
        resolve_options!(self.db, self.options, [write_concern]);

        let ns = Namespace {
            db: self.db.name().to_string(),
            coll: self.name,
        };

        let create = op::Create::new(ns, self.options);
        self.db
            .client()
            .execute_operation(create, self.session.as_deref_mut())
            .await
    }
}
