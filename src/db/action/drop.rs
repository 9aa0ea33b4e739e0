use crate::{
    action::{action_impl, DropDatabase},
    error::Result,
    operation::drop_database as op,
};

#[action_impl]
impl<'a> Action for DropDatabase<'a> {
    type Future = DropDatabaseFuture;

    async fn execute(mut self) -> Result<()> {
        resolve_options!(self.db, self.options, [write_concern]);

        let drop = op::DropDatabase::new(self.db.name().to_string(), self.options);
        self.db
            .client()
            .execute_operation(drop, self.session.as_deref_mut())
            .await
    }
}
