use bson::doc;

use crate::{
    cmap::{Command, RawCommandResponse, StreamDescription},
    db::options::DropDatabaseOptions,
    error::Result,
    operation::{append_options, remove_empty_write_concern, OperationWithDefaults, WriteConcernOnlyBody},
};

#[derive(Debug)]
pub(crate) struct DropDatabase {
    target_db: String,
    options: Option<DropDatabaseOptions>,
}

impl DropDatabase {
    #[allow(dead_code)]
    fn empty() -> Self {
        Self {
            target_db: "".to_string(),
            options: None,
        }
    }

    pub(crate) fn new(target_db: String, options: Option<DropDatabaseOptions>) -> Self {
        Self { target_db, options }
    }
}

impl OperationWithDefaults for DropDatabase {
    type O = ();
    type Command = bson::Document;

    const NAME: &'static str = "dropDatabase";

    fn build(&mut self, _description: &StreamDescription) -> Result<Command> {
        let mut body = doc! {
            Self::NAME: 1,
        };

        remove_empty_write_concern!(self.options);
        append_options(&mut body, self.options.as_ref())?;

        Ok(Command::new(
            Self::NAME.to_string(),
            self.target_db.clone(),
            body,
        ))
    }

    fn handle_response(
        &self,
        response: RawCommandResponse,
        _description: &StreamDescription,
    ) -> Result<Self::O> {
        let response: WriteConcernOnlyBody = response.body()?;
        response.validate()
    }

    fn write_concern(&self) -> Option<&crate::options::WriteConcern> {
        self.options.as_ref().and_then(|opts| opts.write_concern.as_ref())
    }
}

#[cfg(test)]
mod test {
    use bson::doc;

    use crate::{
        cmap::StreamDescription,
        concern::{Acknowledgment, WriteConcern},
        operation::{test::handle_response_test, DropDatabase, OperationWithDefaults},
    };

    #[test]
    fn build() {
        let mut op = DropDatabase::new(
            "test_db".to_string(),
            Some(
                crate::db::options::DropDatabaseOptions::builder()
                    .write_concern(WriteConcern {
                        w: Some(Acknowledgment::Tag("abc".to_string())),
                        ..Default::default()
                    })
                    .build(),
            ),
        );

        let description = StreamDescription::new_testing();
        let cmd = op.build(&description).unwrap();

        assert_eq!(cmd.name.as_str(), "dropDatabase");
        assert_eq!(cmd.target_db.as_str(), "test_db");
        assert_eq!(
            cmd.body,
            doc! {
                "dropDatabase": 1,
                "writeConcern": { "w": "abc" }
            }
        );
    }

    #[test]
    fn handle_success() {
        let op = DropDatabase::empty();

        let ok_response = doc! { "ok": 1.0 };
        assert!(handle_response_test(&op, ok_response).is_ok());
        let ok_extra = doc! { "ok": 1.0, "hello": "world" };
        assert!(handle_response_test(&op, ok_extra).is_ok());
    }
}
