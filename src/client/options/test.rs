use crate::{
    client::options::{ClientOptions, ServerAddress},
    selection_criteria::{ReadPreference, SelectionCriteria},
};

// Literal seed scenario from the connection-string grammar invariants: a standard URI with two
// hosts, a replica set name, a read preference, and retryWrites should parse into exactly the
// structured values the URI names.
#[tokio::test]
async fn parse_standard_uri() {
    let options = ClientOptions::parse(
        "mongodb://u:p@h1:27017,h2:27018/admin?replicaSet=rs0&readPreference=secondary&\
         retryWrites=true",
    )
    .await
    .unwrap();

    assert_eq!(
        options.hosts,
        vec![
            ServerAddress::Tcp {
                host: "h1".to_string(),
                port: Some(27017),
            },
            ServerAddress::Tcp {
                host: "h2".to_string(),
                port: Some(27018),
            },
        ]
    );

    let credential = options.credential.as_ref().unwrap();
    assert_eq!(credential.username.as_deref(), Some("u"));
    assert_eq!(credential.password.as_deref(), Some("p"));
    assert_eq!(credential.source.as_deref(), Some("admin"));
    assert!(credential.mechanism.is_none());

    assert_eq!(options.repl_set_name.as_deref(), Some("rs0"));
    assert_eq!(options.retry_writes, Some(true));
    assert!(matches!(
        options.selection_criteria,
        Some(SelectionCriteria::ReadPreference(ReadPreference::Secondary { .. }))
    ));
}

// An option appearing more than once elsewhere in the query string (order aside) must not change
// the parsed result; this is the "option order within the query string is unspecified" carve-out
// from the round-trip invariant.
#[tokio::test]
async fn parse_is_insensitive_to_query_option_order() {
    let forward = ClientOptions::parse("mongodb://h1/?replicaSet=rs0&retryWrites=true")
        .await
        .unwrap();
    let reversed = ClientOptions::parse("mongodb://h1/?retryWrites=true&replicaSet=rs0")
        .await
        .unwrap();

    assert_eq!(forward.repl_set_name, reversed.repl_set_name);
    assert_eq!(forward.retry_writes, reversed.retry_writes);
}
