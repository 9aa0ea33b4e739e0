//! Contains all of the types needed to specify options to MongoDB operations.
//!
//! Most of the options structs in this module use the
//! [`typed-builder`](https://crates.io/crates/typed-builder) crate to derive a type-safe builder
//! API on them. For example, to create an instance of
//! [`FindOptions`](struct.FindOptions.html) with only `limit` and `batch_size` set, the builder
//! API can be used as follows:
//!
//! ```rust
//! # use mongodb::options::FindOptions;
//! #
//! # let options = FindOptions::builder()
//! #                   .limit(20)
//! #                   .batch_size(5)
//! #                   .build();
//! ```

pub use crate::{
    client::{auth::*, options::*},
    coll::options::*,
    collation::*,
    concern::*,
    db::options::*,
    selection_criteria::*,
};

/// Updates an options struct with the read preference/read concern/write concern of a
/// client/database/collection.
macro_rules! resolve_options {
    ($obj:expr, $opts:expr, [$( $field:ident ),+] ) => {
        $(
            if let Some(option) = $obj.$field() {
                if !$opts
                    .as_ref()
                    .map(|opts| opts.$field.is_some())
                    .unwrap_or(false)
                {
                    $opts.get_or_insert_with(Default::default).$field = Some(option.clone());
                }
            }
        )+
    };
}

/// Resolves the write concern for an operation from the collection/database/client default,
/// erroring if an explicit write concern was supplied while `$session` has a transaction in
/// progress. A transaction's write concern is fixed when it is started and cannot be overridden
/// by an individual operation within it.
macro_rules! resolve_write_concern_with_session {
    ($obj:expr, $opts:expr, $session:expr) => {{
        let session: Option<_> = $session;
        match session {
            Some(session) if session.in_transaction() => {
                if $opts
                    .as_ref()
                    .map(|opts| opts.write_concern.is_some())
                    .unwrap_or(false)
                {
                    Err(crate::error::ErrorKind::InvalidArgument {
                        message: "write concern cannot be specified for an operation executing \
                                  within a transaction; specify it when starting the transaction \
                                  instead"
                            .to_string(),
                    }
                    .into())
                } else {
                    Ok(())
                }
            }
            _ => {
                resolve_options!($obj, $opts, [write_concern]);
                Ok(())
            }
        }
    }};
}

/// Resolves the read concern for an operation from the collection/database/client default,
/// erroring if an explicit read concern was supplied while `$session` has a transaction in
/// progress. A transaction's read concern is fixed when it is started and cannot be overridden
/// by an individual operation within it.
macro_rules! resolve_read_concern_with_session {
    ($obj:expr, $opts:expr, $session:expr) => {{
        let session: Option<_> = $session;
        match session {
            Some(session) if session.in_transaction() => {
                if $opts
                    .as_ref()
                    .map(|opts| opts.read_concern.is_some())
                    .unwrap_or(false)
                {
                    Err(crate::error::ErrorKind::InvalidArgument {
                        message: "read concern cannot be specified for an operation executing \
                                  within a transaction; specify it when starting the transaction \
                                  instead"
                            .to_string(),
                    }
                    .into())
                } else {
                    Ok(())
                }
            }
            _ => {
                resolve_options!($obj, $opts, [read_concern]);
                Ok(())
            }
        }
    }};
}

/// Resolves the selection criteria for an operation from the collection/database/client default,
/// erroring if explicit selection criteria was supplied while `$session` has a transaction in
/// progress. A transaction's selection criteria is fixed when it is started and cannot be
/// overridden by an individual operation within it.
macro_rules! resolve_selection_criteria_with_session {
    ($obj:expr, $opts:expr, $session:expr) => {{
        let session: Option<_> = $session;
        match session {
            Some(session) if session.in_transaction() => {
                if $opts
                    .as_ref()
                    .map(|opts| opts.selection_criteria.is_some())
                    .unwrap_or(false)
                {
                    Err(crate::error::ErrorKind::InvalidArgument {
                        message: "selection criteria cannot be specified for an operation \
                                  executing within a transaction; specify it when starting the \
                                  transaction instead"
                            .to_string(),
                    }
                    .into())
                } else {
                    Ok(())
                }
            }
            _ => {
                resolve_options!($obj, $opts, [selection_criteria]);
                Ok(())
            }
        }
    }};
}

/// Merges the options from src into dst.
#[cfg(test)]
macro_rules! merge_options {
    ($src:expr, $dst:expr, [$( $field:ident ),+] ) => {
        $(
            if let Some(option) = $src.$field {
                if !$dst.$field.is_some() {
                    $dst.$field = Some(option.clone());
                }
            }
        )+
    };
}
