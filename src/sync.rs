//! A blocking API for this crate, supported via an internal Tokio runtime. See each individual
//! type for more details; changes in behavior between the asynchronous and synchronous APIs are
//! noted there.
//!
//! The sync-specific types re-exported here are thin wrappers around their async counterparts; the
//! majority of their methods are defined alongside the async ones in `src/action` so the two APIs
//! stay in lockstep.

mod change_stream;
mod client;
mod coll;
mod cursor;
mod db;

pub use self::{
    change_stream::{ChangeStream, SessionChangeStream},
    client::{session::ClientSession, Client},
    coll::Collection,
    cursor::{Cursor, SessionCursor},
    db::Database,
};

#[cfg(feature = "sync")]
pub(crate) static TOKIO_RUNTIME: once_cell::sync::Lazy<tokio::runtime::Runtime> =
    once_cell::sync::Lazy::new(|| match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => panic!(
            "Error occurred when starting the underlying async runtime: {}",
            err
        ),
    });
