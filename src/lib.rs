//! # Driver statement engine
//!
//! Execution, cursor positioning and data conversion of a database driver exposing the ODBC
//! statement model (bind parameters, execute, fetch, scroll, update in place) on top of a
//! request/response protocol client. The protocol client is plugged in as a [`handles::Backend`].
//!
//! All statements of a [`Connection`] share one wire. At most one of them may stream a result at
//! any time. Every other statement first makes the streaming statement cache the rest of its
//! result, before it talks to the server.

mod connection;
mod cursor;
mod dae;
mod descriptor;
mod error;
mod execute;
mod get_data;
mod options;
mod positioned;
mod query;
mod statement;

pub mod buffers;
pub mod conversion;
pub mod handles;
pub mod sys;

pub use self::{
    connection::{Connection, ConnectionGuard, CursorSnapshot, StatementId},
    cursor::FetchOrientation,
    dae::{ParamData, PutData},
    descriptor::{ParamBinding, ParamIo, ParamStatus, RowStatus},
    error::Error,
    options::{BindType, ConnectionOptions, CursorType, OdbcVersion, StatementOptions},
    positioned::{LockType, SetPosOperation},
    query::{Query, QueryType},
    statement::{Statement, StatementState},
};
// Reexports
pub use widestring::{U16Str, U16String};
