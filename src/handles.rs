//! Interfaces of the external collaborators and the plain data exchanged with them. Everything in
//! here is agnostic of statement state, descriptors and conversions.

mod backend;
mod column_metadata;
mod diagnostics;
mod logging;
mod sql_result;
mod text_codec;
mod value;

pub use self::{
    backend::{Backend, BackendStatement, Execution},
    column_metadata::{ColumnMetadata, Nullability},
    diagnostics::{Diagnostics, Record, State},
    logging::log_diagnostics,
    sql_result::{Aggregate, Outcome, RowCode},
    text_codec::{TextCodec, Utf8Codec},
    value::{Param, Value},
};
