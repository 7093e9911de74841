use thiserror::Error as ThisError;

use crate::{
    handles::{Record as DiagnosticRecord, State},
    sys::{CDataType, SqlDataType},
};

#[derive(Debug, ThisError)]
/// Error type of every statement operation. Each variant maps to an SQLSTATE, see
/// [`Error::state`].
pub enum Error {
    /// An operation has been called out of the order required by the statement state machine. E.g.
    /// executing while data at execution is still pending.
    #[error("Function sequence error: {0}")]
    SequenceError(&'static str),
    /// The conversion between the C type of the application buffer and the SQL type is not
    /// supported.
    #[error("Conversion from {c_type:?} to {sql_type:?} is not supported.")]
    ConversionUnsupported {
        c_type: CDataType,
        sql_type: SqlDataType,
    },
    /// A value does not fit into its target type.
    #[error("Numeric value out of range: {0}")]
    ConversionRange(String),
    /// Raised only where truncation is not acceptable. Usually truncation is a warning.
    #[error("String data, right truncated. Complete length: {length}")]
    Truncation { length: usize },
    #[error("Invalid datetime format: {0}")]
    InvalidDatetimeFormat(String),
    #[error("Interval field overflow: {0}")]
    IntervalFieldOverflow(String),
    #[error("Invalid character value for cast specification: {0}")]
    InvalidCharacterValue(String),
    /// The cursor does not map to exactly one base table.
    #[error("Updatable Cursors with multiple tables are not supported")]
    NotUpdatable,
    /// SQL Error had been returned by the backend. The diagnostic record is passed on verbatim.
    #[error("Backend emitted an error calling '{function}':\n{record}")]
    Backend {
        /// Diagnostic record returned by the backend
        record: DiagnosticRecord,
        /// Backend call which produced the diagnostic record
        function: &'static str,
    },
    #[error("Memory allocation error")]
    OutOfMemory,
    /// Data at execution mixes `NULL` and data for the same parameter.
    #[error("Attempt to concatenate a null value")]
    ConcatenateNull,
    #[error("Invalid cursor state: {0}")]
    InvalidCursorState(&'static str),
    #[error("Invalid cursor position")]
    InvalidCursorPosition,
    #[error("Fetch type out of range")]
    FetchTypeOutOfRange,
    #[error("Invalid bookmark value")]
    InvalidBookmark,
    #[error("Row value out of range")]
    RowValueOutOfRange,
    #[error("Invalid cursor name: {0}")]
    InvalidCursorName(String),
    #[error("Syntax error or access violation: {0}")]
    SyntaxError(String),
    #[error("Invalid descriptor index {0}")]
    InvalidDescriptorIndex(u16),
    /// A parameter marker has no buffer bound to it.
    #[error("Parameter {0} is not bound")]
    UnboundParameter(u16),
    #[error("Indicator variable required but not supplied")]
    IndicatorRequired,
    #[error("Optional feature not implemented: {0}")]
    OptionalFeatureNotImplemented(&'static str),
    #[error("Invalid string or buffer length")]
    InvalidBufferLength,
    /// Access to an application buffer beyond its declared array size.
    #[error("Row {row} is out of bounds of a buffer bound for {array_size} rows.")]
    BufferOutOfBounds { row: usize, array_size: usize },
}

impl Error {
    /// SQLSTATE matching the error.
    pub fn state(&self) -> State {
        match self {
            Error::SequenceError(_) => State::FUNCTION_SEQUENCE_ERROR,
            Error::ConversionUnsupported { .. } => State::RESTRICTED_DATA_TYPE_ATTRIBUTE_VIOLATION,
            Error::ConversionRange(_) => State::NUMERIC_VALUE_OUT_OF_RANGE,
            Error::Truncation { .. } => State::STRING_DATA_RIGHT_TRUNCATION,
            Error::InvalidDatetimeFormat(_) => State::INVALID_DATETIME_FORMAT,
            Error::IntervalFieldOverflow(_) => State::INTERVAL_FIELD_OVERFLOW,
            Error::InvalidCharacterValue(_) => State::INVALID_CHARACTER_VALUE,
            Error::NotUpdatable => State::DRIVER_DOES_NOT_SUPPORT_FUNCTION,
            Error::Backend { record, .. } => record.state,
            Error::OutOfMemory => State::MEMORY_ALLOCATION_ERROR,
            Error::ConcatenateNull => State::ATTEMPT_TO_CONCATENATE_NULL,
            Error::InvalidCursorState(_) => State::INVALID_CURSOR_STATE,
            Error::InvalidCursorPosition => State::INVALID_CURSOR_POSITION,
            Error::FetchTypeOutOfRange => State::FETCH_TYPE_OUT_OF_RANGE,
            Error::InvalidBookmark => State::INVALID_BOOKMARK_VALUE,
            Error::RowValueOutOfRange => State::ROW_VALUE_OUT_OF_RANGE,
            Error::InvalidCursorName(_) => State::INVALID_CURSOR_NAME,
            Error::SyntaxError(_) => State::SYNTAX_ERROR,
            Error::InvalidDescriptorIndex(_) => State::INVALID_DESCRIPTOR_INDEX,
            Error::UnboundParameter(_) => State::COUNT_FIELD_INCORRECT,
            Error::IndicatorRequired => State::INDICATOR_VARIABLE_REQUIRED_BUT_NOT_SUPPLIED,
            Error::OptionalFeatureNotImplemented(_) => State::OPTIONAL_FEATURE_NOT_IMPLEMENTED,
            Error::InvalidBufferLength => State::INVALID_STRING_OR_BUFFER_LENGTH,
            Error::BufferOutOfBounds { .. } => State::GENERAL_ERROR,
        }
    }

    /// Diagnostic record describing the error, as it would be reported to an application.
    pub fn to_record(&self) -> DiagnosticRecord {
        match self {
            Error::Backend { record, .. } => record.clone(),
            other => DiagnosticRecord::new(other.state(), 0, other.to_string()),
        }
    }
}

/// Wraps diagnostic records returned by the backend into [`Error::Backend`].
pub(crate) trait ExtendResult<T> {
    fn backend_call(self, function: &'static str) -> Result<T, Error>;
}

impl<T> ExtendResult<T> for Result<T, DiagnosticRecord> {
    fn backend_call(self, function: &'static str) -> Result<T, Error> {
        self.map_err(|record| Error::Backend { record, function })
    }
}

#[cfg(test)]
mod tests {
    use crate::handles::{Record, State};

    use super::{Error, ExtendResult};

    #[test]
    fn backend_errors_keep_native_code_and_state() {
        let result: Result<(), Record> =
            Err(Record::new(State(*b"23000"), 1062, "Duplicate entry '1' for key 'PRIMARY'"));

        let error = result.backend_call("execute_one").unwrap_err();

        assert_eq!(State(*b"23000"), error.state());
        let record = error.to_record();
        assert_eq!(1062, record.native_error);
        assert_eq!("Duplicate entry '1' for key 'PRIMARY'", record.message);
    }

    #[test]
    fn driver_errors_carry_their_sqlstate() {
        let record = Error::SequenceError("data at execution pending").to_record();

        assert_eq!("HY010", record.state.as_str());
        assert_eq!(0, record.native_error);
    }
}
