use std::fmt;

/// A five character SQLSTATE. The first two characters indicate the class, the next three the
/// subclass. Class `01` marks warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct State(pub [u8; 5]);

impl State {
    /// Warning without further specification.
    pub const GENERAL_WARNING: State = State(*b"01000");
    /// String or binary data returned for a column resulted in the truncation of nonblank
    /// character or non-NULL binary data. If it was a string value, it was right-truncated.
    pub const STRING_DATA_RIGHT_TRUNCATION: State = State(*b"01004");
    /// A row of a parameter array or row set failed. Details are not available.
    pub const ERROR_IN_ROW: State = State(*b"01S01");
    /// Numeric or temporal data lost fractional digits in the conversion.
    pub const FRACTIONAL_TRUNCATION: State = State(*b"01S07");
    /// A parameter marker has not been bound.
    pub const COUNT_FIELD_INCORRECT: State = State(*b"07002");
    pub const RESTRICTED_DATA_TYPE_ATTRIBUTE_VIOLATION: State = State(*b"07006");
    pub const INVALID_DESCRIPTOR_INDEX: State = State(*b"07009");
    /// StrLen_or_IndPtr was a null pointer and NULL data was retrieved.
    pub const INDICATOR_VARIABLE_REQUIRED_BUT_NOT_SUPPLIED: State = State(*b"22002");
    pub const NUMERIC_VALUE_OUT_OF_RANGE: State = State(*b"22003");
    pub const INVALID_DATETIME_FORMAT: State = State(*b"22007");
    pub const INTERVAL_FIELD_OVERFLOW: State = State(*b"22015");
    pub const INVALID_CHARACTER_VALUE: State = State(*b"22018");
    pub const INVALID_CURSOR_STATE: State = State(*b"24000");
    pub const INVALID_CURSOR_NAME: State = State(*b"34000");
    pub const SYNTAX_ERROR: State = State(*b"42000");
    pub const GENERAL_ERROR: State = State(*b"HY000");
    pub const MEMORY_ALLOCATION_ERROR: State = State(*b"HY001");
    pub const ATTEMPT_TO_CONCATENATE_NULL: State = State(*b"HY020");
    pub const FUNCTION_SEQUENCE_ERROR: State = State(*b"HY010");
    pub const INVALID_STRING_OR_BUFFER_LENGTH: State = State(*b"HY090");
    pub const FETCH_TYPE_OUT_OF_RANGE: State = State(*b"HY106");
    pub const ROW_VALUE_OUT_OF_RANGE: State = State(*b"HY107");
    pub const INVALID_CURSOR_POSITION: State = State(*b"HY109");
    pub const INVALID_BOOKMARK_VALUE: State = State(*b"HY111");
    pub const OPTIONAL_FEATURE_NOT_IMPLEMENTED: State = State(*b"HYC00");
    /// Driver does not support this function for the current cursor.
    pub const DRIVER_DOES_NOT_SUPPORT_FUNCTION: State = State(*b"IM001");

    /// View status code as string slice for displaying. Codes which are not ASCII are shown as
    /// `?????`.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("?????")
    }

    /// `true` for class `01`.
    pub fn is_warning(&self) -> bool {
        self.0.starts_with(b"01")
    }
}

/// Diagnostic record, either raised by the backend or by the driver itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    /// SQLSTATE of the condition.
    pub state: State,
    /// Error code specific to the data source. `0` for conditions raised by the driver.
    pub native_error: i32,
    /// Human readable description.
    pub message: String,
}

impl Record {
    pub fn new(state: State, native_error: i32, message: impl Into<String>) -> Self {
        Record {
            state,
            native_error,
            message: message.into(),
        }
    }

    /// Warning raised by the driver itself.
    pub fn warning(state: State, message: impl Into<String>) -> Self {
        Self::new(state, 0, message)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "State: {}, Native error: {}, Message: {}",
            self.state.as_str(),
            self.native_error,
            self.message,
        )
    }
}

/// Report diagnostics from the last call to a statement.
pub trait Diagnostics {
    /// Diagnostic records are numbered from 1. `None` if `rec_number` is larger than the number of
    /// records available.
    fn diagnostic_record(&self, rec_number: usize) -> Option<&Record>;
}

impl Diagnostics for [Record] {
    fn diagnostic_record(&self, rec_number: usize) -> Option<&Record> {
        rec_number.checked_sub(1).and_then(|index| self.get(index))
    }
}
