//! Type codes, sentinel values and C layout structures shared between applications and the
//! driver. Applications use these to describe their buffers, the driver uses them to interpret
//! what it finds in there.

/// Indicator value: the field is `NULL`.
pub const NULL_DATA: isize = -1;
/// Indicator value: the parameter is sent at execution time using `put_data`.
pub const DATA_AT_EXEC: isize = -2;
/// Indicator value: the value is terminated by a zero.
pub const NTS: isize = -3;
/// Indicator value: the total length of the value is not known.
pub const NO_TOTAL: isize = -4;
/// Indicator value: use the default value of the parameter or column.
pub const DEFAULT_PARAM: isize = -5;
/// Indicator value: ignore this column for bulk and positioned operations.
pub const COLUMN_IGNORE: isize = -6;
/// Indicator values at or below this offset mark data at execution with a length hint.
pub const LEN_DATA_AT_EXEC_OFFSET: isize = -100;

/// Indicator value marking data at execution with a length hint of `length` bytes.
pub fn len_data_at_exec(length: usize) -> isize {
    LEN_DATA_AT_EXEC_OFFSET - length as isize
}

/// Type of an application buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CDataType {
    /// Pick the C type matching the SQL type of the column or parameter.
    Default,
    /// Narrow text in the connection encoding, zero terminated on output.
    Char,
    /// UTF-16 text, zero terminated on output.
    WChar,
    Binary,
    /// A single byte holding `0` or `1`.
    Bit,
    STinyInt,
    UTinyInt,
    SShort,
    UShort,
    SLong,
    ULong,
    SBigInt,
    UBigInt,
    Float,
    Double,
    /// See [`Numeric`].
    Numeric,
    /// See [`Date`].
    Date,
    /// See [`Time`].
    Time,
    /// See [`Timestamp`].
    Timestamp,
    /// See [`Interval`]. Seconds are not part of this type.
    IntervalHourToMinute,
    /// See [`Interval`].
    IntervalHourToSecond,
    /// Absolute row position of a fetched row, stored as `u64`.
    Bookmark,
}

impl CDataType {
    /// Size of one element in bytes, `None` for variable sized types.
    pub fn fixed_size(self) -> Option<usize> {
        let size = match self {
            CDataType::Default | CDataType::Char | CDataType::WChar | CDataType::Binary => {
                return None;
            }
            CDataType::Bit | CDataType::STinyInt | CDataType::UTinyInt => 1,
            CDataType::SShort | CDataType::UShort => 2,
            CDataType::SLong | CDataType::ULong | CDataType::Float => 4,
            CDataType::SBigInt | CDataType::UBigInt | CDataType::Double | CDataType::Bookmark => 8,
            CDataType::Numeric => Numeric::SIZE,
            CDataType::Date => Date::SIZE,
            CDataType::Time => Time::SIZE,
            CDataType::Timestamp => Timestamp::SIZE,
            CDataType::IntervalHourToMinute | CDataType::IntervalHourToSecond => Interval::SIZE,
        };
        Some(size)
    }

    /// `true` for the signed and unsigned integer types.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            CDataType::STinyInt
                | CDataType::UTinyInt
                | CDataType::SShort
                | CDataType::UShort
                | CDataType::SLong
                | CDataType::ULong
                | CDataType::SBigInt
                | CDataType::UBigInt
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            CDataType::STinyInt | CDataType::SShort | CDataType::SLong | CDataType::SBigInt
        )
    }

    /// Resolves [`CDataType::Default`] to the type an application gets for a column of type
    /// `sql_type`. Any other type is returned unchanged.
    pub fn resolve(self, sql_type: SqlDataType, unsigned: bool) -> CDataType {
        if self != CDataType::Default {
            return self;
        }
        match sql_type {
            SqlDataType::WChar | SqlDataType::WVarchar | SqlDataType::WLongVarchar => {
                CDataType::WChar
            }
            SqlDataType::Binary | SqlDataType::Varbinary | SqlDataType::LongVarbinary => {
                CDataType::Binary
            }
            SqlDataType::Bit => CDataType::Bit,
            SqlDataType::TinyInt if unsigned => CDataType::UTinyInt,
            SqlDataType::TinyInt => CDataType::STinyInt,
            SqlDataType::SmallInt if unsigned => CDataType::UShort,
            SqlDataType::SmallInt => CDataType::SShort,
            SqlDataType::Integer if unsigned => CDataType::ULong,
            SqlDataType::Integer => CDataType::SLong,
            SqlDataType::BigInt if unsigned => CDataType::UBigInt,
            SqlDataType::BigInt => CDataType::SBigInt,
            SqlDataType::Real => CDataType::Float,
            SqlDataType::Float | SqlDataType::Double => CDataType::Double,
            SqlDataType::Date => CDataType::Date,
            SqlDataType::Time => CDataType::Time,
            SqlDataType::Timestamp => CDataType::Timestamp,
            SqlDataType::IntervalHourToMinute => CDataType::IntervalHourToMinute,
            SqlDataType::IntervalHourToSecond => CDataType::IntervalHourToSecond,
            SqlDataType::Unknown
            | SqlDataType::Char
            | SqlDataType::Varchar
            | SqlDataType::LongVarchar
            | SqlDataType::Decimal
            | SqlDataType::Numeric => CDataType::Char,
        }
    }
}

/// Type of a column or parameter as the data source sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SqlDataType {
    #[default]
    Unknown,
    Char,
    Varchar,
    LongVarchar,
    WChar,
    WVarchar,
    WLongVarchar,
    Binary,
    Varbinary,
    LongVarbinary,
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Float,
    Double,
    Decimal,
    Numeric,
    Date,
    Time,
    Timestamp,
    IntervalHourToMinute,
    IntervalHourToSecond,
}

impl SqlDataType {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            SqlDataType::TinyInt | SqlDataType::SmallInt | SqlDataType::Integer | SqlDataType::BigInt
        )
    }

    /// Types whose values the server delivers as raw big endian bytes.
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            SqlDataType::Binary
                | SqlDataType::Varbinary
                | SqlDataType::LongVarbinary
                | SqlDataType::Bit
        )
    }

    pub fn is_character(self) -> bool {
        matches!(
            self,
            SqlDataType::Char
                | SqlDataType::Varchar
                | SqlDataType::LongVarchar
                | SqlDataType::WChar
                | SqlDataType::WVarchar
                | SqlDataType::WLongVarchar
        )
    }

    /// Octet length of integer types, `None` for anything else.
    pub fn integer_octet_length(self) -> Option<usize> {
        match self {
            SqlDataType::TinyInt => Some(1),
            SqlDataType::SmallInt => Some(2),
            SqlDataType::Integer => Some(4),
            SqlDataType::BigInt => Some(8),
            _ => None,
        }
    }
}

/// `SQL_DATE_STRUCT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Date {
    pub year: i16,
    pub month: u16,
    pub day: u16,
}

impl Date {
    pub const SIZE: usize = 6;
}

/// `SQL_TIME_STRUCT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Time {
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
}

impl Time {
    pub const SIZE: usize = 6;
}

/// `SQL_TIMESTAMP_STRUCT`. `fraction` is given in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub year: i16,
    pub month: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
    pub fraction: u32,
}

impl Timestamp {
    pub const SIZE: usize = 16;
}

/// `SQL_NUMERIC_STRUCT`. The value is `val` (little endian, unsigned) divided by ten to the power
/// of `scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Numeric {
    pub precision: u8,
    pub scale: i8,
    /// `1` for positive, `0` for negative values.
    pub sign: u8,
    pub val: [u8; 16],
}

impl Numeric {
    pub const SIZE: usize = 19;
}

impl Default for Numeric {
    fn default() -> Self {
        Numeric {
            precision: 38,
            scale: 0,
            sign: 1,
            val: [0; 16],
        }
    }
}

/// Day-time interval as used by the hour to minute and hour to second C types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interval {
    pub negative: bool,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub fraction: u32,
}

impl Interval {
    pub const SIZE: usize = 20;
}
