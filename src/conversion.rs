//! Value conversion between application buffers and server values, in both directions.
//!
//! Conversions are looked up in dispatch tables keyed by the class of the application C type and
//! the class of the SQL type. A pair missing from the table is not supported.

mod fetch;
mod numeric;
mod param;
mod temporal;

pub use self::numeric::{numeric_to_text, parse_decimal, parse_integer, text_to_numeric};

pub(crate) use self::{
    fetch::{FetchContext, FetchConversion, Written, copy_chunk, fetch_conversion},
    param::{ParamTarget, convert_param, decode_param, param_conversion},
    temporal::{NormalizedTime, parse_temporal},
};

use crate::sys::{CDataType, SqlDataType};

/// Groups C types which share a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CClass {
    Text,
    WideText,
    Binary,
    Bit,
    Integer,
    Float,
    Numeric,
    Date,
    Time,
    Timestamp,
    Interval,
    Bookmark,
}

impl CClass {
    /// `None` for [`CDataType::Default`], which must be resolved first.
    pub fn of(c_type: CDataType) -> Option<CClass> {
        let class = match c_type {
            CDataType::Default => return None,
            CDataType::Char => CClass::Text,
            CDataType::WChar => CClass::WideText,
            CDataType::Binary => CClass::Binary,
            CDataType::Bit => CClass::Bit,
            CDataType::STinyInt
            | CDataType::UTinyInt
            | CDataType::SShort
            | CDataType::UShort
            | CDataType::SLong
            | CDataType::ULong
            | CDataType::SBigInt
            | CDataType::UBigInt => CClass::Integer,
            CDataType::Float | CDataType::Double => CClass::Float,
            CDataType::Numeric => CClass::Numeric,
            CDataType::Date => CClass::Date,
            CDataType::Time => CClass::Time,
            CDataType::Timestamp => CClass::Timestamp,
            CDataType::IntervalHourToMinute | CDataType::IntervalHourToSecond => CClass::Interval,
            CDataType::Bookmark => CClass::Bookmark,
        };
        Some(class)
    }
}

/// Groups SQL types which share a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SqlClass {
    Text,
    Binary,
    Bit,
    Integer,
    Float,
    Decimal,
    Date,
    Time,
    Timestamp,
    Interval,
}

impl SqlClass {
    pub fn of(sql_type: SqlDataType) -> SqlClass {
        match sql_type {
            SqlDataType::Unknown
            | SqlDataType::Char
            | SqlDataType::Varchar
            | SqlDataType::LongVarchar
            | SqlDataType::WChar
            | SqlDataType::WVarchar
            | SqlDataType::WLongVarchar => SqlClass::Text,
            SqlDataType::Binary | SqlDataType::Varbinary | SqlDataType::LongVarbinary => {
                SqlClass::Binary
            }
            SqlDataType::Bit => SqlClass::Bit,
            SqlDataType::TinyInt
            | SqlDataType::SmallInt
            | SqlDataType::Integer
            | SqlDataType::BigInt => SqlClass::Integer,
            SqlDataType::Real | SqlDataType::Float | SqlDataType::Double => SqlClass::Float,
            SqlDataType::Decimal | SqlDataType::Numeric => SqlClass::Decimal,
            SqlDataType::Date => SqlClass::Date,
            SqlDataType::Time => SqlClass::Time,
            SqlDataType::Timestamp => SqlClass::Timestamp,
            SqlDataType::IntervalHourToMinute | SqlDataType::IntervalHourToSecond => {
                SqlClass::Interval
            }
        }
    }
}
