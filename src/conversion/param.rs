//! Application parameter buffers into server values.

use widestring::U16Str;

use crate::{
    Error,
    buffers::{Bit, FixedSized, Indicator},
    handles::{Param, TextCodec, Value},
    sys::{CDataType, Date, Interval, Numeric, SqlDataType, Time, Timestamp},
};

use super::{
    CClass, SqlClass,
    numeric::{numeric_to_text, parse_decimal, parse_integer},
    temporal::{NormalizedTime, TimeKind, parse_temporal},
};

/// A parameter value as read from the application buffer, before it is converted to the SQL type
/// of the parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum AppValue {
    Null,
    Default,
    Text(Vec<u8>),
    Bytes(Vec<u8>),
    Integer(i128),
    Float(f64),
    Numeric(Numeric),
    Date(Date),
    Time(Time),
    Timestamp(Timestamp),
    Interval(Interval),
}

/// Reads one element of a parameter buffer. `indicator` is `None` for buffers without an
/// indicator, in which case text is expected to be zero terminated.
pub fn decode_param(
    c_type: CDataType,
    element: &[u8],
    indicator: Option<Indicator>,
    codec: &dyn TextCodec,
) -> Result<AppValue, Error> {
    let length = match indicator {
        Some(Indicator::Null) => return Ok(AppValue::Null),
        Some(Indicator::Default) => return Ok(AppValue::Default),
        Some(Indicator::DataAtExec(_)) | Some(Indicator::Ignore) => {
            return Err(Error::SequenceError(
                "Parameter value is not located in the bound buffer",
            ));
        }
        Some(Indicator::Length(length)) => Some(length.min(element.len())),
        Some(Indicator::NullTerminated) | Some(Indicator::NoTotal) | None => None,
    };

    let fixed = || fixed_element(c_type, element);

    let value = match c_type {
        CDataType::Char => {
            let length = length.unwrap_or_else(|| terminated_length(element, 1));
            AppValue::Text(element[..length].to_vec())
        }
        CDataType::WChar => {
            let length = length.unwrap_or_else(|| terminated_length(element, 2));
            let units: Vec<u16> = element[..length & !1]
                .chunks_exact(2)
                .map(|unit| u16::from_ne_bytes([unit[0], unit[1]]))
                .collect();
            let narrow = codec
                .from_wide(U16Str::from_slice(&units))
                .map_err(|record| Error::InvalidCharacterValue(record.message))?;
            AppValue::Text(narrow)
        }
        CDataType::Binary => AppValue::Bytes(element[..length.unwrap_or(element.len())].to_vec()),
        CDataType::Bit => {
            let bit = Bit::read_from(fixed()?).ok_or(Error::InvalidBufferLength)?;
            AppValue::Integer(i128::from(bit.as_bool()))
        }
        CDataType::STinyInt => AppValue::Integer(read_fixed::<i8>(fixed()?)?.into()),
        CDataType::UTinyInt => AppValue::Integer(read_fixed::<u8>(fixed()?)?.into()),
        CDataType::SShort => AppValue::Integer(read_fixed::<i16>(fixed()?)?.into()),
        CDataType::UShort => AppValue::Integer(read_fixed::<u16>(fixed()?)?.into()),
        CDataType::SLong => AppValue::Integer(read_fixed::<i32>(fixed()?)?.into()),
        CDataType::ULong => AppValue::Integer(read_fixed::<u32>(fixed()?)?.into()),
        CDataType::SBigInt => AppValue::Integer(read_fixed::<i64>(fixed()?)?.into()),
        CDataType::UBigInt | CDataType::Bookmark => AppValue::Integer(read_fixed::<u64>(fixed()?)?.into()),
        CDataType::Float => AppValue::Float(read_fixed::<f32>(fixed()?)?.into()),
        CDataType::Double => AppValue::Float(read_fixed::<f64>(fixed()?)?),
        CDataType::Numeric => AppValue::Numeric(read_fixed(fixed()?)?),
        CDataType::Date => AppValue::Date(read_fixed(fixed()?)?),
        CDataType::Time => AppValue::Time(read_fixed(fixed()?)?),
        CDataType::Timestamp => AppValue::Timestamp(read_fixed(fixed()?)?),
        CDataType::IntervalHourToMinute | CDataType::IntervalHourToSecond => {
            AppValue::Interval(read_fixed(fixed()?)?)
        }
        CDataType::Default => {
            return Err(Error::ConversionUnsupported {
                c_type,
                sql_type: SqlDataType::Unknown,
            });
        }
    };
    Ok(value)
}

fn fixed_element(c_type: CDataType, element: &[u8]) -> Result<&[u8], Error> {
    match c_type.fixed_size() {
        Some(size) if element.len() >= size => Ok(&element[..size]),
        _ => Err(Error::InvalidBufferLength),
    }
}

fn read_fixed<T: FixedSized>(bytes: &[u8]) -> Result<T, Error> {
    T::read_from(bytes).ok_or(Error::InvalidBufferLength)
}

/// Position of the first terminating zero character of `width` bytes, or the entire buffer.
fn terminated_length(element: &[u8], width: usize) -> usize {
    element
        .chunks_exact(width)
        .position(|unit| unit.iter().all(|&b| b == 0))
        .map_or(element.len() - element.len() % width, |units| units * width)
}

/// Declared type of the parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParamTarget {
    pub sql_type: SqlDataType,
    pub column_size: usize,
    pub decimal_digits: i16,
}

type Convert = fn(AppValue, &ParamTarget) -> Result<Value, Error>;

const EVERYTHING: &[CClass] = &[
    CClass::Text,
    CClass::WideText,
    CClass::Binary,
    CClass::Bit,
    CClass::Integer,
    CClass::Float,
    CClass::Numeric,
    CClass::Date,
    CClass::Time,
    CClass::Timestamp,
    CClass::Interval,
];

const NUMBERS: &[CClass] = &[
    CClass::Text,
    CClass::WideText,
    CClass::Bit,
    CClass::Integer,
    CClass::Float,
    CClass::Numeric,
];

const PARAM_CONVERSIONS: &[(SqlClass, &[CClass], Convert)] = &[
    (SqlClass::Text, EVERYTHING, to_text),
    (
        SqlClass::Binary,
        &[CClass::Text, CClass::WideText, CClass::Binary],
        to_bytes,
    ),
    (
        SqlClass::Bit,
        &[
            CClass::Text,
            CClass::WideText,
            CClass::Binary,
            CClass::Bit,
            CClass::Integer,
        ],
        to_bit,
    ),
    (SqlClass::Integer, NUMBERS, to_integer),
    (SqlClass::Float, NUMBERS, to_float),
    (SqlClass::Decimal, NUMBERS, to_decimal),
    (
        SqlClass::Date,
        &[
            CClass::Text,
            CClass::WideText,
            CClass::Date,
            CClass::Timestamp,
        ],
        to_date,
    ),
    (
        SqlClass::Time,
        &[
            CClass::Text,
            CClass::WideText,
            CClass::Time,
            CClass::Timestamp,
            CClass::Interval,
        ],
        to_time,
    ),
    (
        SqlClass::Timestamp,
        &[
            CClass::Text,
            CClass::WideText,
            CClass::Date,
            CClass::Time,
            CClass::Timestamp,
        ],
        to_timestamp,
    ),
    (
        SqlClass::Interval,
        &[
            CClass::Text,
            CClass::WideText,
            CClass::Time,
            CClass::Interval,
        ],
        to_time,
    ),
];

/// Looks up the conversion of a parameter bound as `c_type` to the declared `sql_type`. Fails with
/// [`Error::ConversionUnsupported`] if there is none.
pub fn param_conversion(c_type: CDataType, sql_type: SqlDataType) -> Result<Convert, Error> {
    let unsupported = Error::ConversionUnsupported { c_type, sql_type };
    let Some(c_class) = CClass::of(c_type) else {
        return Err(unsupported);
    };
    let sql_class = SqlClass::of(sql_type);
    PARAM_CONVERSIONS
        .iter()
        .find(|(sql, sources, _)| *sql == sql_class && sources.contains(&c_class))
        .map(|&(_, _, convert)| convert)
        .ok_or(unsupported)
}

/// Converts a decoded application value into the parameter handed to the backend.
pub fn convert_param(
    value: AppValue,
    c_type: CDataType,
    target: &ParamTarget,
) -> Result<Param, Error> {
    match value {
        AppValue::Null => Ok(Param::null()),
        AppValue::Default => Ok(Param::Default),
        value => {
            let convert = param_conversion(c_type, target.sql_type)?;
            convert(value, target).map(Param::Value)
        }
    }
}

fn unsupported(value: &AppValue, target: &ParamTarget) -> Error {
    Error::ConversionRange(format!(
        "{value:?} can not be represented as {:?}",
        target.sql_type
    ))
}

fn format_date(date: &Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year, date.month, date.day)
}

fn text_of(value: AppValue) -> Option<Vec<u8>> {
    let text = match value {
        AppValue::Null | AppValue::Default => return None,
        AppValue::Text(text) | AppValue::Bytes(text) => text,
        AppValue::Integer(i) => i.to_string().into_bytes(),
        AppValue::Float(f) => f.to_string().into_bytes(),
        AppValue::Numeric(n) => numeric_to_text(&n).into_bytes(),
        AppValue::Date(d) => format_date(&d).into_bytes(),
        AppValue::Time(t) => format!("{:02}:{:02}:{:02}", t.hour, t.minute, t.second).into_bytes(),
        AppValue::Timestamp(ts) => Value::Timestamp(ts).to_text().unwrap_or_default(),
        AppValue::Interval(i) => Value::Time(i).to_text().unwrap_or_default(),
    };
    Some(text)
}

fn to_text(value: AppValue, _target: &ParamTarget) -> Result<Value, Error> {
    Ok(text_of(value).map_or(Value::Null, Value::Text))
}

fn to_bytes(value: AppValue, _target: &ParamTarget) -> Result<Value, Error> {
    Ok(text_of(value).map_or(Value::Null, Value::Bytes))
}

fn integer_of(value: &AppValue) -> Result<i128, Error> {
    match value {
        AppValue::Integer(i) => Ok(*i),
        AppValue::Float(f) => {
            let truncated = f.trunc();
            if !truncated.is_finite() || truncated.abs() >= 1e38 {
                return Err(Error::ConversionRange(f.to_string()));
            }
            Ok(truncated as i128)
        }
        AppValue::Numeric(n) => Ok(parse_integer(numeric_to_text(n).as_bytes())?.0),
        AppValue::Text(text) => Ok(parse_integer(text)?.0),
        AppValue::Bytes(bytes) => Ok(bytes.iter().any(|&b| b != 0).into()),
        _ => Err(Error::InvalidCharacterValue(format!("{value:?}"))),
    }
}

fn to_bit(value: AppValue, _target: &ParamTarget) -> Result<Value, Error> {
    Ok(Value::Int((integer_of(&value)? != 0).into()))
}

/// Values of integer columns may be in the range of either the signed or the unsigned type, since
/// the declared type does not tell which one the column is.
fn integer_bounds(sql_type: SqlDataType) -> (i128, i128) {
    match sql_type.integer_octet_length() {
        Some(1) => (i8::MIN.into(), u8::MAX.into()),
        Some(2) => (i16::MIN.into(), u16::MAX.into()),
        Some(4) => (i32::MIN.into(), u32::MAX.into()),
        _ => (i64::MIN.into(), u64::MAX.into()),
    }
}

fn to_integer(value: AppValue, target: &ParamTarget) -> Result<Value, Error> {
    let number = integer_of(&value)?;
    let (min, max) = integer_bounds(target.sql_type);
    if number < min || number > max {
        return Err(unsupported(&value, target));
    }
    Ok(match i64::try_from(number) {
        Ok(signed) => Value::Int(signed),
        // Positive, since it is within the bounds
        Err(_) => Value::UInt(number as u64),
    })
}

fn to_float(value: AppValue, _target: &ParamTarget) -> Result<Value, Error> {
    let number = match &value {
        AppValue::Float(f) => *f,
        AppValue::Integer(i) => *i as f64,
        AppValue::Numeric(n) => numeric_to_text(n).parse().unwrap_or_default(),
        AppValue::Text(text) => std::str::from_utf8(text)
            .ok()
            .and_then(|text| text.trim().parse().ok())
            .ok_or_else(|| Error::InvalidCharacterValue(format!("{value:?}")))?,
        _ => return Err(Error::InvalidCharacterValue(format!("{value:?}"))),
    };
    Ok(Value::Double(number))
}

fn to_decimal(value: AppValue, target: &ParamTarget) -> Result<Value, Error> {
    let text = match value {
        AppValue::Text(text) => {
            let scale = usize::try_from(target.decimal_digits).unwrap_or(0);
            let parsed = parse_decimal(&text, scale.max(fraction_digits(&text)))?;
            let digits = parsed.scaled.to_string().len();
            if target.column_size != 0 && digits > target.column_size {
                return Err(Error::ConversionRange(
                    String::from_utf8_lossy(&text).into_owned(),
                ));
            }
            String::from_utf8_lossy(text.trim_ascii()).into_owned()
        }
        AppValue::Numeric(n) => numeric_to_text(&n),
        other => String::from_utf8(text_of(other).unwrap_or_default()).unwrap_or_default(),
    };
    Ok(Value::Decimal(text))
}

/// Number of digits after the radix character.
fn fraction_digits(text: &[u8]) -> usize {
    text.trim_ascii()
        .iter()
        .position(|&b| b == b'.')
        .map_or(0, |dot| text.trim_ascii().len() - dot - 1)
}

fn normalized(value: AppValue) -> Result<NormalizedTime, Error> {
    let time = match value {
        AppValue::Text(text) => parse_temporal(&text)?,
        AppValue::Date(d) => NormalizedTime::from(d),
        AppValue::Time(t) => NormalizedTime::from(t),
        AppValue::Timestamp(ts) => NormalizedTime::from(ts),
        AppValue::Interval(i) => NormalizedTime::from(i),
        other => return Err(Error::InvalidDatetimeFormat(format!("{other:?}"))),
    };
    if !time.is_valid() {
        return Err(Error::InvalidDatetimeFormat(format!("{time:?}")));
    }
    Ok(time)
}

fn to_date(value: AppValue, _target: &ParamTarget) -> Result<Value, Error> {
    Ok(Value::Date(normalized(value)?.to_date()?))
}

fn to_time(value: AppValue, _target: &ParamTarget) -> Result<Value, Error> {
    let time = normalized(value)?;
    if time.kind == TimeKind::Date {
        return Err(Error::InvalidDatetimeFormat(
            "A date value has no time part".to_owned(),
        ));
    }
    Ok(Value::Time(time.to_interval()))
}

fn to_timestamp(value: AppValue, _target: &ParamTarget) -> Result<Value, Error> {
    Ok(Value::Timestamp(normalized(value)?.to_timestamp()?))
}
