//! Server values into application buffers.

use crate::{
    Error,
    buffers::{Bit, FixedSized},
    handles::{ColumnMetadata, Record, State, TextCodec, Value},
    sys::{CDataType, Interval, SqlDataType},
};

use super::{
    CClass, SqlClass,
    numeric::{parse_integer, text_to_numeric},
    temporal::{NormalizedTime, TimeKind},
};

/// Everything a conversion needs to know besides the value itself.
pub struct FetchContext<'a> {
    pub source: &'a ColumnMetadata,
    /// Resolved C type of the target buffer.
    pub target: CDataType,
    pub codec: &'a dyn TextCodec,
    /// Precision and scale for packed decimal targets.
    pub precision: u8,
    pub scale: i8,
}

/// Result of writing a fixed sized value.
#[derive(Debug)]
pub struct Written {
    /// Value for the length indicator.
    pub length: usize,
    pub warning: Option<Record>,
}

type Render = fn(&Value, &FetchContext<'_>) -> Result<Vec<u8>, Error>;
type Write = fn(&Value, &FetchContext<'_>, &mut [u8]) -> Result<Written, Error>;

#[derive(Clone, Copy)]
pub enum FetchConversion {
    /// The value is rendered completely and copied into the buffer in chunks.
    Variable(Render),
    /// The value is written in one piece.
    Fixed(Write),
}

const ALL: &[SqlClass] = &[
    SqlClass::Text,
    SqlClass::Binary,
    SqlClass::Bit,
    SqlClass::Integer,
    SqlClass::Float,
    SqlClass::Decimal,
    SqlClass::Date,
    SqlClass::Time,
    SqlClass::Timestamp,
    SqlClass::Interval,
];

const NUMBERS: &[SqlClass] = &[
    SqlClass::Text,
    SqlClass::Binary,
    SqlClass::Bit,
    SqlClass::Integer,
    SqlClass::Float,
    SqlClass::Decimal,
];

const FETCH_CONVERSIONS: &[(CClass, &[SqlClass], FetchConversion)] = &[
    (CClass::Text, ALL, FetchConversion::Variable(render_text)),
    (CClass::WideText, ALL, FetchConversion::Variable(render_wide)),
    (CClass::Binary, ALL, FetchConversion::Variable(render_text)),
    (CClass::Integer, NUMBERS, FetchConversion::Fixed(write_integer)),
    (CClass::Bit, NUMBERS, FetchConversion::Fixed(write_bit)),
    (CClass::Float, NUMBERS, FetchConversion::Fixed(write_float)),
    (CClass::Numeric, NUMBERS, FetchConversion::Fixed(write_numeric)),
    (
        CClass::Date,
        &[SqlClass::Text, SqlClass::Date, SqlClass::Timestamp],
        FetchConversion::Fixed(write_date),
    ),
    (
        CClass::Time,
        &[
            SqlClass::Text,
            SqlClass::Time,
            SqlClass::Timestamp,
            SqlClass::Interval,
        ],
        FetchConversion::Fixed(write_time),
    ),
    (
        CClass::Timestamp,
        &[
            SqlClass::Text,
            SqlClass::Date,
            SqlClass::Time,
            SqlClass::Timestamp,
        ],
        FetchConversion::Fixed(write_timestamp),
    ),
    (
        CClass::Interval,
        &[SqlClass::Text, SqlClass::Time, SqlClass::Interval],
        FetchConversion::Fixed(write_interval),
    ),
];

/// Looks up the conversion from a column of type `source` into a buffer of type `target`.
pub fn fetch_conversion(source: SqlDataType, target: CDataType) -> Result<FetchConversion, Error> {
    let unsupported = Error::ConversionUnsupported {
        c_type: target,
        sql_type: source,
    };
    let Some(c_class) = CClass::of(target) else {
        return Err(unsupported);
    };
    let sql_class = SqlClass::of(source);
    FETCH_CONVERSIONS
        .iter()
        .find(|(c, sources, _)| *c == c_class && sources.contains(&sql_class))
        .map(|&(_, _, conversion)| conversion)
        .ok_or(unsupported)
}

/// Copies `value[offset..]` into `target`, reserving `terminator` bytes for a trailing zero.
/// Returns the number of value bytes copied. Wide text (`terminator == 2`) is copied in whole code
/// units only.
pub fn copy_chunk(value: &[u8], offset: usize, target: &mut [u8], terminator: usize) -> usize {
    let rest = value.get(offset..).unwrap_or_default();
    let mut capacity = target.len().saturating_sub(terminator);
    if terminator == 2 {
        capacity &= !1;
    }
    let copied = rest.len().min(capacity);
    target[..copied].copy_from_slice(&rest[..copied]);
    if target.len() >= copied + terminator {
        target[copied..copied + terminator].fill(0);
    }
    copied
}

fn unsupported(ctx: &FetchContext<'_>) -> Error {
    Error::ConversionUnsupported {
        c_type: ctx.target,
        sql_type: ctx.source.sql_type,
    }
}

fn fractional_truncation() -> Option<Record> {
    Some(Record::warning(
        State::FRACTIONAL_TRUNCATION,
        "Fractional truncation",
    ))
}

fn written(ok: bool, length: usize, warning: Option<Record>) -> Result<Written, Error> {
    if ok {
        Ok(Written { length, warning })
    } else {
        Err(Error::InvalidBufferLength)
    }
}

fn render_text(value: &Value, _ctx: &FetchContext<'_>) -> Result<Vec<u8>, Error> {
    Ok(value.to_text().unwrap_or_default())
}

fn render_wide(value: &Value, ctx: &FetchContext<'_>) -> Result<Vec<u8>, Error> {
    let text = value.to_text().unwrap_or_default();
    let wide = ctx.codec.to_wide(&text).map_err(|record| Error::InvalidCharacterValue(record.message))?;
    Ok(wide.as_slice().iter().flat_map(|unit| unit.to_ne_bytes()).collect())
}

/// Smallest and largest value of an integer C type.
fn integer_range(c_type: CDataType) -> (i128, i128) {
    match c_type {
        CDataType::STinyInt => (i8::MIN.into(), i8::MAX.into()),
        CDataType::UTinyInt => (0, u8::MAX.into()),
        CDataType::SShort => (i16::MIN.into(), i16::MAX.into()),
        CDataType::UShort => (0, u16::MAX.into()),
        CDataType::SLong => (i32::MIN.into(), i32::MAX.into()),
        CDataType::ULong => (0, u32::MAX.into()),
        CDataType::SBigInt => (i64::MIN.into(), i64::MAX.into()),
        _ => (0, u64::MAX.into()),
    }
}

/// Writes the lower `size` bytes of `number` in host byte order.
fn write_low_bytes(number: i128, size: usize, target: &mut [u8]) -> bool {
    match size {
        1 => (number as u8).write_to(target),
        2 => (number as u16).write_to(target),
        4 => (number as u32).write_to(target),
        _ => (number as u64).write_to(target),
    }
}

fn write_integer(
    value: &Value,
    ctx: &FetchContext<'_>,
    target: &mut [u8],
) -> Result<Written, Error> {
    let size = ctx.target.fixed_size().unwrap_or(8);
    let mut warning = None;
    let number = match value {
        Value::Int(i) => i128::from(*i),
        Value::UInt(u) => i128::from(*u),
        Value::Double(d) => {
            let truncated = d.trunc();
            if truncated != *d {
                warning = fractional_truncation();
            }
            if !truncated.is_finite() || truncated.abs() >= 1e38 {
                return Err(Error::ConversionRange(d.to_string()));
            }
            truncated as i128
        }
        Value::Bytes(bytes) if ctx.source.sql_type.is_binary() => {
            return write_big_endian(bytes, size, target);
        }
        Value::Decimal(text) => {
            let (number, truncated) = parse_integer(text.as_bytes())?;
            if truncated {
                warning = fractional_truncation();
            }
            number
        }
        Value::Text(text) | Value::Bytes(text) => {
            let (number, truncated) = parse_integer(text)?;
            if truncated {
                warning = fractional_truncation();
            }
            number
        }
        _ => return Err(unsupported(ctx)),
    };

    let (min, max) = integer_range(ctx.target);
    if number < min || number > max {
        // An integer column of equal width is reinterpreted, so applications may read unsigned
        // columns into signed buffers and vice versa.
        let bits = size * 8;
        let same_width = ctx.source.sql_type.integer_octet_length() == Some(size);
        let fits_width = number >= -(1i128 << (bits - 1)) && number < (1i128 << bits);
        if !(same_width && fits_width) {
            return Err(Error::ConversionRange(format!(
                "{number} does not fit into {:?}",
                ctx.target
            )));
        }
    }
    written(write_low_bytes(number, size, target), size, warning)
}

/// Binary and bit columns arrive as big endian bytes, whatever the host byte order.
fn write_big_endian(bytes: &[u8], size: usize, target: &mut [u8]) -> Result<Written, Error> {
    let significant = bytes.len().saturating_sub(size);
    if bytes[..significant].iter().any(|&b| b != 0) {
        return Err(Error::ConversionRange(format!(
            "{} byte binary value does not fit into {size} bytes",
            bytes.len()
        )));
    }
    let number = bytes[significant..]
        .iter()
        .fold(0i128, |acc, &byte| (acc << 8) | i128::from(byte));
    written(write_low_bytes(number, size, target), size, None)
}

fn write_bit(value: &Value, ctx: &FetchContext<'_>, target: &mut [u8]) -> Result<Written, Error> {
    let set = match value {
        Value::Int(i) => *i != 0,
        Value::UInt(u) => *u != 0,
        Value::Double(d) => *d != 0.0,
        Value::Bytes(bytes) if ctx.source.sql_type.is_binary() => bytes.iter().any(|&b| b != 0),
        Value::Decimal(text) => parse_integer(text.as_bytes())?.0 != 0,
        Value::Text(text) | Value::Bytes(text) => parse_integer(text)?.0 != 0,
        _ => return Err(unsupported(ctx)),
    };
    written(Bit::from_bool(set).write_to(target), Bit::SIZE, None)
}

fn parse_float(text: &[u8]) -> Result<f64, Error> {
    let invalid = || Error::InvalidCharacterValue(String::from_utf8_lossy(text).into_owned());
    std::str::from_utf8(text)
        .map_err(|_| invalid())?
        .trim()
        .parse()
        .map_err(|_| invalid())
}

fn write_float(value: &Value, ctx: &FetchContext<'_>, target: &mut [u8]) -> Result<Written, Error> {
    let number = match value {
        Value::Int(i) => *i as f64,
        Value::UInt(u) => *u as f64,
        Value::Double(d) => *d,
        Value::Decimal(text) => parse_float(text.as_bytes())?,
        Value::Text(text) => parse_float(text)?,
        _ => return Err(unsupported(ctx)),
    };
    if ctx.target == CDataType::Float {
        if number.is_finite() && number.abs() > f64::from(f32::MAX) {
            return Err(Error::ConversionRange(number.to_string()));
        }
        written((number as f32).write_to(target), 4, None)
    } else {
        written(number.write_to(target), 8, None)
    }
}

fn write_numeric(
    value: &Value,
    ctx: &FetchContext<'_>,
    target: &mut [u8],
) -> Result<Written, Error> {
    let text = match value {
        Value::Int(_) | Value::UInt(_) | Value::Double(_) | Value::Decimal(_) | Value::Text(_) => {
            value.to_text().unwrap_or_default()
        }
        _ => return Err(unsupported(ctx)),
    };
    let (numeric, truncated) = text_to_numeric(&text, ctx.precision, ctx.scale)?;
    let warning = if truncated {
        fractional_truncation()
    } else {
        None
    };
    written(numeric.write_to(target), crate::sys::Numeric::SIZE, warning)
}

fn normalized(value: &Value, ctx: &FetchContext<'_>) -> Result<NormalizedTime, Error> {
    NormalizedTime::from_value(value)?.ok_or_else(|| unsupported(ctx))
}

fn write_date(value: &Value, ctx: &FetchContext<'_>, target: &mut [u8]) -> Result<Written, Error> {
    let time = normalized(value, ctx)?;
    let date = time.to_date()?;
    let warning = if time.has_time() {
        fractional_truncation()
    } else {
        None
    };
    written(date.write_to(target), crate::sys::Date::SIZE, warning)
}

fn write_time(value: &Value, ctx: &FetchContext<'_>, target: &mut [u8]) -> Result<Written, Error> {
    let time = normalized(value, ctx)?;
    if time.kind == TimeKind::Date {
        return Err(Error::InvalidDatetimeFormat(
            "A date value has no time part".to_owned(),
        ));
    }
    let warning = if time.fraction != 0 {
        fractional_truncation()
    } else {
        None
    };
    written(time.to_time()?.write_to(target), crate::sys::Time::SIZE, warning)
}

fn write_timestamp(
    value: &Value,
    ctx: &FetchContext<'_>,
    target: &mut [u8],
) -> Result<Written, Error> {
    let timestamp = normalized(value, ctx)?.to_timestamp()?;
    written(
        timestamp.write_to(target),
        crate::sys::Timestamp::SIZE,
        None,
    )
}

/// Largest hour an interval leading field may hold.
const MAX_INTERVAL_HOUR: u32 = 99_999;

fn write_interval(
    value: &Value,
    ctx: &FetchContext<'_>,
    target: &mut [u8],
) -> Result<Written, Error> {
    let time = normalized(value, ctx)?;
    if time.kind == TimeKind::Date {
        return Err(Error::InvalidDatetimeFormat(
            "A date value is not an interval".to_owned(),
        ));
    }
    if time.hour > MAX_INTERVAL_HOUR {
        return Err(Error::IntervalFieldOverflow(format!(
            "{} hours exceed the leading field precision",
            time.hour
        )));
    }
    let mut interval = time.to_interval();
    let mut warning = None;
    if ctx.target == CDataType::IntervalHourToMinute && (interval.second != 0 || interval.fraction != 0)
    {
        interval.second = 0;
        interval.fraction = 0;
        warning = fractional_truncation();
    }
    written(interval.write_to(target), Interval::SIZE, warning)
}

#[cfg(test)]
mod tests {
    use crate::{
        Error,
        buffers::FixedSized,
        handles::{ColumnMetadata, State, Utf8Codec, Value},
        sys::{CDataType, Date, Interval, SqlDataType},
    };

    use super::{FetchContext, FetchConversion, Written, copy_chunk, fetch_conversion};

    fn convert(
        value: Value,
        source: SqlDataType,
        target: CDataType,
        buffer: &mut [u8],
    ) -> Result<Written, Error> {
        let column = ColumnMetadata::new("c", source, "t");
        let ctx = FetchContext {
            source: &column,
            target,
            codec: &Utf8Codec,
            precision: 38,
            scale: 0,
        };
        match fetch_conversion(source, target)? {
            FetchConversion::Fixed(write) => write(&value, &ctx, buffer),
            FetchConversion::Variable(_) => panic!("Expected fixed conversion"),
        }
    }

    #[test]
    fn unsupported_pair_is_a_table_miss() {
        let result = fetch_conversion(SqlDataType::Date, CDataType::SLong);
        assert!(matches!(result, Err(Error::ConversionUnsupported { .. })));
    }

    #[test]
    fn binary_column_into_integer_is_read_big_endian() {
        let mut buffer = [0u8; 4];
        convert(
            Value::Bytes(vec![0x00, 0x01, 0x02]),
            SqlDataType::Binary,
            CDataType::SLong,
            &mut buffer,
        )
        .unwrap();

        assert_eq!(0x0102, i32::from_ne_bytes(buffer));
    }

    #[test]
    fn unsigned_column_into_signed_buffer_of_same_width_is_reinterpreted() {
        let mut buffer = [0u8; 4];
        let written = convert(
            Value::UInt(u32::MAX.into()),
            SqlDataType::Integer,
            CDataType::SLong,
            &mut buffer,
        )
        .unwrap();

        assert_eq!(-1, i32::from_ne_bytes(buffer));
        assert!(written.warning.is_none());
    }

    #[test]
    fn too_large_integer_for_narrower_buffer_is_out_of_range() {
        let mut buffer = [0u8; 2];
        let result = convert(
            Value::Int(70_000),
            SqlDataType::Integer,
            CDataType::SShort,
            &mut buffer,
        );

        assert!(matches!(result, Err(Error::ConversionRange(_))));
    }

    #[test]
    fn bit_is_normalized() {
        let mut buffer = [0u8; 1];
        convert(Value::Int(5), SqlDataType::TinyInt, CDataType::Bit, &mut buffer).unwrap();
        assert_eq!(1, buffer[0]);
    }

    #[test]
    fn timestamp_into_date_reports_truncated_time() {
        let mut buffer = [0u8; Date::SIZE];
        let written = convert(
            Value::Text(b"2020-02-02 10:00:00".to_vec()),
            SqlDataType::Timestamp,
            CDataType::Date,
            &mut buffer,
        )
        .unwrap();

        assert_eq!(
            Some(Date {
                year: 2020,
                month: 2,
                day: 2
            }),
            Date::read_from(&buffer)
        );
        assert_eq!(State::FRACTIONAL_TRUNCATION, written.warning.unwrap().state);
    }

    #[test]
    fn invalid_datetime_text() {
        let mut buffer = [0u8; Date::SIZE];
        let result = convert(
            Value::Text(b"not a date".to_vec()),
            SqlDataType::Varchar,
            CDataType::Date,
            &mut buffer,
        );
        assert!(matches!(result, Err(Error::InvalidDatetimeFormat(_))));
    }

    #[test]
    fn interval_hour_overflow() {
        let mut buffer = [0u8; Interval::SIZE];
        let value = Value::Time(Interval {
            hour: 100_000,
            ..Interval::default()
        });
        let result = convert(
            value,
            SqlDataType::Time,
            CDataType::IntervalHourToSecond,
            &mut buffer,
        );
        assert!(matches!(result, Err(Error::IntervalFieldOverflow(_))));
    }

    #[test]
    fn hour_to_minute_interval_drops_seconds() {
        let mut buffer = [0u8; Interval::SIZE];
        let value = Value::Time(Interval {
            hour: 30,
            minute: 15,
            second: 10,
            ..Interval::default()
        });
        let written = convert(
            value,
            SqlDataType::Time,
            CDataType::IntervalHourToMinute,
            &mut buffer,
        )
        .unwrap();

        let interval = Interval::read_from(&buffer).unwrap();
        assert_eq!((30, 15, 0), (interval.hour, interval.minute, interval.second));
        assert_eq!(State::FRACTIONAL_TRUNCATION, written.warning.unwrap().state);
    }

    #[test]
    fn numeric_needs_capacity() {
        let mut buffer = [0u8; crate::sys::Numeric::SIZE];
        let column = ColumnMetadata::new("c", SqlDataType::Decimal, "t");
        let ctx = FetchContext {
            source: &column,
            target: CDataType::Numeric,
            codec: &Utf8Codec,
            precision: 3,
            scale: 0,
        };
        let FetchConversion::Fixed(write) =
            fetch_conversion(SqlDataType::Decimal, CDataType::Numeric).unwrap()
        else {
            panic!("Expected fixed conversion")
        };

        let result = write(&Value::Decimal("1234".to_owned()), &ctx, &mut buffer);

        assert!(matches!(result, Err(Error::ConversionRange(_))));
        assert_eq!([0u8; crate::sys::Numeric::SIZE], buffer);
    }

    #[test]
    fn copy_text_chunks_with_terminator() {
        let mut target = [0xffu8; 4];

        let copied = copy_chunk(b"Hello", 0, &mut target, 1);
        assert_eq!(3, copied);
        assert_eq!(b"Hel\0", &target);

        let copied = copy_chunk(b"Hello", 3, &mut target, 1);
        assert_eq!(2, copied);
        assert_eq!(b"lo\0", &target[..3]);
    }

    #[test]
    fn copy_wide_chunks_in_whole_code_units() {
        let mut target = [0xffu8; 5];
        let copied = copy_chunk(&[1, 0, 2, 0, 3, 0], 0, &mut target, 2);
        assert_eq!(2, copied);
    }
}
