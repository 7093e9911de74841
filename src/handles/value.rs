use crate::sys::{Date, Interval, Timestamp};

/// A single field as delivered by the backend. The server is dynamically typed, so each field
/// carries its own representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Double(f64),
    /// Exact numeric in its text representation, e.g. `-123.45`.
    Decimal(String),
    /// Text in the connection character set.
    Text(Vec<u8>),
    /// Raw bytes. Binary and bit columns arrive big endian.
    Bytes(Vec<u8>),
    Date(Date),
    /// Server side times may be negative and exceed 24 hours.
    Time(Interval),
    Timestamp(Timestamp),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text representation as the server would print it. `None` for `NULL`. Binary values are
    /// returned as they are.
    pub fn to_text(&self) -> Option<Vec<u8>> {
        let text = match self {
            Value::Null => return None,
            Value::Int(i) => i.to_string().into_bytes(),
            Value::UInt(u) => u.to_string().into_bytes(),
            Value::Double(d) => d.to_string().into_bytes(),
            Value::Decimal(d) => d.clone().into_bytes(),
            Value::Text(bytes) | Value::Bytes(bytes) => bytes.clone(),
            Value::Date(d) => format!("{:04}-{:02}-{:02}", d.year, d.month, d.day).into_bytes(),
            Value::Time(t) => format_time(t).into_bytes(),
            Value::Timestamp(ts) => format_timestamp(ts).into_bytes(),
        };
        Some(text)
    }
}

fn format_time(time: &Interval) -> String {
    let sign = if time.negative { "-" } else { "" };
    let mut text = format!("{sign}{:02}:{:02}:{:02}", time.hour, time.minute, time.second);
    push_fraction(&mut text, time.fraction);
    text
}

fn format_timestamp(ts: &crate::sys::Timestamp) -> String {
    let mut text = format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        ts.year, ts.month, ts.day, ts.hour, ts.minute, ts.second
    );
    push_fraction(&mut text, ts.fraction);
    text
}

/// Appends microseconds of a nanosecond fraction, if any.
fn push_fraction(text: &mut String, fraction: u32) {
    if fraction != 0 {
        text.push_str(&format!(".{:06}", fraction / 1000));
    }
}

/// A parameter value handed to the backend for execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Value(Value),
    /// The value has already been streamed with
    /// [`super::BackendStatement::send_long_data`].
    LongData,
    /// Use the default value of the target column.
    Default,
}

impl Param {
    pub fn null() -> Self {
        Param::Value(Value::Null)
    }
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Param::Value(value)
    }
}
