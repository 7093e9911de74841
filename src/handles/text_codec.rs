use widestring::{U16Str, U16String};

use super::{Record, State};

/// Converts between text in the connection character set (narrow) and UTF-16 (wide).
pub trait TextCodec {
    fn to_wide(&self, text: &[u8]) -> Result<U16String, Record>;

    fn from_wide(&self, text: &U16Str) -> Result<Vec<u8>, Record>;
}

/// Codec for connections using UTF-8 as their character set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Codec;

impl TextCodec for Utf8Codec {
    fn to_wide(&self, text: &[u8]) -> Result<U16String, Record> {
        let text = std::str::from_utf8(text).map_err(|error| {
            Record::new(
                State::INVALID_CHARACTER_VALUE,
                0,
                format!("Text is not valid UTF-8: {error}"),
            )
        })?;
        Ok(U16String::from_str(text))
    }

    fn from_wide(&self, text: &U16Str) -> Result<Vec<u8>, Record> {
        text.to_string().map(String::into_bytes).map_err(|error| {
            Record::new(
                State::INVALID_CHARACTER_VALUE,
                0,
                format!("Text is not valid UTF-16: {error}"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use widestring::U16String;

    use super::{TextCodec, Utf8Codec};

    #[test]
    fn narrow_to_wide_and_back() {
        let wide = Utf8Codec.to_wide("Grüße".as_bytes()).unwrap();
        assert_eq!(U16String::from_str("Grüße"), wide);

        let narrow = Utf8Codec.from_wide(&wide).unwrap();
        assert_eq!("Grüße".as_bytes(), narrow.as_slice());
    }

    #[test]
    fn reject_invalid_utf8() {
        let result = Utf8Codec.to_wide(&[0xff, 0xfe]);
        assert_eq!(*b"22018", result.unwrap_err().state.0);
    }
}
