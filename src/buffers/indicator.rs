use crate::sys::{
    COLUMN_IGNORE, DATA_AT_EXEC, DEFAULT_PARAM, LEN_DATA_AT_EXEC_OFFSET, NO_TOTAL, NTS, NULL_DATA,
};

/// Indicates existence and length of a value. Input parameters and bound columns use some
/// additional sentinels to mark values which are not in the buffer.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Indicator {
    /// Field does not exist
    Null,
    /// Field exists, but its length had not be reported by the driver.
    NoTotal,
    /// Fields exists. Value indicates number of bytes required to store the value. In case of
    /// truncated data, this is the true length of the data, before truncation occurred.
    Length(usize),
    /// Text value terminated by a zero.
    NullTerminated,
    /// Value is sent in chunks at execution time. May carry a length hint.
    DataAtExec(Option<usize>),
    /// Use the default value of the target.
    Default,
    /// Leave the column alone in bulk and positioned operations.
    Ignore,
}

impl Indicator {
    /// Creates an indicator from an `isize` indicator value as found in application buffers.
    pub fn from_isize(indicator: isize) -> Self {
        match indicator {
            NULL_DATA => Indicator::Null,
            NO_TOTAL => Indicator::NoTotal,
            NTS => Indicator::NullTerminated,
            DATA_AT_EXEC => Indicator::DataAtExec(None),
            DEFAULT_PARAM => Indicator::Default,
            COLUMN_IGNORE => Indicator::Ignore,
            hint if hint <= LEN_DATA_AT_EXEC_OFFSET => {
                Indicator::DataAtExec(Some((LEN_DATA_AT_EXEC_OFFSET - hint) as usize))
            }
            len if len >= 0 => Indicator::Length(len as usize),
            // Other negative values carry no length information.
            _ => Indicator::NoTotal,
        }
    }

    /// Creates an indicator value as stored in application buffers.
    pub fn to_isize(self) -> isize {
        match self {
            Indicator::Null => NULL_DATA,
            Indicator::NoTotal => NO_TOTAL,
            Indicator::Length(len) => isize::try_from(len).unwrap_or(isize::MAX),
            Indicator::NullTerminated => NTS,
            Indicator::DataAtExec(None) => DATA_AT_EXEC,
            Indicator::DataAtExec(Some(hint)) => {
                LEN_DATA_AT_EXEC_OFFSET - isize::try_from(hint).unwrap_or(0)
            }
            Indicator::Default => DEFAULT_PARAM,
            Indicator::Ignore => COLUMN_IGNORE,
        }
    }

    /// Does this indicator imply truncation for a value of the given length?
    ///
    /// `length_in_buffer` is specified in bytes without terminating zeroes.
    pub fn is_truncated(self, length_in_buffer: usize) -> bool {
        match self {
            Indicator::NoTotal => true,
            Indicator::Length(complete_length) => complete_length > length_in_buffer,
            _ => false,
        }
    }

    /// Only `true` if the indicator is [`Indicator::Null`].
    pub fn is_null(self) -> bool {
        matches!(self, Indicator::Null)
    }

    pub fn is_data_at_exec(self) -> bool {
        matches!(self, Indicator::DataAtExec(_))
    }

    /// If the indicator is [`Indicator::Length`] this is [`Some`].
    pub fn length(self) -> Option<usize> {
        if let Indicator::Length(len) = self {
            Some(len)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::Indicator;

    #[test_case(Indicator::Null; "null")]
    #[test_case(Indicator::NoTotal; "no total")]
    #[test_case(Indicator::Length(42); "length")]
    #[test_case(Indicator::NullTerminated; "null terminated")]
    #[test_case(Indicator::DataAtExec(None); "data at execution")]
    #[test_case(Indicator::DataAtExec(Some(1000)); "data at execution with length hint")]
    #[test_case(Indicator::Default; "default")]
    #[test_case(Indicator::Ignore; "ignore")]
    fn survives_representation_in_application_buffer(indicator: Indicator) {
        assert_eq!(indicator, Indicator::from_isize(indicator.to_isize()));
    }

    #[test]
    fn truncation() {
        assert!(Indicator::Length(10).is_truncated(9));
        assert!(!Indicator::Length(10).is_truncated(10));
        assert!(Indicator::NoTotal.is_truncated(100));
        assert!(!Indicator::Null.is_truncated(0));
    }
}
