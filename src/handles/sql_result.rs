/// Outcome of a statement operation which did not fail. Failures are reported as
/// [`crate::Error`] instead.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Outcome {
    /// The function has been executed successfully.
    Success,
    /// The function has been executed successfully. There have been warnings, which are available
    /// as diagnostics of the statement.
    SuccessWithInfo,
    /// Execution is suspended until the application supplied data at execution.
    NeedData,
    /// No more data is available.
    NoData,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Success | Outcome::SuccessWithInfo)
    }
}

/// Result code of a single row within a parameter array or row set.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RowCode {
    Success,
    SuccessWithInfo,
    Error,
}

/// Folds the result codes of several rows into a single one.
///
/// The first row seeds the aggregate. Any later row with a different code widens it to
/// [`RowCode::SuccessWithInfo`]. An error in every row of the array keeps it [`RowCode::Error`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregate {
    code: Option<RowCode>,
    errors: usize,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, code: RowCode) {
        if code == RowCode::Error {
            self.errors += 1;
        }
        self.code = match self.code {
            None => Some(code),
            Some(current) if current != code => Some(RowCode::SuccessWithInfo),
            unchanged => unchanged,
        };
    }

    /// Number of rows folded with [`RowCode::Error`].
    pub fn errors(&self) -> usize {
        self.errors
    }

    /// Aggregated code for an array of `array_size` rows. Rows never folded do not count as
    /// errors.
    pub fn finish(&self, array_size: usize) -> RowCode {
        if self.errors > 0 {
            if self.errors < array_size {
                RowCode::SuccessWithInfo
            } else {
                RowCode::Error
            }
        } else {
            self.code.unwrap_or(RowCode::Success)
        }
    }
}
