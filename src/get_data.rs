//! Retrieves single column values of the current row, variable sized values in chunks.

use crate::{
    Error, Statement,
    buffers::{FixedSized, Indicator},
    conversion::{FetchContext, FetchConversion, copy_chunk, fetch_conversion},
    cursor::{terminator, truncation_warning},
    error::ExtendResult,
    handles::{Backend, BackendStatement, Outcome},
    sys::CDataType,
};

/// Progress of retrieving one column of the current row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct GetDataOffset {
    /// Bytes of the converted value returned so far.
    pub offset: usize,
    /// The value has been returned completely.
    pub done: bool,
}

impl<B: Backend> Statement<'_, B> {
    /// Retrieves the value of `column` (one based) in the current row, converted to `target`.
    ///
    /// Character and binary values larger than `buf` are returned in chunks, one per call. Every
    /// chunk but the last one comes with a truncation warning and the indicator reports the bytes
    /// remaining before the call. Once a value has been returned completely, further calls for the
    /// same column report [`Outcome::NoData`].
    ///
    /// # Parameters
    ///
    /// * `column`: Column number. `0` is the bookmark of the current row.
    /// * `target`: Type the value is converted into. [`CDataType::Default`] picks the type matching
    ///   the column.
    /// * `buf`: Receives the value.
    /// * `indicator`: Receives length or `NULL` of the value. Required to retrieve `NULL`.
    pub fn get_data(
        &mut self,
        column: u16,
        target: CDataType,
        buf: &mut [u8],
        indicator: Option<&mut Indicator>,
    ) -> Result<Outcome, Error> {
        self.diagnostics.clear();
        let result = self.get_data_impl(column, target, buf, indicator);
        self.conclude(result)
    }

    fn get_data_impl(
        &mut self,
        column: u16,
        target: CDataType,
        buf: &mut [u8],
        indicator: Option<&mut Indicator>,
    ) -> Result<Outcome, Error> {
        if self.dae.is_pending() {
            return Err(Error::SequenceError("Data at execution is pending"));
        }
        let cursor = self
            .cursor
            .ok_or(Error::InvalidCursorState("No result set"))?;
        if cursor.position <= 0 || self.rows_processed == 0 {
            return Err(Error::InvalidCursorState(
                "Cursor is not positioned on a row",
            ));
        }

        if column == 0 {
            if !self.options.use_bookmarks {
                return Err(Error::InvalidDescriptorIndex(0));
            }
            if !cursor.current_row().write_to(buf) {
                return Err(Error::InvalidBufferLength);
            }
            if let Some(indicator) = indicator {
                *indicator = Indicator::Length(u64::SIZE);
            }
            return Ok(Outcome::Success);
        }

        let index = usize::from(column - 1);
        let source = self
            .ird
            .get(index)
            .ok_or(Error::InvalidDescriptorIndex(column))?
            .clone();
        let c_type = target.resolve(source.sql_type, source.unsigned);
        let conversion = fetch_conversion(source.sql_type, c_type)?;
        let progress = self.get_data.get(index).copied().unwrap_or_default();
        if progress.done {
            return Ok(Outcome::NoData);
        }

        let value = self
            .backend_stmt_mut()?
            .column(index)
            .backend_call("column")?;
        if value.is_null() {
            let indicator = indicator.ok_or(Error::IndicatorRequired)?;
            *indicator = Indicator::Null;
            self.finish_column(index, progress.offset);
            return Ok(Outcome::Success);
        }

        let ctx = FetchContext {
            source: &source,
            target: c_type,
            codec: self.codec(),
            precision: 38,
            scale: i8::try_from(source.decimal_digits).unwrap_or(0),
        };
        match conversion {
            FetchConversion::Variable(render) => {
                let bytes = render(&value, &ctx)?;
                if progress.offset > 0 && progress.offset >= bytes.len() {
                    self.finish_column(index, progress.offset);
                    return Ok(Outcome::NoData);
                }
                let copied = copy_chunk(&bytes, progress.offset, buf, terminator(c_type));
                let remaining = bytes.len() - progress.offset;
                if let Some(indicator) = indicator {
                    *indicator = Indicator::Length(remaining);
                }
                if copied < remaining {
                    if let Some(progress) = self.get_data.get_mut(index) {
                        progress.offset += copied;
                    }
                    self.diagnostics.push(truncation_warning(bytes.len()));
                } else {
                    self.finish_column(index, bytes.len());
                }
            }
            FetchConversion::Fixed(write) => {
                let written = write(&value, &ctx, buf)?;
                if let Some(indicator) = indicator {
                    *indicator = Indicator::Length(written.length);
                }
                self.diagnostics.extend(written.warning);
                self.finish_column(index, written.length);
            }
        }
        Ok(Outcome::Success)
    }

    fn finish_column(&mut self, index: usize, offset: usize) {
        if let Some(progress) = self.get_data.get_mut(index) {
            *progress = GetDataOffset { offset, done: true };
        }
    }
}
