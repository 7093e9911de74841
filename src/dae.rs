//! Data at execution. Parameters whose indicator is [`crate::buffers::Indicator::DataAtExec`] are
//! not read from their buffer, but streamed to the server in chunks after execute returned
//! [`Outcome::NeedData`].

use std::borrow::Cow;

use log::debug;
use widestring::U16Str;

use crate::{
    Error, Statement,
    error::ExtendResult,
    handles::{Backend, BackendStatement, Outcome},
    sys::CDataType,
};

/// Operation suspended for data at execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum DataExecution {
    /// Execute of the statement itself.
    #[default]
    Normal,
    /// Row insert of `SetPos`, executed by the nested statement.
    Add,
    /// Row update of `SetPos`, executed by the nested statement.
    Update,
}

#[derive(Debug, Default)]
pub(crate) struct DaeState {
    /// Index of the parameter currently receiving data.
    put_param: Option<usize>,
    /// Parameter row the data is collected for.
    row: usize,
    execution: DataExecution,
    need_data: bool,
    /// Data of every parameter of `row` has been put.
    done: bool,
    /// Column numbers of the parameters of the nested statement.
    columns: Vec<u16>,
}

impl DaeState {
    /// `true` while the application has yet to supply data. No other execution may proceed.
    pub fn is_pending(&self) -> bool {
        self.need_data
    }

    /// Suspends execute of parameter row `row`.
    pub fn suspend(&mut self, row: usize) {
        *self = DaeState {
            row,
            need_data: true,
            ..DaeState::default()
        };
    }

    /// Suspends a `SetPos` operation, whose nested statement awaits data for `columns`.
    pub fn suspend_nested(&mut self, execution: DataExecution, columns: Vec<u16>) {
        *self = DaeState {
            execution,
            need_data: true,
            columns,
            ..DaeState::default()
        };
    }

    /// Data for all parameters of `row` has been put, so its values can be sent.
    pub fn is_complete_for(&self, row: usize) -> bool {
        self.done && self.row == row
    }

    fn complete(&mut self) {
        self.need_data = false;
        self.put_param = None;
        self.done = true;
    }

    /// Forgets everything about the current row.
    pub fn finish_row(&mut self) {
        *self = DaeState::default();
    }
}

/// Result of [`Statement::param_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamData {
    /// Put the value of this parameter (one based). For `SetPos` operations this is the column
    /// number.
    NeedData { parameter: u16 },
    /// All data has been put and the suspended operation completed.
    Done(Outcome),
}

/// A piece of data sent with [`Statement::put_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutData<'a> {
    /// The parameter is `NULL`. No chunks may follow.
    Null,
    /// Appended to the value of the parameter. Wide character parameters expect native endian
    /// UTF-16.
    Chunk(&'a [u8]),
}

impl<B: Backend> Statement<'_, B> {
    /// Asks for the next parameter to put data for. Once data for every parameter has been put,
    /// the suspended execute or `SetPos` is resumed and its outcome returned as
    /// [`ParamData::Done`].
    pub fn param_data(&mut self) -> Result<ParamData, Error> {
        self.diagnostics.clear();
        match self.param_data_impl() {
            Ok(ParamData::Done(outcome)) => self.conclude(Ok(outcome)).map(ParamData::Done),
            Ok(need_data) => Ok(need_data),
            Err(error) => self.conclude(Err(error)).map(ParamData::Done),
        }
    }

    pub(crate) fn param_data_impl(&mut self) -> Result<ParamData, Error> {
        loop {
            if !self.dae.is_pending() {
                return Err(Error::SequenceError("No data at execution is pending"));
            }
            let outcome = match self.dae.execution {
                DataExecution::Normal => {
                    if let Some(index) = self.next_data_at_exec() {
                        self.dae.put_param = Some(index);
                        let parameter = u16::try_from(index + 1).unwrap_or(u16::MAX);
                        return Ok(ParamData::NeedData { parameter });
                    }
                    debug!(
                        "Statement {} received all data at execution for parameter row {}.",
                        self.id, self.dae.row
                    );
                    self.dae.complete();
                    self.execute_rows()
                }
                DataExecution::Add | DataExecution::Update => {
                    let child = self
                        .dae_stmt
                        .as_mut()
                        .ok_or(Error::SequenceError("No data at execution is pending"))?;
                    let child_result = child.param_data_impl();
                    match child_result {
                        Ok(ParamData::NeedData { parameter }) => {
                            let index = usize::from(parameter).saturating_sub(1);
                            self.dae.put_param = Some(index);
                            let column = self.dae.columns.get(index).copied().unwrap_or(parameter);
                            return Ok(ParamData::NeedData { parameter: column });
                        }
                        Ok(ParamData::Done(outcome)) => {
                            self.dae.finish_row();
                            self.resume_set_pos(Ok(outcome))
                        }
                        Err(error) => {
                            self.dae.finish_row();
                            self.resume_set_pos(Err(error))
                        }
                    }
                }
            };
            match outcome? {
                // The next row needs data, too.
                Outcome::NeedData => continue,
                outcome => return Ok(ParamData::Done(outcome)),
            }
        }
    }

    /// First parameter after the one which received data last, whose value is sent at execution.
    fn next_data_at_exec(&self) -> Option<usize> {
        let start = self.dae.put_param.map_or(0, |index| index + 1);
        let row = self.dae.row;
        (start..self.param_count).find(|&index| {
            self.params
                .get(index)
                .and_then(Option::as_ref)
                .is_some_and(|record| record.in_use && record.is_data_at_exec(row))
        })
    }

    /// Sends data for parameter `number`, which must be the one last requested by
    /// [`Self::param_data`]. Chunks are passed on to the server right away.
    pub fn put_data(&mut self, number: u16, data: PutData<'_>) -> Result<Outcome, Error> {
        self.diagnostics.clear();
        let result = self.put_data_impl(number, data);
        self.conclude(result)
    }

    fn put_data_impl(&mut self, number: u16, data: PutData<'_>) -> Result<Outcome, Error> {
        if !self.dae.is_pending() {
            return Err(Error::SequenceError("No data at execution is pending"));
        }
        let index = self
            .dae
            .put_param
            .ok_or(Error::SequenceError("Parameter data has not been requested"))?;

        if self.dae.execution != DataExecution::Normal {
            let requested = self.dae.columns.get(index).copied();
            if requested != Some(number) {
                return Err(Error::SequenceError(
                    "Data is put for a column other than the requested one",
                ));
            }
            let parameter = u16::try_from(index + 1).unwrap_or(u16::MAX);
            let child = self
                .dae_stmt
                .as_mut()
                .ok_or(Error::SequenceError("No data at execution is pending"))?;
            return child.put_data_impl(parameter, data);
        }

        if usize::from(number) != index + 1 {
            return Err(Error::SequenceError(
                "Data is put for a parameter other than the requested one",
            ));
        }
        let id = self.id;
        let codec = self.codec();
        let record = self
            .params
            .get_mut(index)
            .and_then(Option::as_mut)
            .ok_or(Error::UnboundParameter(number))?;
        let chunk = match data {
            PutData::Null if record.dae_length > 0 => return Err(Error::ConcatenateNull),
            PutData::Null => {
                record.dae_null = true;
                return Ok(Outcome::Success);
            }
            PutData::Chunk(_) if record.dae_null => return Err(Error::ConcatenateNull),
            PutData::Chunk(chunk) => chunk,
        };
        let bytes = if record.binding.resolved_c_type() == CDataType::WChar {
            if chunk.len() % 2 != 0 {
                return Err(Error::InvalidBufferLength);
            }
            let units: Vec<u16> = chunk
                .chunks_exact(2)
                .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
                .collect();
            let narrow = codec
                .from_wide(U16Str::from_slice(&units))
                .map_err(|record| Error::InvalidCharacterValue(record.message))?;
            Cow::Owned(narrow)
        } else {
            Cow::Borrowed(chunk)
        };

        let stmt = self
            .backend_stmt
            .as_mut()
            .ok_or(Error::SequenceError("Statement has not been prepared"))?;
        let mut conn = self.connection.lock();
        conn.drain_other_streamer(id)?;
        stmt.send_long_data(index, &bytes)
            .backend_call("send_long_data")?;
        record.dae_length += bytes.len();
        Ok(Outcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::{DaeState, DataExecution};

    #[test]
    fn suspended_row_is_pending_until_complete() {
        let mut dae = DaeState::default();
        assert!(!dae.is_pending());

        dae.suspend(2);
        assert!(dae.is_pending());
        assert!(!dae.is_complete_for(2));

        dae.complete();
        assert!(!dae.is_pending());
        assert!(dae.is_complete_for(2));
        assert!(!dae.is_complete_for(1));

        dae.finish_row();
        assert!(!dae.is_complete_for(2));
    }

    #[test]
    fn nested_suspension_remembers_columns() {
        let mut dae = DaeState::default();
        dae.suspend_nested(DataExecution::Update, vec![2, 4]);

        assert!(dae.is_pending());
        assert_eq!(DataExecution::Update, dae.execution);
        assert_eq!(vec![2, 4], dae.columns);
    }
}
