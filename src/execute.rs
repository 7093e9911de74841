use log::debug;

use crate::{
    Error, Statement,
    buffers::Indicator,
    conversion::{FetchContext, ParamTarget, convert_param, decode_param},
    cursor::{Cursor, store_value},
    descriptor::ParamStatus,
    error::ExtendResult,
    get_data::GetDataOffset,
    handles::{
        Aggregate, Backend, BackendStatement, ColumnMetadata, Execution, Outcome, Param, Record,
        RowCode,
    },
    options::BindType,
    query::QueryType,
    statement::StatementState,
};

/// Progress of a statement applied to several rows. Kept while the execution is suspended for data
/// at execution.
#[derive(Debug, Default)]
pub(crate) struct Batch {
    aggregate: Aggregate,
    /// Rows folded into the aggregate.
    rows: usize,
    last_error: Option<Error>,
    pub affected: u64,
    pub has_result_set: bool,
}

impl Batch {
    pub fn succeeded(&mut self) {
        self.aggregate.fold(RowCode::Success);
        self.rows += 1;
    }

    /// Records the failure of a single row. The batch carries on with the next row.
    pub fn failed(&mut self, error: Error, diagnostics: &mut Vec<Record>) {
        diagnostics.push(error.to_record());
        self.aggregate.fold(RowCode::Error);
        self.rows += 1;
        self.last_error = Some(error);
    }

    /// Outcome of the whole batch. Only fails if every row failed, with the error of the last row.
    pub fn outcome(self) -> Result<Outcome, Error> {
        let code = self.aggregate.finish(self.rows);
        match (code, self.last_error) {
            (RowCode::Error, Some(error)) => Err(error),
            (RowCode::SuccessWithInfo, _) => Ok(Outcome::SuccessWithInfo),
            _ => Ok(Outcome::Success),
        }
    }
}

/// Errors which concern the statement as a whole, rather than a single parameter row.
fn aborts_batch(error: &Error) -> bool {
    matches!(
        error,
        Error::UnboundParameter(_) | Error::BufferOutOfBounds { .. } | Error::SequenceError(_)
    )
}

impl<B: Backend> Statement<'_, B> {
    /// Executes the prepared statement once for every row of the bound parameter array.
    ///
    /// Returns [`Outcome::NeedData`] if a parameter is sent at execution time. The application
    /// then supplies the data using [`Self::param_data`] and [`Self::put_data`], after which the
    /// execution completes on its own.
    pub fn execute(&mut self) -> Result<Outcome, Error> {
        self.diagnostics.clear();
        let result = self.execute_impl();
        self.conclude(result)
    }

    fn execute_impl(&mut self) -> Result<Outcome, Error> {
        if self.dae.is_pending() {
            return Err(Error::SequenceError("Data at execution is pending"));
        }
        if self.state == StatementState::Inited || self.backend_stmt.is_none() {
            return Err(Error::SequenceError("Statement has not been prepared"));
        }
        self.close_cursor()?;
        self.connection.lock().force_materialize_streamer()?;
        self.affected_rows = 0;
        self.array_offset = 0;
        self.batch = Batch::default();

        if let Some(target) = &self.positioned {
            let conn = self.connection.lock();
            let snapshot = conn.snapshot(&target.cursor_name).ok_or(Error::InvalidCursorState(
                "Cursor of positioned command is not positioned on a row",
            ))?;
            self.positioned_keys = target.key_params(snapshot);
        }

        let array_size = self.options.paramset_size.max(1);
        self.param_status = vec![ParamStatus::Unused; array_size];
        self.params_processed = 0;
        if self.bulk_applicable(array_size) {
            self.execute_bulk(array_size)
        } else {
            self.execute_rows()
        }
    }

    /// Bulk execution sends the whole parameter array in one round trip. Only available for
    /// `INSERT` and `UPDATE` with column-wise binding, and if no value is sent at execution time.
    fn bulk_applicable(&self, array_size: usize) -> bool {
        array_size > 1
            && self.options.param_bind_type == BindType::Column
            && self.positioned.is_none()
            && self
                .query
                .as_ref()
                .is_some_and(|query| query.query_type.supports_bulk())
            && !self
                .params
                .iter()
                .take(self.param_count)
                .flatten()
                .any(|record| (0..array_size).any(|row| record.is_data_at_exec(row)))
    }

    fn is_param_row_ignored(&self, row: usize) -> bool {
        self.param_operations
            .as_ref()
            .and_then(|ignore| ignore.get(row))
            .copied()
            .unwrap_or(false)
    }

    fn execute_bulk(&mut self, array_size: usize) -> Result<Outcome, Error> {
        debug!(
            "Statement {} executes {array_size} parameter rows in bulk.",
            self.id
        );
        let mut rows = Vec::with_capacity(array_size);
        let mut rows_to_skip = vec![false; array_size];
        for row in 0..array_size {
            if self.is_param_row_ignored(row) {
                rows_to_skip[row] = true;
                rows.push(Vec::new());
                continue;
            }
            match self.row_params(row) {
                Ok(Some(params)) => {
                    rows.push(params);
                    self.param_status[row] = ParamStatus::Success;
                    self.batch.succeeded();
                }
                Ok(None) => {
                    return Err(Error::SequenceError(
                        "Data at execution is not supported in bulk operations",
                    ));
                }
                Err(error) if aborts_batch(&error) => return Err(error),
                Err(error) => {
                    rows_to_skip[row] = true;
                    rows.push(Vec::new());
                    self.param_status[row] = ParamStatus::Error;
                    self.batch.failed(error, &mut self.diagnostics);
                }
            }
        }
        self.params_processed = array_size;

        if rows_to_skip.iter().any(|skip| !skip) {
            let stmt = self
                .backend_stmt
                .as_mut()
                .ok_or(Error::SequenceError("Statement has not been prepared"))?;
            let mut conn = self.connection.lock();
            conn.drain_other_streamer(self.id)?;
            let result = stmt
                .bind_parameter_array(&rows, &rows_to_skip)
                .and_then(|()| stmt.execute_bulk(array_size));
            drop(conn);
            match result {
                Ok(affected) => self.batch.affected = affected,
                Err(record) => {
                    self.param_status.fill(ParamStatus::DiagUnavailable);
                    self.batch = Batch::default();
                    return Err(Error::Backend {
                        record,
                        function: "execute_bulk",
                    });
                }
            }
        }
        self.finish_batch(array_size - 1)
    }

    /// Executes parameter rows one at a time, starting with the row at the array offset. Resumes
    /// a batch suspended for data at execution.
    pub(crate) fn execute_rows(&mut self) -> Result<Outcome, Error> {
        let array_size = self.options.paramset_size.max(1);
        if self.param_status.len() < array_size {
            self.param_status.resize(array_size, ParamStatus::Unused);
        }
        let mut last_row = 0;
        while self.array_offset < array_size {
            let row = self.array_offset;
            if self.is_param_row_ignored(row) {
                self.param_status[row] = ParamStatus::Unused;
                self.array_offset += 1;
                continue;
            }
            let params = match self.row_params(row) {
                Ok(Some(params)) => params,
                Ok(None) => {
                    debug!(
                        "Statement {} awaits data at execution for parameter row {row}.",
                        self.id
                    );
                    self.dae.suspend(row);
                    return Ok(Outcome::NeedData);
                }
                Err(error) if aborts_batch(&error) => {
                    self.abort_batch();
                    return Err(error);
                }
                Err(error) => {
                    self.param_status[row] = ParamStatus::Error;
                    self.batch.failed(error, &mut self.diagnostics);
                    self.dae.finish_row();
                    self.clear_param_dae();
                    self.params_processed += 1;
                    self.array_offset += 1;
                    continue;
                }
            };

            let executed = self.execute_row(&params);
            self.dae.finish_row();
            self.clear_param_dae();
            match executed {
                Ok(execution) => {
                    self.param_status[row] = ParamStatus::Success;
                    self.batch.succeeded();
                    match execution {
                        Execution::RowsAffected(affected) => self.batch.affected += affected,
                        Execution::HasResultSet => self.batch.has_result_set = true,
                    }
                }
                // Outside of an array a failing execution is the failure of the call.
                Err(error) if array_size == 1 => {
                    self.abort_batch();
                    return Err(error);
                }
                // Only the failure of the final row stays attributed to its row.
                Err(error) => {
                    self.param_status[row] = if row + 1 < array_size {
                        ParamStatus::DiagUnavailable
                    } else {
                        ParamStatus::Error
                    };
                    self.batch.failed(error, &mut self.diagnostics);
                }
            }
            last_row = row;
            self.params_processed += 1;
            self.array_offset += 1;
        }
        self.finish_batch(last_row)
    }

    fn execute_row(&mut self, params: &[Param]) -> Result<Execution, Error> {
        let stmt = self
            .backend_stmt
            .as_mut()
            .ok_or(Error::SequenceError("Statement has not been prepared"))?;
        let mut conn = self.connection.lock();
        conn.drain_other_streamer(self.id)?;
        stmt.bind_parameters(params)
            .backend_call("bind_parameters")?;
        stmt.execute_one().backend_call("execute_one")
    }

    fn abort_batch(&mut self) {
        self.array_offset = 0;
        self.batch = Batch::default();
        self.dae.finish_row();
        self.clear_param_dae();
    }

    /// Forgets what has been put for the parameters of the current row.
    fn clear_param_dae(&mut self) {
        for record in self.params.iter_mut().flatten() {
            record.clear_dae();
        }
    }

    /// Converts the parameters of `row` into backend parameters. `None` if a value is still to be
    /// sent at execution time.
    pub(crate) fn row_params(&self, row: usize) -> Result<Option<Vec<Param>>, Error> {
        let codec = self.codec();
        let mut params = Vec::with_capacity(self.param_count + self.positioned_keys.len());
        for index in 0..self.param_count {
            let number = u16::try_from(index + 1).unwrap_or(u16::MAX);
            let record = self
                .params
                .get(index)
                .and_then(Option::as_ref)
                .filter(|record| record.in_use)
                .ok_or(Error::UnboundParameter(number))?;
            if !record.binding.io.is_input() {
                params.push(Param::null());
                continue;
            }
            let buffer = record.buffer.as_ref();
            match buffer.indicator_at(row) {
                Some(Indicator::DataAtExec(_)) => {
                    if !self.dae.is_complete_for(row) {
                        return Ok(None);
                    }
                    params.push(if record.dae_null {
                        Param::null()
                    } else {
                        Param::LongData
                    });
                }
                Some(Indicator::Ignore) => params.push(Param::Default),
                indicator => {
                    let element = buffer.element_at(row).ok_or(Error::BufferOutOfBounds {
                        row,
                        array_size: buffer.array_size(),
                    })?;
                    let c_type = record.binding.resolved_c_type();
                    let value = decode_param(c_type, element, indicator, codec)?;
                    let target = ParamTarget {
                        sql_type: record.binding.sql_type,
                        column_size: record.binding.column_size,
                        decimal_digits: record.binding.decimal_digits,
                    };
                    params.push(convert_param(value, c_type, &target)?);
                }
            }
        }
        params.extend(self.positioned_keys.iter().cloned());
        Ok(Some(params))
    }

    /// Concludes the execution of the parameter array. `last_row` is the row output parameters are
    /// written to.
    fn finish_batch(&mut self, last_row: usize) -> Result<Outcome, Error> {
        self.array_offset = 0;
        self.last_row_fetched = 0;
        let batch = std::mem::take(&mut self.batch);
        let affected = batch.affected;
        let has_result_set = batch.has_result_set;
        let outcome = batch.outcome()?;

        self.state = StatementState::Executed;
        if has_result_set {
            self.open_cursor()?;
        } else {
            self.affected_rows = i64::try_from(affected).unwrap_or(i64::MAX);
        }
        self.fetch_out_params(last_row)?;

        if let (Some(target), Some(query)) = (&self.positioned, &self.query) {
            if query.query_type == QueryType::Delete {
                self.connection.lock().mark_for_reset(&target.cursor_name);
            }
        }
        Ok(outcome)
    }

    /// Creates the cursor over the result set of the last execution.
    pub(crate) fn open_cursor(&mut self) -> Result<(), Error> {
        let stmt = self
            .backend_stmt
            .as_ref()
            .ok_or(Error::SequenceError("Statement has not been prepared"))?;
        self.ird = stmt.column_metadata();
        self.get_data = vec![GetDataOffset::default(); self.ird.len()];
        self.cursor = Some(Cursor::new());
        self.affected_rows = -1;
        if stmt.is_streaming() {
            self.connection.lock().set_streamer(self.id);
        }
        Ok(())
    }

    fn fetch_out_params(&mut self, row: usize) -> Result<(), Error> {
        let codec = self.codec();
        let Some(stmt) = self.backend_stmt.as_mut() else {
            return Ok(());
        };
        if !stmt.has_out_params() {
            return Ok(());
        }
        let values = {
            let _conn = self.connection.lock();
            stmt.out_params().backend_call("out_params")?
        };
        for (index, value) in values.iter().enumerate() {
            let Some(record) = self
                .params
                .get_mut(index)
                .and_then(Option::as_mut)
                .filter(|record| record.in_use && record.binding.io.is_output())
            else {
                continue;
            };
            let source = ColumnMetadata {
                sql_type: record.binding.sql_type,
                column_size: record.binding.column_size,
                decimal_digits: record.binding.decimal_digits,
                ..ColumnMetadata::default()
            };
            let ctx = FetchContext {
                source: &source,
                target: record.binding.resolved_c_type(),
                codec,
                precision: 38,
                scale: i8::try_from(record.binding.decimal_digits).unwrap_or(0),
            };
            if let Some(warning) = store_value(value, &ctx, record.buffer.as_mut(), row)? {
                self.diagnostics.push(warning);
            }
        }
        self.state = StatementState::OutParamsFetched;
        Ok(())
    }
}
