use std::collections::HashMap;

use log::{debug, warn};

use crate::{
    Error,
    buffers::RowBuffer,
    connection::{Connection, StatementId},
    conversion::{fetch_conversion, param_conversion},
    cursor::Cursor,
    dae::DaeState,
    descriptor::{ColumnRecord, ParamBinding, ParamRecord, ParamStatus, RowStatus},
    error::ExtendResult,
    execute::Batch,
    get_data::GetDataOffset,
    handles::{
        Backend, BackendStatement, ColumnMetadata, Diagnostics, Outcome, Param, Record, TextCodec,
        Value, log_diagnostics,
    },
    options::StatementOptions,
    positioned::{PendingSetPos, PositionedTarget},
    query::{Query, QueryType},
    sys::CDataType,
};

/// Lifecycle of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// Allocated, but nothing has been prepared yet.
    Inited,
    Prepared,
    Executed,
    /// Executed, and the values of output parameters have been written to their buffers.
    OutParamsFetched,
}

/// Shortest statement text accepted by prepare.
const MIN_STATEMENT_LENGTH: usize = 5;

/// A statement allocated on a [`Connection`]. Owns its descriptor records and the application
/// buffers bound to them, its cursor and the nested statement used to apply `SetPos` operations.
///
/// Every operation returns an [`Outcome`], or an [`Error`]. Warnings and per row errors of the
/// last operation are available through [`Diagnostics`].
pub struct Statement<'c, B: Backend> {
    pub(crate) id: StatementId,
    pub(crate) connection: &'c Connection<B>,
    pub(crate) state: StatementState,
    pub(crate) query: Option<Query>,
    pub(crate) backend_stmt: Option<B::Statement>,
    /// Parameter markers bound by the application. Excludes markers appended to identify the row
    /// of a positioned command.
    pub(crate) param_count: usize,
    pub(crate) params: Vec<Option<ParamRecord>>,
    pub(crate) columns: Vec<Option<ColumnRecord>>,
    pub(crate) bookmark_column: Option<Box<dyn RowBuffer>>,
    /// Implementation row descriptor.
    pub(crate) ird: Vec<ColumnMetadata>,
    pub(crate) options: StatementOptions,
    /// `true` for parameter rows to skip.
    pub(crate) param_operations: Option<Vec<bool>>,
    /// `true` for rows of the row set bulk `SetPos` operations leave alone.
    pub(crate) row_operations: Option<Vec<bool>>,
    pub(crate) param_status: Vec<ParamStatus>,
    pub(crate) row_status: Vec<RowStatus>,
    pub(crate) params_processed: usize,
    pub(crate) rows_processed: usize,
    /// `-1` if the last execution produced a result set.
    pub(crate) affected_rows: i64,
    /// Next parameter row to execute, if execution of an array has been suspended.
    pub(crate) array_offset: usize,
    pub(crate) last_row_fetched: usize,
    pub(crate) batch: Batch,
    pub(crate) cursor: Option<Cursor>,
    pub(crate) dae: DaeState,
    pub(crate) dae_stmt: Option<Box<Statement<'c, B>>>,
    pub(crate) pending_set_pos: Option<PendingSetPos>,
    pub(crate) positioned: Option<PositionedTarget>,
    /// Values identifying the row a positioned command applies to.
    pub(crate) positioned_keys: Vec<Param>,
    pub(crate) get_data: Vec<GetDataOffset>,
    pub(crate) cursor_name: Option<String>,
    /// Columns of the `INSERT` prepared on the nested statement.
    pub(crate) insert_shape: Option<Vec<usize>>,
    /// Default values of the base table columns, by column name.
    pub(crate) column_defaults: Option<HashMap<String, Value>>,
    pub(crate) fetch_bookmark: Option<i64>,
    pub(crate) diagnostics: Vec<Record>,
}

impl<'c, B: Backend> Statement<'c, B> {
    pub(crate) fn new(connection: &'c Connection<B>, id: StatementId) -> Self {
        Statement {
            id,
            connection,
            state: StatementState::Inited,
            query: None,
            backend_stmt: None,
            param_count: 0,
            params: Vec::new(),
            columns: Vec::new(),
            bookmark_column: None,
            ird: Vec::new(),
            options: StatementOptions::default(),
            param_operations: None,
            row_operations: None,
            param_status: Vec::new(),
            row_status: Vec::new(),
            params_processed: 0,
            rows_processed: 0,
            affected_rows: 0,
            array_offset: 0,
            last_row_fetched: 0,
            batch: Batch::default(),
            cursor: None,
            dae: DaeState::default(),
            dae_stmt: None,
            pending_set_pos: None,
            positioned: None,
            positioned_keys: Vec::new(),
            get_data: Vec::new(),
            cursor_name: None,
            insert_shape: None,
            column_defaults: None,
            fetch_bookmark: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn id(&self) -> StatementId {
        self.id
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    pub fn options(&self) -> &StatementOptions {
        &self.options
    }

    /// Settings take effect with the next prepare, execute or fetch.
    pub fn options_mut(&mut self) -> &mut StatementOptions {
        &mut self.options
    }

    /// Sends `sql` to the server for preparation.
    ///
    /// Any cursor is closed and parameters and columns are unbound. A trailing
    /// `WHERE CURRENT OF <cursor>` makes this a positioned command, which applies to the row the
    /// named cursor currently points to.
    pub fn prepare(&mut self, sql: &str) -> Result<Outcome, Error> {
        self.diagnostics.clear();
        let result = self.prepare_impl(sql, true).map(|()| Outcome::Success);
        self.conclude(result)
    }

    pub(crate) fn prepare_impl(&mut self, sql: &str, unbind: bool) -> Result<(), Error> {
        if sql.trim().len() < MIN_STATEMENT_LENGTH {
            return Err(Error::SyntaxError(format!("Statement text too short: '{sql}'")));
        }
        self.teardown()?;
        if unbind {
            self.reset_parameters();
            self.unbind_columns();
        }

        let query = Query::new(sql);
        let (text, positioned) = match &query.positioned {
            Some(clause) => {
                if !matches!(query.query_type, QueryType::Update | QueryType::Delete) {
                    return Err(Error::SyntaxError(
                        "WHERE CURRENT OF requires an UPDATE or DELETE statement".to_owned(),
                    ));
                }
                let conn = self.connection.lock();
                let snapshot = conn
                    .snapshot(&clause.cursor_name)
                    .ok_or_else(|| Error::InvalidCursorName(clause.cursor_name.clone()))?;
                let target = PositionedTarget::new(&clause.cursor_name, snapshot);
                (
                    target.rewrite(query.text_before_positioned_clause()),
                    Some(target),
                )
            }
            None => (query.text.clone(), None),
        };
        let text = self
            .options
            .decorate_query(&text, query.query_type == QueryType::Select);
        log_sql(self.id, "Prepare", &text);

        let mut conn = self.connection.lock();
        conn.force_materialize_streamer()?;
        let stmt = conn
            .prepare(&text, self.options.streams())
            .backend_call("prepare")?;
        drop(conn);

        let key_markers = positioned.as_ref().map_or(0, PositionedTarget::key_count);
        self.param_count = stmt.param_count().saturating_sub(key_markers);
        self.ird = stmt.column_metadata();
        self.get_data = vec![GetDataOffset::default(); self.ird.len()];
        self.backend_stmt = Some(stmt);
        self.positioned = positioned;
        self.query = Some(query);
        self.state = StatementState::Prepared;
        Ok(())
    }

    /// Prepares and executes `sql` in one go. Unlike [`Self::prepare`] this keeps the current
    /// bindings.
    pub fn exec_direct(&mut self, sql: &str) -> Result<Outcome, Error> {
        self.diagnostics.clear();
        if let Err(error) = self.prepare_impl(sql, false) {
            return self.conclude(Err(error));
        }
        self.execute()
    }

    /// Binds `buffer` to parameter `number` (one based). Values are read from the buffer at
    /// execution time, output values written into it.
    ///
    /// Fails with [`Error::ConversionUnsupported`] if the C type of the binding can not be
    /// converted into its SQL type.
    pub fn bind_parameter(
        &mut self,
        number: u16,
        binding: ParamBinding,
        buffer: Box<dyn RowBuffer>,
    ) -> Result<(), Error> {
        let index = usize::from(number)
            .checked_sub(1)
            .ok_or(Error::InvalidDescriptorIndex(number))?;
        let c_type = binding.resolved_c_type();
        if binding.io.is_input() {
            param_conversion(c_type, binding.sql_type)?;
        }
        if binding.io.is_output() {
            fetch_conversion(binding.sql_type, c_type)?;
        }
        if self.params.len() <= index {
            self.params.resize_with(index + 1, || None);
        }
        self.params[index] = Some(ParamRecord::new(binding, buffer));
        Ok(())
    }

    /// Binds `buffer` to result column `number` (one based). Column `0` is the bookmark column,
    /// which requires bookmarks to be enabled.
    pub fn bind_col(
        &mut self,
        number: u16,
        c_type: CDataType,
        buffer: Box<dyn RowBuffer>,
    ) -> Result<(), Error> {
        self.bind_col_with_precision(number, c_type, buffer, 38, 0)
    }

    /// Binds a [`CDataType::Numeric`] buffer with the given precision and scale.
    pub fn bind_numeric_col(
        &mut self,
        number: u16,
        precision: u8,
        scale: i8,
        buffer: Box<dyn RowBuffer>,
    ) -> Result<(), Error> {
        self.bind_col_with_precision(number, CDataType::Numeric, buffer, precision, scale)
    }

    fn bind_col_with_precision(
        &mut self,
        number: u16,
        c_type: CDataType,
        buffer: Box<dyn RowBuffer>,
        precision: u8,
        scale: i8,
    ) -> Result<(), Error> {
        if number == 0 {
            if !self.options.use_bookmarks {
                return Err(Error::InvalidDescriptorIndex(0));
            }
            self.bookmark_column = Some(buffer);
            return Ok(());
        }
        let index = usize::from(number - 1);
        if !self.ird.is_empty() {
            let column = self
                .ird
                .get(index)
                .ok_or(Error::InvalidDescriptorIndex(number))?;
            fetch_conversion(column.sql_type, c_type.resolve(column.sql_type, column.unsigned))?;
        }
        if self.columns.len() <= index {
            self.columns.resize_with(index + 1, || None);
        }
        self.columns[index] = Some(ColumnRecord {
            c_type,
            buffer,
            in_use: true,
            precision,
            scale,
        });
        Ok(())
    }

    /// Marks all parameter records as unbound. Their buffers are kept until rebound.
    pub fn reset_parameters(&mut self) {
        for record in self.params.iter_mut().flatten() {
            record.in_use = false;
        }
    }

    /// Marks all column records as unbound.
    pub fn unbind_columns(&mut self) {
        for record in self.columns.iter_mut().flatten() {
            record.in_use = false;
        }
        self.bookmark_column = None;
    }

    /// Closes the cursor and unbinds parameters and columns. The prepared statement is kept.
    pub fn reset(&mut self) -> Result<Outcome, Error> {
        self.diagnostics.clear();
        let result = self.close_impl().map(|()| {
            self.reset_parameters();
            self.unbind_columns();
            Outcome::Success
        });
        self.conclude(result)
    }

    /// Discards the cursor and any pending data at execution. The prepared statement is kept.
    pub fn close(&mut self) -> Result<Outcome, Error> {
        self.diagnostics.clear();
        let result = self.close_impl().map(|()| Outcome::Success);
        self.conclude(result)
    }

    fn close_impl(&mut self) -> Result<(), Error> {
        self.dae_stmt = None;
        self.dae = DaeState::default();
        self.pending_set_pos = None;
        self.array_offset = 0;
        self.batch = Batch::default();
        self.close_cursor()?;
        if matches!(
            self.state,
            StatementState::Executed | StatementState::OutParamsFetched
        ) {
            self.state = StatementState::Prepared;
        }
        Ok(())
    }

    /// Drops the cursor. A result still streamed is cached first, so the connection is free for
    /// other statements.
    pub(crate) fn close_cursor(&mut self) -> Result<(), Error> {
        let mut conn = self.connection.lock();
        if conn.current_streamer() == Some(self.id) {
            conn.force_materialize_streamer()?;
        }
        conn.discard_snapshot(self.id);
        drop(conn);
        self.cursor = None;
        self.rows_processed = 0;
        self.last_row_fetched = 0;
        self.row_status.clear();
        Ok(())
    }

    /// Everything a new prepare replaces: cursor, data at execution state and the nested statement.
    fn teardown(&mut self) -> Result<(), Error> {
        self.close_impl()?;
        self.backend_stmt = None;
        self.query = None;
        self.positioned = None;
        self.positioned_keys.clear();
        self.ird.clear();
        self.get_data.clear();
        self.insert_shape = None;
        self.column_defaults = None;
        self.affected_rows = 0;
        self.param_count = 0;
        self.state = StatementState::Inited;
        Ok(())
    }

    /// Rows affected by the last execute or `SetPos`. `-1` if the execute produced a result set.
    pub fn row_count(&self) -> i64 {
        self.affected_rows
    }

    /// Number of columns in the result set.
    pub fn column_count(&self) -> usize {
        self.ird.len()
    }

    /// Metadata of column `number` (one based).
    pub fn describe_col(&self, number: u16) -> Option<&ColumnMetadata> {
        usize::from(number).checked_sub(1).and_then(|index| self.ird.get(index))
    }

    /// Number of parameter markers of the prepared statement.
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// Status of each parameter row of the last execute.
    pub fn param_status(&self) -> &[ParamStatus] {
        &self.param_status
    }

    pub fn params_processed(&self) -> usize {
        self.params_processed
    }

    /// Status of each row of the current row set.
    pub fn row_status(&self) -> &[RowStatus] {
        &self.row_status
    }

    /// Number of rows in the current row set.
    pub fn rows_fetched(&self) -> usize {
        self.rows_processed
    }

    /// Marks parameter rows to skip during execute. `None` executes every row.
    pub fn set_param_operations(&mut self, ignore: Option<Vec<bool>>) {
        self.param_operations = ignore;
    }

    /// Marks rows of the row set which bulk `SetPos` operations leave alone.
    pub fn set_row_operations(&mut self, ignore: Option<Vec<bool>>) {
        self.row_operations = ignore;
    }

    /// Bookmark used by [`crate::FetchOrientation::Bookmark`].
    pub fn set_fetch_bookmark(&mut self, bookmark: Option<i64>) {
        self.fetch_bookmark = bookmark;
    }

    pub fn parameter_buffer(&self, number: u16) -> Option<&dyn RowBuffer> {
        self.param_record(number).map(|record| record.buffer.as_ref())
    }

    pub fn parameter_buffer_mut(&mut self, number: u16) -> Option<&mut (dyn RowBuffer + 'static)> {
        let index = usize::from(number).checked_sub(1)?;
        self.params
            .get_mut(index)?
            .as_mut()
            .map(|record| record.buffer.as_mut())
    }

    pub fn column_buffer(&self, number: u16) -> Option<&dyn RowBuffer> {
        if number == 0 {
            return self.bookmark_column.as_deref();
        }
        self.columns
            .get(usize::from(number - 1))?
            .as_ref()
            .map(|record| record.buffer.as_ref())
    }

    pub fn column_buffer_mut(&mut self, number: u16) -> Option<&mut (dyn RowBuffer + 'static)> {
        if number == 0 {
            return self.bookmark_column.as_deref_mut();
        }
        self.columns
            .get_mut(usize::from(number - 1))?
            .as_mut()
            .map(|record| record.buffer.as_mut())
    }

    /// Name of the cursor, as referred to by positioned commands. Defaults to `SQL_CUR<id>`.
    pub fn cursor_name(&self) -> String {
        self.cursor_name
            .clone()
            .unwrap_or_else(|| format!("SQL_CUR{}", self.id))
    }

    /// Fails with [`Error::InvalidCursorName`] if another statement of the connection uses the
    /// name already, or it is reserved for generated names.
    pub fn set_cursor_name(&mut self, name: &str) -> Result<(), Error> {
        let reserved = ["SQL_CUR", "SQLCUR"].iter().any(|prefix| {
            name.get(..prefix.len())
                .is_some_and(|start| start.eq_ignore_ascii_case(prefix))
        });
        if name.is_empty() || reserved {
            return Err(Error::InvalidCursorName(name.to_owned()));
        }
        self.connection.lock().claim_cursor_name(self.id, name)?;
        self.cursor_name = Some(name.to_owned());
        Ok(())
    }

    /// Warnings and errors of the last operation.
    pub fn diagnostics(&self) -> &[Record] {
        &self.diagnostics
    }

    pub(crate) fn param_record(&self, number: u16) -> Option<&ParamRecord> {
        let index = usize::from(number).checked_sub(1)?;
        self.params.get(index)?.as_ref()
    }

    pub(crate) fn codec(&self) -> &'c dyn TextCodec {
        self.connection.options().text_codec.as_ref()
    }

    pub(crate) fn backend_stmt_mut(&mut self) -> Result<&mut B::Statement, Error> {
        self.backend_stmt
            .as_mut()
            .ok_or(Error::SequenceError("Statement has not been prepared"))
    }

    /// Turns a plain success into success with info, if warnings have been collected, and logs
    /// the diagnostics of the call.
    pub(crate) fn conclude(&mut self, result: Result<Outcome, Error>) -> Result<Outcome, Error> {
        let result = match result {
            Ok(Outcome::Success) if self.diagnostics.iter().any(|r| r.state.is_warning()) => {
                Ok(Outcome::SuccessWithInfo)
            }
            other => other,
        };
        if let Err(error) = &result {
            let record = error.to_record();
            // Failures of the last row of a batch have been recorded already.
            if self.diagnostics.last() != Some(&record) {
                self.diagnostics.push(record);
            }
        }
        log_diagnostics(self);
        result
    }
}

impl<B: Backend> Diagnostics for Statement<'_, B> {
    fn diagnostic_record(&self, rec_number: usize) -> Option<&Record> {
        self.diagnostics.diagnostic_record(rec_number)
    }
}

impl<B: Backend> Drop for Statement<'_, B> {
    fn drop(&mut self) {
        // The nested statement locks the connection while dropping.
        self.dae_stmt = None;
        let mut conn = self.connection.lock();
        if conn.current_streamer() == Some(self.id) {
            if let Err(error) = conn.force_materialize_streamer() {
                warn!("Statement {} failed to release the connection: {error}", self.id);
            }
        }
        conn.discard_snapshot(self.id);
        conn.release_cursor_name(self.id);
    }
}

#[cfg(not(feature = "structured_logging"))]
pub(crate) fn log_sql(statement: StatementId, action: &str, sql: &str) {
    debug!("{action} (statement {statement}): {sql}");
}

#[cfg(feature = "structured_logging")]
pub(crate) fn log_sql(statement: StatementId, action: &str, sql: &str) {
    debug!(statement = statement.0, sql = sql; "{action}");
}
