use super::{ColumnMetadata, Param, Record, Value};

/// Result of executing a prepared statement for a single parameter row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// The statement changed this many rows and did not produce a result set.
    RowsAffected(u64),
    /// The statement produced a result set, which can be fetched row by row.
    HasResultSet,
}

/// Client side of the wire protocol, as far as one connection is concerned. Implementations
/// speak the protocol, this crate decides what to send and when.
///
/// Errors are reported as diagnostic [`Record`]s carrying the native error code and SQLSTATE of
/// the server verbatim.
pub trait Backend {
    /// Server side prepared statement belonging to this connection.
    type Statement: BackendStatement;

    /// Prepares `sql` on the server.
    ///
    /// * `stream_results`: If `true` result sets of the statement are not buffered on the client,
    ///   but read from the wire row by row as they are fetched. Only one result may be streamed per
    ///   connection at any time.
    fn prepare(&mut self, sql: &str, stream_results: bool) -> Result<Self::Statement, Record>;

    /// Executes `sql` directly, without preparing it. Returns the number of affected rows.
    fn query(&mut self, sql: &str) -> Result<u64, Record>;

    /// Reads all rows of the result currently streamed on this connection from the wire and
    /// caches them within the statement they belong to. Returns the number of rows cached.
    fn cache_rest_of_stream(&mut self) -> Result<u64, Record>;

    /// `true` if the statement currently streaming has further result sets pending.
    fn more_results(&self) -> bool;
}

/// A statement prepared on the server.
pub trait BackendStatement {
    /// Number of parameter markers in the prepared text.
    fn param_count(&self) -> usize;

    /// Metadata of the result columns. Available after prepare for most statements, and always
    /// after an execution which produced a result set.
    fn column_metadata(&self) -> Vec<ColumnMetadata>;

    /// Binds a single row of parameters for the next [`Self::execute_one`].
    fn bind_parameters(&mut self, params: &[Param]) -> Result<(), Record>;

    /// Binds an array of parameter rows for the next [`Self::execute_bulk`]. Rows flagged in
    /// `rows_to_skip` are not sent.
    fn bind_parameter_array(&mut self, rows: &[Vec<Param>], rows_to_skip: &[bool])
    -> Result<(), Record>;

    fn execute_one(&mut self) -> Result<Execution, Record>;

    /// Executes the statement for every bound, not skipped row in one round trip. Returns the
    /// total number of rows affected.
    fn execute_bulk(&mut self, array_size: usize) -> Result<u64, Record>;

    /// Advances to the next row of the result set. `false` at the end of the result.
    fn fetch_next(&mut self) -> Result<bool, Record>;

    /// Field `index` (zero based) of the current row.
    fn column(&self, index: usize) -> Result<Value, Record>;

    /// Appends `bytes` to the value of parameter `param_index` (zero based) for the next
    /// execution.
    fn send_long_data(&mut self, param_index: usize, bytes: &[u8]) -> Result<(), Record>;

    /// Number of rows in the result. `None` while the result is streamed and its end has not
    /// been seen yet.
    fn row_count(&self) -> Option<u64>;

    /// Makes row `absolute_row` (one based) the current row. `0` positions before the first row,
    /// so the next [`Self::fetch_next`] yields row `absolute_row + 1`.
    fn seek(&mut self, absolute_row: u64) -> Result<(), Record>;

    /// `true` while rows of the current result are still read from the wire.
    fn is_streaming(&self) -> bool;

    /// `true` if the last execution returned values for output parameters.
    fn has_out_params(&self) -> bool;

    /// Values of the output parameters of the last execution, one per parameter marker.
    /// Input only parameters are reported as [`Value::Null`].
    fn out_params(&mut self) -> Result<Vec<Value>, Record>;
}
