//! Statement and connection level settings.

use std::fmt;

use crate::handles::{TextCodec, Utf8Codec};

/// Scrolling capabilities of a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorType {
    /// Rows can only be fetched in order, once. Results of forward only cursors may be streamed.
    #[default]
    ForwardOnly,
    /// Scrollable snapshot of the result at execution time.
    Static,
    /// Scrollable cursor re-executed on every scroll, so changes of other connections become
    /// visible.
    Dynamic,
}

/// ODBC behaviour the application asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OdbcVersion {
    V2,
    #[default]
    V3,
}

/// Layout of the buffers bound for a parameter array or row set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindType {
    /// Each parameter or column has its own buffer.
    #[default]
    Column,
    /// Values of all columns of a row are stored together in a record of the given size.
    Row(usize),
}

/// Settings of a statement. Most take effect at the next prepare or execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementOptions {
    pub cursor_type: CursorType,
    /// Maximum number of rows returned by a query. `0` means no limit.
    pub max_rows: u64,
    /// Query timeout in seconds, enforced by the server. `0` means no timeout.
    pub query_timeout: u32,
    /// Enables bookmarks and the bookmark column `0`.
    pub use_bookmarks: bool,
    /// Number of rows fetched by a single call to fetch.
    pub row_array_size: usize,
    /// Number of parameter rows executed by a single call to execute.
    pub paramset_size: usize,
    /// Layout of the bound parameter buffers. Bulk execution requires column-wise binding. Result
    /// columns are bound row-wise by binding a [`crate::buffers::StridedBuffer`].
    pub param_bind_type: BindType,
    /// Read the results of forward only cursors from the wire as they are fetched instead of
    /// buffering them on execute.
    pub stream_results: bool,
}

impl Default for StatementOptions {
    fn default() -> Self {
        StatementOptions {
            cursor_type: CursorType::ForwardOnly,
            max_rows: 0,
            query_timeout: 0,
            use_bookmarks: false,
            row_array_size: 1,
            paramset_size: 1,
            param_bind_type: BindType::Column,
            stream_results: true,
        }
    }
}

impl StatementOptions {
    /// Text sent to the server for `sql`, with query timeout and row limit applied.
    pub(crate) fn decorate_query(&self, sql: &str, is_select: bool) -> String {
        let mut decorated = String::with_capacity(sql.len() + 48);
        if self.query_timeout > 0 {
            decorated.push_str(&format!(
                "SET STATEMENT max_statement_time={} FOR ",
                self.query_timeout
            ));
        }
        decorated.push_str(sql);
        if self.max_rows > 0 && is_select {
            decorated.push_str(&format!(" LIMIT {}", self.max_rows));
        }
        decorated
    }

    pub(crate) fn streams(&self) -> bool {
        self.stream_results && self.cursor_type == CursorType::ForwardOnly
    }
}

/// Settings of a connection.
pub struct ConnectionOptions {
    pub odbc_version: OdbcVersion,
    /// Converts between the connection character set and UTF-16.
    pub text_codec: Box<dyn TextCodec>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptions {
            odbc_version: OdbcVersion::V3,
            text_codec: Box::new(Utf8Codec),
        }
    }
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("odbc_version", &self.odbc_version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::StatementOptions;

    #[test]
    fn plain_query_is_sent_unchanged() {
        let options = StatementOptions::default();
        assert_eq!("SELECT 1", options.decorate_query("SELECT 1", true));
    }

    #[test]
    fn timeout_and_limit() {
        let options = StatementOptions {
            max_rows: 10,
            query_timeout: 5,
            ..StatementOptions::default()
        };

        assert_eq!(
            "SET STATEMENT max_statement_time=5 FOR SELECT a FROM t LIMIT 10",
            options.decorate_query("SELECT a FROM t", true)
        );
        assert_eq!(
            "SET STATEMENT max_statement_time=5 FOR DELETE FROM t",
            options.decorate_query("DELETE FROM t", false)
        );
    }
}
