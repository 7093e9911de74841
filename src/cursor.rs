use log::debug;

use crate::{
    Error, Statement,
    buffers::{Indicator, RowBuffer},
    connection::CursorSnapshot,
    conversion::{FetchContext, FetchConversion, copy_chunk, fetch_conversion},
    descriptor::RowStatus,
    error::ExtendResult,
    get_data::GetDataOffset,
    handles::{
        Aggregate, Backend, BackendStatement, Execution, Outcome, Record, RowCode, State,
        TextCodec, Value,
    },
    options::{CursorType, OdbcVersion},
    positioned::base_table,
    sys::CDataType,
};

/// Where [`Statement::fetch_scroll`] moves the cursor to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrientation {
    /// Row set following the current one.
    Next,
    /// Row set preceding the current one.
    Prior,
    First,
    /// Last complete row set of the result.
    Last,
    /// Row set starting at the given row. Negative offsets count from the end.
    Absolute,
    /// Row set starting the given number of rows after the current one.
    Relative,
    /// Row set starting the given number of rows after the bookmarked row.
    Bookmark,
}

/// Scroll state over a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    /// First row (one based) of the current row set. `0` is before the first row, `row_count + 1`
    /// after the last one.
    pub position: i64,
    /// Row the backend yields with its next fetch.
    pub next: u64,
}

impl Cursor {
    pub fn new() -> Self {
        Cursor {
            position: 0,
            next: 1,
        }
    }

    /// Row the backend currently reads columns from.
    pub fn current_row(&self) -> u64 {
        self.next.saturating_sub(1)
    }
}

/// Everything the position of the next row set depends on.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScrollState {
    pub position: i64,
    /// Rows in the current row set.
    pub last_fetched: usize,
    pub array_size: usize,
    /// `None` while the result is streamed and its end has not been seen yet.
    pub row_count: Option<u64>,
    pub bookmark: Option<i64>,
    /// ODBC 2 applications scroll to the bookmarked row itself and pass no offset.
    pub odbc_version: OdbcVersion,
}

/// Position a scroll resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    /// Fetch the row set starting at this row.
    Rows(i64),
    BeforeFirst,
    /// Past the end. Carries the position the cursor is parked at.
    AfterLast(i64),
}

/// Resolves the first row of the row set `orientation` and `offset` refer to.
pub(crate) fn resolve_position(
    orientation: FetchOrientation,
    offset: i64,
    state: &ScrollState,
) -> Result<Target, Error> {
    let array = i64::try_from(state.array_size.max(1)).unwrap_or(i64::MAX);
    let last_fetched = i64::try_from(state.last_fetched).unwrap_or(i64::MAX);
    let row_count = state.row_count.map(|rows| i64::try_from(rows).unwrap_or(i64::MAX));
    // Scrolling relative to the end requires the end to be known.
    let rows = || row_count.ok_or(Error::FetchTypeOutOfRange);

    let start = match orientation {
        FetchOrientation::Next if state.position <= 0 => 1,
        FetchOrientation::Next => (state.position + last_fetched).max(1),
        FetchOrientation::Prior => state.position - array,
        FetchOrientation::First => 1,
        FetchOrientation::Last => rows()? - array + 1,
        FetchOrientation::Relative => {
            let start = state.position + offset;
            if start <= 0 && state.position > 1 && offset.unsigned_abs() < array.unsigned_abs() {
                1
            } else {
                start
            }
        }
        FetchOrientation::Absolute if offset < 0 => {
            let start = rows()? + offset + 1;
            if start <= 0 && offset.unsigned_abs() <= array.unsigned_abs() {
                1
            } else {
                start
            }
        }
        FetchOrientation::Absolute => offset,
        FetchOrientation::Bookmark => {
            let bookmark = state.bookmark.ok_or(Error::InvalidBookmark)?;
            match state.odbc_version {
                OdbcVersion::V2 => bookmark,
                OdbcVersion::V3 => bookmark + offset,
            }
        }
    };

    if start <= 0 {
        return Ok(Target::BeforeFirst);
    }
    match row_count {
        Some(rows) if start > rows => Ok(Target::AfterLast(rows + 1)),
        _ => Ok(Target::Rows(start)),
    }
}

/// Bytes reserved for the terminating zero of text written into buffers of type `c_type`.
pub(crate) fn terminator(c_type: CDataType) -> usize {
    match c_type {
        CDataType::Char => 1,
        CDataType::WChar => 2,
        _ => 0,
    }
}

pub(crate) fn truncation_warning(length: usize) -> Record {
    Record::warning(
        State::STRING_DATA_RIGHT_TRUNCATION,
        format!("String data, right truncated. Complete length: {length}"),
    )
}

/// Converts `value` and writes it into `row` of `buffer`. Returns a warning, if the conversion
/// truncated the value.
pub(crate) fn store_value(
    value: &Value,
    ctx: &FetchContext<'_>,
    buffer: &mut dyn RowBuffer,
    row: usize,
) -> Result<Option<Record>, Error> {
    let array_size = buffer.array_size();
    if value.is_null() {
        if buffer.set_indicator(row, Indicator::Null) {
            return Ok(None);
        }
        return Err(if buffer.has_indicator() {
            Error::BufferOutOfBounds { row, array_size }
        } else {
            Error::IndicatorRequired
        });
    }
    let conversion = fetch_conversion(ctx.source.sql_type, ctx.target)?;
    let element = buffer
        .element_at_mut(row)
        .ok_or(Error::BufferOutOfBounds { row, array_size })?;
    let (length, warning) = match conversion {
        FetchConversion::Variable(render) => {
            let bytes = render(value, ctx)?;
            let copied = copy_chunk(&bytes, 0, element, terminator(ctx.target));
            let warning = (copied < bytes.len()).then(|| truncation_warning(bytes.len()));
            (bytes.len(), warning)
        }
        FetchConversion::Fixed(write) => {
            let written = write(value, ctx, element)?;
            (written.length, written.warning)
        }
    };
    buffer.set_indicator(row, Indicator::Length(length));
    Ok(warning)
}

impl<B: Backend> Statement<'_, B> {
    /// Fetches the next row set into the bound column buffers.
    ///
    /// Returns [`Outcome::NoData`] once the result set is consumed.
    pub fn fetch(&mut self) -> Result<Outcome, Error> {
        self.fetch_scroll(FetchOrientation::Next, 0)
    }

    /// Moves the cursor and fetches the row set at its new position into the bound column
    /// buffers.
    ///
    /// # Parameters
    ///
    /// * `orientation`: Where to move the cursor. Forward only cursors support
    ///   [`FetchOrientation::Next`] only.
    /// * `offset`: Row for [`FetchOrientation::Absolute`], distance for
    ///   [`FetchOrientation::Relative`] and [`FetchOrientation::Bookmark`]. Ignored otherwise.
    ///
    /// A row set which would start before the first row leaves the cursor before the first row,
    /// one which would start after the last row parks it after the last row. Both report
    /// [`Outcome::NoData`]. A row set which is only partially filled is a success.
    pub fn fetch_scroll(
        &mut self,
        orientation: FetchOrientation,
        offset: i64,
    ) -> Result<Outcome, Error> {
        self.diagnostics.clear();
        let result = self.fetch_scroll_impl(orientation, offset);
        self.conclude(result)
    }

    fn fetch_scroll_impl(
        &mut self,
        orientation: FetchOrientation,
        offset: i64,
    ) -> Result<Outcome, Error> {
        if self.dae.is_pending() {
            return Err(Error::SequenceError("Data at execution is pending"));
        }
        if self.cursor.is_none() {
            return Err(Error::InvalidCursorState("No result set"));
        }
        if self.options.cursor_type == CursorType::ForwardOnly
            && orientation != FetchOrientation::Next
        {
            return Err(Error::FetchTypeOutOfRange);
        }
        if orientation == FetchOrientation::Bookmark {
            if !self.options.use_bookmarks {
                return Err(Error::FetchTypeOutOfRange);
            }
            if self.fetch_bookmark.is_none() {
                return Err(Error::InvalidBookmark);
            }
        }

        let refresh = {
            let mut conn = self.connection.lock();
            conn.drain_other_streamer(self.id)?;
            conn.take_reset(self.id)
        };
        if refresh || self.options.cursor_type == CursorType::Dynamic {
            if let Err(error) = self.refresh_cursor() {
                if refresh {
                    self.connection.lock().restore_reset(self.id);
                }
                return Err(error);
            }
        }

        let cursor = self
            .cursor
            .ok_or(Error::InvalidCursorState("No result set"))?;
        let array_size = self.options.row_array_size.max(1);
        let state = ScrollState {
            position: cursor.position,
            last_fetched: self.last_row_fetched,
            array_size,
            row_count: self.backend_stmt_mut()?.row_count(),
            bookmark: self.fetch_bookmark,
            odbc_version: self.connection.options().odbc_version,
        };
        let target = resolve_position(orientation, offset, &state)?;

        self.get_data.fill(GetDataOffset::default());
        self.row_status = vec![RowStatus::NoRow; array_size];
        self.rows_processed = 0;
        match target {
            Target::Rows(start) => self.fetch_rows(start),
            Target::BeforeFirst => Ok(self.park(0)),
            Target::AfterLast(position) => Ok(self.park(position)),
        }
    }

    /// Leaves the cursor outside of the result set.
    fn park(&mut self, position: i64) -> Outcome {
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.position = position;
        }
        self.last_row_fetched = 0;
        self.rows_processed = 0;
        self.connection.lock().discard_snapshot(self.id);
        Outcome::NoData
    }

    /// Re-executes the query, so the result reflects the current content of the database. The
    /// position of the cursor is kept.
    fn refresh_cursor(&mut self) -> Result<(), Error> {
        debug!("Statement {} re-executes its query to refresh the cursor.", self.id);
        let id = self.id;
        let stmt = self
            .backend_stmt
            .as_mut()
            .ok_or(Error::SequenceError("Statement has not been prepared"))?;
        let execution = {
            let mut conn = self.connection.lock();
            conn.drain_other_streamer(id)?;
            stmt.execute_one().backend_call("execute_one")?
        };
        let ird = stmt.column_metadata();
        let streaming = stmt.is_streaming();
        // Counters only change once the refresh succeeded.
        if execution == Execution::HasResultSet {
            self.ird = ird;
            if let Some(cursor) = self.cursor.as_mut() {
                cursor.next = 1;
            }
            if streaming {
                self.connection.lock().set_streamer(id);
            }
        }
        Ok(())
    }

    fn fetch_rows(&mut self, start: i64) -> Result<Outcome, Error> {
        let array_size = self.options.row_array_size.max(1);
        let id = self.id;
        let columns = self.ird.len();
        let first = u64::try_from(start).unwrap_or(0);
        let mut cursor = self
            .cursor
            .ok_or(Error::InvalidCursorState("No result set"))?;

        let stmt = self
            .backend_stmt
            .as_mut()
            .ok_or(Error::SequenceError("Statement has not been prepared"))?;
        let mut images = Vec::with_capacity(array_size);
        {
            let mut conn = self.connection.lock();
            if cursor.next != first {
                stmt.seek(first - 1).backend_call("seek")?;
            }
            while images.len() < array_size {
                if !stmt.fetch_next().backend_call("fetch_next")? {
                    if conn.current_streamer() == Some(id) && !conn.more_results() {
                        conn.release_streamer(id);
                    }
                    break;
                }
                let image = (0..columns)
                    .map(|index| stmt.column(index))
                    .collect::<Result<Vec<_>, _>>()
                    .backend_call("column")?;
                images.push(image);
            }
        }
        let fetched = images.len();
        cursor.next = first + fetched as u64;

        if fetched == 0 {
            let parked = stmt
                .row_count()
                .map_or(start, |rows| start.min(i64::try_from(rows).unwrap_or(i64::MAX) + 1));
            self.cursor = Some(cursor);
            return Ok(self.park(parked));
        }

        // Leave the backend on the first row of the row set, which get data and positioned
        // commands refer to.
        if fetched > 1 && !stmt.is_streaming() {
            stmt.seek(first).backend_call("seek")?;
            cursor.next = first + 1;
        }
        cursor.position = start;
        self.cursor = Some(cursor);
        self.last_row_fetched = fetched;
        self.rows_processed = fetched;

        let codec = self.codec();
        let mut aggregate = Aggregate::new();
        let mut last_error = None;
        for (row, image) in images.iter().enumerate() {
            let (code, error) = self.store_row(row, image, first + row as u64, codec);
            self.row_status[row] = match code {
                RowCode::Success => RowStatus::Success,
                RowCode::SuccessWithInfo => RowStatus::SuccessWithInfo,
                RowCode::Error => RowStatus::Error,
            };
            aggregate.fold(code);
            if error.is_some() {
                last_error = error;
            }
        }

        if let Some(image) = images.into_iter().next() {
            self.publish_image(image);
        }

        match (aggregate.finish(fetched), last_error) {
            (RowCode::Error, Some(error)) if fetched == 1 => Err(error),
            (RowCode::Success, _) => Ok(Outcome::Success),
            _ => Ok(Outcome::SuccessWithInfo),
        }
    }

    /// Writes `image` into `row` of the bound column buffers.
    fn store_row(
        &mut self,
        row: usize,
        image: &[Value],
        absolute: u64,
        codec: &dyn TextCodec,
    ) -> (RowCode, Option<Error>) {
        let mut code = RowCode::Success;
        let mut failure = None;
        for (index, record) in self.columns.iter_mut().enumerate() {
            let Some(record) = record.as_mut().filter(|record| record.in_use) else {
                continue;
            };
            let Some(source) = self.ird.get(index) else {
                continue;
            };
            let ctx = FetchContext {
                source,
                target: record.c_type.resolve(source.sql_type, source.unsigned),
                codec,
                precision: record.precision,
                scale: record.scale,
            };
            let value = image.get(index).unwrap_or(&Value::Null);
            match store_value(value, &ctx, record.buffer.as_mut(), row) {
                Ok(None) => (),
                Ok(Some(warning)) => {
                    self.diagnostics.push(warning);
                    if code == RowCode::Success {
                        code = RowCode::SuccessWithInfo;
                    }
                }
                Err(error) => {
                    self.diagnostics.push(error.to_record());
                    code = RowCode::Error;
                    failure = Some(error);
                }
            }
        }
        if let Some(bookmarks) = self.bookmark_column.as_deref_mut() {
            bookmarks.set_value(row, Some(absolute));
        }
        (code, failure)
    }

    /// Publishes the row the cursor points to, so positioned commands can refer to it. Cursors
    /// over anything but a single table can not be referred to.
    pub(crate) fn publish_image(&mut self, row: Vec<Value>) {
        let cursor_name = self.cursor_name();
        let mut conn = self.connection.lock();
        match base_table(&self.ird) {
            Ok((catalog, table)) => conn.publish_snapshot(
                self.id,
                CursorSnapshot {
                    cursor_name,
                    catalog,
                    table,
                    columns: self.ird.clone(),
                    row,
                    pending_reset: false,
                },
            ),
            Err(_) => conn.discard_snapshot(self.id),
        }
    }
}
