//! Positioned updates and deletes. Translates `SetPos` operations and `WHERE CURRENT OF` clauses
//! into plain DML against the base table of a cursor.

use std::collections::HashMap;

use log::debug;

use crate::{
    Error, Statement,
    buffers::{ColumnBuffer, Indicator, RowBuffer},
    connection::{CursorSnapshot, key_columns},
    dae::DataExecution,
    descriptor::{ParamBinding, RowStatus},
    error::ExtendResult,
    execute::Batch,
    get_data::GetDataOffset,
    handles::{Backend, BackendStatement, ColumnMetadata, Execution, Outcome, Param, Value},
    options::CursorType,
    statement::log_sql,
};

/// Operation of [`Statement::set_pos`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetPosOperation {
    /// Makes a row of the row set the current row.
    Position,
    /// Reserved. Does nothing.
    Refresh,
    /// Writes the values of the bound column buffers into the row.
    Update,
    Delete,
    /// Inserts the values of the bound column buffers as a new row.
    Add,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockType {
    #[default]
    NoChange,
    Exclusive,
    Unlock,
}

/// Row a positioned command applies to. Created at prepare from the image published by the
/// referenced cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PositionedTarget {
    pub cursor_name: String,
    key_columns: Vec<String>,
    key_indices: Vec<usize>,
    /// No unique index is known. The row is identified by all of its values.
    full_row: bool,
}

impl PositionedTarget {
    pub fn new(cursor_name: &str, snapshot: &CursorSnapshot) -> Self {
        let keys = snapshot.key_columns();
        let full_row = keys.is_empty();
        let key_indices = if full_row {
            base_columns(&snapshot.columns)
        } else {
            keys
        };
        let key_columns = key_indices
            .iter()
            .filter_map(|&index| snapshot.columns.get(index))
            .map(|column| column.org_name.clone())
            .collect();
        PositionedTarget {
            cursor_name: cursor_name.to_owned(),
            key_columns,
            key_indices,
            full_row,
        }
    }

    /// Parameter markers appended to the statement to identify the row.
    pub fn key_count(&self) -> usize {
        self.key_indices.len()
    }

    /// Replaces the positioned clause with a predicate on the key columns.
    pub fn rewrite(&self, text: &str) -> String {
        let operator = if self.full_row { "<=>" } else { "=" };
        let conditions: Vec<String> = self
            .key_columns
            .iter()
            .map(|name| format!("{}{operator}?", quote_identifier(name)))
            .collect();
        let mut sql = format!("{text} WHERE {}", conditions.join(" AND "));
        if self.full_row {
            sql.push_str(" LIMIT 1");
        }
        sql
    }

    /// Values of the key columns in the current row of the cursor.
    pub fn key_params(&self, snapshot: &CursorSnapshot) -> Vec<Param> {
        self.key_indices
            .iter()
            .map(|&index| Param::Value(snapshot.row.get(index).cloned().unwrap_or(Value::Null)))
            .collect()
    }
}

/// A `SetPos` update or insert applied to several rows. Kept while the nested statement awaits
/// data at execution.
#[derive(Debug)]
pub(crate) struct PendingSetPos {
    operation: SetPosOperation,
    catalog: String,
    table: String,
    /// Row set index of the next row to apply the operation to.
    next_row: usize,
    end: usize,
    /// The operation addresses exactly one row. Its failure is the failure of the call.
    single: bool,
    batch: Batch,
}

/// Catalog and name of the single table all columns stem from.
pub(crate) fn base_table(columns: &[ColumnMetadata]) -> Result<(String, String), Error> {
    let mut tables = columns
        .iter()
        .filter(|column| !column.org_table.is_empty())
        .map(|column| (&column.catalog, &column.org_table));
    let (catalog, table) = tables.next().ok_or(Error::NotUpdatable)?;
    if tables.any(|(other_catalog, other_table)| other_catalog != catalog || other_table != table) {
        return Err(Error::NotUpdatable);
    }
    Ok((catalog.clone(), table.clone()))
}

/// Columns which stem directly from a base table column.
fn base_columns(columns: &[ColumnMetadata]) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .filter(|(_, column)| !column.org_name.is_empty())
        .map(|(index, _)| index)
        .collect()
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn table_ref(catalog: &str, table: &str) -> String {
    if catalog.is_empty() {
        quote_identifier(table)
    } else {
        format!("{}.{}", quote_identifier(catalog), quote_identifier(table))
    }
}

/// `value` as an SQL literal.
pub(crate) fn quote_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_owned(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Decimal(d) => d.clone(),
        Value::Bytes(bytes) if bytes.is_empty() => "''".to_owned(),
        Value::Bytes(bytes) => {
            let hex: String = bytes.iter().map(|byte| format!("{byte:02X}")).collect();
            format!("0x{hex}")
        }
        other => {
            let text = other.to_text().unwrap_or_default();
            let text = String::from_utf8_lossy(&text);
            format!("'{}'", text.replace('\\', "\\\\").replace('\'', "''"))
        }
    }
}

/// `WHERE` clause matching the row `image` by its key columns, or all of its values if there are
/// no keys.
pub(crate) fn row_predicate(columns: &[ColumnMetadata], keys: &[usize], image: &[Value]) -> String {
    let full_row = keys.is_empty();
    let indices = if full_row {
        base_columns(columns)
    } else {
        keys.to_vec()
    };
    let conditions: Vec<String> = indices
        .iter()
        .filter_map(|&index| Some((columns.get(index)?, image.get(index)?)))
        .map(|(column, value)| {
            let name = quote_identifier(&column.org_name);
            if value.is_null() {
                format!("{name} IS NULL")
            } else {
                format!("{name}={}", quote_literal(value))
            }
        })
        .collect();
    let mut predicate = format!(" WHERE {}", conditions.join(" AND "));
    if full_row {
        predicate.push_str(" LIMIT 1");
    }
    predicate
}

pub(crate) fn build_update(
    catalog: &str,
    table: &str,
    assignments: &[String],
    predicate: &str,
) -> String {
    format!(
        "UPDATE {} SET {}{predicate}",
        table_ref(catalog, table),
        assignments.join(",")
    )
}

pub(crate) fn build_delete(catalog: &str, table: &str, predicate: &str) -> String {
    format!("DELETE FROM {}{predicate}", table_ref(catalog, table))
}

pub(crate) fn build_insert(catalog: &str, table: &str, columns: &[String], values: &[String]) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table_ref(catalog, table),
        columns.join(","),
        values.join(",")
    )
}

/// Copy of `row` of `buffer`, to be bound as parameter of the nested statement.
fn single_row_copy(buffer: &dyn RowBuffer, row: usize) -> Result<Box<dyn RowBuffer>, Error> {
    let element = buffer.element_at(row).ok_or(Error::BufferOutOfBounds {
        row,
        array_size: buffer.array_size(),
    })?;
    let mut copy = match buffer.indicator_at(row) {
        Some(indicator) => ColumnBuffer::new(element.len(), 1).with_indicators(&[indicator]),
        None => ColumnBuffer::without_indicators(element.len(), 1),
    };
    if let Some(target) = copy.element_at_mut(0) {
        target.copy_from_slice(element);
    }
    Ok(Box::new(copy))
}

/// Row set indices `row` refers to. `0` refers to all `count` rows.
fn target_rows(row: usize, count: usize) -> (usize, usize) {
    if row == 0 { (0, count) } else { (row - 1, row) }
}

type Bindings = Vec<(ParamBinding, Box<dyn RowBuffer>)>;

impl<'c, B: Backend> Statement<'c, B> {
    /// Applies `operation` to `row` (one based) of the current row set. Row `0` applies updates,
    /// deletes and inserts to every row not marked in the row operation array.
    ///
    /// Updates and inserts take their values from the bound column buffers. A column which is not
    /// bound, or whose indicator is [`Indicator::Ignore`], keeps its current value on update and
    /// receives its default on insert. May return [`Outcome::NeedData`] for columns sent at
    /// execution.
    pub fn set_pos(
        &mut self,
        row: usize,
        operation: SetPosOperation,
        lock: LockType,
    ) -> Result<Outcome, Error> {
        self.diagnostics.clear();
        let result = self.set_pos_impl(row, operation, lock);
        self.conclude(result)
    }

    fn set_pos_impl(
        &mut self,
        row: usize,
        operation: SetPosOperation,
        lock: LockType,
    ) -> Result<Outcome, Error> {
        if self.dae.is_pending() {
            return Err(Error::SequenceError("Data at execution is pending"));
        }
        let cursor = self
            .cursor
            .ok_or(Error::InvalidCursorState("No result set"))?;
        if lock != LockType::NoChange {
            return Err(Error::OptionalFeatureNotImplemented("Row locks"));
        }
        if operation == SetPosOperation::Position
            && (row == 0 || (self.options.cursor_type == CursorType::ForwardOnly && row != 1))
        {
            return Err(Error::InvalidCursorPosition);
        }
        if operation == SetPosOperation::Add {
            if row > self.options.row_array_size.max(1) {
                return Err(Error::RowValueOutOfRange);
            }
        } else {
            if cursor.position <= 0 || self.rows_processed == 0 {
                return Err(Error::InvalidCursorState(
                    "Cursor is not positioned on a row",
                ));
            }
            if row > self.last_row_fetched {
                return Err(Error::RowValueOutOfRange);
            }
        }
        // Seeking requires the whole result on the client.
        self.connection.lock().force_materialize_streamer()?;

        match operation {
            SetPosOperation::Position => self.position_on(row),
            SetPosOperation::Refresh => Ok(Outcome::Success),
            SetPosOperation::Delete => self.delete_rows(row),
            SetPosOperation::Update | SetPosOperation::Add => self.start_set_pos(operation, row),
        }
    }

    /// First row of the current row set.
    fn row_set_start(&self) -> u64 {
        self.cursor
            .map_or(0, |cursor| u64::try_from(cursor.position).unwrap_or(0))
    }

    fn is_row_ignored(&self, index: usize) -> bool {
        self.row_operations
            .as_ref()
            .and_then(|ignore| ignore.get(index))
            .copied()
            .unwrap_or(false)
    }

    fn set_row_status(&mut self, index: usize, status: RowStatus) {
        if let Some(entry) = self.row_status.get_mut(index) {
            *entry = status;
        }
    }

    /// Makes `absolute` the current row of the backend and returns its values.
    fn seek_row(&mut self, absolute: u64) -> Result<Vec<Value>, Error> {
        let columns = self.ird.len();
        let stmt = self
            .backend_stmt
            .as_mut()
            .ok_or(Error::SequenceError("Statement has not been prepared"))?;
        stmt.seek(absolute).backend_call("seek")?;
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.next = absolute + 1;
        }
        (0..columns)
            .map(|index| stmt.column(index))
            .collect::<Result<Vec<_>, _>>()
            .backend_call("column")
    }

    fn position_on(&mut self, row: usize) -> Result<Outcome, Error> {
        let absolute = self.row_set_start() + row as u64 - 1;
        let image = self.seek_row(absolute)?;
        self.get_data.fill(GetDataOffset::default());
        self.publish_image(image);
        Ok(Outcome::Success)
    }

    fn delete_rows(&mut self, row: usize) -> Result<Outcome, Error> {
        let (catalog, table) = base_table(&self.ird)?;
        let keys = key_columns(&self.ird);
        let (first, end) = target_rows(row, self.last_row_fetched);
        let start = self.row_set_start();
        let mut batch = Batch::default();
        for index in first..end {
            if row == 0 && self.is_row_ignored(index) {
                continue;
            }
            match self.delete_row(&catalog, &table, &keys, start + index as u64) {
                Ok(deleted) => {
                    batch.succeeded();
                    batch.affected += deleted;
                    self.set_row_status(index, RowStatus::Deleted);
                }
                Err(error) if row != 0 => return Err(error),
                Err(error) => {
                    batch.failed(error, &mut self.diagnostics);
                    self.set_row_status(index, RowStatus::Error);
                }
            }
        }
        self.affected_rows = i64::try_from(batch.affected).unwrap_or(i64::MAX);
        if self.options.cursor_type == CursorType::Dynamic {
            let deleted = usize::try_from(batch.affected).unwrap_or(usize::MAX);
            self.last_row_fetched = self.last_row_fetched.saturating_sub(deleted);
        }
        batch.outcome()
    }

    fn delete_row(
        &mut self,
        catalog: &str,
        table: &str,
        keys: &[usize],
        absolute: u64,
    ) -> Result<u64, Error> {
        let image = self.seek_row(absolute)?;
        let sql = build_delete(catalog, table, &row_predicate(&self.ird, keys, &image));
        log_sql(self.id, "Positioned delete", &sql);
        let mut conn = self.connection.lock();
        conn.drain_other_streamer(self.id)?;
        conn.query(&sql).backend_call("query")
    }

    fn start_set_pos(&mut self, operation: SetPosOperation, row: usize) -> Result<Outcome, Error> {
        let (catalog, table) = base_table(&self.ird)?;
        let count = if operation == SetPosOperation::Add {
            self.options.row_array_size.max(1)
        } else {
            self.last_row_fetched
        };
        let (next_row, end) = target_rows(row, count);
        self.pending_set_pos = Some(PendingSetPos {
            operation,
            catalog,
            table,
            next_row,
            end,
            single: row != 0,
            batch: Batch::default(),
        });
        self.continue_set_pos()
    }

    /// Applies the pending operation to the remaining rows.
    fn continue_set_pos(&mut self) -> Result<Outcome, Error> {
        loop {
            let pending = self
                .pending_set_pos
                .as_mut()
                .ok_or(Error::SequenceError("No SetPos operation is pending"))?;
            if pending.next_row >= pending.end {
                break;
            }
            let row = pending.next_row;
            let single = pending.single;
            let operation = pending.operation;
            let catalog = pending.catalog.clone();
            let table = pending.table.clone();
            if !single && self.is_row_ignored(row) {
                if let Some(pending) = self.pending_set_pos.as_mut() {
                    pending.next_row += 1;
                }
                continue;
            }
            let result = if operation == SetPosOperation::Add {
                self.add_row(row, &catalog, &table)
            } else {
                self.update_row(row, &catalog, &table)
            };
            if matches!(result, Ok(Outcome::NeedData)) {
                return Ok(Outcome::NeedData);
            }
            self.fold_set_pos_row(row, result)?;
        }
        let pending = self
            .pending_set_pos
            .take()
            .ok_or(Error::SequenceError("No SetPos operation is pending"))?;
        self.affected_rows = i64::try_from(pending.batch.affected).unwrap_or(i64::MAX);
        pending.batch.outcome()
    }

    /// Continues the pending operation after the nested statement received all data at execution.
    pub(crate) fn resume_set_pos(&mut self, result: Result<Outcome, Error>) -> Result<Outcome, Error> {
        let row = self
            .pending_set_pos
            .as_ref()
            .map(|pending| pending.next_row)
            .ok_or(Error::SequenceError("No SetPos operation is pending"))?;
        self.fold_set_pos_row(row, result)?;
        self.continue_set_pos()
    }

    fn fold_set_pos_row(&mut self, row: usize, result: Result<Outcome, Error>) -> Result<(), Error> {
        let (affected, warnings) = match self.dae_stmt.as_deref() {
            Some(child) => (
                u64::try_from(child.row_count()).unwrap_or(0),
                child
                    .diagnostics()
                    .iter()
                    .filter(|record| record.state.is_warning())
                    .cloned()
                    .collect(),
            ),
            None => (0, Vec::new()),
        };
        let pending = self
            .pending_set_pos
            .as_mut()
            .ok_or(Error::SequenceError("No SetPos operation is pending"))?;
        let status = match result {
            Ok(_) => {
                pending.batch.succeeded();
                pending.batch.affected += affected;
                if pending.operation == SetPosOperation::Add {
                    RowStatus::Added
                } else {
                    RowStatus::Updated
                }
            }
            Err(error) if pending.single => {
                self.pending_set_pos = None;
                return Err(error);
            }
            Err(error) => {
                pending.batch.failed(error, &mut self.diagnostics);
                RowStatus::Error
            }
        };
        pending.next_row += 1;
        self.diagnostics.extend(warnings);
        self.set_row_status(row, status);
        Ok(())
    }

    /// Value of column `index` for `row` of the application buffers. `None` if the column is not
    /// bound or ignored.
    fn app_value(
        &self,
        index: usize,
        row: usize,
    ) -> Result<Option<(ParamBinding, Box<dyn RowBuffer>)>, Error> {
        let Some(record) = self
            .columns
            .get(index)
            .and_then(Option::as_ref)
            .filter(|record| record.in_use)
        else {
            return Ok(None);
        };
        let Some(column) = self.ird.get(index) else {
            return Ok(None);
        };
        if record.buffer.indicator_at(row) == Some(Indicator::Ignore) {
            return Ok(None);
        }
        let binding = ParamBinding::input(
            record.c_type.resolve(column.sql_type, column.unsigned),
            column.sql_type,
        )
        .with_size(column.column_size, column.decimal_digits);
        Ok(Some((binding, single_row_copy(record.buffer.as_ref(), row)?)))
    }

    fn update_row(&mut self, row: usize, catalog: &str, table: &str) -> Result<Outcome, Error> {
        let image = self.seek_row(self.row_set_start() + row as u64)?;
        let keys = key_columns(&self.ird);
        let mut assignments = Vec::new();
        let mut bindings: Bindings = Vec::new();
        let mut parameter_columns = Vec::new();
        for index in base_columns(&self.ird) {
            let name = quote_identifier(&self.ird[index].org_name);
            match self.app_value(index, row)? {
                Some(binding) => {
                    assignments.push(format!("{name}=?"));
                    bindings.push(binding);
                    parameter_columns.push(u16::try_from(index + 1).unwrap_or(u16::MAX));
                }
                None => {
                    let current = image.get(index).unwrap_or(&Value::Null);
                    assignments.push(format!("{name}={}", quote_literal(current)));
                }
            }
        }
        let predicate = row_predicate(&self.ird, &keys, &image);
        let sql = build_update(catalog, table, &assignments, &predicate);
        self.insert_shape = None;
        self.run_nested(&sql, true, bindings, DataExecution::Update, parameter_columns)
    }

    fn add_row(&mut self, row: usize, catalog: &str, table: &str) -> Result<Outcome, Error> {
        if self.column_defaults.is_none() {
            self.column_defaults = Some(self.load_column_defaults(catalog, table)?);
        }
        let mut names = Vec::new();
        let mut values = Vec::new();
        let mut shape = Vec::new();
        let mut bindings: Bindings = Vec::new();
        let mut parameter_columns = Vec::new();
        for index in base_columns(&self.ird) {
            let column = &self.ird[index];
            names.push(quote_identifier(&column.org_name));
            match self.app_value(index, row)? {
                Some(binding) => {
                    values.push("?".to_owned());
                    shape.push(index);
                    bindings.push(binding);
                    parameter_columns.push(u16::try_from(index + 1).unwrap_or(u16::MAX));
                }
                None => values.push(
                    self.column_defaults
                        .as_ref()
                        .and_then(|defaults| defaults.get(&column.org_name))
                        .map_or_else(|| "DEFAULT".to_owned(), quote_literal),
                ),
            }
        }
        let sql = build_insert(catalog, table, &names, &values);
        let reprepare = self.dae_stmt.is_none() || self.insert_shape.as_ref() != Some(&shape);
        if reprepare {
            debug!(
                "Statement {} prepares an insert for columns {shape:?} of {table}.",
                self.id
            );
            self.insert_shape = Some(shape);
        }
        let result = self.run_nested(&sql, reprepare, bindings, DataExecution::Add, parameter_columns);
        if result.is_err() {
            self.insert_shape = None;
        }
        result
    }

    /// Default values of the columns of `table`, by column name.
    fn load_column_defaults(
        &mut self,
        catalog: &str,
        table: &str,
    ) -> Result<HashMap<String, Value>, Error> {
        let schema = if catalog.is_empty() {
            "DATABASE()".to_owned()
        } else {
            quote_literal(&Value::Text(catalog.as_bytes().to_vec()))
        };
        let sql = format!(
            "SELECT COLUMN_NAME, COLUMN_DEFAULT FROM INFORMATION_SCHEMA.COLUMNS \
            WHERE TABLE_SCHEMA={schema} AND TABLE_NAME={}",
            quote_literal(&Value::Text(table.as_bytes().to_vec()))
        );
        log_sql(self.id, "Load column defaults", &sql);
        let mut conn = self.connection.lock();
        conn.drain_other_streamer(self.id)?;
        let mut stmt = conn.prepare(&sql, false).backend_call("prepare")?;
        let mut defaults = HashMap::new();
        if stmt.execute_one().backend_call("execute_one")? == Execution::HasResultSet {
            while stmt.fetch_next().backend_call("fetch_next")? {
                let name = stmt.column(0).backend_call("column")?;
                let default = stmt.column(1).backend_call("column")?;
                if let (Some(name), false) = (name.to_text(), default.is_null()) {
                    defaults.insert(String::from_utf8_lossy(&name).into_owned(), default);
                }
            }
        }
        Ok(defaults)
    }

    /// Executes `sql` on the nested statement, with `bindings` as its parameters.
    fn run_nested(
        &mut self,
        sql: &str,
        reprepare: bool,
        bindings: Bindings,
        execution: DataExecution,
        parameter_columns: Vec<u16>,
    ) -> Result<Outcome, Error> {
        let connection = self.connection;
        let child = self
            .dae_stmt
            .get_or_insert_with(|| Box::new(connection.allocate_statement()));
        if reprepare {
            child.prepare_impl(sql, true)?;
        }
        for (number, (binding, buffer)) in (1..).zip(bindings) {
            child.bind_parameter(number, binding, buffer)?;
        }
        let outcome = child.execute()?;
        if outcome == Outcome::NeedData {
            self.dae.suspend_nested(execution, parameter_columns);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use crate::{
        Error,
        connection::CursorSnapshot,
        handles::{ColumnMetadata, Param, Value},
        sys::{Date, SqlDataType},
    };

    use super::{
        PositionedTarget, base_table, build_delete, build_insert, build_update, quote_literal,
        row_predicate,
    };

    fn columns() -> Vec<ColumnMetadata> {
        vec![
            ColumnMetadata::new("id", SqlDataType::Integer, "t")
                .with_catalog("db")
                .primary_key(),
            ColumnMetadata::new("name", SqlDataType::Varchar, "t").with_catalog("db"),
        ]
    }

    fn snapshot(columns: Vec<ColumnMetadata>, row: Vec<Value>) -> CursorSnapshot {
        CursorSnapshot {
            cursor_name: "c1".to_owned(),
            catalog: "db".to_owned(),
            table: "t".to_owned(),
            columns,
            row,
            pending_reset: false,
        }
    }

    #[test_case(Value::Null, "NULL"; "null")]
    #[test_case(Value::Int(-3), "-3"; "integer")]
    #[test_case(Value::Decimal("12.50".to_owned()), "12.50"; "decimal")]
    #[test_case(Value::Text(b"O'Neil".to_vec()), "'O''Neil'"; "quote in text")]
    #[test_case(Value::Text(b"a\\b".to_vec()), "'a\\\\b'"; "backslash in text")]
    #[test_case(Value::Bytes(vec![0xca, 0xfe]), "0xCAFE"; "bytes")]
    #[test_case(Value::Date(Date { year: 2020, month: 1, day: 2 }), "'2020-01-02'"; "date")]
    fn literals(value: Value, expected: &str) {
        assert_eq!(expected, quote_literal(&value));
    }

    #[test]
    fn predicate_on_key() {
        let image = [Value::Int(3), Value::Text(b"x".to_vec())];
        assert_eq!(" WHERE `id`=3", row_predicate(&columns(), &[0], &image));
    }

    #[test]
    fn predicate_on_full_row() {
        let image = [Value::Int(3), Value::Null];
        assert_eq!(
            " WHERE `id`=3 AND `name` IS NULL LIMIT 1",
            row_predicate(&columns(), &[], &image)
        );
    }

    #[test]
    fn statements() {
        let predicate = " WHERE `id`=3";
        assert_eq!(
            "UPDATE `db`.`t` SET `name`=? WHERE `id`=3",
            build_update("db", "t", &["`name`=?".to_owned()], predicate)
        );
        assert_eq!(
            "DELETE FROM `t` WHERE `id`=3",
            build_delete("", "t", predicate)
        );
        assert_eq!(
            "INSERT INTO `db`.`t` (`id`,`name`) VALUES (?,DEFAULT)",
            build_insert(
                "db",
                "t",
                &["`id`".to_owned(), "`name`".to_owned()],
                &["?".to_owned(), "DEFAULT".to_owned()]
            )
        );
    }

    #[test]
    fn join_is_not_updatable() {
        let mut columns = columns();
        columns.push(ColumnMetadata::new("other", SqlDataType::Integer, "u").with_catalog("db"));

        assert!(matches!(base_table(&columns), Err(Error::NotUpdatable)));
    }

    #[test]
    fn expressions_do_not_belong_to_a_table() {
        let mut columns = columns();
        columns.push(ColumnMetadata {
            name: "COUNT(*)".to_owned(),
            ..ColumnMetadata::default()
        });

        assert_eq!(
            ("db".to_owned(), "t".to_owned()),
            base_table(&columns).unwrap()
        );
    }

    #[test]
    fn rewrite_positioned_command_on_key() {
        let snapshot = snapshot(columns(), vec![Value::Int(7), Value::Text(b"x".to_vec())]);
        let target = PositionedTarget::new("c1", &snapshot);

        assert_eq!(
            "UPDATE t SET name=? WHERE `id`=?",
            target.rewrite("UPDATE t SET name=?")
        );
        assert_eq!(1, target.key_count());
        assert_eq!(vec![Param::Value(Value::Int(7))], target.key_params(&snapshot));
    }

    #[test]
    fn rewrite_positioned_command_without_key() {
        let columns = vec![
            ColumnMetadata::new("a", SqlDataType::Integer, "t"),
            ColumnMetadata::new("b", SqlDataType::Integer, "t"),
        ];
        let snapshot = snapshot(columns, vec![Value::Int(1), Value::Null]);
        let target = PositionedTarget::new("c1", &snapshot);

        assert_eq!(
            "DELETE FROM t WHERE `a`<=>? AND `b`<=>? LIMIT 1",
            target.rewrite("DELETE FROM t")
        );
        assert_eq!(
            vec![Param::Value(Value::Int(1)), Param::null()],
            target.key_params(&snapshot)
        );
    }
}
