//! Scripted in-memory backend. Statements are answered according to scripts registered for a
//! prefix of their text. Every exchange with the "server" is recorded as an [`Event`].

#![allow(dead_code)]
use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use odbc_driver_core::{
    Connection, ConnectionOptions,
    handles::{Backend, BackendStatement, ColumnMetadata, Execution, Param, Record, State, Value},
    sys::SqlDataType,
};

pub type Server = Rc<RefCell<MockServer>>;

/// Enables log output of failing tests, e.g. with `RUST_LOG=odbc_driver_core=debug`.
pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn server() -> Server {
    init();
    Rc::new(RefCell::new(MockServer::default()))
}

pub fn connect(server: &Server) -> Connection<MockBackend> {
    Connection::new(MockBackend {
        server: server.clone(),
    })
}

pub fn connect_with(server: &Server, options: ConnectionOptions) -> Connection<MockBackend> {
    Connection::with_options(
        MockBackend {
            server: server.clone(),
        },
        options,
    )
}

/// Columns `id` (primary key), `title` and `year` of table `db.movies`.
pub fn movie_columns() -> Vec<ColumnMetadata> {
    vec![
        ColumnMetadata::new("id", SqlDataType::Integer, "movies")
            .with_catalog("db")
            .primary_key(),
        ColumnMetadata::new("title", SqlDataType::Varchar, "movies")
            .with_catalog("db")
            .with_octet_length(255),
        ColumnMetadata::new("year", SqlDataType::Integer, "movies").with_catalog("db"),
    ]
}

/// `count` movies with ids starting at `1`.
pub fn movies(count: i64) -> Vec<Vec<Value>> {
    (1..=count)
        .map(|id| {
            vec![
                Value::Int(id),
                Value::Text(format!("Movie {id}").into_bytes()),
                Value::Int(1990 + id),
            ]
        })
        .collect()
}

/// How the server answers statements starting with a given text.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// A non empty column list makes the statement produce a result set.
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<Value>>,
    /// Affected rows of consecutive executions, repeated from the start once exhausted.
    pub affected: Vec<u64>,
    /// Executions with this value among their parameters fail with a duplicate key error.
    pub fail_when: Option<Value>,
    /// Every execution fails as if the server went away.
    pub failing: bool,
    pub out_params: Vec<Value>,
    executions: usize,
}

impl Script {
    pub fn result_set(columns: Vec<ColumnMetadata>, rows: Vec<Vec<Value>>) -> Self {
        Script {
            columns,
            rows,
            ..Script::default()
        }
    }

    pub fn affecting(affected: &[u64]) -> Self {
        Script {
            affected: affected.to_vec(),
            ..Script::default()
        }
    }

    pub fn failing_when(mut self, value: Value) -> Self {
        self.fail_when = Some(value);
        self
    }

    pub fn with_out_params(mut self, values: Vec<Value>) -> Self {
        self.out_params = values;
        self
    }

    fn next_affected(&mut self) -> u64 {
        let affected = if self.affected.is_empty() {
            1
        } else {
            self.affected[self.executions % self.affected.len()]
        };
        self.executions += 1;
        affected
    }

    fn check(&self, params: &[Param]) -> Result<(), Record> {
        if self.failing {
            return Err(lost_connection());
        }
        match &self.fail_when {
            Some(value) if params.contains(&Param::Value(value.clone())) => Err(duplicate_key()),
            _ => Ok(()),
        }
    }
}

/// Exchange with the server, as recorded by [`MockServer`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Prepare(String),
    /// Parameters sent as long data are reported as [`Value::Bytes`].
    Execute { sql: String, params: Vec<Param> },
    ExecuteBulk { sql: String, rows: Vec<Vec<Param>> },
    Query(String),
    LongData { param: usize, bytes: Vec<u8> },
    /// The streamed result has been read to its end, caching this many rows.
    Cache { rows: usize },
}

#[derive(Debug, Clone, Copy)]
struct Stream {
    statement: u64,
    total: usize,
    read: usize,
}

#[derive(Debug, Default)]
pub struct MockServer {
    scripts: Vec<(String, Script)>,
    pub events: Vec<Event>,
    stream: Option<Stream>,
    next_statement: u64,
}

impl MockServer {
    pub fn script(&mut self, prefix: &str, script: Script) {
        self.scripts.push((prefix.to_owned(), script));
    }

    /// Changes the rows returned by the next execution of statements starting with `prefix`.
    pub fn set_rows(&mut self, prefix: &str, rows: Vec<Vec<Value>>) {
        if let Some((_, script)) = self.scripts.iter_mut().find(|(p, _)| p == prefix) {
            script.rows = rows;
        }
    }

    /// Makes executions of statements starting with `prefix` fail, or succeed again.
    pub fn set_failing(&mut self, prefix: &str, failing: bool) {
        if let Some((_, script)) = self.scripts.iter_mut().find(|(p, _)| p == prefix) {
            script.failing = failing;
        }
    }

    /// Statements sent to the server by execute, bulk execute or query, in order.
    pub fn executed(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Execute { sql, .. } | Event::ExecuteBulk { sql, .. } | Event::Query(sql) => {
                    Some(sql.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn script_mut(&mut self, sql: &str) -> Option<&mut Script> {
        self.scripts
            .iter_mut()
            .find(|(prefix, _)| sql.starts_with(prefix.as_str()))
            .map(|(_, script)| script)
    }

    /// Only the statement streaming a result may talk to the server.
    fn check_wire(&self, statement: Option<u64>) -> Result<(), Record> {
        match self.stream {
            Some(stream) if Some(stream.statement) != statement => Err(out_of_sync()),
            _ => Ok(()),
        }
    }

    fn is_streaming(&self, statement: u64) -> bool {
        self.stream.is_some_and(|stream| stream.statement == statement)
    }
}

fn duplicate_key() -> Record {
    Record::new(
        State(*b"23000"),
        1062,
        "Duplicate entry for key 'PRIMARY'",
    )
}

fn lost_connection() -> Record {
    Record::new(
        State(*b"08S01"),
        2013,
        "Lost connection to server during query",
    )
}

fn out_of_sync() -> Record {
    Record::new(
        State::GENERAL_ERROR,
        2014,
        "Commands out of sync; you can't run this command now",
    )
}

pub struct MockBackend {
    server: Server,
}

impl Backend for MockBackend {
    type Statement = MockStatement;

    fn prepare(&mut self, sql: &str, stream_results: bool) -> Result<MockStatement, Record> {
        let mut server = self.server.borrow_mut();
        server.check_wire(None)?;
        server.events.push(Event::Prepare(sql.to_owned()));
        server.next_statement += 1;
        let columns = server
            .script_mut(sql)
            .map(|script| script.columns.clone())
            .unwrap_or_default();
        Ok(MockStatement {
            server: self.server.clone(),
            id: server.next_statement,
            sql: sql.to_owned(),
            stream_results,
            columns,
            params: Vec::new(),
            param_rows: Vec::new(),
            long_data: BTreeMap::new(),
            rows: Vec::new(),
            current: 0,
            out_params: Vec::new(),
        })
    }

    fn query(&mut self, sql: &str) -> Result<u64, Record> {
        let mut server = self.server.borrow_mut();
        server.check_wire(None)?;
        server.events.push(Event::Query(sql.to_owned()));
        Ok(server
            .script_mut(sql)
            .map_or(1, |script| script.next_affected()))
    }

    fn cache_rest_of_stream(&mut self) -> Result<u64, Record> {
        let mut server = self.server.borrow_mut();
        let Some(stream) = server.stream.take() else {
            return Ok(0);
        };
        let rows = stream.total - stream.read;
        server.events.push(Event::Cache { rows });
        Ok(rows as u64)
    }

    fn more_results(&self) -> bool {
        false
    }
}

pub struct MockStatement {
    server: Server,
    id: u64,
    sql: String,
    stream_results: bool,
    columns: Vec<ColumnMetadata>,
    params: Vec<Param>,
    param_rows: Vec<Vec<Param>>,
    long_data: BTreeMap<usize, Vec<u8>>,
    rows: Vec<Vec<Value>>,
    /// One based, `0` is before the first row.
    current: usize,
    out_params: Vec<Value>,
}

impl BackendStatement for MockStatement {
    fn param_count(&self) -> usize {
        self.sql.matches('?').count()
    }

    fn column_metadata(&self) -> Vec<ColumnMetadata> {
        self.columns.clone()
    }

    fn bind_parameters(&mut self, params: &[Param]) -> Result<(), Record> {
        self.params = params.to_vec();
        Ok(())
    }

    fn bind_parameter_array(
        &mut self,
        rows: &[Vec<Param>],
        rows_to_skip: &[bool],
    ) -> Result<(), Record> {
        self.param_rows = rows
            .iter()
            .zip(rows_to_skip)
            .filter(|(_, skip)| !**skip)
            .map(|(row, _)| row.clone())
            .collect();
        Ok(())
    }

    fn execute_one(&mut self) -> Result<Execution, Record> {
        let mut server = self.server.borrow_mut();
        server.check_wire(Some(self.id))?;
        let mut long_data = std::mem::take(&mut self.long_data);
        let params: Vec<Param> = self
            .params
            .iter()
            .enumerate()
            .map(|(index, param)| match param {
                Param::LongData => {
                    Param::Value(Value::Bytes(long_data.remove(&index).unwrap_or_default()))
                }
                other => other.clone(),
            })
            .collect();
        server.events.push(Event::Execute {
            sql: self.sql.clone(),
            params: params.clone(),
        });
        self.rows.clear();
        self.current = 0;

        let Some(script) = server.script_mut(&self.sql) else {
            if self.sql.to_ascii_uppercase().starts_with("SELECT") {
                return Ok(Execution::HasResultSet);
            }
            return Ok(Execution::RowsAffected(1));
        };
        script.check(&params)?;
        if script.columns.is_empty() {
            self.out_params = script.out_params.clone();
            return Ok(Execution::RowsAffected(script.next_affected()));
        }
        self.columns = script.columns.clone();
        self.rows = script.rows.clone();
        let total = self.rows.len();
        if self.stream_results {
            server.stream = Some(Stream {
                statement: self.id,
                total,
                read: 0,
            });
        }
        Ok(Execution::HasResultSet)
    }

    fn execute_bulk(&mut self, _array_size: usize) -> Result<u64, Record> {
        let mut server = self.server.borrow_mut();
        server.check_wire(Some(self.id))?;
        let rows = std::mem::take(&mut self.param_rows);
        server.events.push(Event::ExecuteBulk {
            sql: self.sql.clone(),
            rows: rows.clone(),
        });
        let Some(script) = server.script_mut(&self.sql) else {
            return Ok(rows.len() as u64);
        };
        for row in &rows {
            script.check(row)?;
        }
        Ok(rows.iter().map(|_| script.next_affected()).sum())
    }

    fn fetch_next(&mut self) -> Result<bool, Record> {
        let mut server = self.server.borrow_mut();
        let streaming = server.is_streaming(self.id);
        if self.current >= self.rows.len() {
            if streaming {
                server.stream = None;
            }
            return Ok(false);
        }
        self.current += 1;
        if let Some(stream) = server.stream.as_mut().filter(|_| streaming) {
            stream.read = self.current;
        }
        Ok(true)
    }

    fn column(&self, index: usize) -> Result<Value, Record> {
        self.current
            .checked_sub(1)
            .and_then(|row| self.rows.get(row))
            .and_then(|row| row.get(index))
            .cloned()
            .ok_or_else(|| Record::new(State::GENERAL_ERROR, 0, "No current row"))
    }

    fn send_long_data(&mut self, param_index: usize, bytes: &[u8]) -> Result<(), Record> {
        let mut server = self.server.borrow_mut();
        server.check_wire(Some(self.id))?;
        server.events.push(Event::LongData {
            param: param_index,
            bytes: bytes.to_vec(),
        });
        self.long_data
            .entry(param_index)
            .or_default()
            .extend_from_slice(bytes);
        Ok(())
    }

    fn row_count(&self) -> Option<u64> {
        if self.is_streaming() {
            None
        } else {
            Some(self.rows.len() as u64)
        }
    }

    fn seek(&mut self, absolute_row: u64) -> Result<(), Record> {
        if self.is_streaming() {
            return Err(Record::new(
                State::GENERAL_ERROR,
                0,
                "Can not seek within a streamed result",
            ));
        }
        self.current = absolute_row as usize;
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.server.borrow().is_streaming(self.id)
    }

    fn has_out_params(&self) -> bool {
        !self.out_params.is_empty()
    }

    fn out_params(&mut self) -> Result<Vec<Value>, Record> {
        Ok(std::mem::take(&mut self.out_params))
    }
}
