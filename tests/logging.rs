//! Test for logging is isolated in its own module to avoid messing with the global settings of
//! other, non-logging related tests.
mod common;

use std::{cell::RefCell, rc::Rc};

use common::{MockServer, Script, connect};
use log::Level;
use odbc_driver_core::{
    ParamBinding,
    buffers::ColumnBuffer,
    handles::{Record, State, Value, log_diagnostics},
    sys::{CDataType, SqlDataType},
};

#[test]
fn emit_a_warning_for_each_diagnostic() {
    // Given two diagnostic records
    let records = [
        Record::warning(State::GENERAL_WARNING, "first diagnostic"),
        Record::warning(State::GENERAL_WARNING, "second diagnostic"),
    ];

    testing_logger::setup();

    // When logging them
    log_diagnostics(&records[..]);

    // Both diagnostics are logged as warnings
    testing_logger::validate(|captured_logs| {
        assert_eq!(captured_logs.len(), 2);
        assert_eq!(captured_logs[0].level, Level::Warn);
        assert!(captured_logs[0].body.contains("first diagnostic"));
        assert_eq!(captured_logs[1].level, Level::Warn);
        assert!(captured_logs[1].body.contains("second diagnostic"));
    });
}

#[test]
fn failing_rows_are_logged_with_their_native_error() {
    // Not initialized with `common::server`, which installs a different logger.
    let server = Rc::new(RefCell::new(MockServer::default()));
    server.borrow_mut().script(
        "DELETE FROM movies",
        Script::affecting(&[1]).failing_when(Value::Int(2)),
    );
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();
    stmt.options_mut().paramset_size = 2;
    stmt.prepare("DELETE FROM movies WHERE id=?").unwrap();
    stmt.bind_parameter(
        1,
        ParamBinding::input(CDataType::SLong, SqlDataType::Integer),
        Box::new(ColumnBuffer::from_values(&[Some(1i32), Some(2)])),
    )
    .unwrap();

    testing_logger::setup();
    stmt.execute().unwrap();

    testing_logger::validate(|captured_logs| {
        let warnings: Vec<_> = captured_logs
            .iter()
            .filter(|log| log.level == Level::Warn)
            .collect();
        assert_eq!(1, warnings.len());
        assert!(warnings[0].body.contains("23000"));
        assert!(warnings[0].body.contains("1062"));
    });
}
