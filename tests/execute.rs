mod common;

use common::{Event, Script, connect, server};

use odbc_driver_core::{
    Error, ParamBinding, ParamStatus, StatementState,
    buffers::{ColumnBuffer, Indicator, RowBuffer},
    handles::{Outcome, Param, State, Value},
    sys::{CDataType, SqlDataType},
};

fn title_binding() -> ParamBinding {
    ParamBinding::input(CDataType::Char, SqlDataType::Varchar)
}

fn integer_binding() -> ParamBinding {
    ParamBinding::input(CDataType::SLong, SqlDataType::Integer)
}

#[test]
fn insert_single_row() -> anyhow::Result<()> {
    let server = server();
    server
        .borrow_mut()
        .script("INSERT INTO movies", Script::affecting(&[1]));
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();

    stmt.prepare("INSERT INTO movies (title, year) VALUES (?, ?)")?;
    assert_eq!(2, stmt.param_count());
    stmt.bind_parameter(
        1,
        title_binding(),
        Box::new(ColumnBuffer::from_text(32, &[Some("Alien")])),
    )?;
    stmt.bind_parameter(
        2,
        integer_binding(),
        Box::new(ColumnBuffer::from_values(&[Some(1979i32)])),
    )?;
    let outcome = stmt.execute()?;

    assert_eq!(Outcome::Success, outcome);
    assert_eq!(1, stmt.row_count());
    assert_eq!(StatementState::Executed, stmt.state());
    let expected = Event::Execute {
        sql: "INSERT INTO movies (title, year) VALUES (?, ?)".to_owned(),
        params: vec![
            Param::Value(Value::Text(b"Alien".to_vec())),
            Param::Value(Value::Int(1979)),
        ],
    };
    assert_eq!(Some(&expected), server.borrow().events.last());
    Ok(())
}

#[test]
fn bulk_insert_sums_affected_rows() -> anyhow::Result<()> {
    let server = server();
    server
        .borrow_mut()
        .script("INSERT INTO movies", Script::affecting(&[1]));
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();
    stmt.options_mut().paramset_size = 3;

    stmt.prepare("INSERT INTO movies (year) VALUES (?)")?;
    stmt.bind_parameter(
        1,
        integer_binding(),
        Box::new(ColumnBuffer::from_values(&[Some(1), Some(2), Some(3)])),
    )?;
    let outcome = stmt.execute()?;

    assert_eq!(Outcome::Success, outcome);
    assert_eq!(3, stmt.row_count());
    assert_eq!(3, stmt.params_processed());
    assert_eq!(&[ParamStatus::Success; 3], stmt.param_status());
    let rows = match server.borrow().events.last() {
        Some(Event::ExecuteBulk { rows, .. }) => rows.len(),
        other => panic!("Expected bulk execution, got {other:?}"),
    };
    assert_eq!(3, rows);
    Ok(())
}

#[test]
fn ignored_rows_are_not_sent() -> anyhow::Result<()> {
    let server = server();
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();
    stmt.options_mut().paramset_size = 3;

    stmt.prepare("INSERT INTO movies (year) VALUES (?)")?;
    stmt.bind_parameter(
        1,
        integer_binding(),
        Box::new(ColumnBuffer::from_values(&[Some(1), Some(2), Some(3)])),
    )?;
    stmt.set_param_operations(Some(vec![false, true, false]));
    stmt.execute()?;

    assert_eq!(
        &[ParamStatus::Success, ParamStatus::Unused, ParamStatus::Success],
        stmt.param_status()
    );
    let expected = Event::ExecuteBulk {
        sql: "INSERT INTO movies (year) VALUES (?)".to_owned(),
        rows: vec![
            vec![Param::Value(Value::Int(1))],
            vec![Param::Value(Value::Int(3))],
        ],
    };
    assert_eq!(Some(&expected), server.borrow().events.last());
    Ok(())
}

#[test]
fn one_failing_row_of_many() -> anyhow::Result<()> {
    let server = server();
    server.borrow_mut().script(
        "DELETE FROM movies",
        Script::affecting(&[1]).failing_when(Value::Int(2)),
    );
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();
    stmt.options_mut().paramset_size = 3;

    stmt.prepare("DELETE FROM movies WHERE id=?")?;
    stmt.bind_parameter(
        1,
        integer_binding(),
        Box::new(ColumnBuffer::from_values(&[Some(1), Some(2), Some(3)])),
    )?;
    let outcome = stmt.execute()?;

    assert_eq!(Outcome::SuccessWithInfo, outcome);
    assert_eq!(
        &[
            ParamStatus::Success,
            ParamStatus::DiagUnavailable,
            ParamStatus::Success
        ],
        stmt.param_status()
    );
    assert_eq!(2, stmt.row_count());
    assert_eq!(3, stmt.params_processed());
    let record = &stmt.diagnostics()[0];
    assert_eq!("23000", record.state.as_str());
    assert_eq!(1062, record.native_error);
    Ok(())
}

#[test]
fn every_row_failing_fails_the_call() {
    let server = server();
    server.borrow_mut().script(
        "DELETE FROM movies",
        Script::affecting(&[1]).failing_when(Value::Int(7)),
    );
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();
    stmt.options_mut().paramset_size = 2;

    stmt.prepare("DELETE FROM movies WHERE id=?").unwrap();
    stmt.bind_parameter(
        1,
        integer_binding(),
        Box::new(ColumnBuffer::from_values(&[Some(7), Some(7)])),
    )
    .unwrap();
    let error = stmt.execute().unwrap_err();

    assert_eq!("23000", error.state().as_str());
    assert_eq!(
        &[ParamStatus::DiagUnavailable, ParamStatus::Error],
        stmt.param_status()
    );
    assert_eq!(2, stmt.diagnostics().len());
}

#[test]
fn failing_bulk_execution_leaves_status_unknown() {
    let server = server();
    server.borrow_mut().script(
        "INSERT INTO movies",
        Script::affecting(&[1]).failing_when(Value::Int(2)),
    );
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();
    stmt.options_mut().paramset_size = 2;

    stmt.prepare("INSERT INTO movies (year) VALUES (?)").unwrap();
    stmt.bind_parameter(
        1,
        integer_binding(),
        Box::new(ColumnBuffer::from_values(&[Some(1), Some(2)])),
    )
    .unwrap();
    let error = stmt.execute().unwrap_err();

    assert!(matches!(error, Error::Backend { .. }));
    assert_eq!(&[ParamStatus::DiagUnavailable; 2], stmt.param_status());
}

#[test]
fn conversion_failure_skips_the_row() -> anyhow::Result<()> {
    let server = server();
    server
        .borrow_mut()
        .script("INSERT INTO movies", Script::affecting(&[1]));
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();
    stmt.options_mut().paramset_size = 2;

    stmt.prepare("INSERT INTO movies (year) VALUES (?)")?;
    stmt.bind_parameter(
        1,
        ParamBinding::input(CDataType::Char, SqlDataType::Integer),
        Box::new(ColumnBuffer::from_text(8, &[Some("1999"), Some("soon")])),
    )?;
    let outcome = stmt.execute()?;

    assert_eq!(Outcome::SuccessWithInfo, outcome);
    assert_eq!(
        &[ParamStatus::Success, ParamStatus::Error],
        stmt.param_status()
    );
    assert_eq!(1, stmt.row_count());
    Ok(())
}

#[test]
fn unbound_parameter() {
    let server = server();
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();

    stmt.prepare("INSERT INTO movies (title) VALUES (?)").unwrap();
    let error = stmt.execute().unwrap_err();

    assert!(matches!(error, Error::UnboundParameter(1)));
    assert_eq!(State::COUNT_FIELD_INCORRECT, stmt.diagnostics()[0].state);
}

#[test]
fn execute_requires_prepare() {
    let server = server();
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();

    let error = stmt.execute().unwrap_err();

    assert!(matches!(error, Error::SequenceError(_)));
    assert!(server.borrow().events.is_empty());
}

#[test]
fn reject_too_short_statement() {
    let server = server();
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();

    let error = stmt.prepare("  ab ").unwrap_err();

    assert_eq!(State::SYNTAX_ERROR, error.state());
}

#[test]
fn default_parameter() -> anyhow::Result<()> {
    let server = server();
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();

    stmt.prepare("INSERT INTO movies (year) VALUES (?)")?;
    let buffer = ColumnBuffer::for_type::<i32>(1).with_indicators(&[Indicator::Default]);
    stmt.bind_parameter(1, integer_binding(), Box::new(buffer))?;
    stmt.execute()?;

    let expected = Event::Execute {
        sql: "INSERT INTO movies (year) VALUES (?)".to_owned(),
        params: vec![Param::Default],
    };
    assert_eq!(Some(&expected), server.borrow().events.last());
    Ok(())
}

#[test]
fn output_parameter() -> anyhow::Result<()> {
    let server = server();
    server.borrow_mut().script(
        "CALL count_movies",
        Script::affecting(&[0]).with_out_params(vec![Value::Null, Value::Int(42)]),
    );
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();

    stmt.prepare("CALL count_movies(?, ?)")?;
    stmt.bind_parameter(
        1,
        integer_binding(),
        Box::new(ColumnBuffer::from_values(&[Some(1990)])),
    )?;
    stmt.bind_parameter(
        2,
        ParamBinding::output(CDataType::SLong, SqlDataType::Integer),
        Box::new(ColumnBuffer::for_type::<i32>(1)),
    )?;
    stmt.execute()?;

    assert_eq!(StatementState::OutParamsFetched, stmt.state());
    let buffer: &dyn RowBuffer = stmt.parameter_buffer(2).unwrap();
    assert_eq!(Some(42), buffer.value::<i32>(0));
    // Output only parameters are sent as NULL.
    let expected = Event::Execute {
        sql: "CALL count_movies(?, ?)".to_owned(),
        params: vec![Param::Value(Value::Int(1990)), Param::null()],
    };
    assert_eq!(Some(&expected), server.borrow().events.last());
    Ok(())
}

#[test]
fn change_bound_value_between_executions() -> anyhow::Result<()> {
    let server = server();
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();
    stmt.prepare("DELETE FROM movies WHERE id=?")?;
    stmt.bind_parameter(
        1,
        integer_binding(),
        Box::new(ColumnBuffer::from_values(&[Some(1i32)])),
    )?;
    stmt.execute()?;

    let ids: &mut dyn RowBuffer = stmt.parameter_buffer_mut(1).unwrap();
    ids.set_value(0, Some(2i32));
    stmt.execute()?;

    let expected = Event::Execute {
        sql: "DELETE FROM movies WHERE id=?".to_owned(),
        params: vec![Param::Value(Value::Int(2))],
    };
    assert_eq!(Some(&expected), server.borrow().events.last());
    Ok(())
}

#[test]
fn exec_direct_keeps_bindings() -> anyhow::Result<()> {
    let server = server();
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();

    stmt.bind_parameter(
        1,
        integer_binding(),
        Box::new(ColumnBuffer::from_values(&[Some(2001)])),
    )?;
    stmt.exec_direct("INSERT INTO movies (year) VALUES (?)")?;
    stmt.exec_direct("UPDATE movies SET year=?")?;

    let expected = Event::Execute {
        sql: "UPDATE movies SET year=?".to_owned(),
        params: vec![Param::Value(Value::Int(2001))],
    };
    assert_eq!(Some(&expected), server.borrow().events.last());

    // Prepare starts over without any bindings.
    stmt.prepare("UPDATE movies SET year=?")?;
    assert!(matches!(stmt.execute(), Err(Error::UnboundParameter(1))));
    Ok(())
}

#[test]
fn reexecute_prepared_statement() -> anyhow::Result<()> {
    let server = server();
    server
        .borrow_mut()
        .script("UPDATE movies", Script::affecting(&[4, 2]));
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();

    stmt.prepare("UPDATE movies SET year=year+1")?;
    stmt.execute()?;
    assert_eq!(4, stmt.row_count());
    stmt.execute()?;
    assert_eq!(2, stmt.row_count());

    let prepares = server
        .borrow()
        .events
        .iter()
        .filter(|event| matches!(event, Event::Prepare(_)))
        .count();
    assert_eq!(1, prepares);
    Ok(())
}
