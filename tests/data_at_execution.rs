mod common;

use common::{Event, connect, server};

use odbc_driver_core::{
    Error, ParamBinding, ParamData, PutData,
    buffers::{ColumnBuffer, Indicator},
    handles::{Outcome, Param, Value},
    sys::{CDataType, SqlDataType},
};

const INSERT: &str = "INSERT INTO movies (title, year) VALUES (?, ?)";

fn data_at_exec(array_size: usize) -> Box<ColumnBuffer> {
    let indicators = vec![Indicator::DataAtExec(None); array_size];
    Box::new(ColumnBuffer::new(0, array_size).with_indicators(&indicators))
}

fn long_data_of(server: &common::Server) -> Vec<Vec<u8>> {
    server
        .borrow()
        .events
        .iter()
        .filter_map(|event| match event {
            Event::LongData { bytes, .. } => Some(bytes.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn send_title_in_chunks() -> anyhow::Result<()> {
    let server = server();
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();
    stmt.prepare(INSERT)?;
    stmt.bind_parameter(
        1,
        ParamBinding::input(CDataType::Char, SqlDataType::LongVarchar),
        data_at_exec(1),
    )?;
    stmt.bind_parameter(
        2,
        ParamBinding::input(CDataType::SLong, SqlDataType::Integer),
        Box::new(ColumnBuffer::from_values(&[Some(1982i32)])),
    )?;

    assert_eq!(Outcome::NeedData, stmt.execute()?);
    assert_eq!(ParamData::NeedData { parameter: 1 }, stmt.param_data()?);
    stmt.put_data(1, PutData::Chunk(b"Blade "))?;
    stmt.put_data(1, PutData::Chunk(b"Runner"))?;
    let done = stmt.param_data()?;

    assert_eq!(ParamData::Done(Outcome::Success), done);
    assert_eq!(vec![b"Blade ".to_vec(), b"Runner".to_vec()], long_data_of(&server));
    let expected = Event::Execute {
        sql: INSERT.to_owned(),
        params: vec![
            Param::Value(Value::Bytes(b"Blade Runner".to_vec())),
            Param::Value(Value::Int(1982)),
        ],
    };
    assert_eq!(Some(&expected), server.borrow().events.last());
    assert_eq!(1, stmt.row_count());
    Ok(())
}

#[test]
fn put_data_for_wrong_parameter() -> anyhow::Result<()> {
    let server = server();
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();
    stmt.prepare(INSERT)?;
    stmt.bind_parameter(
        1,
        ParamBinding::input(CDataType::Char, SqlDataType::LongVarchar),
        data_at_exec(1),
    )?;
    stmt.bind_parameter(
        2,
        ParamBinding::input(CDataType::SLong, SqlDataType::Integer),
        Box::new(ColumnBuffer::from_values(&[Some(1982i32)])),
    )?;
    stmt.execute()?;

    // Data has not been asked for yet.
    assert!(matches!(
        stmt.put_data(1, PutData::Chunk(b"x")),
        Err(Error::SequenceError(_))
    ));
    stmt.param_data()?;
    assert!(matches!(
        stmt.put_data(2, PutData::Chunk(b"x")),
        Err(Error::SequenceError(_))
    ));

    // The statement is still waiting for parameter 1 and completes once it got it.
    stmt.put_data(1, PutData::Chunk(b"Tron"))?;
    assert_eq!(ParamData::Done(Outcome::Success), stmt.param_data()?);
    Ok(())
}

#[test]
fn other_operations_are_out_of_sequence_while_data_is_pending() -> anyhow::Result<()> {
    let server = server();
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();
    stmt.prepare("INSERT INTO movies (title) VALUES (?)")?;
    stmt.bind_parameter(
        1,
        ParamBinding::input(CDataType::Char, SqlDataType::LongVarchar),
        data_at_exec(1),
    )?;
    stmt.execute()?;

    assert!(matches!(stmt.execute(), Err(Error::SequenceError(_))));
    assert!(matches!(stmt.fetch(), Err(Error::SequenceError(_))));

    stmt.close()?;
    assert!(matches!(stmt.param_data(), Err(Error::SequenceError(_))));
    Ok(())
}

#[test]
fn put_null() -> anyhow::Result<()> {
    let server = server();
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();
    stmt.prepare("INSERT INTO movies (title) VALUES (?)")?;
    stmt.bind_parameter(
        1,
        ParamBinding::input(CDataType::Char, SqlDataType::LongVarchar),
        data_at_exec(1),
    )?;
    stmt.execute()?;
    stmt.param_data()?;

    stmt.put_data(1, PutData::Null)?;
    assert!(matches!(
        stmt.put_data(1, PutData::Chunk(b"late")),
        Err(Error::ConcatenateNull)
    ));
    stmt.param_data()?;

    let expected = Event::Execute {
        sql: "INSERT INTO movies (title) VALUES (?)".to_owned(),
        params: vec![Param::null()],
    };
    assert_eq!(Some(&expected), server.borrow().events.last());
    Ok(())
}

#[test]
fn null_after_data_is_rejected() -> anyhow::Result<()> {
    let server = server();
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();
    stmt.prepare("INSERT INTO movies (title) VALUES (?)")?;
    stmt.bind_parameter(
        1,
        ParamBinding::input(CDataType::Char, SqlDataType::LongVarchar),
        data_at_exec(1),
    )?;
    stmt.execute()?;
    stmt.param_data()?;
    stmt.put_data(1, PutData::Chunk(b"Brazil"))?;

    let error = stmt.put_data(1, PutData::Null).unwrap_err();

    assert_eq!("HY020", error.state().as_str());
    // The data already sent still makes it to the server.
    stmt.param_data()?;
    let expected = Event::Execute {
        sql: "INSERT INTO movies (title) VALUES (?)".to_owned(),
        params: vec![Param::Value(Value::Bytes(b"Brazil".to_vec()))],
    };
    assert_eq!(Some(&expected), server.borrow().events.last());
    Ok(())
}

#[test]
fn aborted_execution_forgets_null_put_at_execution() -> anyhow::Result<()> {
    let server = server();
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();
    stmt.prepare(INSERT)?;
    stmt.bind_parameter(
        1,
        ParamBinding::input(CDataType::Char, SqlDataType::LongVarchar),
        data_at_exec(1),
    )?;
    // Parameter 2 is missing, so the execution fails once the data of parameter 1 is complete.
    stmt.execute()?;
    stmt.param_data()?;
    stmt.put_data(1, PutData::Null)?;
    let error = stmt.param_data().unwrap_err();
    assert!(matches!(error, Error::UnboundParameter(2)));

    stmt.bind_parameter(
        2,
        ParamBinding::input(CDataType::SLong, SqlDataType::Integer),
        Box::new(ColumnBuffer::from_values(&[Some(1985i32)])),
    )?;
    assert_eq!(Outcome::NeedData, stmt.execute()?);
    assert_eq!(ParamData::NeedData { parameter: 1 }, stmt.param_data()?);
    stmt.put_data(1, PutData::Chunk(b"Brazil"))?;
    stmt.param_data()?;

    let expected = Event::Execute {
        sql: INSERT.to_owned(),
        params: vec![
            Param::Value(Value::Bytes(b"Brazil".to_vec())),
            Param::Value(Value::Int(1985)),
        ],
    };
    assert_eq!(Some(&expected), server.borrow().events.last());
    Ok(())
}

#[test]
fn wide_chunks_are_sent_in_connection_character_set() -> anyhow::Result<()> {
    let server = server();
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();
    stmt.prepare("INSERT INTO movies (title) VALUES (?)")?;
    stmt.bind_parameter(
        1,
        ParamBinding::input(CDataType::WChar, SqlDataType::WLongVarchar),
        data_at_exec(1),
    )?;
    stmt.execute()?;
    stmt.param_data()?;

    let wide: Vec<u8> = "Amélie".encode_utf16().flat_map(u16::to_ne_bytes).collect();
    assert!(matches!(
        stmt.put_data(1, PutData::Chunk(&wide[..3])),
        Err(Error::InvalidBufferLength)
    ));
    stmt.put_data(1, PutData::Chunk(&wide))?;
    stmt.param_data()?;

    assert_eq!(vec!["Amélie".as_bytes().to_vec()], long_data_of(&server));
    Ok(())
}

#[test]
fn each_row_of_an_array_asks_for_its_data() -> anyhow::Result<()> {
    let server = server();
    let conn = connect(&server);
    let mut stmt = conn.allocate_statement();
    stmt.options_mut().paramset_size = 2;
    stmt.prepare("INSERT INTO movies (title) VALUES (?)")?;
    stmt.bind_parameter(
        1,
        ParamBinding::input(CDataType::Char, SqlDataType::LongVarchar),
        data_at_exec(2),
    )?;

    assert_eq!(Outcome::NeedData, stmt.execute()?);
    for title in ["Heat", "Ronin"] {
        assert_eq!(ParamData::NeedData { parameter: 1 }, stmt.param_data()?);
        stmt.put_data(1, PutData::Chunk(title.as_bytes()))?;
    }
    assert_eq!(ParamData::Done(Outcome::Success), stmt.param_data()?);

    assert_eq!(2, stmt.row_count());
    let titles: Vec<Vec<Param>> = server
        .borrow()
        .events
        .iter()
        .filter_map(|event| match event {
            Event::Execute { params, .. } => Some(params.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        vec![
            vec![Param::Value(Value::Bytes(b"Heat".to_vec()))],
            vec![Param::Value(Value::Bytes(b"Ronin".to_vec()))],
        ],
        titles
    );
    Ok(())
}
