//! Client/driver scenarios over the in-process transport.
//!
//! Every test runs a `MemoryBackend` behind a `Dispatcher` task, so the full
//! wire protocol is exercised without spawning processes.

use async_trait::async_trait;
use dbmi::prelude::*;
use dbmi::protocol::{WireReader, WireWriter};
use dbmi::schema::{GRANT_PUBLIC, PRIV_SELECT};
use pretty_assertions::assert_eq;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

fn rybniky() -> (Table, Vec<Vec<Value>>) {
    let table = Table::new(
        "rybniky",
        vec![
            Column::new("cat", SqlType::Integer),
            Column::new("kapri", SqlType::Character).length(20),
            Column::new("pocet", SqlType::Integer),
        ],
    );
    let rows = vec![
        vec![Value::Int(1), Value::string("hodne"), Value::Int(120)],
        vec![Value::Int(4), Value::string("malo"), Value::Int(3)],
        vec![Value::Int(2), Value::string("hodne"), Value::Int(80)],
        vec![Value::Int(3), Value::string("hodne"), Value::Null],
    ];
    (table, rows)
}

fn backend() -> MemoryBackend {
    let mut backend = MemoryBackend::new();
    backend.add_database("gis", vec![rybniky()]);
    backend
}

async fn connect(backend: MemoryBackend) -> Driver {
    let transport = InProcessTransport::spawn(backend);
    Driver::connect("mem", Box::new(transport)).await.unwrap()
}

async fn open(backend: MemoryBackend) -> Driver {
    let mut driver = connect(backend).await;
    driver.open_database(&Handle::new("gis")).await.unwrap();
    driver
}

#[tokio::test]
async fn test_select_scenario() -> DbmiResult<()> {
    let mut backend = MemoryBackend::new();
    backend.add_database(
        "gis",
        vec![(
            Table::new(
                "rybniky",
                vec![
                    Column::new("kapri", SqlType::Character),
                    Column::new("pocet", SqlType::Integer),
                ],
            ),
            vec![
                vec![Value::string("hodne"), Value::Int(12)],
                vec![Value::string("malo"), Value::Int(1)],
                vec![Value::string("hodne"), Value::Int(7)],
            ],
        )],
    );
    let mut driver = connect(backend).await;
    driver.open_database(&Handle::new("gis")).await?;

    let mut cursor = driver
        .open_select_cursor(
            "select * from rybniky where kapri = 'hodne'",
            CursorMode::SEQUENTIAL,
        )
        .await?;
    assert_eq!(cursor.kind(), CursorKind::Readonly);
    assert_eq!(cursor.table()?.column_names(), vec!["kapri", "pocet"]);
    assert_eq!(cursor.column(0)?.host_type, HostType::String);
    assert_eq!(cursor.column(1)?.host_type, HostType::Int);

    let mut seen = Vec::new();
    while driver.fetch(&mut cursor, Position::Next).await? {
        seen.push(cursor.value(1)?.clone());
        assert_eq!(cursor.value(0)?.as_str(), Some("hodne"));
    }
    assert_eq!(seen, vec![Value::Int(12), Value::Int(7)]);
    assert!(!driver.fetch(&mut cursor, Position::Next).await?);

    driver.close_cursor(&mut cursor).await?;
    driver.close_database().await?;
    driver.shutdown().await?;
    assert!(!driver.is_running());
    Ok(())
}

#[tokio::test]
async fn test_fetch_after_close() -> DbmiResult<()> {
    let mut driver = open(backend()).await;
    let mut cursor = driver
        .open_select_cursor("select * from rybniky", CursorMode::SEQUENTIAL)
        .await?;
    assert_eq!(driver.get_num_rows(&cursor).await?, 4);
    driver.close_cursor(&mut cursor).await?;

    assert!(matches!(
        driver.fetch(&mut cursor, Position::Next).await,
        Err(DbmiError::CursorClosed)
    ));
    assert!(matches!(
        driver.close_cursor(&mut cursor).await,
        Err(DbmiError::CursorClosed)
    ));
    assert!(matches!(cursor.value(0), Err(DbmiError::CursorClosed)));
    assert!(driver.is_healthy());
    driver.shutdown().await
}

#[tokio::test]
async fn test_update_cursor() -> DbmiResult<()> {
    let mut driver = open(backend()).await;
    let mut cursor = driver
        .open_update_cursor(
            "rybniky",
            "select * from rybniky where cat = 4",
            CursorMode::SEQUENTIAL,
        )
        .await?;
    assert_eq!(cursor.kind(), CursorKind::Update);
    assert_eq!(cursor.column_count()?, 3);

    cursor.set_column_for_update(0)?;
    assert!(cursor.test_any_column_for_update());
    cursor.unset_column_for_update(0)?;
    assert!(!cursor.test_any_column_for_update());
    assert!(matches!(
        cursor.set_column_for_update(3),
        Err(DbmiError::ColumnOutOfRange { index: 3, count: 3 })
    ));

    cursor.set_column_for_update(2)?;
    driver.bind_update(&cursor).await?;
    assert!(driver.fetch(&mut cursor, Position::Next).await?);
    cursor.set_value(2, &Value::Int(30))?;
    cursor.set_value(1, &Value::string("ignored"))?;
    driver.update(&cursor).await?;
    driver.close_cursor(&mut cursor).await?;

    let mut check = driver
        .open_select_cursor(
            "select kapri, pocet from rybniky where cat = 4",
            CursorMode::SEQUENTIAL,
        )
        .await?;
    assert!(driver.fetch(&mut check, Position::Next).await?);
    assert_eq!(
        check.table()?.row(),
        vec![Value::string("malo"), Value::Int(30)]
    );
    driver.close_cursor(&mut check).await?;
    driver.shutdown().await
}

#[tokio::test]
async fn test_delete_through_cursor() -> DbmiResult<()> {
    let mut driver = open(backend()).await;
    let mut cursor = driver
        .open_update_cursor(
            "rybniky",
            "select * from rybniky where kapri = 'hodne'",
            CursorMode::SEQUENTIAL,
        )
        .await?;
    while driver.fetch(&mut cursor, Position::Next).await? {
        driver.delete(&cursor).await?;
    }
    driver.close_cursor(&mut cursor).await?;
    assert_eq!(driver.list_tables(false).await?, vec!["rybniky".to_string()]);

    let mut all = driver
        .open_select_cursor("select * from rybniky", CursorMode::SEQUENTIAL)
        .await?;
    assert_eq!(driver.get_num_rows(&all).await?, 1);
    driver.close_cursor(&mut all).await?;
    driver.shutdown().await
}

#[tokio::test]
async fn test_insert_cursor() -> DbmiResult<()> {
    let mut driver = open(backend()).await;
    let table = driver.describe_table("rybniky").await?;
    let mut cursor = driver
        .open_insert_cursor(table, CursorMode::SEQUENTIAL)
        .await?;
    assert_eq!(cursor.kind(), CursorKind::Insert);

    cursor.set_value(0, &Value::Int(9))?;
    cursor.set_value(1, &Value::string("zadni"))?;
    cursor.set_value(2, &Value::Int(0))?;
    driver.insert(&cursor).await?;

    // Only cat and kapri are bound; pocet goes in as null.
    cursor.set_column_for_update(0)?;
    cursor.set_column_for_update(1)?;
    driver.bind_insert(&cursor).await?;
    cursor.set_value(0, &Value::Int(10))?;
    driver.insert(&cursor).await?;

    // Insert cursors cannot fetch.
    assert!(matches!(
        driver.fetch(&mut cursor, Position::Next).await,
        Err(DbmiError::Failed(_))
    ));
    driver.close_cursor(&mut cursor).await?;

    let mut check = driver
        .open_select_cursor(
            "select pocet from rybniky where kapri = 'zadni'",
            CursorMode::SEQUENTIAL,
        )
        .await?;
    let mut pocty = Vec::new();
    while driver.fetch(&mut check, Position::Next).await? {
        pocty.push(check.value(0)?.clone());
    }
    assert_eq!(pocty, vec![Value::Int(0), Value::Null]);
    driver.close_cursor(&mut check).await?;
    driver.shutdown().await
}

#[tokio::test]
async fn test_insert_type_mismatch_sends_nothing() -> DbmiResult<()> {
    let mut driver = open(backend()).await;
    let table = driver.describe_table("rybniky").await?;
    let mut cursor = driver
        .open_insert_cursor(table, CursorMode::SEQUENTIAL)
        .await?;
    assert!(matches!(
        cursor.set_value(0, &Value::string("x")),
        Err(DbmiError::TypeMismatch { .. })
    ));
    driver.close_cursor(&mut cursor).await?;
    assert!(driver.is_healthy());
    driver.shutdown().await
}

#[tokio::test]
async fn test_cat_val_array_with_and_without_procedure() -> DbmiResult<()> {
    let mut direct = open(backend()).await;
    let mut slow_backend = backend();
    slow_backend.disable(Procedure::SelectCatVal);
    let mut fallback = open(slow_backend).await;

    for driver in [&mut direct, &mut fallback] {
        let array = driver
            .select_cat_val_array("rybniky", "cat", "pocet", Some("kapri = 'hodne'"))
            .await?;
        assert_eq!(array.host_type(), HostType::Int);
        let cats: Vec<i32> = array.iter().map(|cv| cv.cat).collect();
        assert_eq!(cats, vec![1, 2, 3]);
        assert_eq!(array.get_value_int(2)?, Some(80));
        assert_eq!(array.get_value_int(3)?, None);
        assert!(array.get_value_int(4).is_err());

        let strings = driver
            .select_cat_val_array("rybniky", "cat", "kapri", None)
            .await?;
        assert_eq!(strings.len(), 4);
        assert_eq!(strings.get_value(4)?.as_str(), Some("malo"));

        assert!(matches!(
            driver
                .select_cat_val_array("rybniky", "kapri", "pocet", None)
                .await,
            Err(DbmiError::Failed(_))
        ));
        assert!(driver.is_healthy());
        driver.shutdown().await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_cat_val_where_clause_is_one_condition() -> DbmiResult<()> {
    let mut direct = open(backend()).await;
    let mut slow_backend = backend();
    slow_backend.disable(Procedure::SelectCatVal);
    let mut fallback = open(slow_backend).await;

    for driver in [&mut direct, &mut fallback] {
        let array = driver
            .select_cat_val_array("rybniky", "cat", "pocet", Some("cat = 2"))
            .await?;
        assert_eq!(array.len(), 1);
        assert_eq!(array.get_value_int(2)?, Some(80));

        for clause in ["kapri = 'hodne' and cat = 1", "cat = 1 or cat = 2"] {
            assert!(matches!(
                driver
                    .select_cat_val_array("rybniky", "cat", "pocet", Some(clause))
                    .await,
                Err(DbmiError::Failed(_))
            ));
        }
        assert!(driver.is_healthy());
        driver.shutdown().await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_noproc_and_failed_keep_connection() -> DbmiResult<()> {
    let mut backend = backend();
    backend.disable(Procedure::DropIndex);
    let mut driver = open(backend).await;

    assert!(matches!(
        driver.drop_index("idx").await,
        Err(DbmiError::NoProc(Procedure::DropIndex))
    ));
    assert!(driver.is_healthy());

    let err = driver.describe_table("nope").await.unwrap_err();
    assert_eq!(err.status(), Status::Failed);
    assert_eq!(err.to_string(), "Driver failure: Table 'nope' not found");
    assert!(driver.is_healthy());

    assert_eq!(driver.describe_table("rybniky").await?.column_count(), 3);
    driver.shutdown().await
}

#[tokio::test]
async fn test_database_required() -> DbmiResult<()> {
    let mut driver = connect(backend()).await;
    assert!(matches!(
        driver.list_tables(false).await,
        Err(DbmiError::DatabaseNotOpen)
    ));
    assert!(matches!(
        driver
            .open_select_cursor("select * from rybniky", CursorMode::SEQUENTIAL)
            .await,
        Err(DbmiError::DatabaseNotOpen)
    ));
    assert!(matches!(
        driver.open_database(&Handle::new("jinde")).await,
        Err(DbmiError::Failed(_))
    ));
    assert!(driver.database().is_none());

    driver.open_database(&Handle::new("gis")).await?;
    assert_eq!(driver.database(), Some(&Handle::new("gis")));
    driver.close_database().await?;
    assert!(driver.database().is_none());
    driver.shutdown().await
}

#[tokio::test]
async fn test_database_management() -> DbmiResult<()> {
    let mut driver = connect(backend()).await;
    let novy = Handle::new("novy");
    driver.create_database(&novy).await?;
    assert_eq!(driver.find_database(&novy).await?, Some(novy.clone()));
    assert_eq!(
        driver.list_databases(&[]).await?,
        vec![Handle::new("gis"), novy.clone()]
    );
    driver.delete_database(&novy).await?;
    assert_eq!(driver.find_database(&novy).await?, None);
    assert!(driver.delete_database(&novy).await.is_err());
    driver.shutdown().await
}

#[tokio::test]
async fn test_table_and_index_ddl() -> DbmiResult<()> {
    let mut driver = open(backend()).await;

    let lovy = Table::new(
        "lovy",
        vec![
            Column::new("id", SqlType::Serial).not_null(),
            Column::new("kdy", SqlType::Date),
        ],
    )
    .description("fishing days");
    driver.create_table(&lovy).await?;
    assert!(driver.create_table(&lovy).await.is_err());
    let described = driver.describe_table("lovy").await?;
    assert_eq!(described.description, "fishing days");
    assert_eq!(described.column(1)?.sql_type, SqlType::Date);

    driver
        .add_column("lovy", &Column::new("ulovek", SqlType::DoublePrecision))
        .await?;
    driver.drop_column("lovy", "kdy").await?;
    assert_eq!(
        driver.describe_table("lovy").await?.column_names(),
        vec!["id", "ulovek"]
    );

    let name = driver
        .create_index(&Index::new("", "rybniky").column("cat").unique())
        .await?;
    assert!(!name.is_empty());
    let indexes = driver.list_indexes("rybniky").await?;
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].columns, vec!["cat".to_string()]);
    assert!(indexes[0].unique);
    driver.drop_index(&name).await?;
    assert!(driver.list_indexes("rybniky").await?.is_empty());

    driver
        .grant_on_table("rybniky", PRIV_SELECT, GRANT_PUBLIC)
        .await?;
    driver.begin_transaction().await?;
    driver.execute_immediate("vacuum").await?;
    driver.commit_transaction().await?;
    assert!(driver.commit_transaction().await.is_err());

    driver.drop_table("lovy").await?;
    assert_eq!(driver.list_tables(false).await?, vec!["rybniky".to_string()]);
    driver.shutdown().await
}

#[tokio::test]
async fn test_shutdown_is_idempotent() -> DbmiResult<()> {
    let mut driver = open(backend()).await;
    driver.shutdown().await?;
    driver.shutdown().await?;
    assert!(!driver.is_healthy());
    assert!(driver.list_tables(false).await.unwrap_err().is_fatal());
    Ok(())
}

/// Transport over a raw duplex pipe, for drivers scripted by the test.
struct PipeTransport {
    stream: Option<DuplexStream>,
}

impl AsyncRead for PipeTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut().stream.as_mut() {
            Some(s) => Pin::new(s).poll_read(cx, buf),
            None => Poll::Ready(Err(io::ErrorKind::BrokenPipe.into())),
        }
    }
}

impl AsyncWrite for PipeTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut().stream.as_mut() {
            Some(s) => Pin::new(s).poll_write(cx, buf),
            None => Poll::Ready(Err(io::ErrorKind::BrokenPipe.into())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().stream.as_mut() {
            Some(s) => Pin::new(s).poll_flush(cx),
            None => Poll::Ready(Err(io::ErrorKind::BrokenPipe.into())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().stream.as_mut() {
            Some(s) => Pin::new(s).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

#[async_trait]
impl dbmi::driver::DriverTransport for PipeTransport {
    async fn terminate(&mut self) -> io::Result<()> {
        self.stream = None;
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        self.stream.is_some()
    }

    fn describe(&self) -> String {
        "scripted pipe".to_string()
    }
}

/// Answer the handshake, then answer the next procedure with the
/// integers in `reply` and go silent.
async fn scripted_driver(reply: Vec<i32>) -> Driver {
    let (client, server) = tokio::io::duplex(4096);
    tokio::spawn(async move {
        let mut r = WireReader::new(server);
        let code = r.recv_int().await.unwrap();
        assert_eq!(code, Procedure::Version.code());
        let mut w = WireWriter::new();
        w.put_int(code);
        w.put_int(Status::Ok.code());
        w.put_int(PROTOCOL_VERSION);
        w.flush_to(r.get_mut()).await.unwrap();

        let _next = r.recv_int().await;
        if !reply.is_empty() {
            let mut w = WireWriter::new();
            for n in reply {
                w.put_int(n);
            }
            let _ = w.flush_to(r.get_mut()).await;
        }
        std::future::pending::<()>().await;
    });
    let transport = PipeTransport {
        stream: Some(client),
    };
    Driver::connect("scripted", Box::new(transport)).await.unwrap()
}

#[tokio::test]
async fn test_kill_switch_aborts_hung_call() {
    let mut driver = scripted_driver(Vec::new()).await;
    let kill = driver.kill_switch();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        kill.kill();
    });

    let err = driver
        .create_database(&Handle::new("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbmiError::Killed(_)));
    assert_eq!(err.status(), Status::ProtocolErr);
    assert!(!driver.is_healthy());
    assert!(!driver.is_running());
    driver.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_protocol_error_tears_down() {
    let mut driver = scripted_driver(vec![77]).await;
    let err = driver
        .create_database(&Handle::new("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbmiError::Protocol(_)));
    assert!(!driver.is_healthy());
    assert!(!driver.is_running());

    // Later calls fail without touching the pipe.
    let again = driver.list_databases(&[]).await.unwrap_err();
    assert!(again.is_fatal());
    driver.shutdown().await.unwrap();
    driver.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_eof_status_outside_fetch_is_protocol_error() {
    let mut driver = scripted_driver(vec![
        Procedure::FindDatabase.code(),
        Status::Eof.code(),
    ])
    .await;
    let err = driver.find_database(&Handle::new("x")).await.unwrap_err();
    assert!(matches!(err, DbmiError::Protocol(_)));
    assert!(!driver.is_healthy());
    assert!(!driver.is_running());
    driver.shutdown().await.unwrap();
}
