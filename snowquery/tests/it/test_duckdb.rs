use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use insta::assert_display_snapshot;
use snowquery::api::Append;
use snowquery::duckdb::{
    count_rows, table_create, table_exists, type_arrow_into_db, CreateMode, DuckDBAppender,
};
use snowquery::{Error, QueryArgs, QueryOutput, Snowquery};

use super::util::{init_logger, settings_with_credentials};

fn init() -> duckdb::Connection {
    init_logger();

    duckdb::Connection::open_in_memory().unwrap()
}

#[test]
fn query_01() {
    let mut conn = init();
    let table = snowquery::query(&mut conn, "SELECT 1 AS a, 'x' AS b").unwrap();
    assert_display_snapshot!(table, @r###"
    +---+---+
    | a | b |
    +---+---+
    | 1 | x |
    +---+---+
    "###);
}

#[test]
fn append_and_read_back() {
    let mut conn = init();

    let batch = RecordBatch::try_from_iter(vec![
        ("id", Arc::new(Int32Array::from(vec![Some(1), None, Some(3)])) as ArrayRef),
        ("name", Arc::new(StringArray::from(vec!["a", "b", "c"])) as ArrayRef),
        ("score", Arc::new(Float64Array::from(vec![0.5, 1.5, 2.5])) as ArrayRef),
        ("ok", Arc::new(BooleanArray::from(vec![true, false, true])) as ArrayRef),
    ])
    .unwrap();

    table_create(&conn, "scores", &batch.schema(), CreateMode::Replace).unwrap();
    let mut appender = DuckDBAppender::new(&conn, "scores").unwrap();
    appender.append(batch).unwrap();
    assert_eq!(appender.rows(), 3);
    appender.finish().unwrap();

    assert_eq!(count_rows(&conn, "scores").unwrap(), 3);

    let table = snowquery::query(&mut conn, "SELECT * FROM scores ORDER BY name").unwrap();
    assert_display_snapshot!(table, @r###"
    +----+------+-------+-------+
    | id | name | score | ok    |
    +----+------+-------+-------+
    | 1  | a    | 0.5   | true  |
    |    | b    | 1.5   | false |
    | 3  | c    | 2.5   | true  |
    +----+------+-------+-------+
    "###);
}

#[test]
fn create_modes() {
    let conn = init();
    let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, true)]));

    assert!(!table_exists(&conn, "t").unwrap());
    table_create(&conn, "t", &schema, CreateMode::Replace).unwrap();
    conn.execute_batch("INSERT INTO t VALUES (1), (2)").unwrap();

    table_create(&conn, "t", &schema, CreateMode::IfNotExists).unwrap();
    assert_eq!(count_rows(&conn, "t").unwrap(), 2);

    table_create(&conn, "t", &schema, CreateMode::Replace).unwrap();
    assert_eq!(count_rows(&conn, "t").unwrap(), 0);
    assert!(table_exists(&conn, "t").unwrap());
}

#[test]
fn empty_schema_gets_placeholder_column() {
    let mut conn = init();
    let schema = Arc::new(Schema::empty());

    table_create(&conn, "nothing", &schema, CreateMode::Replace).unwrap();
    let table = snowquery::query(&mut conn, "SELECT * FROM nothing").unwrap();
    assert_eq!(table.num_rows(), 0);
    assert_eq!(table.schema().field(0).name(), "placeholder");
}

#[test]
fn arrow_types_in_duckdb() {
    assert_eq!(type_arrow_into_db(&DataType::Int64).as_deref(), Some("BIGINT"));
    assert_eq!(
        type_arrow_into_db(&DataType::Decimal128(10, 2)).as_deref(),
        Some("DECIMAL(10, 2)")
    );
    assert_eq!(
        type_arrow_into_db(&DataType::Timestamp(
            arrow::datatypes::TimeUnit::Microsecond,
            Some("+00:00".into())
        ))
        .as_deref(),
        Some("TIMESTAMPTZ")
    );
    assert_eq!(type_arrow_into_db(&DataType::LargeUtf8).as_deref(), Some("VARCHAR"));
}

#[test]
fn query_db_reads_the_cache_file() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_with_credentials(dir.path(), "local:\n  db_type: duckdb\n");
    {
        let conn = duckdb::Connection::open(&settings.cache_path).unwrap();
        conn.execute_batch("CREATE TABLE orders AS SELECT range AS id FROM range(5)")
            .unwrap();
    }

    let args = QueryArgs {
        conn_name: "local".into(),
        ..QueryArgs::default()
    };
    let output = Snowquery::new(settings)
        .query_db("SELECT COUNT(*) AS n FROM orders", &args)
        .unwrap();

    assert!(matches!(output, QueryOutput::Table(_)));
    assert_display_snapshot!(output, @r###"
    +---+
    | n |
    +---+
    | 5 |
    +---+
    "###);
}

#[test]
fn query_db_without_cache_file() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_with_credentials(dir.path(), "");

    let args = QueryArgs {
        db_type: Some("duckdb".into()),
        ..QueryArgs::default()
    };
    let err = Snowquery::new(settings)
        .query_db("SELECT 1", &args)
        .unwrap_err();

    let Error::Connect { backend, hint, .. } = err else {
        panic!("expected a connection error");
    };
    assert_eq!(backend.as_str(), "duckdb");
    assert!(hint.contains("snowquery_creds.yaml"));
}
