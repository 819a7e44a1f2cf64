use arrow::array::{Array, AsArray, Int64Array};
use arrow::datatypes::{DataType, Int64Type};
use insta::assert_display_snapshot;
use snowquery::config::ConnParams;
use snowquery::{QueryArgs, QueryOutput, Snowquery};

use super::util::{init_logger, settings_with_credentials};

fn init() -> rusqlite::Connection {
    init_logger();

    rusqlite::Connection::open_in_memory().unwrap()
}

#[test]
fn query_01() {
    let mut conn = init();
    let table = snowquery::query(&mut conn, "SELECT 1, NULL").unwrap();
    assert_display_snapshot!(table, @r###"
    +---+------+
    | 1 | NULL |
    +---+------+
    | 1 |      |
    +---+------+
    "###);
}

#[test]
fn query_02() {
    let mut conn = init();
    conn.execute_batch(
        "CREATE TABLE t (a INTEGER, b TEXT, c REAL, d BLOB, e);
         INSERT INTO t VALUES (1, 'one', 1.5, x'00ff', NULL);
         INSERT INTO t VALUES (2, NULL, 2, NULL, NULL);",
    )
    .unwrap();

    let table = snowquery::query(&mut conn, "SELECT * FROM t ORDER BY a").unwrap();
    let types: Vec<_> = table
        .schema()
        .fields()
        .iter()
        .map(|f| f.data_type().clone())
        .collect();
    assert_eq!(
        types,
        vec![
            DataType::Int64,
            DataType::LargeUtf8,
            DataType::Float64,
            DataType::LargeBinary,
            DataType::Null,
        ]
    );
    assert_display_snapshot!(table, @r###"
    +---+-----+-----+------+---+
    | a | b   | c   | d    | e |
    +---+-----+-----+------+---+
    | 1 | one | 1.5 | 00ff |   |
    | 2 |     | 2.0 |      |   |
    +---+-----+-----+------+---+
    "###);
}

#[test]
fn mixed_storage_classes() {
    let mut conn = init();
    conn.execute_batch(
        "CREATE TABLE t (v);
         INSERT INTO t VALUES (1);
         INSERT INTO t VALUES ('two');",
    )
    .unwrap();

    let table = snowquery::query(&mut conn, "SELECT v FROM t ORDER BY rowid").unwrap();
    let v = table.column("v").unwrap();
    let v = v.as_string::<i64>();
    assert_eq!(v.value(0), "1");
    assert_eq!(v.value(1), "two");
}

#[test]
fn empty_result_uses_declared_types() {
    let mut conn = init();
    conn.execute_batch("CREATE TABLE t (a INTEGER, b VARCHAR(10));")
        .unwrap();

    let table = snowquery::query(&mut conn, "SELECT a, b FROM t").unwrap();
    assert_eq!(table.num_rows(), 0);
    assert_eq!(table.schema().field(0).data_type(), &DataType::Int64);
    assert_eq!(table.schema().field(1).data_type(), &DataType::LargeUtf8);
}

#[test]
fn many_rows_are_split_into_batches() {
    let mut conn = init();
    let table = snowquery::query(
        &mut conn,
        "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 2500)
         SELECT i FROM n",
    )
    .unwrap();

    assert_eq!(table.num_rows(), 2500);
    assert_eq!(table.batches().len(), 3);

    let i = table.column("i").unwrap();
    let i = i.as_primitive::<Int64Type>();
    assert_eq!(i.value(2499), 2500);
}

#[test]
fn untyped_null_column_in_every_batch() {
    let mut conn = init();
    let table = snowquery::query(
        &mut conn,
        "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 2500)
         SELECT NULL AS x, i FROM n",
    )
    .unwrap();

    assert_eq!(table.batches().len(), 3);
    for batch in table.batches() {
        assert_eq!(batch.column(0).data_type(), &DataType::Null);
        assert_eq!(batch.column(0).len(), batch.num_rows());
    }
    assert_eq!(table.column("x").unwrap().len(), 2500);
}

#[test]
fn query_db_select_one() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("local.db");
    let settings = settings_with_credentials(
        dir.path(),
        &format!("local:\n  db_type: sqlite\n  database: {}\n", db.display()),
    );

    let args = QueryArgs {
        conn_name: "local".into(),
        ..QueryArgs::default()
    };
    let output = Snowquery::new(settings)
        .query_db("SELECT 1 AS x", &args)
        .unwrap();

    let QueryOutput::Table(table) = output else {
        panic!("expected a table");
    };
    assert_eq!(table.num_rows(), 1);
    assert_eq!(table.num_columns(), 1);
    let x = table.column("x").unwrap();
    assert_eq!(
        x.as_primitive::<Int64Type>(),
        &Int64Array::from(vec![1])
    );
}

#[test]
fn query_db_with_explicit_path() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("explicit.db");
    {
        let conn = rusqlite::Connection::open(&db).unwrap();
        conn.execute_batch("CREATE TABLE t (a INTEGER); INSERT INTO t VALUES (7), (8);")
            .unwrap();
    }
    let settings = settings_with_credentials(dir.path(), "");

    let args = QueryArgs {
        db_type: Some("sqlite".into()),
        params: ConnParams {
            database: Some(db.display().to_string()),
            ..ConnParams::default()
        },
        ..QueryArgs::default()
    };
    let output = Snowquery::new(settings)
        .query_db("SELECT SUM(a) AS total FROM t", &args)
        .unwrap();

    assert_display_snapshot!(output, @r###"
    +-------+
    | total |
    +-------+
    | 15    |
    +-------+
    "###);
}
