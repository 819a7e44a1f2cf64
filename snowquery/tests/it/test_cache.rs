use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema};
use insta::assert_display_snapshot;
use snowquery::cache::{materialize, stream_batches, validate_table_name, CacheReport};
use snowquery::duckdb::table_exists;
use snowquery::snowflake::SnowflakeCursor;
use snowquery::util::ArrowReader;
use snowquery::CacheError;

use super::util::{id_name_batch, id_name_schema, init_logger, tags_batch, FakeSnowflake};

fn init() -> duckdb::Connection {
    init_logger();

    duckdb::Connection::open_in_memory().unwrap()
}

fn cursor(fake: &FakeSnowflake) -> Box<dyn SnowflakeCursor> {
    Box::new(fake.clone())
}

#[test]
fn table_names() {
    for valid in ["orders", "_tmp", "Orders_2024", "a"] {
        validate_table_name(valid).unwrap();
    }
    for invalid in ["", "2024_orders", "orders;drop", "my table", "schema.table", "naïve"] {
        let err = validate_table_name(invalid).unwrap_err();
        assert!(matches!(err, CacheError::InvalidTableName(_)), "{invalid}");
    }
}

#[test]
fn report_message() {
    let report = CacheReport {
        table: "orders".into(),
        rows: 42,
    };
    assert_display_snapshot!(report, @"Successfully cached 42 rows to DuckDB table 'orders'.");
}

#[test]
fn stream_batches_sums_all_batches() {
    let store = init();
    store
        .execute_batch("CREATE TABLE orders (id BIGINT, name VARCHAR); INSERT INTO orders VALUES (100, 'old');")
        .unwrap();

    let fake = FakeSnowflake::new(
        id_name_schema(),
        vec![id_name_batch(0, 3), id_name_batch(3, 0), id_name_batch(3, 4), id_name_batch(7, 2)],
        true,
    );
    let report = stream_batches(cursor(&fake).as_mut(), "SELECT 1", &store, "orders", true).unwrap();

    // the first batch replaced the old table, the others were appended
    assert_eq!(report.rows, 9);
    assert_eq!(fake.calls.borrow().batches, 1);
    assert_eq!(fake.calls.borrow().fetch_all, 0);
    assert_eq!(fake.calls.borrow().executed, vec!["SELECT 1".to_string()]);
}

#[test]
fn stream_batches_appends() {
    let store = init();
    let fake = FakeSnowflake::new(id_name_schema(), vec![id_name_batch(0, 2)], true);

    stream_batches(cursor(&fake).as_mut(), "SELECT 1", &store, "orders", false).unwrap();
    let report = stream_batches(cursor(&fake).as_mut(), "SELECT 1", &store, "orders", false).unwrap();
    assert_eq!(report.rows, 4);

    let report = stream_batches(cursor(&fake).as_mut(), "SELECT 1", &store, "orders", true).unwrap();
    assert_eq!(report.rows, 2);
}

#[test]
fn stream_without_batch_capability() {
    let store = init();
    let fake = FakeSnowflake::new(
        id_name_schema(),
        vec![id_name_batch(0, 3), id_name_batch(3, 3)],
        false,
    );

    let report = stream_batches(cursor(&fake).as_mut(), "SELECT 1", &store, "orders", true).unwrap();
    assert_eq!(report.rows, 6);
    assert_eq!(fake.calls.borrow().fetch_all, 1);
    assert_eq!(fake.calls.borrow().batches, 0);
}

#[test]
fn stream_zero_rows_creates_empty_table() {
    let store = init();
    store
        .execute_batch("CREATE TABLE orders (x INTEGER); INSERT INTO orders VALUES (1);")
        .unwrap();

    let fake = FakeSnowflake::new(id_name_schema(), vec![], true);
    let report = stream_batches(cursor(&fake).as_mut(), "SELECT 1", &store, "orders", true).unwrap();
    assert_eq!(report.rows, 0);
    assert!(table_exists(&store, "orders").unwrap());

    // with the result schema
    let mut columns = store
        .prepare("SELECT column_name FROM information_schema.columns WHERE table_name = 'orders' ORDER BY ordinal_position")
        .unwrap();
    let names: Vec<String> = columns
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(names, vec!["id", "name"]);
}

#[test]
fn stream_zero_rows_unknown_schema() {
    let store = init();
    let fake = FakeSnowflake::new(Arc::new(Schema::empty()), vec![], false);

    let report = stream_batches(cursor(&fake).as_mut(), "DELETE FROM x", &store, "nothing", true).unwrap();
    assert_eq!(report.rows, 0);
    assert!(table_exists(&store, "nothing").unwrap());
}

#[test]
fn stream_flattens_lists() {
    let mut store = init();
    let batch = tags_batch();
    let fake = FakeSnowflake::new(batch.schema(), vec![batch], true);

    stream_batches(cursor(&fake).as_mut(), "SELECT 1", &store, "tagged", true).unwrap();

    let table = snowquery::query(&mut store, "SELECT * FROM tagged ORDER BY id").unwrap();
    assert_eq!(table.schema().field(1).data_type(), &DataType::Utf8);
    assert_display_snapshot!(table, @r###"
    +----+------+
    | id | tags |
    +----+------+
    | 1  | 1, 2 |
    | 2  | 3    |
    | 3  |      |
    +----+------+
    "###);
}

#[test]
fn materialize_replaces() {
    let mut store = init();
    store
        .execute_batch("CREATE TABLE orders (other INTEGER); INSERT INTO orders VALUES (1), (2), (3);")
        .unwrap();

    let reader = ArrowReader::new(id_name_schema(), vec![id_name_batch(0, 2), id_name_batch(2, 2)]);
    let report = materialize(reader, &mut store, "orders", true).unwrap();
    assert_eq!(report.rows, 4);
    assert_eq!(report.to_string(), "Successfully cached 4 rows to DuckDB table 'orders'.");

    // the staging table is gone
    assert!(!table_exists(&store, "snowquery_stage_orders").unwrap());

    let table = snowquery::query(&mut store, "SELECT * FROM orders ORDER BY id LIMIT 2").unwrap();
    assert_display_snapshot!(table, @r###"
    +----+--------+
    | id | name   |
    +----+--------+
    | 0  | name_0 |
    | 1  | name_1 |
    +----+--------+
    "###);
}

#[test]
fn materialize_keeps_table_named_like_the_stage() {
    let mut store = init();
    store
        .execute_batch("CREATE TABLE snowquery_stage_orders (note VARCHAR); INSERT INTO snowquery_stage_orders VALUES ('mine');")
        .unwrap();

    let reader = ArrowReader::new(id_name_schema(), vec![id_name_batch(0, 2)]);
    let report = materialize(reader, &mut store, "orders", true).unwrap();
    assert_eq!(report.rows, 2);

    let table = snowquery::query(&mut store, "SELECT * FROM main.snowquery_stage_orders").unwrap();
    assert_display_snapshot!(table, @r###"
    +------+
    | note |
    +------+
    | mine |
    +------+
    "###);
}

#[test]
fn materialize_appends_to_existing() {
    let mut store = init();

    let reader = ArrowReader::new(id_name_schema(), vec![id_name_batch(0, 3)]);
    materialize(reader, &mut store, "orders", true).unwrap();

    let reader = ArrowReader::new(id_name_schema(), vec![id_name_batch(3, 5)]);
    let report = materialize(reader, &mut store, "orders", false).unwrap();
    assert_eq!(report.rows, 8);
}

#[test]
fn materialize_appends_to_missing_table() {
    let mut store = init();

    let reader = ArrowReader::new(id_name_schema(), vec![id_name_batch(0, 3)]);
    let report = materialize(reader, &mut store, "fresh", false).unwrap();
    assert_eq!(report.rows, 3);
}

#[test]
fn materialize_failure_leaves_store_untouched() {
    let mut store = init();
    store
        .execute_batch("CREATE TABLE orders (id BIGINT, name VARCHAR); INSERT INTO orders VALUES (1, 'kept');")
        .unwrap();

    // an appended result with a different column count cannot be inserted
    let schema = Arc::new(Schema::new(vec![Field::new("only", DataType::Int64, true)]));
    let batch = arrow::record_batch::RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(arrow::array::Int64Array::from(vec![5])) as arrow::array::ArrayRef],
    )
    .unwrap();
    let reader = ArrowReader::new(schema, vec![batch]);

    let err = materialize(reader, &mut store, "orders", false).unwrap_err();
    assert!(matches!(err, CacheError::Driver { .. }));

    assert!(!table_exists(&store, "snowquery_stage_orders").unwrap());
    assert_eq!(snowquery::duckdb::count_rows(&store, "orders").unwrap(), 1);
}
