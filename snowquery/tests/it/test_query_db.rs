use arrow::array::{Array, AsArray};
use arrow::datatypes::DataType;
use snowquery::config::{BackendKind, ConnParams};
use snowquery::{CacheError, ConfigError, Error, QueryArgs, QueryOutput, Snowquery};

use super::util::{
    id_name_batch, id_name_schema, init_logger, settings_with_credentials, tags_batch,
    FakeSnowflake,
};

const CREDENTIALS: &str = r#"
default:
  db_type: snowflake
  account: xy12345
  username: analyst
  password: hunter2
  database: ANALYTICS
  warehouse: COMPUTE_WH
  role: ANALYST
local:
  db_type: duckdb
shop:
  db_type: postgres
  host: localhost
  port: 5432
  database: shop
  username: shop
"#;

fn cached(table: &str) -> QueryArgs {
    QueryArgs {
        cache_table_name: Some(table.to_string()),
        ..QueryArgs::default()
    }
}

#[test]
fn cache_duckdb_to_itself() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_with_credentials(dir.path(), CREDENTIALS);

    let args = QueryArgs {
        conn_name: "local".into(),
        ..cached("copy")
    };
    let err = Snowquery::new(settings).query_db("SELECT 1", &args).unwrap_err();

    assert!(matches!(err, Error::Cache(CacheError::SelfCache)));
    assert_eq!(err.to_string(), "cannot cache duckdb source to itself");

    // explicit db_type counts as well
    let settings = settings_with_credentials(dir.path(), "");
    let args = QueryArgs {
        db_type: Some("duckdb".into()),
        ..cached("copy")
    };
    let err = Snowquery::new(settings).query_db("SELECT 1", &args).unwrap_err();
    assert!(matches!(err, Error::Cache(CacheError::SelfCache)));
}

#[test]
fn cache_sqlite_fails_fast() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_with_credentials(dir.path(), "");

    let args = QueryArgs {
        db_type: Some("sqlite".into()),
        params: ConnParams {
            database: Some(dir.path().join("local.db").display().to_string()),
            ..ConnParams::default()
        },
        ..cached("copy")
    };
    let err = Snowquery::new(settings).query_db("SELECT 1", &args).unwrap_err();
    assert!(matches!(
        err,
        Error::Cache(CacheError::UnsupportedSource(BackendKind::SQLite))
    ));

    // nothing was opened
    assert!(!dir.path().join("local.db").exists());
}

#[test]
fn postgres_without_password() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_with_credentials(dir.path(), CREDENTIALS);

    let args = QueryArgs {
        conn_name: "shop".into(),
        ..QueryArgs::default()
    };
    let err = Snowquery::new(settings).query_db("SELECT 1", &args).unwrap_err();

    let Error::Config(err @ ConfigError::MissingCredentials { .. }) = err else {
        panic!("expected missing credentials");
    };
    assert_eq!(err.missing_fields(), &["password"]);
    assert!(err.to_string().contains("password"));
}

#[test]
fn invalid_cache_table_name() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_with_credentials(dir.path(), CREDENTIALS);
    let fake = FakeSnowflake::new(id_name_schema(), vec![id_name_batch(0, 1)], true);

    let err = Snowquery::with_driver(settings, fake.clone())
        .query_db("SELECT 1", &cached("bad name"))
        .unwrap_err();
    assert!(matches!(err, Error::Cache(CacheError::InvalidTableName(_))));
    assert!(fake.calls.borrow().executed.is_empty());
}

#[test]
fn snowflake_query_flattens_lists() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_with_credentials(dir.path(), CREDENTIALS);
    let batch = tags_batch();
    let fake = FakeSnowflake::new(batch.schema(), vec![batch], true);

    let output = Snowquery::with_driver(settings, fake.clone())
        .query_db("SELECT id, tags FROM t", &QueryArgs::default())
        .unwrap();

    let table = output.into_table().unwrap();
    assert_eq!(table.schema().field(1).data_type(), &DataType::Utf8);
    let tags = table.column("tags").unwrap();
    let tags = tags.as_string::<i32>();
    assert_eq!(tags.value(0), "1, 2");
    assert_eq!(tags.value(1), "3");
    assert!(tags.is_null(2));

    let calls = fake.calls.borrow();
    assert_eq!(calls.executed, vec!["SELECT id, tags FROM t".to_string()]);
    assert_eq!(calls.fetch_all, 1);
    assert_eq!(calls.cursors_closed, 1);
    assert_eq!(calls.connections_closed, 1);
}

#[test]
fn snowflake_cache() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_with_credentials(dir.path(), CREDENTIALS);
    let cache_path = settings.cache_path.clone();
    let fake = FakeSnowflake::new(
        id_name_schema(),
        vec![id_name_batch(0, 10), id_name_batch(10, 5)],
        true,
    );
    let snowquery = Snowquery::with_driver(settings, fake.clone());

    let output = snowquery.query_db("SELECT * FROM orders", &cached("orders")).unwrap();
    let QueryOutput::Cached(report) = &output else {
        panic!("expected a cache report");
    };
    assert_eq!(report.rows, 15);
    assert_eq!(
        output.to_string(),
        "Successfully cached 15 rows to DuckDB table 'orders'."
    );

    let append = QueryArgs {
        overwrite: false,
        ..cached("orders")
    };
    let output = snowquery.query_db("SELECT * FROM orders", &append).unwrap();
    assert!(matches!(output, QueryOutput::Cached(r) if r.rows == 30));

    {
        let calls = fake.calls.borrow();
        assert_eq!(calls.cursors_closed, 2);
        assert_eq!(calls.connections_closed, 2);
    }

    // the cache can be read back through the duckdb backend
    let local = QueryArgs {
        conn_name: "local".into(),
        ..QueryArgs::default()
    };
    let table = snowquery
        .query_db("SELECT COUNT(DISTINCT id) AS n FROM orders", &local)
        .unwrap()
        .into_table()
        .unwrap();
    insta::assert_display_snapshot!(table, @r###"
    +----+
    | n  |
    +----+
    | 15 |
    +----+
    "###);
    assert!(cache_path.exists());
}

#[test]
fn snowflake_connect_error() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_with_credentials(dir.path(), CREDENTIALS);
    let mut fake = FakeSnowflake::new(id_name_schema(), vec![], true);
    fake.connect_error = Some("Incorrect username or password was specified.".into());

    let err = Snowquery::with_driver(settings, fake)
        .query_db("SELECT 1", &QueryArgs::default())
        .unwrap_err();

    let message = err.to_string();
    assert!(matches!(err, Error::Connect { .. }));
    assert!(message.contains("snowflake connection 'default'"));
    assert!(message.contains("Incorrect username or password"));
    assert!(message.contains("snowquery_creds.yaml"));
}

#[test]
fn resolve_reads_credentials_on_every_call() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_with_credentials(dir.path(), "a:\n  db_type: duckdb\n");
    let snowquery = Snowquery::new(settings.clone());

    let args = QueryArgs {
        conn_name: "a".into(),
        ..QueryArgs::default()
    };
    assert_eq!(snowquery.resolve(&args).unwrap().kind(), BackendKind::DuckDB);

    settings_with_credentials(dir.path(), "a:\n  db_type: sqlite\n  database: a.db\n");
    assert_eq!(snowquery.resolve(&args).unwrap().kind(), BackendKind::SQLite);
}

#[test]
fn missing_credential_file() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings_with_credentials(dir.path(), "");
    settings.credentials_path = Some(dir.path().join("absent.yaml"));

    let err = Snowquery::new(settings)
        .query_db("SELECT 1", &QueryArgs::default())
        .unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::Io(_))));
}
