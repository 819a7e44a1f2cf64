use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::ipc::reader::StreamReader;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::api::ResultReader;
use crate::config::SnowflakeParams;
use crate::errors::ConnectorError;
use crate::table::Table;

use super::{description_to_schema, find_python, BridgeError, ColumnDescription, SnowflakeConnection, SnowflakeCursor, SnowflakeDriver};

const BRIDGE_SCRIPT: &str = include_str!("bridge.py");

/// Number of stderr lines of the bridge kept for error messages.
const STDERR_TAIL: usize = 20;

/// [SnowflakeDriver] that runs `snowflake-connector-python` in a Python child process.
///
/// Each connection gets its own process, which exits when the connection is closed or dropped.
#[derive(Debug, Clone, Default)]
pub struct PythonBridge {
    python: Option<PathBuf>,
}

impl PythonBridge {
    /// Use the interpreter found by [find_python].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_python(python: impl Into<PathBuf>) -> Self {
        PythonBridge {
            python: Some(python.into()),
        }
    }
}

impl SnowflakeDriver for PythonBridge {
    fn connect(
        &self,
        params: &SnowflakeParams,
        login_timeout: Duration,
    ) -> Result<Box<dyn SnowflakeConnection>, ConnectorError> {
        let python = match &self.python {
            Some(python) => python.clone(),
            None => find_python()?,
        };

        let mut process = BridgeProcess::spawn(&python)?;
        let handshake = process.request(&Request::Connect {
            params: ConnectParams {
                account: &params.account,
                user: &params.username,
                password: &params.password,
                database: &params.database,
                warehouse: &params.warehouse,
                role: &params.role,
            },
            login_timeout: login_timeout.as_secs().max(1),
        })?;

        log::info!(
            "connected to snowflake account {} (connector {})",
            params.account,
            handshake.version.as_deref().unwrap_or("unknown")
        );

        Ok(Box::new(BridgeConnection {
            process,
            batches: handshake.batches,
        }))
    }
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Connect {
        params: ConnectParams<'a>,
        login_timeout: u64,
    },
    Cursor,
    Execute {
        sql: &'a str,
    },
    Fetch {
        mode: FetchMode,
    },
    CloseCursor,
    Close,
}

#[derive(Serialize)]
struct ConnectParams<'a> {
    account: &'a str,
    user: &'a str,
    password: &'a str,
    database: &'a str,
    warehouse: &'a str,
    role: &'a str,
}

#[derive(Serialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum FetchMode {
    All,
    Batches,
}

#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Response {
    Ok(Reply),
    Error { kind: String, message: String },
}

#[derive(Deserialize, Default)]
struct Reply {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    batches: bool,
    /// Cursor description, sent with the reply to `fetch`.
    #[serde(default)]
    columns: Vec<ColumnDescription>,
}

struct BridgeProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<VecDeque<String>>>,
    closed: bool,
}

impl BridgeProcess {
    fn spawn(python: &std::path::Path) -> Result<Self, BridgeError> {
        log::debug!("starting snowflake bridge with {}", python.display());

        let mut child = Command::new(python)
            .arg("-u")
            .arg("-c")
            .arg(BRIDGE_SCRIPT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let missing = |name: &str| BridgeError::Protocol(format!("{name} of the bridge is not piped"));
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        // the child must never block on a full stderr pipe
        let stderr = std::thread::spawn(move || {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL);
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                log::debug!("bridge: {line}");
                if tail.len() == STDERR_TAIL {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail
        });

        Ok(BridgeProcess {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            stderr: Some(stderr),
            closed: false,
        })
    }

    fn request(&mut self, request: &Request) -> Result<Reply, BridgeError> {
        if let Err(e) = self.send(request) {
            // the process may have reported why it exited
            return Err(match self.receive() {
                Err(remote @ BridgeError::Remote { .. }) => remote,
                _ => e,
            });
        }
        self.receive()
    }

    fn send(&mut self, request: &Request) -> Result<(), BridgeError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| BridgeError::Protocol("the bridge is closed".to_string()))?;

        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        stdin.write_all(&line)?;
        stdin.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Reply, BridgeError> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(self.exited());
        }

        match serde_json::from_str(&line)? {
            Response::Ok(reply) => Ok(reply),
            Response::Error { kind, message } => Err(BridgeError::Remote { kind, message }),
        }
    }

    /// Reap the exited process and describe its exit.
    fn exited(&mut self) -> BridgeError {
        self.stdin.take();
        let status = self.child.wait();
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        let status = match status {
            Ok(status) => status.to_string(),
            Err(e) => e.to_string(),
        };
        let stderr: Vec<String> = stderr.into();
        BridgeError::Protocol(format!(
            "the bridge process exited unexpectedly ({status})\n{}",
            stderr.join("\n")
        ))
    }

    fn read_stream(&mut self, mode: FetchMode) -> Result<BridgeBatches<'_>, ConnectorError> {
        let reply = self.request(&Request::Fetch { mode })?;

        let reader = StreamReader::try_new(&mut self.stdout, None)?;

        // a result without rows arrives with an empty stream schema
        let schema = if reader.schema().fields().is_empty() && !reply.columns.is_empty() {
            description_to_schema(&reply.columns)
        } else {
            reader.schema()
        };
        Ok(BridgeBatches {
            schema,
            inner: Box::new(reader),
        })
    }

    fn close(&mut self) -> Result<(), BridgeError> {
        self.request(&Request::Close)?;
        self.closed = true;
        self.stdin.take();
        self.child.wait()?;
        Ok(())
    }
}

impl Drop for BridgeProcess {
    fn drop(&mut self) {
        if !self.closed && self.stdin.is_some() {
            let _ = self.request(&Request::Close);
        }
        self.stdin.take();
        let _ = self.child.kill();
        let _ = self.child.wait();
        if let Some(handle) = self.stderr.take() {
            let _ = handle.join();
        }
    }
}

struct BridgeConnection {
    process: BridgeProcess,
    batches: bool,
}

impl SnowflakeConnection for BridgeConnection {
    fn cursor(&mut self) -> Result<Box<dyn SnowflakeCursor + '_>, ConnectorError> {
        self.process.request(&Request::Cursor)?;
        Ok(Box::new(BridgeCursor {
            process: &mut self.process,
            batches: self.batches,
            open: true,
        }))
    }

    fn close(mut self: Box<Self>) -> Result<(), ConnectorError> {
        log::debug!("closing snowflake connection");
        self.process.close()?;
        Ok(())
    }
}

struct BridgeCursor<'conn> {
    process: &'conn mut BridgeProcess,
    batches: bool,
    open: bool,
}

impl SnowflakeCursor for BridgeCursor<'_> {
    fn execute(&mut self, sql: &str) -> Result<(), ConnectorError> {
        log::debug!("executing on snowflake: {sql}");
        self.process.request(&Request::Execute { sql })?;
        Ok(())
    }

    fn fetch_all(&mut self) -> Result<Table, ConnectorError> {
        let reader = self.process.read_stream(FetchMode::All)?;
        Table::from_reader(reader)
    }

    fn batches(&mut self) -> Option<Result<Box<dyn ResultReader + '_>, ConnectorError>> {
        if !self.batches {
            return None;
        }
        Some(
            self.process
                .read_stream(FetchMode::Batches)
                .map(|reader| Box::new(reader) as Box<dyn ResultReader + '_>),
        )
    }

    fn close(mut self: Box<Self>) -> Result<(), ConnectorError> {
        self.open = false;
        self.process.request(&Request::CloseCursor)?;
        Ok(())
    }
}

impl Drop for BridgeCursor<'_> {
    fn drop(&mut self) {
        if self.open {
            let _ = self.process.request(&Request::CloseCursor);
        }
    }
}

/// Arrow IPC stream written by the bridge after a `fetch` request.
struct BridgeBatches<'a> {
    schema: SchemaRef,
    inner: Box<dyn Iterator<Item = Result<RecordBatch, ArrowError>> + 'a>,
}

impl Iterator for BridgeBatches<'_> {
    type Item = Result<RecordBatch, ConnectorError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|r| r.map_err(ConnectorError::from))
    }
}

impl ResultReader for BridgeBatches<'_> {
    fn get_schema(&mut self) -> Result<SchemaRef, ConnectorError> {
        Ok(self.schema.clone())
    }
}

impl Drop for BridgeBatches<'_> {
    fn drop(&mut self) {
        // the next reply can only be read after the end of the stream
        while let Some(Ok(_)) = self.inner.next() {}
    }
}
