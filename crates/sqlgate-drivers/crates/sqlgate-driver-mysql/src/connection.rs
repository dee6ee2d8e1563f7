//! Native link over `mysql_async`

use mysql_async::{Conn, Opts, OptsBuilder, Pool, Row as MySqlRow, consts::ColumnType, prelude::*};
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use sqlgate_core::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot};

use crate::errors::{
    CR_CONNECTION_ERROR, CR_SERVER_LOST, CR_UNKNOWN_ERROR, NativeError,
};
use crate::link::{
    ConnectParams, FieldInfo, NativeConnector, NativeLink, NativeResult, ResultMode,
    StoredResult,
};

/// Client flag: report matched rather than changed rows
pub const CLIENT_FOUND_ROWS: u32 = 2;

const BINARY_CHARSET: u16 = 63;
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3306;

/// Pools backing persistent links, keyed by connection target
static PERSISTENT_POOLS: Lazy<Mutex<HashMap<String, Pool>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Dedicated Tokio runtime for MySQL operations.
///
/// mysql_async spawns tasks for networking and pool management, so every call
/// into it must happen inside a Tokio context. The blocking API drives it from
/// this runtime and must therefore not be called from a Tokio worker thread.
fn mysql_runtime() -> Result<&'static Runtime, NativeError> {
    static RUNTIME: OnceCell<Runtime> = OnceCell::new();
    RUNTIME
        .get_or_try_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .thread_name("sqlgate-mysql-runtime")
                .build()
        })
        .map_err(|e| {
            NativeError::new(
                CR_UNKNOWN_ERROR,
                format!("Failed to create Tokio runtime for MySQL driver: {}", e),
            )
        })
}

fn native_error(err: mysql_async::Error, io_code: i32) -> NativeError {
    match err {
        mysql_async::Error::Server(server) => NativeError::new(server.code.into(), server.message),
        mysql_async::Error::Io(io) => NativeError::new(io_code, io.to_string()),
        other => NativeError::new(CR_UNKNOWN_ERROR, other.to_string()),
    }
}

/// Settings derived from [`ConnectParams`] that `mysql_async` understands
#[derive(Debug, Clone)]
struct LinkSettings {
    opts: Opts,
    connect_timeout: Option<Duration>,
    pool_key: String,
}

fn option_u64(value: &serde_json::Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn option_bool(value: &serde_json::Value) -> Option<bool> {
    value.as_bool().or_else(|| option_u64(value).map(|n| n != 0))
}

/// Option names with the client library prefixes removed
fn normalize_option(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let stripped = lower
        .strip_prefix("mysqli_opt_")
        .or_else(|| lower.strip_prefix("mysqli_"))
        .or_else(|| lower.strip_prefix("mysql_opt_"))
        .unwrap_or(&lower);
    stripped.to_string()
}

impl LinkSettings {
    fn from_params(params: &ConnectParams) -> Self {
        let host = params
            .host
            .clone()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = params.port.filter(|p| *p > 0).unwrap_or(DEFAULT_PORT);
        let socket = params.socket.clone().filter(|s| !s.is_empty());
        let database = params.database.clone().filter(|d| !d.is_empty());

        let pool_key = format!(
            "{}@{}:{}/{}#{}",
            params.username.as_deref().unwrap_or(""),
            host,
            port,
            database.as_deref().unwrap_or(""),
            socket.as_deref().unwrap_or(""),
        );

        let mut builder = OptsBuilder::from_opts(Opts::default())
            .ip_or_hostname(host)
            .tcp_port(port)
            .user(params.username.clone())
            .pass(params.password.clone())
            .db_name(database)
            .socket(socket);

        let mut flags = params.flags;
        if flags & CLIENT_FOUND_ROWS != 0 {
            builder = builder.client_found_rows(true);
            flags &= !CLIENT_FOUND_ROWS;
        }
        if flags != 0 {
            tracing::warn!(flags, "ignoring unsupported MySQL client flags");
        }

        let mut init = Vec::new();
        let mut connect_timeout = None;
        for (name, value) in &params.options {
            match normalize_option(name).as_str() {
                "init_command" => {
                    if let Some(command) = value.as_str() {
                        init.push(command.to_string());
                    }
                }
                "connect_timeout" => {
                    connect_timeout = option_u64(value).map(Duration::from_secs);
                }
                "tcp_keepalive" => {
                    let ms = option_u64(value).and_then(|n| u32::try_from(n).ok());
                    builder = builder.tcp_keepalive(ms);
                }
                "tcp_nodelay" => {
                    builder = builder.tcp_nodelay(option_bool(value).unwrap_or(true));
                }
                "max_allowed_packet" => {
                    let size = option_u64(value).and_then(|n| usize::try_from(n).ok());
                    builder = builder.max_allowed_packet(size);
                }
                "wait_timeout" => {
                    let secs = option_u64(value).and_then(|n| usize::try_from(n).ok());
                    builder = builder.wait_timeout(secs);
                }
                "prefer_socket" => {
                    builder = builder.prefer_socket(option_bool(value).unwrap_or(true));
                }
                "stmt_cache_size" => {
                    if let Some(size) = option_u64(value).and_then(|n| usize::try_from(n).ok()) {
                        builder = builder.stmt_cache_size(size);
                    }
                }
                _ => tracing::warn!(option = %name, "ignoring unsupported MySQL option"),
            }
        }
        if !init.is_empty() {
            builder = builder.init(init);
        }

        Self {
            opts: builder.into(),
            connect_timeout,
            pool_key,
        }
    }
}

/// Opens links with `mysql_async`
#[derive(Debug, Default, Clone, Copy)]
pub struct AsyncMySqlConnector;

impl AsyncMySqlConnector {
    pub fn new() -> Self {
        Self
    }
}

impl NativeConnector for AsyncMySqlConnector {
    #[tracing::instrument(skip(self, params), fields(host = params.host.as_deref(), persistent = params.persistent))]
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn NativeLink>, NativeError> {
        let runtime = mysql_runtime()?;
        let settings = LinkSettings::from_params(params);

        let pool = if params.persistent {
            let _guard = runtime.enter();
            let mut pools = PERSISTENT_POOLS.lock();
            let pool = pools
                .entry(settings.pool_key.clone())
                .or_insert_with(|| Pool::new(settings.opts.clone()))
                .clone();
            Some(pool)
        } else {
            None
        };
        let pooled = pool.is_some();

        let opts = settings.opts.clone();
        let connecting = async move {
            match pool {
                Some(pool) => pool.get_conn().await,
                None => Conn::new(opts).await,
            }
        };
        let conn = match settings.connect_timeout {
            Some(limit) => runtime
                .block_on(async move { tokio::time::timeout(limit, connecting).await })
                .map_err(|_| {
                    NativeError::new(CR_CONNECTION_ERROR, "Connection timed out")
                })?,
            None => runtime.block_on(connecting),
        }
        .map_err(|e| native_error(e, CR_CONNECTION_ERROR))?;

        tracing::debug!(thread_id = conn.id(), pooled, "MySQL link opened");
        Ok(Box::new(AsyncMySqlLink::new(runtime, conn, pooled)))
    }
}

/// Outcome counters of the last statement
#[derive(Debug, Clone, Default)]
struct Completion {
    affected_rows: i64,
    insert_id: u64,
    info: Option<String>,
}

impl Completion {
    fn failed() -> Self {
        Self {
            affected_rows: -1,
            ..Default::default()
        }
    }

    fn from_conn(conn: &Conn) -> Self {
        let info = conn.info();
        Self {
            affected_rows: i64::try_from(conn.affected_rows()).unwrap_or(i64::MAX),
            insert_id: conn.last_insert_id().unwrap_or(0),
            info: (!info.is_empty()).then(|| info.into_owned()),
        }
    }
}

/// First message of a streamed statement
enum StreamHeader {
    Failed(NativeError),
    Done,
    Rows(Vec<FieldInfo>),
}

type RowMessage = Result<Vec<Value>, NativeError>;

/// A streamed result still holding the connection
struct PendingStream {
    active: Arc<AtomicBool>,
    conn_rx: oneshot::Receiver<(Conn, Completion)>,
}

/// Native link backed by a single `mysql_async` connection.
///
/// While a streamed result is being read, the connection lives inside the
/// task pumping rows and comes back once the stream is exhausted or dropped.
pub struct AsyncMySqlLink {
    runtime: &'static Runtime,
    conn: Option<Conn>,
    pending: Option<PendingStream>,
    stats: Completion,
    thread_id: u32,
    pooled: bool,
}

impl AsyncMySqlLink {
    fn new(runtime: &'static Runtime, conn: Conn, pooled: bool) -> Self {
        let thread_id = conn.id();
        Self {
            runtime,
            conn: Some(conn),
            pending: None,
            stats: Completion::default(),
            thread_id,
            pooled,
        }
    }

    /// Take the connection back from a finished stream
    fn reclaim(&mut self) -> Result<(), NativeError> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        if pending.active.load(Ordering::SeqCst) {
            self.pending = Some(pending);
            return Err(NativeError::out_of_sync());
        }
        self.finish_stream(pending.conn_rx)
    }

    fn finish_stream(
        &mut self,
        conn_rx: oneshot::Receiver<(Conn, Completion)>,
    ) -> Result<(), NativeError> {
        match conn_rx.blocking_recv() {
            Ok((conn, completion)) => {
                tracing::debug!(thread_id = self.thread_id, "link reclaimed from stream");
                self.conn = Some(conn);
                self.stats = completion;
                Ok(())
            }
            Err(_) => Err(NativeError::new(
                CR_SERVER_LOST,
                "Lost connection to MySQL server during query",
            )),
        }
    }

    fn store(&mut self, sql: &str) -> Result<Option<Box<dyn NativeResult>>, NativeError> {
        let runtime = self.runtime;
        let conn = self.conn.as_mut().ok_or_else(NativeError::server_gone)?;
        let outcome = runtime.block_on(store_query(conn, sql));
        match outcome {
            Ok((result, completion)) => {
                self.stats = completion;
                Ok(result.map(|r| Box::new(r) as Box<dyn NativeResult>))
            }
            Err(err) => {
                self.stats = Completion::failed();
                Err(err)
            }
        }
    }

    fn stream(&mut self, sql: &str) -> Result<Option<Box<dyn NativeResult>>, NativeError> {
        let conn = self.conn.take().ok_or_else(NativeError::server_gone)?;
        let (header_tx, header_rx) = oneshot::channel();
        let (row_tx, row_rx) = mpsc::channel(1);
        let (conn_tx, conn_rx) = oneshot::channel();
        self.runtime
            .spawn(pump_rows(conn, sql.to_string(), header_tx, row_tx, conn_tx));

        match header_rx.blocking_recv() {
            Ok(StreamHeader::Rows(fields)) => {
                let active = Arc::new(AtomicBool::new(true));
                self.pending = Some(PendingStream {
                    active: active.clone(),
                    conn_rx,
                });
                self.stats = Completion::failed();
                Ok(Some(Box::new(StreamedResult {
                    fields,
                    rows: row_rx,
                    active,
                })))
            }
            Ok(StreamHeader::Done) => {
                self.finish_stream(conn_rx)?;
                Ok(None)
            }
            Ok(StreamHeader::Failed(err)) => {
                self.finish_stream(conn_rx)?;
                self.stats = Completion::failed();
                Err(err)
            }
            Err(_) => Err(NativeError::new(
                CR_SERVER_LOST,
                "Lost connection to MySQL server during query",
            )),
        }
    }
}

impl NativeLink for AsyncMySqlLink {
    fn query(
        &mut self,
        sql: &str,
        mode: ResultMode,
    ) -> Result<Option<Box<dyn NativeResult>>, NativeError> {
        self.reclaim()?;
        match mode {
            ResultMode::Store => self.store(sql),
            ResultMode::Use => self.stream(sql),
        }
    }

    fn set_charset(&mut self, charset: &str) -> bool {
        if charset.is_empty() || !charset.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return false;
        }
        if self.reclaim().is_err() {
            return false;
        }
        let runtime = self.runtime;
        let Some(conn) = self.conn.as_mut() else {
            return false;
        };
        let statement = format!("SET NAMES {}", charset);
        runtime.block_on(conn.query_drop(statement)).is_ok()
    }

    fn affected_rows(&self) -> i64 {
        self.stats.affected_rows
    }

    fn insert_id(&self) -> u64 {
        self.stats.insert_id
    }

    fn info(&self) -> Option<String> {
        self.stats.info.clone()
    }

    fn thread_id(&self) -> u32 {
        self.thread_id
    }

    fn close(&mut self) {
        // A pending stream hands its connection to a dropped receiver and the
        // pump task drops it inside the runtime.
        self.pending = None;
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.pooled {
            let _guard = self.runtime.enter();
            drop(conn);
        } else if let Err(e) = self.runtime.block_on(conn.disconnect()) {
            tracing::debug!(error = %e, "error while closing MySQL link");
        }
    }
}

impl Drop for AsyncMySqlLink {
    fn drop(&mut self) {
        self.close();
    }
}

async fn store_query(
    conn: &mut Conn,
    sql: &str,
) -> Result<(Option<StoredResult>, Completion), NativeError> {
    let mut result = conn
        .query_iter(sql)
        .await
        .map_err(|e| native_error(e, CR_SERVER_LOST))?;
    if result.columns_ref().is_empty() {
        result
            .drop_result()
            .await
            .map_err(|e| native_error(e, CR_SERVER_LOST))?;
        return Ok((None, Completion::from_conn(conn)));
    }

    let fields = fields_of(result.columns_ref());
    let rows: Vec<MySqlRow> = result
        .collect()
        .await
        .map_err(|e| native_error(e, CR_SERVER_LOST))?;
    result
        .drop_result()
        .await
        .map_err(|e| native_error(e, CR_SERVER_LOST))?;

    let rows: Vec<Vec<Value>> = rows.into_iter().map(|row| decode_row(row, &fields)).collect();
    let completion = Completion {
        affected_rows: rows.len() as i64,
        ..Completion::from_conn(conn)
    };
    Ok((Some(StoredResult::new(fields, rows)), completion))
}

async fn pump_rows(
    mut conn: Conn,
    sql: String,
    header_tx: oneshot::Sender<StreamHeader>,
    row_tx: mpsc::Sender<RowMessage>,
    conn_tx: oneshot::Sender<(Conn, Completion)>,
) {
    let completion = stream_rows(&mut conn, &sql, header_tx, row_tx).await;
    // Nobody is waiting when the link was closed mid-stream; the connection
    // is dropped here, inside the runtime.
    let _ = conn_tx.send((conn, completion));
}

async fn stream_rows(
    conn: &mut Conn,
    sql: &str,
    header_tx: oneshot::Sender<StreamHeader>,
    row_tx: mpsc::Sender<RowMessage>,
) -> Completion {
    let mut result = match conn.query_iter(sql).await {
        Ok(result) => result,
        Err(e) => {
            let _ = header_tx.send(StreamHeader::Failed(native_error(e, CR_SERVER_LOST)));
            return Completion::failed();
        }
    };

    if result.columns_ref().is_empty() {
        return match result.drop_result().await {
            Ok(()) => {
                let _ = header_tx.send(StreamHeader::Done);
                Completion::from_conn(conn)
            }
            Err(e) => {
                let _ = header_tx.send(StreamHeader::Failed(native_error(e, CR_SERVER_LOST)));
                Completion::failed()
            }
        };
    }

    let fields = fields_of(result.columns_ref());
    if header_tx.send(StreamHeader::Rows(fields.clone())).is_ok() {
        loop {
            match result.next().await {
                Ok(Some(row)) => {
                    if row_tx.send(Ok(decode_row(row, &fields))).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = row_tx.send(Err(native_error(e, CR_SERVER_LOST))).await;
                    break;
                }
            }
        }
    }
    drop(row_tx);

    match result.drop_result().await {
        Ok(()) => Completion::from_conn(conn),
        Err(e) => {
            tracing::debug!(error = %e, "error while draining streamed result");
            Completion::failed()
        }
    }
}

/// Rows arriving from the pump task, one at a time
struct StreamedResult {
    fields: Vec<FieldInfo>,
    rows: mpsc::Receiver<RowMessage>,
    active: Arc<AtomicBool>,
}

impl NativeResult for StreamedResult {
    fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    fn fetch_row(&mut self) -> Result<Option<Vec<Value>>, NativeError> {
        if !self.active.load(Ordering::SeqCst) {
            return Ok(None);
        }
        match self.rows.blocking_recv() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(err)) => {
                self.active.store(false, Ordering::SeqCst);
                Err(err)
            }
            None => {
                self.active.store(false, Ordering::SeqCst);
                Ok(None)
            }
        }
    }

    fn num_rows(&self) -> Option<u64> {
        None
    }

    fn data_seek(&mut self, _row: u64) -> bool {
        false
    }
}

impl Drop for StreamedResult {
    fn drop(&mut self) {
        self.rows.close();
        self.active.store(false, Ordering::SeqCst);
    }
}

fn fields_of(columns: &[mysql_async::Column]) -> Vec<FieldInfo> {
    columns
        .iter()
        .map(|column| FieldInfo {
            name: column.name_str().into_owned(),
            org_name: column.org_name_str().into_owned(),
            table: column.table_str().into_owned(),
            org_table: column.org_table_str().into_owned(),
            db: column.schema_str().into_owned(),
            charset: column.character_set(),
            length: column.column_length(),
            type_code: column.column_type() as u8,
            flags: column.flags().bits(),
            decimals: column.decimals(),
        })
        .collect()
}

fn decode_row(mut row: MySqlRow, fields: &[FieldInfo]) -> Vec<Value> {
    (0..row.len())
        .map(|index| {
            let raw = row
                .take::<mysql_async::Value, usize>(index)
                .unwrap_or(mysql_async::Value::NULL);
            match fields.get(index) {
                Some(field) => mysql_value_to_value(raw, field),
                None => mysql_value_to_value(raw, &FieldInfo::default()),
            }
        })
        .collect()
}

fn is_type(field: &FieldInfo, types: &[ColumnType]) -> bool {
    types.iter().any(|t| *t as u8 == field.type_code)
}

/// Convert a protocol value to a [`Value`] using the column's type and charset
fn mysql_value_to_value(val: mysql_async::Value, field: &FieldInfo) -> Value {
    match val {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(bytes) => bytes_to_value(bytes, field),
        mysql_async::Value::Int(i) => Value::Int64(i),
        mysql_async::Value::UInt(u) => match i64::try_from(u) {
            Ok(i) => Value::Int64(i),
            Err(_) => Value::UInt64(u),
        },
        mysql_async::Value::Float(f) => Value::Float32(f),
        mysql_async::Value::Double(d) => Value::Float64(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let date = chrono::NaiveDate::from_ymd_opt(year.into(), month.into(), day.into());
            if hour == 0 && min == 0 && sec == 0 && micro == 0 && is_type(field, &[ColumnType::MYSQL_TYPE_DATE]) {
                match date {
                    Some(date) => Value::Date(date),
                    None => Value::String(format!("{:04}-{:02}-{:02}", year, month, day)),
                }
            } else {
                match date.and_then(|d| d.and_hms_micro_opt(hour.into(), min.into(), sec.into(), micro)) {
                    Some(dt) => Value::DateTime(dt),
                    None => Value::String(format!(
                        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                        year, month, day, hour, min, sec
                    )),
                }
            }
        }
        mysql_async::Value::Time(negative, days, hours, mins, secs, micros) => {
            let total_hours = days * 24 + u32::from(hours);
            let sign = if negative { "-" } else { "" };
            Value::String(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign, total_hours, mins, secs, micros
            ))
        }
    }
}

fn bytes_to_value(bytes: Vec<u8>, field: &FieldInfo) -> Value {
    use ColumnType::*;

    if is_type(field, &[MYSQL_TYPE_BIT]) {
        return Value::Bytes(bytes);
    }
    if field.charset == BINARY_CHARSET
        && is_type(
            field,
            &[
                MYSQL_TYPE_TINY_BLOB,
                MYSQL_TYPE_MEDIUM_BLOB,
                MYSQL_TYPE_LONG_BLOB,
                MYSQL_TYPE_BLOB,
                MYSQL_TYPE_VAR_STRING,
                MYSQL_TYPE_STRING,
                MYSQL_TYPE_VARCHAR,
                MYSQL_TYPE_GEOMETRY,
            ],
        )
    {
        return Value::Bytes(bytes);
    }

    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => return Value::Bytes(e.into_bytes()),
    };

    if is_type(
        field,
        &[
            MYSQL_TYPE_TINY,
            MYSQL_TYPE_SHORT,
            MYSQL_TYPE_LONG,
            MYSQL_TYPE_LONGLONG,
            MYSQL_TYPE_INT24,
            MYSQL_TYPE_YEAR,
        ],
    ) {
        if let Ok(i) = text.parse::<i64>() {
            return Value::Int64(i);
        }
        return text.parse::<u64>().map(Value::UInt64).unwrap_or(Value::String(text));
    }
    if is_type(field, &[MYSQL_TYPE_FLOAT]) {
        return text.parse::<f32>().map(Value::Float32).unwrap_or(Value::String(text));
    }
    if is_type(field, &[MYSQL_TYPE_DOUBLE]) {
        return text.parse::<f64>().map(Value::Float64).unwrap_or(Value::String(text));
    }
    if is_type(field, &[MYSQL_TYPE_DECIMAL, MYSQL_TYPE_NEWDECIMAL]) {
        return Value::Decimal(text);
    }
    if is_type(field, &[MYSQL_TYPE_DATE, MYSQL_TYPE_NEWDATE]) {
        return chrono::NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .map(Value::Date)
            .unwrap_or(Value::String(text));
    }
    if is_type(field, &[MYSQL_TYPE_DATETIME, MYSQL_TYPE_TIMESTAMP]) {
        return chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
            .map(Value::DateTime)
            .unwrap_or(Value::String(text));
    }
    Value::String(text)
}
