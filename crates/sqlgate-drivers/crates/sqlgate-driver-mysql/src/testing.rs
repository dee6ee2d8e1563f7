//! Scripted in-memory engine for tests
//!
//! A [`ScriptedServer`] answers statements from a table of canned responses
//! and records everything it was asked to do. Statements it has no answer for
//! succeed without producing a result set, so session setup (`SET ...`) needs
//! no scripting.

use parking_lot::Mutex;
use sqlgate_core::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::NativeError;
use crate::link::{
    ConnectParams, FieldInfo, NativeConnector, NativeLink, NativeResult, ResultMode,
    StoredResult,
};

/// Canned answer for one statement
#[derive(Debug, Clone)]
pub enum Response {
    Rows {
        fields: Vec<FieldInfo>,
        rows: Vec<Vec<Value>>,
    },
    Ok {
        affected_rows: u64,
        insert_id: u64,
        info: Option<String>,
    },
    Error(NativeError),
}

#[derive(Default)]
struct ServerState {
    responses: HashMap<String, Response>,
    executed: Vec<String>,
    charsets: Vec<String>,
    connects: Vec<ConnectParams>,
    closed: Vec<u32>,
    refuse: Option<NativeError>,
    reject_charset: bool,
    next_thread_id: u32,
}

/// Shared handle to a scripted engine. Clones talk to the same server.
#[derive(Clone, Default)]
pub struct ScriptedServer {
    state: Arc<Mutex<ServerState>>,
}

impl ScriptedServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, sql: &str, response: Response) -> &Self {
        self.state.lock().responses.insert(sql.to_string(), response);
        self
    }

    /// Answer `sql` with a result set
    pub fn rows(&self, sql: &str, fields: Vec<FieldInfo>, rows: Vec<Vec<Value>>) -> &Self {
        self.respond(sql, Response::Rows { fields, rows })
    }

    pub fn ok(&self, sql: &str, affected_rows: u64, insert_id: u64) -> &Self {
        self.respond(
            sql,
            Response::Ok {
                affected_rows,
                insert_id,
                info: None,
            },
        )
    }

    pub fn ok_with_info(&self, sql: &str, affected_rows: u64, info: &str) -> &Self {
        self.respond(
            sql,
            Response::Ok {
                affected_rows,
                insert_id: 0,
                info: Some(info.to_string()),
            },
        )
    }

    pub fn fail(&self, sql: &str, code: i32, message: &str) -> &Self {
        self.respond(sql, Response::Error(NativeError::new(code, message)))
    }

    /// Make every following connect attempt fail
    pub fn refuse_connections(&self, code: i32, message: &str) -> &Self {
        self.state.lock().refuse = Some(NativeError::new(code, message));
        self
    }

    /// Make the fast-path charset switch report failure
    pub fn reject_charset(&self, reject: bool) -> &Self {
        self.state.lock().reject_charset = reject;
        self
    }

    /// Statements received, in order
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    /// Charsets requested through the fast path
    pub fn charsets(&self) -> Vec<String> {
        self.state.lock().charsets.clone()
    }

    /// Parameters of every connect attempt, including refused ones
    pub fn connects(&self) -> Vec<ConnectParams> {
        self.state.lock().connects.clone()
    }

    /// Thread ids of links that were closed
    pub fn closed(&self) -> Vec<u32> {
        self.state.lock().closed.clone()
    }

    pub fn connector(&self) -> Arc<dyn NativeConnector> {
        Arc::new(ScriptedConnector {
            server: self.clone(),
        })
    }

    /// Open a link directly, bypassing the connector
    pub fn open_link(&self) -> Box<dyn NativeLink> {
        let thread_id = {
            let mut state = self.state.lock();
            state.next_thread_id += 1;
            state.next_thread_id
        };
        Box::new(ScriptedLink {
            server: self.clone(),
            thread_id,
            closed: false,
            affected_rows: 0,
            insert_id: 0,
            info: None,
            streaming: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Connector opening links to a [`ScriptedServer`]
pub struct ScriptedConnector {
    server: ScriptedServer,
}

impl NativeConnector for ScriptedConnector {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn NativeLink>, NativeError> {
        let refused = {
            let mut state = self.server.state.lock();
            state.connects.push(params.clone());
            state.refuse.clone()
        };
        match refused {
            Some(err) => Err(err),
            None => Ok(self.server.open_link()),
        }
    }
}

struct ScriptedLink {
    server: ScriptedServer,
    thread_id: u32,
    closed: bool,
    affected_rows: i64,
    insert_id: u64,
    info: Option<String>,
    streaming: Arc<AtomicBool>,
}

impl NativeLink for ScriptedLink {
    fn query(
        &mut self,
        sql: &str,
        mode: ResultMode,
    ) -> Result<Option<Box<dyn NativeResult>>, NativeError> {
        if self.closed {
            return Err(NativeError::server_gone());
        }
        if self.streaming.load(Ordering::SeqCst) {
            return Err(NativeError::out_of_sync());
        }
        let response = {
            let mut state = self.server.state.lock();
            state.executed.push(sql.to_string());
            state.responses.get(sql).cloned()
        };
        self.info = None;
        self.insert_id = 0;
        match response {
            Some(Response::Error(err)) => {
                self.affected_rows = -1;
                Err(err)
            }
            Some(Response::Rows { fields, rows }) => match mode {
                ResultMode::Store => {
                    self.affected_rows = rows.len() as i64;
                    Ok(Some(Box::new(StoredResult::new(fields, rows))))
                }
                ResultMode::Use => {
                    self.affected_rows = -1;
                    self.streaming.store(true, Ordering::SeqCst);
                    Ok(Some(Box::new(ScriptedStream {
                        fields,
                        rows: rows.into(),
                        streaming: self.streaming.clone(),
                    })))
                }
            },
            Some(Response::Ok {
                affected_rows,
                insert_id,
                info,
            }) => {
                self.affected_rows = affected_rows as i64;
                self.insert_id = insert_id;
                self.info = info;
                Ok(None)
            }
            None => {
                self.affected_rows = 0;
                Ok(None)
            }
        }
    }

    fn set_charset(&mut self, charset: &str) -> bool {
        let mut state = self.server.state.lock();
        state.charsets.push(charset.to_string());
        !state.reject_charset
    }

    fn affected_rows(&self) -> i64 {
        self.affected_rows
    }

    fn insert_id(&self) -> u64 {
        self.insert_id
    }

    fn info(&self) -> Option<String> {
        self.info.clone()
    }

    fn thread_id(&self) -> u32 {
        self.thread_id
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.server.state.lock().closed.push(self.thread_id);
        }
    }
}

/// Streamed result: rows are handed out once and the link stays busy until
/// the stream is exhausted or dropped
struct ScriptedStream {
    fields: Vec<FieldInfo>,
    rows: VecDeque<Vec<Value>>,
    streaming: Arc<AtomicBool>,
}

impl NativeResult for ScriptedStream {
    fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    fn fetch_row(&mut self) -> Result<Option<Vec<Value>>, NativeError> {
        let row = self.rows.pop_front();
        if row.is_none() {
            self.streaming.store(false, Ordering::SeqCst);
        }
        Ok(row)
    }

    fn num_rows(&self) -> Option<u64> {
        None
    }

    fn data_seek(&mut self, _row: u64) -> bool {
        false
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.streaming.store(false, Ordering::SeqCst);
    }
}
