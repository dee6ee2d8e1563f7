//! Unit tests for the connection registry and session dispatch

use super::*;
use pretty_assertions::assert_eq;
use sqlgate_core::{ConnectionConfig, DriverErrorKind, Error, RowData, Value};
use sqlgate_driver_mysql::testing::ScriptedServer;
use sqlgate_driver_mysql::{FieldInfo, MySqlDriverFactory};
use sqlgate_drivers::DriverRegistry;
use std::sync::Arc;

fn registry(server: &ScriptedServer) -> Arc<ConnectionRegistry> {
    let mut drivers = DriverRegistry::new();
    drivers.register(Arc::new(MySqlDriverFactory::with_connector(server.connector())));
    Arc::new(ConnectionRegistry::with_drivers(drivers))
}

fn session(server: &ScriptedServer) -> Session {
    Session::new(registry(server))
}

fn config() -> ConnectionConfig {
    ConnectionConfig::new("mysql").with_host("db").with_timezone("")
}

fn script_users(server: &ScriptedServer) {
    server.rows(
        "SELECT id, name FROM users",
        vec![FieldInfo::new("id", 3), FieldInfo::new("name", 253)],
        vec![
            vec![Value::Int64(1), Value::from("Alice")],
            vec![Value::Int64(2), Value::from("Bob")],
        ],
    );
}

// =============================================================================
// Registry and active connection
// =============================================================================

#[test]
fn test_not_connected_before_connect() {
    let server = ScriptedServer::new();
    let session = session(&server);
    assert!(!session.is_connected());
    assert!(matches!(session.get_connection(None), Err(Error::NotConnected)));
    assert!(matches!(session.query("SELECT 1", &[]), Err(Error::NotConnected)));
}

#[test]
fn test_connect_registers_and_activates() {
    let server = ScriptedServer::new();
    let session = session(&server);
    let conn = session.connect(config(), Some("a")).unwrap();

    assert!(session.is_connected());
    assert!(Arc::ptr_eq(&conn, &session.get_connection(Some("a")).unwrap()));
    assert!(Arc::ptr_eq(&conn, &session.get_connection(None).unwrap()));
    assert_eq!(conn.name(), "a");
    assert_eq!(conn.config().charset.as_deref(), Some("utf8"));
}

#[test]
fn test_default_connection_name() {
    let server = ScriptedServer::new();
    let session = session(&server);
    session.connect(config(), None).unwrap();
    assert_eq!(session.registry().names(), vec![DEFAULT_CONNECTION.to_string()]);
    assert!(session.get_connection(Some("0")).is_ok());
}

#[test]
fn test_missing_named_connection() {
    let server = ScriptedServer::new();
    let session = session(&server);
    session.connect(config(), None).unwrap();
    match session.get_connection(Some("reporting")) {
        Err(Error::NoSuchConnection(name)) => assert_eq!(name, "reporting"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_unknown_driver() {
    let server = ScriptedServer::new();
    let session = session(&server);
    let err = session
        .connect(ConnectionConfig::new("oracle"), None)
        .unwrap_err();
    assert!(matches!(err, Error::UnknownDriver(_)));
    assert!(!session.is_connected());
}

#[test]
fn test_failed_connect_keeps_previous_active() {
    let server = ScriptedServer::new();
    let session = session(&server);
    let first = session.connect(config(), Some("first")).unwrap();

    server.refuse_connections(2002, "Can't connect to MySQL server on 'db'");
    let err = session.connect(config(), Some("second")).unwrap_err();
    assert_eq!(err.code(), Some(2002));
    assert!(Arc::ptr_eq(&first, &session.get_connection(None).unwrap()));
    assert_eq!(session.registry().names(), vec!["first".to_string()]);
}

#[test]
fn test_set_connection_only_moves_active_pointer() {
    let server = ScriptedServer::new();
    let session = session(&server);
    let a = session.connect(config(), Some("a")).unwrap();
    let b = session.connect(config(), Some("b")).unwrap();
    assert!(Arc::ptr_eq(&b, &session.get_connection(None).unwrap()));

    session.set_connection(a.clone());
    assert!(Arc::ptr_eq(&a, &session.get_connection(None).unwrap()));
    assert_eq!(session.registry().len(), 2);
}

#[test]
#[allow(deprecated)]
fn test_activate_by_name() {
    let server = ScriptedServer::new();
    let session = session(&server);
    let a = session.connect(config(), Some("a")).unwrap();
    session.connect(config(), Some("b")).unwrap();

    let activated = session.activate("a").unwrap();
    assert!(Arc::ptr_eq(&a, &activated));
    assert!(Arc::ptr_eq(&a, &session.get_connection(None).unwrap()));
    assert!(matches!(session.activate("zzz"), Err(Error::NoSuchConnection(_))));
}

#[test]
fn test_sessions_share_registry() {
    let server = ScriptedServer::new();
    let shared = registry(&server);
    let first = Session::new(shared.clone());
    let second = Session::new(shared.clone());

    let conn = first.connect(config(), Some("main")).unwrap();
    assert!(!second.is_connected());
    second.set_connection(second.get_connection(Some("main")).unwrap());
    assert!(Arc::ptr_eq(&conn, &second.get_connection(None).unwrap()));
}

#[test]
fn test_registry_disconnect_removes_entry() {
    let server = ScriptedServer::new();
    let registry = registry(&server);
    let conn = registry.connect(config(), "x").unwrap();
    assert_eq!(registry.len(), 1);

    registry.disconnect("x").unwrap();
    assert!(registry.is_empty());
    assert!(!conn.is_connected());
    assert!(matches!(registry.disconnect("x"), Err(Error::NoSuchConnection(_))));
}

#[test]
fn test_replaced_registry_entry_is_no_longer_active() {
    let server = ScriptedServer::new();
    let session = session(&server);
    let first = session.connect(config(), Some("a")).unwrap();
    let second = session.registry().connect(config(), "a").unwrap();
    assert!(Arc::ptr_eq(&first, &session.get_connection(None).unwrap()));

    drop(first);
    assert!(matches!(session.get_connection(None), Err(Error::NotConnected)));
    assert!(!session.is_connected());
    assert!(matches!(session.native_query("SELECT 1"), Err(Error::NotConnected)));
    assert!(Arc::ptr_eq(&second, &session.get_connection(Some("a")).unwrap()));
}

#[test]
fn test_removed_registry_entry_is_no_longer_active() {
    let server = ScriptedServer::new();
    let session = session(&server);
    drop(session.connect(config(), Some("a")).unwrap());
    assert!(session.is_connected());

    session.registry().disconnect("a").unwrap();
    assert!(matches!(session.get_connection(None), Err(Error::NotConnected)));
    assert!(matches!(session.query("SELECT ?", &[Value::Int64(1)]), Err(Error::NotConnected)));
}

#[test]
fn test_session_disconnect_closes_active_link() {
    let server = ScriptedServer::new();
    let session = session(&server);
    session.connect(config(), None).unwrap();
    session.disconnect().unwrap();

    assert!(!session.is_connected());
    assert!(session.get_connection(None).is_ok());
    assert!(matches!(session.native_query("SELECT 1"), Err(Error::NotConnected)));
}

// =============================================================================
// Forwarded operations
// =============================================================================

#[test]
fn test_fetch_helpers() {
    let server = ScriptedServer::new();
    script_users(&server);
    let session = session(&server);
    session.connect(config(), None).unwrap();

    let first = session.fetch("SELECT id, name FROM users", &[]).unwrap().unwrap();
    assert_eq!(first.get_by_name("name"), Some(&Value::from("Alice")));

    let all = session.fetch_all("SELECT id, name FROM users", &[]).unwrap();
    assert_eq!(all.len(), 2);
    assert!(matches!(all[1], RowData::Associative(_)));

    let single = session.fetch_single("SELECT id, name FROM users", &[]).unwrap();
    assert_eq!(single, Some(Value::Int64(1)));

    assert_eq!(session.fetch("DELETE FROM users", &[]).unwrap(), None);
    assert!(session.fetch_all("DELETE FROM users", &[]).unwrap().is_empty());
}

#[test]
fn test_query_binds_parameters_native_query_does_not() {
    let server = ScriptedServer::new();
    let session = session(&server);
    session.connect(config(), None).unwrap();

    session
        .query("UPDATE users SET name = ? WHERE id = ?", &[Value::from("Zoë"), Value::Int64(3)])
        .unwrap();
    session.native_query("SELECT '?'").unwrap();

    assert_eq!(
        server.executed(),
        vec![
            "UPDATE users SET name = 'Zoë' WHERE id = 3".to_string(),
            "SELECT '?'".to_string(),
        ]
    );
}

#[test]
fn test_affected_rows_and_insert_id() {
    let server = ScriptedServer::new();
    server.ok("INSERT INTO users (name) VALUES ('Eve')", 1, 11);
    server.fail("INSERT INTO users (id) VALUES (1)", 1062, "Duplicate entry '1' for key 'PRIMARY'");
    let session = session(&server);
    session.connect(config(), None).unwrap();

    session.query("INSERT INTO users (name) VALUES ('Eve')", &[]).unwrap();
    assert_eq!(session.affected_rows().unwrap(), 1);
    assert_eq!(session.insert_id(None).unwrap(), 11);

    let err = session.query("INSERT INTO users (id) VALUES (1)", &[]).unwrap_err();
    assert_eq!(err.driver_kind(), Some(DriverErrorKind::UniqueConstraintViolation));
    assert!(matches!(session.affected_rows(), Err(Error::Driver(_))));
}

#[test]
fn test_transactions_forwarded() {
    let server = ScriptedServer::new();
    let session = session(&server);
    session.connect(config(), None).unwrap();

    session.begin(None).unwrap();
    session.begin(Some("before_import")).unwrap();
    session.rollback(Some("before_import")).unwrap();
    session.commit(None).unwrap();

    assert_eq!(
        server.executed(),
        vec![
            "START TRANSACTION".to_string(),
            "SAVEPOINT before_import".to_string(),
            "ROLLBACK TO SAVEPOINT before_import".to_string(),
            "COMMIT".to_string(),
        ]
    );
}

#[test]
fn test_version_constant() {
    assert!(!VERSION.is_empty());
}
