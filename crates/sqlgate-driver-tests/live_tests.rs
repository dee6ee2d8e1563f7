//! Live server tests
//!
//! These talk to a real MySQL or MariaDB server through the `mysql_async`
//! link. They are ignored by default; set `SQLGATE_TEST_MYSQL_HOST` (and
//! optionally `_PORT`, `_USER`, `_PASSWORD`, `_DATABASE`) and run with
//! `--ignored`.

#[cfg(test)]
mod tests {
    use crate::fixtures::{TestMode, init_tracing, live_config};
    use anyhow::{Context, Result};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use sqlgate_connection::{ConnectionOps, Session};
    use sqlgate_core::{DriverErrorKind, RowData, Value};
    use sqlgate_driver_mysql::CR_COMMANDS_OUT_OF_SYNC;

    fn live_session(mode: TestMode) -> Result<Option<Session>> {
        init_tracing();
        let Some(config) = live_config() else {
            tracing::warn!("SQLGATE_TEST_MYSQL_HOST not set, skipping live test");
            return Ok(None);
        };
        let session = Session::with_defaults();
        session
            .connect(config.unbuffered(!mode.is_buffered()), None)
            .context("failed to connect to the live server")?;
        Ok(Some(session))
    }

    #[rstest]
    #[case::buffered(TestMode::Buffered)]
    #[case::streaming(TestMode::Streaming)]
    #[ignore = "requires a MySQL server (SQLGATE_TEST_MYSQL_HOST)"]
    fn test_live_select_one(#[case] mode: TestMode) -> Result<()> {
        let Some(session) = live_session(mode)? else {
            return Ok(());
        };

        let mut result = session
            .query("SELECT 1", &[])?
            .context("SELECT 1 should produce a cursor")?;
        assert_eq!(result.is_buffered(), mode.is_buffered());
        assert_eq!(result.row_count().is_ok(), mode.is_buffered());

        let row = result.fetch(true)?.context("expected one row")?;
        let RowData::Associative(map) = row else {
            panic!("expected an associative row");
        };
        assert_eq!(map.get("1"), Some(&Value::Int64(1)));
        assert_eq!(result.fetch(true)?, None);

        Ok(())
    }

    #[rstest]
    #[case::buffered(TestMode::Buffered)]
    #[case::streaming(TestMode::Streaming)]
    #[ignore = "requires a MySQL server (SQLGATE_TEST_MYSQL_HOST)"]
    fn test_live_temporary_table_round_trip(#[case] mode: TestMode) -> Result<()> {
        let Some(session) = live_session(mode)? else {
            return Ok(());
        };

        session.native_query(
            "CREATE TEMPORARY TABLE sqlgate_actor (\
             actor_id INT PRIMARY KEY AUTO_INCREMENT, \
             name VARCHAR(45) NOT NULL UNIQUE, \
             joined DATE NULL)",
        )?;

        session.begin(None)?;
        session.query(
            "INSERT INTO sqlgate_actor (name, joined) VALUES (?, ?)",
            &[
                Value::from("PENELOPE"),
                Value::Date(chrono::NaiveDate::from_ymd_opt(2006, 2, 15).context("date")?),
            ],
        )?;
        let id = session.insert_id(None)?;
        session.commit(None)?;
        assert!(id > 0);

        let duplicate = session
            .query("INSERT INTO sqlgate_actor (name) VALUES (?)", &[Value::from("PENELOPE")])
            .unwrap_err();
        assert_eq!(
            duplicate.driver_kind(),
            Some(DriverErrorKind::UniqueConstraintViolation)
        );

        let missing = session
            .native_query("INSERT INTO sqlgate_actor (name) VALUES (NULL)")
            .unwrap_err();
        assert_eq!(
            missing.driver_kind(),
            Some(DriverErrorKind::NotNullConstraintViolation)
        );

        let name = session.fetch_single(
            "SELECT name FROM sqlgate_actor WHERE actor_id = ?",
            &[Value::Int64(i64::try_from(id)?)],
        )?;
        assert_eq!(name, Some(Value::from("PENELOPE")));

        Ok(())
    }

    #[test]
    #[ignore = "requires a MySQL server (SQLGATE_TEST_MYSQL_HOST)"]
    fn test_live_streaming_out_of_sync() -> Result<()> {
        let Some(session) = live_session(TestMode::Streaming)? else {
            return Ok(());
        };

        let mut result = session
            .native_query("SELECT 1 UNION ALL SELECT 2 UNION ALL SELECT 3")?
            .context("expected a cursor")?;
        result.fetch(false)?;

        let err = session.native_query("SELECT 4").unwrap_err();
        assert_eq!(err.code(), Some(CR_COMMANDS_OUT_OF_SYNC));

        drop(result);
        assert!(session.native_query("SELECT 4")?.is_some());

        Ok(())
    }
}
