//! Select tests: cursor iteration, seeking, row counts and column metadata
//!
//! Each scenario runs in buffered and streaming mode. Where the modes differ
//! (row counts, seeking) the test asserts the behaviour of each.

#[cfg(test)]
mod tests {
    use crate::fixtures::{ACTOR_SELECT, TestMode, scripted_fixture};
    use anyhow::{Context, Result};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use sqlgate_connection::ConnectionOps;
    use sqlgate_core::{ConnectionConfig, Error, RowData, Value};

    fn first_names(rows: &[RowData]) -> Vec<String> {
        rows.iter()
            .filter_map(|row| row.get_by_name("first_name"))
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    /// `SELECT 1` on an unbuffered connection yields a streaming cursor
    #[test]
    fn test_unbuffered_select_one() -> Result<()> {
        let fixture = scripted_fixture(TestMode::Streaming)?;
        let config = ConnectionConfig::new("mysql").with_host("db").unbuffered(true);
        fixture.session.connect(config, None)?;

        let mut result = fixture
            .session
            .query("SELECT 1", &[])?
            .context("SELECT 1 should produce a cursor")?;

        assert!(!result.is_buffered());
        assert!(matches!(result.row_count(), Err(Error::NotSupported(_))));

        let row = result.fetch(true)?.context("expected one row")?;
        let RowData::Associative(map) = row else {
            panic!("expected an associative row");
        };
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("1"), Some(&Value::Int64(1)));
        assert_eq!(result.fetch(true)?, None);

        Ok(())
    }

    /// Every row comes back exactly once, in order
    #[rstest]
    #[case::buffered(TestMode::Buffered)]
    #[case::streaming(TestMode::Streaming)]
    fn test_fetch_all_rows(#[case] mode: TestMode) -> Result<()> {
        let fixture = scripted_fixture(mode)?;

        let rows = fixture.session.fetch_all(ACTOR_SELECT, &[])?;
        assert_eq!(first_names(&rows), vec!["PENELOPE", "NICK", "ED"]);

        Ok(())
    }

    /// Positional rows keep the column order
    #[rstest]
    #[case::buffered(TestMode::Buffered)]
    #[case::streaming(TestMode::Streaming)]
    fn test_fetch_positional(#[case] mode: TestMode) -> Result<()> {
        let fixture = scripted_fixture(mode)?;
        let mut result = fixture
            .session
            .query(ACTOR_SELECT, &[])?
            .context("expected a cursor")?;

        let row = result.fetch(false)?.context("expected a row")?;
        assert_eq!(
            row,
            RowData::Positional(vec![
                Value::Int64(1),
                Value::from("PENELOPE"),
                Value::from("GUINESS"),
            ])
        );
        assert_eq!(row.get(2), Some(&Value::from("GUINESS")));

        Ok(())
    }

    /// Row counts and seeking exist only for buffered results
    #[rstest]
    #[case::buffered(TestMode::Buffered)]
    #[case::streaming(TestMode::Streaming)]
    fn test_row_count_and_seek(#[case] mode: TestMode) -> Result<()> {
        let fixture = scripted_fixture(mode)?;
        let mut result = fixture
            .session
            .query(ACTOR_SELECT, &[])?
            .context("expected a cursor")?;
        assert_eq!(result.is_buffered(), mode.is_buffered());

        if mode.is_buffered() {
            assert_eq!(result.row_count()?, 3);
            assert!(result.seek(2)?);
            let row = result.fetch(true)?.context("expected the third row")?;
            assert_eq!(row.get_by_name("first_name"), Some(&Value::from("ED")));
            assert!(!result.seek(3)?);
        } else {
            assert!(result.row_count().unwrap_err().is_not_supported());
            assert!(result.seek(0).unwrap_err().is_not_supported());
        }

        Ok(())
    }

    /// Seeking then fetching matches fetching sequentially
    #[test]
    fn test_seek_equivalent_to_sequential_fetch() -> Result<()> {
        let fixture = scripted_fixture(TestMode::Buffered)?;
        let mut sequential = fixture
            .session
            .query(ACTOR_SELECT, &[])?
            .context("expected a cursor")?;
        let mut seeking = fixture
            .session
            .query(ACTOR_SELECT, &[])?
            .context("expected a cursor")?;

        for k in 0..3u64 {
            sequential.seek(0)?;
            let mut expected = None;
            for _ in 0..=k {
                expected = sequential.fetch(true)?;
            }
            seeking.seek(k)?;
            assert_eq!(seeking.fetch(true)?, expected);
        }

        Ok(())
    }

    /// Column metadata is derived from the engine's field records
    #[rstest]
    #[case::buffered(TestMode::Buffered)]
    #[case::streaming(TestMode::Streaming)]
    fn test_columns(#[case] mode: TestMode) -> Result<()> {
        let fixture = scripted_fixture(mode)?;
        let mut result = fixture
            .session
            .query(ACTOR_SELECT, &[])?
            .context("expected a cursor")?;

        let columns = result.columns()?;
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].name, "actor_id");
        assert_eq!(columns[0].full_name, "actor.actor_id");
        assert_eq!(columns[0].table, "actor");
        assert_eq!(columns[0].native_type, "INT");
        assert_eq!(columns[1].native_type, "VAR_STRING");
        assert_eq!(columns[1].semantic_type, None);
        assert_eq!(
            columns[2].vendor.get("orgtable"),
            Some(&Value::from("actor"))
        );

        Ok(())
    }

    /// Freed cursors refuse further reads; freeing twice is harmless
    #[rstest]
    #[case::buffered(TestMode::Buffered)]
    #[case::streaming(TestMode::Streaming)]
    fn test_free_is_idempotent(#[case] mode: TestMode) -> Result<()> {
        let fixture = scripted_fixture(mode)?;
        let mut result = fixture
            .session
            .query(ACTOR_SELECT, &[])?
            .context("expected a cursor")?;

        result.fetch(true)?;
        result.free();
        result.free();
        assert!(result.is_freed());
        assert!(result.fetch(true).unwrap_err().is_not_supported());
        assert!(result.seek(0).unwrap_err().is_not_supported());
        assert!(result.row_count().unwrap_err().is_not_supported());

        // the link is usable again once the cursor is gone
        fixture.session.native_query("DO 1")?;

        Ok(())
    }

    /// A detached cursor hands over the native result and stops owning it
    #[rstest]
    #[case::buffered(TestMode::Buffered)]
    #[case::streaming(TestMode::Streaming)]
    fn test_detach(#[case] mode: TestMode) -> Result<()> {
        let fixture = scripted_fixture(mode)?;
        let mut result = fixture
            .session
            .query(ACTOR_SELECT, &[])?
            .context("expected a cursor")?;

        let native = result.detach().context("expected the native result")?;
        assert!(result.is_freed());
        assert!(result.detach().is_none());
        assert!(result.fetch(true).unwrap_err().is_not_supported());
        drop(native);

        Ok(())
    }

    /// Statements without a result set produce no cursor
    #[rstest]
    #[case::buffered(TestMode::Buffered)]
    #[case::streaming(TestMode::Streaming)]
    fn test_statement_without_rows(#[case] mode: TestMode) -> Result<()> {
        let fixture = scripted_fixture(mode)?;
        fixture
            .server
            .ok("UPDATE actor SET last_name = 'CHASE' WHERE actor_id = 3", 1, 0);

        let result = fixture
            .session
            .query("UPDATE actor SET last_name = ? WHERE actor_id = ?", &[
                Value::from("CHASE"),
                Value::Int64(3),
            ])?;
        assert!(result.is_none());
        assert_eq!(fixture.session.affected_rows()?, 1);
        assert_eq!(
            fixture.statements(),
            vec!["UPDATE actor SET last_name = 'CHASE' WHERE actor_id = 3".to_string()]
        );

        Ok(())
    }

    /// fetch and fetch_single read the first row only
    #[rstest]
    #[case::buffered(TestMode::Buffered)]
    #[case::streaming(TestMode::Streaming)]
    fn test_fetch_helpers(#[case] mode: TestMode) -> Result<()> {
        let fixture = scripted_fixture(mode)?;

        let row = fixture
            .session
            .fetch(ACTOR_SELECT, &[])?
            .context("expected a row")?;
        assert_eq!(row.get_by_name("last_name"), Some(&Value::from("GUINESS")));
        assert_eq!(
            fixture.session.fetch_single(ACTOR_SELECT, &[])?,
            Some(Value::Int64(1))
        );

        Ok(())
    }
}
