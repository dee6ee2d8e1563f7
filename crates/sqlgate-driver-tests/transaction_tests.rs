//! Transaction tests: begin/commit/rollback and savepoints

#[cfg(test)]
mod tests {
    use crate::fixtures::{TestMode, scripted_fixture};
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use sqlgate_connection::ConnectionOps;
    use sqlgate_core::{DriverErrorKind, Value};

    fn statements(sql: &[&str]) -> Vec<String> {
        sql.iter().map(|s| s.to_string()).collect()
    }

    /// A committed unit of work issues exactly the transaction statements
    #[rstest]
    #[case::buffered(TestMode::Buffered)]
    #[case::streaming(TestMode::Streaming)]
    fn test_commit(#[case] mode: TestMode) -> Result<()> {
        let fixture = scripted_fixture(mode)?;
        fixture.server.ok(
            "INSERT INTO actor (first_name, last_name) VALUES ('GRACE', 'MOSTEL')",
            1,
            201,
        );

        fixture.session.begin(None)?;
        fixture.session.query(
            "INSERT INTO actor (first_name, last_name) VALUES (?, ?)",
            &[Value::from("GRACE"), Value::from("MOSTEL")],
        )?;
        let id = fixture.session.insert_id(None)?;
        fixture.session.commit(None)?;

        assert_eq!(id, 201);
        assert_eq!(
            fixture.statements(),
            statements(&[
                "START TRANSACTION",
                "INSERT INTO actor (first_name, last_name) VALUES ('GRACE', 'MOSTEL')",
                "COMMIT",
            ])
        );

        Ok(())
    }

    /// Savepoints nest inside a transaction and roll back independently
    #[rstest]
    #[case::buffered(TestMode::Buffered)]
    #[case::streaming(TestMode::Streaming)]
    fn test_savepoints(#[case] mode: TestMode) -> Result<()> {
        let fixture = scripted_fixture(mode)?;

        fixture.session.begin(None)?;
        fixture.session.begin(Some("sp_actor"))?;
        fixture.session.rollback(Some("sp_actor"))?;
        fixture.session.begin(Some("sp_film"))?;
        fixture.session.commit(Some("sp_film"))?;
        fixture.session.rollback(None)?;

        assert_eq!(
            fixture.statements(),
            statements(&[
                "START TRANSACTION",
                "SAVEPOINT sp_actor",
                "ROLLBACK TO SAVEPOINT sp_actor",
                "SAVEPOINT sp_film",
                "RELEASE SAVEPOINT sp_film",
                "ROLLBACK",
            ])
        );

        Ok(())
    }

    /// Savepoint names are not checked client side; the engine's answer is surfaced
    #[rstest]
    #[case::buffered(TestMode::Buffered)]
    #[case::streaming(TestMode::Streaming)]
    fn test_unknown_savepoint(#[case] mode: TestMode) -> Result<()> {
        let fixture = scripted_fixture(mode)?;
        fixture.server.fail(
            "ROLLBACK TO SAVEPOINT never_created",
            1305,
            "SAVEPOINT never_created does not exist",
        );

        let err = fixture
            .session
            .rollback(Some("never_created"))
            .unwrap_err();
        assert_eq!(err.code(), Some(1305));
        assert_eq!(err.driver_kind(), Some(DriverErrorKind::Generic));

        Ok(())
    }

    /// Transactions follow the active connection
    #[test]
    fn test_transaction_on_named_connection() -> Result<()> {
        let fixture = scripted_fixture(TestMode::Buffered)?;
        let reporting = fixture
            .session
            .connect(TestMode::Buffered.config(), Some("reporting"))?;

        fixture.session.begin(None)?;
        assert!(std::sync::Arc::ptr_eq(
            &reporting,
            &fixture.session.get_connection(None)?
        ));
        reporting.commit(None)?;

        assert_eq!(fixture.statements(), statements(&["START TRANSACTION", "COMMIT"]));

        Ok(())
    }
}
