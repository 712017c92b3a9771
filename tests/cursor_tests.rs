//! Tests for cursor navigation, row refresh and updatable cursors
//!
//! Every test runs against a `MemorySession`, whose round-trip counters are
//! used to check when the cursor goes back to the server.

use ob_client::{
    ColumnInfo, Concurrency, Config, Connection, CursorEngine, CursorOptions, CursorPosition,
    Error, MemorySession, OracleType, ResultSetType, Value,
};

fn numbers_session(rows: i64) -> MemorySession {
    let session = MemorySession::new();
    session.create_table("nums", vec![ColumnInfo::new("N", OracleType::Number)]);
    for n in 1..=rows {
        session.insert("nums", vec![Value::Integer(n)]).unwrap();
    }
    session
}

async fn open(session: &MemorySession, options: CursorOptions) -> CursorEngine {
    let conn = Connection::new(session.clone(), Config::default());
    conn.open_cursor("SELECT * FROM nums", options).await.unwrap()
}

fn current(cursor: &CursorEngine) -> i64 {
    cursor.get(0).unwrap().as_i64().unwrap()
}

mod navigation_tests {
    use super::*;

    #[tokio::test]
    async fn test_insensitive_absolute_and_relative() {
        let session = numbers_session(100);
        let mut cursor = open(&session, CursorOptions::scroll_insensitive()).await;

        assert!(cursor.absolute(31).await.unwrap());
        assert_eq!(current(&cursor), 31);
        assert!(cursor.relative(30).await.unwrap());
        assert_eq!(current(&cursor), 61);
        assert!(cursor.absolute(-10).await.unwrap());
        assert_eq!(current(&cursor), 91);
        assert_eq!(cursor.row_number(), 91);

        assert!(!cursor.relative(140).await.unwrap());
        assert!(cursor.is_after_last().unwrap());
        assert!(!cursor.relative(-140).await.unwrap());
        assert!(cursor.is_before_first().unwrap());
    }

    #[tokio::test]
    async fn test_boundaries_on_non_empty_result() {
        let session = numbers_session(5);
        let mut cursor = open(&session, CursorOptions::scroll_insensitive()).await;

        assert!(cursor.is_before_first().unwrap());
        assert!(!cursor.previous().await.unwrap());
        assert!(cursor.is_before_first().unwrap());

        assert!(cursor.last().await.unwrap());
        assert!(cursor.is_last().await.unwrap());
        assert!(!cursor.next().await.unwrap());
        assert!(cursor.is_after_last().unwrap());
        assert!(!cursor.next().await.unwrap());
        assert!(cursor.is_after_last().unwrap());

        assert!(cursor.previous().await.unwrap());
        assert_eq!(current(&cursor), 5);

        assert!(!cursor.absolute(6).await.unwrap());
        assert_eq!(cursor.position(), CursorPosition::AfterLast);
        assert!(!cursor.absolute(-6).await.unwrap());
        assert_eq!(cursor.position(), CursorPosition::BeforeFirst);

        assert!(cursor.first().await.unwrap());
        assert!(cursor.is_first().unwrap());
        assert!(!cursor.absolute(0).await.unwrap());
        assert!(cursor.is_before_first().unwrap());

        assert!(cursor.after_last().await.unwrap());
        assert!(cursor.is_after_last().unwrap());
        assert!(cursor.relative(-2).await.unwrap());
        assert_eq!(current(&cursor), 4);
        assert!(cursor.relative(0).await.unwrap());
        assert_eq!(current(&cursor), 4);
    }

    #[tokio::test]
    async fn test_empty_result_navigation() {
        for options in [
            CursorOptions::scroll_insensitive(),
            CursorOptions::scroll_sensitive(),
            CursorOptions::new(),
            CursorOptions::streaming(10),
        ] {
            let session = numbers_session(0);
            let mut cursor = open(&session, options).await;
            assert!(cursor.is_empty());

            assert!(!cursor.next().await.unwrap());
            assert!(!cursor.previous().await.unwrap());
            assert!(!cursor.first().await.unwrap());
            assert!(!cursor.last().await.unwrap());
            assert!(!cursor.absolute(3).await.unwrap());
            assert!(!cursor.absolute(-3).await.unwrap());
            assert!(!cursor.relative(-140).await.unwrap());
            assert!(!cursor.relative(140).await.unwrap());
            assert!(!cursor.before_first().await.unwrap());
            assert!(!cursor.after_last().await.unwrap());

            assert!(!cursor.is_before_first().unwrap());
            assert!(!cursor.is_after_last().unwrap());
            assert!(!cursor.is_first().unwrap());
            assert!(!cursor.is_last().await.unwrap());
            assert_eq!(cursor.row_number(), 0);
        }
    }

    #[tokio::test]
    async fn test_absolute_zero_policy_by_mode() {
        let session = numbers_session(3);

        let mut forward = open(&session, CursorOptions::new()).await;
        assert!(matches!(forward.absolute(0).await, Err(Error::InvalidParameter(_))));

        let mut streaming = open(&session, CursorOptions::streaming(2)).await;
        assert!(matches!(streaming.absolute(0).await, Err(Error::InvalidParameter(_))));
        streaming.close().await.unwrap();

        let mut sensitive = open(&session, CursorOptions::scroll_sensitive()).await;
        assert!(sensitive.next().await.unwrap());
        assert!(!sensitive.absolute(0).await.unwrap());
        assert!(sensitive.is_before_first().unwrap());

        let empty = numbers_session(0);
        let mut forward = open(&empty, CursorOptions::new()).await;
        assert!(matches!(forward.absolute(0).await, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn test_forward_only_rejects_backward_moves() {
        let session = numbers_session(10);
        let mut cursor = open(&session, CursorOptions::streaming(3)).await;

        assert!(cursor.next().await.unwrap());
        assert!(cursor.relative(4).await.unwrap());
        assert_eq!(current(&cursor), 5);
        assert!(matches!(cursor.previous().await, Err(Error::UnsupportedOperation(_))));
        assert!(matches!(cursor.relative(-1).await, Err(Error::UnsupportedOperation(_))));
        assert!(matches!(cursor.absolute(2).await, Err(Error::UnsupportedOperation(_))));
        assert!(matches!(cursor.first().await, Err(Error::UnsupportedOperation(_))));
        assert_eq!(current(&cursor), 5);

        assert!(cursor.last().await.unwrap());
        assert_eq!(current(&cursor), 10);
        cursor.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_cursor() {
        let session = numbers_session(3);
        let mut cursor = open(&session, CursorOptions::scroll_insensitive()).await;
        assert!(cursor.next().await.unwrap());
        cursor.close().await.unwrap();
        cursor.close().await.unwrap();

        assert!(matches!(cursor.next().await, Err(Error::CursorClosed)));
        assert!(matches!(cursor.absolute(1).await, Err(Error::CursorClosed)));
        assert!(matches!(cursor.get(0), Err(Error::CursorClosed)));
        assert!(matches!(cursor.is_before_first(), Err(Error::CursorClosed)));
        assert!(matches!(cursor.refresh_row().await, Err(Error::CursorClosed)));
        assert_eq!(cursor.position(), CursorPosition::Closed);
        assert_eq!(session.open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_cursor_reports_its_modes() {
        let session = numbers_session(1);
        let cursor = open(&session, CursorOptions::scroll_sensitive().updatable()).await;
        assert_eq!(cursor.result_set_type(), ResultSetType::ScrollSensitive);
        assert_eq!(cursor.concurrency(), Concurrency::Updatable);
        assert_eq!(cursor.columns()[0].name, "N");
    }
}

mod fetch_tests {
    use super::*;

    #[tokio::test]
    async fn test_insensitive_fetches_everything_at_open() {
        let session = numbers_session(100);
        let mut cursor = open(&session, CursorOptions::scroll_insensitive().with_fetch_size(30)).await;
        assert_eq!(session.stats().fetches, 4);
        assert_eq!(cursor.window().len(), 100);

        assert!(cursor.last().await.unwrap());
        assert!(cursor.absolute(17).await.unwrap());
        assert!(cursor.previous().await.unwrap());
        assert_eq!(session.stats().fetches, 4);
    }

    #[tokio::test]
    async fn test_streaming_fetches_one_batch_per_edge() {
        let session = numbers_session(25);
        let mut cursor = open(&session, CursorOptions::streaming(10)).await;
        assert_eq!(session.stats().fetches, 1);

        for expected in 1..=10 {
            assert!(cursor.next().await.unwrap());
            assert_eq!(current(&cursor), expected);
        }
        assert_eq!(session.stats().fetches, 1);

        assert!(cursor.next().await.unwrap());
        assert_eq!(current(&cursor), 11);
        assert_eq!(session.stats().fetches, 2);
        assert_eq!(cursor.window().window_start(), 11);

        while cursor.next().await.unwrap() {}
        assert_eq!(session.stats().fetches, 3);
        assert!(cursor.is_after_last().unwrap());
        assert!(!cursor.next().await.unwrap());
        assert_eq!(session.stats().fetches, 3);
    }

    #[tokio::test]
    async fn test_sensitive_fetches_on_demand() {
        let session = numbers_session(30);
        let mut cursor = open(&session, CursorOptions::scroll_sensitive().with_fetch_size(10)).await;
        assert_eq!(session.stats().fetches, 1);

        for _ in 0..10 {
            assert!(cursor.next().await.unwrap());
        }
        assert_eq!(session.stats().fetches, 1);

        assert!(cursor.next().await.unwrap());
        assert_eq!(current(&cursor), 11);
        assert_eq!(session.stats().fetches, 2);

        assert!(cursor.previous().await.unwrap());
        assert_eq!(current(&cursor), 10);
        assert_eq!(session.stats().fetches, 3);
        assert_eq!(cursor.window().window_start(), 1);

        assert!(cursor.last().await.unwrap());
        assert_eq!(current(&cursor), 30);
        assert_eq!(session.stats().fetches, 4);

        assert!(cursor.previous().await.unwrap());
        assert_eq!(current(&cursor), 29);
        assert_eq!(session.stats().fetches, 5);
        assert_eq!(cursor.window().window_start(), 20);
    }

    #[tokio::test]
    async fn test_fetch_size_falls_back_to_config() {
        let session = numbers_session(12);
        let conn = Connection::new(session.clone(), Config::default().default_fetch_size(5));
        let mut cursor = conn
            .open_cursor("SELECT * FROM nums", CursorOptions::scroll_sensitive())
            .await
            .unwrap();
        assert_eq!(cursor.window().fetch_size(), 5);
        assert_eq!(cursor.window().len(), 5);
        assert!(cursor.absolute(7).await.unwrap());
        assert_eq!(cursor.window().window_start(), 7);
    }
}

mod refresh_tests {
    use super::*;

    #[tokio::test]
    async fn test_refresh_sees_committed_changes() {
        let session = numbers_session(10);
        let mut cursor = open(&session, CursorOptions::scroll_sensitive().with_fetch_size(5)).await;
        assert!(cursor.absolute(2).await.unwrap());

        let id = session.row_ids("nums")[1];
        assert!(session.set_value("nums", &id, 0, Value::Integer(200)));
        assert_eq!(current(&cursor), 2);

        cursor.refresh_row().await.unwrap();
        assert_eq!(current(&cursor), 200);
        assert_eq!(session.stats().refreshes, 1);
    }

    #[tokio::test]
    async fn test_refresh_after_delete_keeps_last_values() {
        let session = numbers_session(10);
        let mut cursor = open(&session, CursorOptions::scroll_sensitive()).await;
        assert!(cursor.absolute(3).await.unwrap());

        let id = session.row_ids("nums")[2];
        assert!(session.remove_row("nums", &id));

        cursor.refresh_row().await.unwrap();
        assert_eq!(current(&cursor), 3);
    }

    #[tokio::test]
    async fn test_refresh_after_drop_table_fails() {
        let session = numbers_session(10);
        let conn = Connection::new(session.clone(), Config::default());
        let mut cursor = conn
            .open_cursor("SELECT * FROM nums", CursorOptions::scroll_sensitive())
            .await
            .unwrap();
        assert!(cursor.next().await.unwrap());

        conn.execute("DROP TABLE nums").await.unwrap();
        let err = cursor.refresh_row().await.unwrap_err();
        assert!(err.is_table_not_found());
        assert!(err.to_string().starts_with("ORA-00942"));
        // cached values are untouched
        assert_eq!(current(&cursor), 1);
    }

    #[tokio::test]
    async fn test_refresh_requires_sensitive_cursor() {
        let session = numbers_session(3);
        for options in [CursorOptions::new(), CursorOptions::scroll_insensitive()] {
            let mut cursor = open(&session, options).await;
            assert!(cursor.next().await.unwrap());
            assert!(matches!(
                cursor.refresh_row().await,
                Err(Error::UnsupportedOperation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_refresh_without_current_row() {
        let session = numbers_session(3);
        let mut cursor = open(&session, CursorOptions::scroll_sensitive()).await;
        assert!(matches!(cursor.refresh_row().await, Err(Error::InvalidCursor(_))));
    }

    #[tokio::test]
    async fn test_insensitive_cache_ignores_deletes() {
        let session = numbers_session(5);
        let mut cursor = open(&session, CursorOptions::scroll_insensitive()).await;
        let id = session.row_ids("nums")[3];
        assert!(session.remove_row("nums", &id));

        assert!(cursor.absolute(4).await.unwrap());
        assert_eq!(current(&cursor), 4);
        assert!(cursor.last().await.unwrap());
        assert_eq!(cursor.row_number(), 5);
    }
}

mod update_tests {
    use super::*;

    #[tokio::test]
    async fn test_update_row() {
        let session = numbers_session(3);
        let conn = Connection::new(session.clone(), Config::default());
        let mut cursor = conn
            .open_cursor(
                "SELECT * FROM nums",
                CursorOptions::scroll_sensitive().updatable(),
            )
            .await
            .unwrap();
        assert!(cursor.absolute(2).await.unwrap());
        cursor.update_value(0, 20).unwrap();
        cursor.update_row().await.unwrap();
        assert_eq!(current(&cursor), 20);

        let id = session.row_ids("nums")[1];
        assert!(conn.is_row_locked(&id).await);
        cursor.refresh_row().await.unwrap();
        assert_eq!(current(&cursor), 20);

        cursor.close().await.unwrap();
        conn.commit().await.unwrap();
        assert_eq!(session.value("nums", &id, 0).and_then(|v| v.as_i64()), Some(20));
    }

    #[tokio::test]
    async fn test_moving_discards_pending_updates() {
        let session = numbers_session(3);
        let mut cursor = open(&session, CursorOptions::scroll_insensitive().updatable()).await;
        assert!(cursor.first().await.unwrap());
        cursor.update_value(0, 99).unwrap();
        assert_eq!(current(&cursor), 99);
        assert!(cursor.next().await.unwrap());
        assert!(cursor.previous().await.unwrap());
        assert_eq!(current(&cursor), 1);
    }

    #[tokio::test]
    async fn test_deleted_row_stays_readable() {
        let session = numbers_session(3);
        let mut cursor = open(&session, CursorOptions::new().updatable()).await;
        assert!(cursor.next().await.unwrap());
        cursor.delete_row().await.unwrap();

        assert!(cursor.row_deleted().unwrap());
        assert_eq!(current(&cursor), 1);
        assert_eq!(session.row_ids("nums").len(), 2);
        assert!(matches!(cursor.delete_row().await, Err(Error::InvalidCursor(_))));

        assert!(cursor.next().await.unwrap());
        assert!(!cursor.row_deleted().unwrap());
        assert_eq!(current(&cursor), 2);
    }

    #[tokio::test]
    async fn test_insert_row_keeps_position() {
        let session = numbers_session(3);
        let mut cursor = open(&session, CursorOptions::scroll_insensitive().updatable()).await;
        assert!(cursor.absolute(2).await.unwrap());

        cursor.move_to_insert_row().unwrap();
        assert!(cursor.get(0).unwrap().is_null());
        cursor.update_value(0, 4).unwrap();
        let id = cursor.insert_row().await.unwrap().unwrap();
        cursor.move_to_current_row().unwrap();

        assert_eq!(cursor.row_number(), 2);
        assert_eq!(current(&cursor), 2);
        assert_eq!(session.value("nums", &id, 0).and_then(|v| v.as_i64()), Some(4));
    }

    #[tokio::test]
    async fn test_read_only_cursor_rejects_updates() {
        let session = numbers_session(3);
        let mut cursor = open(&session, CursorOptions::scroll_sensitive()).await;
        assert!(cursor.next().await.unwrap());
        assert!(matches!(cursor.update_value(0, 1), Err(Error::UnsupportedOperation(_))));
        assert!(matches!(cursor.update_row().await, Err(Error::UnsupportedOperation(_))));
        assert!(matches!(cursor.delete_row().await, Err(Error::UnsupportedOperation(_))));
        assert!(matches!(cursor.move_to_insert_row(), Err(Error::UnsupportedOperation(_))));
        assert!(matches!(cursor.insert_row().await, Err(Error::UnsupportedOperation(_))));
    }

    #[tokio::test]
    async fn test_column_out_of_range() {
        let session = numbers_session(1);
        let mut cursor = open(&session, CursorOptions::scroll_insensitive().updatable()).await;
        assert!(cursor.next().await.unwrap());
        assert!(matches!(cursor.get(1), Err(Error::InvalidParameter(_))));
        assert!(matches!(cursor.update_value(1, 0), Err(Error::InvalidParameter(_))));
    }
}
