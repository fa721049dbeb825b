// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only usage records.

use rusqlite::params;

use tollgate_core::{TollgateError, UserId};

use crate::database::{Database, map_tr_err};
use crate::models::{UsageRecord, parse_text};

const USAGE_COLUMNS: &str = "id, user_id, request_text, response_text, approx_tokens, \
     charge_kind, cost_cents, outcome, created_at";

fn row_to_usage(row: &rusqlite::Row<'_>) -> rusqlite::Result<UsageRecord> {
    Ok(UsageRecord {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        request_text: row.get(2)?,
        response_text: row.get(3)?,
        approx_tokens: row.get(4)?,
        charge_kind: parse_text(5, row.get(5)?)?,
        cost_cents: row.get(6)?,
        outcome: parse_text(7, row.get(7)?)?,
        created_at: row.get(8)?,
    })
}

/// Appends a usage record. `created_at` is assigned by the database.
pub async fn insert_usage(db: &Database, record: &UsageRecord) -> Result<(), TollgateError> {
    let r = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO usage_records
                     (id, user_id, request_text, response_text, approx_tokens, charge_kind, cost_cents, outcome)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    r.id,
                    r.user_id.0,
                    r.request_text,
                    r.response_text,
                    r.approx_tokens,
                    r.charge_kind.to_string(),
                    r.cost_cents,
                    r.outcome.to_string(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent usage records for a user, newest first.
pub async fn list_for_user(
    db: &Database,
    user_id: &UserId,
    limit: usize,
) -> Result<Vec<UsageRecord>, TollgateError> {
    let user_id = user_id.0.clone();
    let limit = limit as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USAGE_COLUMNS} FROM usage_records
                 WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![user_id, limit], row_to_usage)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Totals for a user: number of records, approximate tokens, cents spent.
pub async fn totals_for_user(
    db: &Database,
    user_id: &UserId,
) -> Result<(i64, i64, i64), TollgateError> {
    let user_id = user_id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(approx_tokens), 0), COALESCE(SUM(cost_cents), 0)
                 FROM usage_records WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::accounts;
    use chrono::NaiveDate;
    use tollgate_core::{ChargeKind, UsageOutcome};

    fn record(id: &str, kind: ChargeKind, cost: i64) -> UsageRecord {
        UsageRecord {
            id: id.to_string(),
            user_id: UserId::from("u1"),
            request_text: "hello".to_string(),
            response_text: "hi there".to_string(),
            approx_tokens: 2,
            charge_kind: kind,
            cost_cents: cost,
            outcome: UsageOutcome::Succeeded,
            created_at: String::new(),
        }
    }

    #[tokio::test]
    async fn insert_list_and_total() {
        let db = Database::open_in_memory().await.unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        accounts::get_or_create(&db, &UserId::from("u1"), "", today)
            .await
            .unwrap();

        insert_usage(&db, &record("a", ChargeKind::Free, 0)).await.unwrap();
        insert_usage(&db, &record("b", ChargeKind::Paid, 10)).await.unwrap();

        let listed = list_for_user(&db, &UserId::from("u1"), 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "b");
        assert_eq!(listed[0].charge_kind, ChargeKind::Paid);

        let (count, tokens, spent) = totals_for_user(&db, &UserId::from("u1")).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(tokens, 4);
        assert_eq!(spent, 10);
    }

    #[tokio::test]
    async fn totals_for_unknown_user_are_zero() {
        let db = Database::open_in_memory().await.unwrap();
        let totals = totals_for_user(&db, &UserId::from("nobody")).await.unwrap();
        assert_eq!(totals, (0, 0, 0));
    }
}
