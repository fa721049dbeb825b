// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Account rows: creation, reads, and the guarded balance updates.
//!
//! Balance changes are always expressed as SQL deltas, never as absolute
//! writes, so a credit landing between an admission decision and its commit
//! is never overwritten.

use chrono::NaiveDate;
use rusqlite::{OptionalExtension, params};

use tollgate_core::{Account, TollgateError, UserId};

use crate::database::{Database, map_tr_err};

pub(crate) const ACCOUNT_COLUMNS: &str = "user_id, display_name, daily_used, daily_reset_date, \
     balance_cents, total_requests, created_at, updated_at";

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

pub(crate) fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    let total_requests: i64 = row.get(5)?;
    Ok(Account {
        user_id: UserId(row.get(0)?),
        display_name: row.get(1)?,
        daily_used: row.get(2)?,
        daily_reset_date: row.get(3)?,
        balance_cents: row.get(4)?,
        total_requests: total_requests.max(0) as u64,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn select_account(
    conn: &rusqlite::Connection,
    user_id: &str,
) -> rusqlite::Result<Option<Account>> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ?1"),
        params![user_id],
        row_to_account,
    )
    .optional()
}

/// Result of a conditional balance update, decided inside the writer thread.
enum Guarded {
    Done(Account),
    Insufficient(i64),
    Missing,
}

impl Guarded {
    fn into_result(self, user_id: &str, required_cents: i64) -> Result<Account, TollgateError> {
        match self {
            Guarded::Done(account) => Ok(account),
            Guarded::Insufficient(balance_cents) => Err(TollgateError::InsufficientBalance {
                balance_cents,
                required_cents,
            }),
            Guarded::Missing => Err(TollgateError::AccountNotFound(user_id.to_string())),
        }
    }
}

/// After a guarded UPDATE, load the row and classify the outcome.
fn classify(
    conn: &rusqlite::Connection,
    user_id: &str,
    changed: usize,
) -> rusqlite::Result<Guarded> {
    Ok(match select_account(conn, user_id)? {
        Some(account) if changed == 1 => Guarded::Done(account),
        Some(account) => Guarded::Insufficient(account.balance_cents),
        None => Guarded::Missing,
    })
}

/// Returns the user's account, creating it on first contact.
///
/// Insert-if-absent and the read happen in one writer call, so concurrent
/// first messages from the same user create exactly one row. A non-empty
/// `display_name` refreshes the stored one.
pub async fn get_or_create(
    db: &Database,
    user_id: &UserId,
    display_name: &str,
    today: NaiveDate,
) -> Result<Account, TollgateError> {
    let user_id = user_id.0.clone();
    let display_name = display_name.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO accounts (user_id, display_name, daily_reset_date)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET display_name = excluded.display_name
                 WHERE excluded.display_name <> '' AND excluded.display_name <> accounts.display_name",
                params![user_id, display_name, today],
            )?;
            conn.query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ?1"),
                params![user_id],
                row_to_account,
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Reads an account as stored (no daily reset applied).
pub async fn get(db: &Database, user_id: &UserId) -> Result<Option<Account>, TollgateError> {
    let user_id = user_id.0.clone();
    db.connection()
        .call(move |conn| select_account(conn, &user_id))
        .await
        .map_err(map_tr_err)
}

/// One page of accounts, oldest first, as stored.
pub async fn list(db: &Database, limit: i64, offset: i64) -> Result<Vec<Account>, TollgateError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts
                 ORDER BY created_at ASC, user_id ASC
                 LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt.query_map(params![limit, offset], row_to_account)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count(db: &Database) -> Result<i64, TollgateError> {
    db.connection()
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get::<_, i64>(0)))
        .await
        .map_err(map_tr_err)
}

/// Persists the lazy daily reset. Returns whether the row was stale.
pub async fn reset_daily_if_stale(
    db: &Database,
    user_id: &UserId,
    today: NaiveDate,
) -> Result<bool, TollgateError> {
    let user_id = user_id.0.clone();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "UPDATE accounts SET daily_used = 0, daily_reset_date = ?2, updated_at = {NOW}
                     WHERE user_id = ?1 AND daily_reset_date < ?2"
                ),
                params![user_id, today],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed == 1)
}

/// Adds `amount` cents to the balance.
pub async fn credit(
    db: &Database,
    user_id: &UserId,
    amount: i64,
) -> Result<Account, TollgateError> {
    if amount < 0 {
        return Err(TollgateError::InvalidAmount { amount });
    }
    let uid = user_id.0.clone();
    let outcome = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE accounts SET balance_cents = balance_cents + ?2, updated_at = {NOW}
                     WHERE user_id = ?1"
                ),
                params![uid, amount],
            )?;
            classify(conn, &uid, changed)
        })
        .await
        .map_err(map_tr_err)?;
    outcome.into_result(&user_id.0, amount)
}

/// Subtracts `amount` cents unless that would make the balance negative.
pub async fn debit(
    db: &Database,
    user_id: &UserId,
    amount: i64,
) -> Result<Account, TollgateError> {
    if amount < 0 {
        return Err(TollgateError::InvalidAmount { amount });
    }
    let uid = user_id.0.clone();
    let outcome = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE accounts SET balance_cents = balance_cents - ?2, updated_at = {NOW}
                     WHERE user_id = ?1 AND balance_cents >= ?2"
                ),
                params![uid, amount],
            )?;
            classify(conn, &uid, changed)
        })
        .await
        .map_err(map_tr_err)?;
    outcome.into_result(&user_id.0, amount)
}

/// Persists one admitted request.
///
/// Writes the daily counter as computed by the admission controller (it is
/// only ever changed under the account lock), bumps the lifetime total, and
/// debits `debit_cents` conditionally. Nothing is written when the balance
/// no longer covers the debit.
pub async fn record_admission(
    db: &Database,
    user_id: &UserId,
    daily_used: u32,
    daily_reset_date: NaiveDate,
    debit_cents: i64,
) -> Result<Account, TollgateError> {
    if debit_cents < 0 {
        return Err(TollgateError::InvalidAmount {
            amount: debit_cents,
        });
    }
    let uid = user_id.0.clone();
    let outcome = db
        .connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE accounts SET daily_used = ?2, daily_reset_date = ?3,
                         total_requests = total_requests + 1,
                         balance_cents = balance_cents - ?4, updated_at = {NOW}
                     WHERE user_id = ?1 AND balance_cents >= ?4"
                ),
                params![uid, daily_used, daily_reset_date, debit_cents],
            )?;
            classify(conn, &uid, changed)
        })
        .await
        .map_err(map_tr_err)?;
    outcome.into_result(&user_id.0, debit_cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn get_or_create_inserts_once() {
        let db = setup().await;
        let uid = UserId::from("100");
        let first = get_or_create(&db, &uid, "Ada", day("2026-05-01")).await.unwrap();
        assert_eq!(first.display_name, "Ada");
        assert_eq!(first.balance_cents, 0);
        assert_eq!(first.daily_reset_date, day("2026-05-01"));

        credit(&db, &uid, 50).await.unwrap();
        let again = get_or_create(&db, &uid, "Ada L.", day("2026-05-02")).await.unwrap();
        assert_eq!(again.balance_cents, 50);
        assert_eq!(again.display_name, "Ada L.");
        // Creation date is not touched by later contact.
        assert_eq!(again.daily_reset_date, day("2026-05-01"));
    }

    #[tokio::test]
    async fn list_pages_in_creation_order() {
        let db = setup().await;
        for id in ["c", "a", "b"] {
            get_or_create(&db, &UserId::from(id), id, day("2026-05-01")).await.unwrap();
            // created_at has millisecond resolution.
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(count(&db).await.unwrap(), 3);

        let first: Vec<String> = list(&db, 2, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.user_id.0)
            .collect();
        assert_eq!(first, vec!["c", "a"]);
        let rest = list(&db, 2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].user_id, UserId::from("b"));
        assert!(list(&db, 2, 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_display_name_keeps_stored_one() {
        let db = setup().await;
        let uid = UserId::from("7");
        get_or_create(&db, &uid, "Grace", day("2026-05-01")).await.unwrap();
        let account = get_or_create(&db, &uid, "", day("2026-05-01")).await.unwrap();
        assert_eq!(account.display_name, "Grace");
    }

    #[tokio::test]
    async fn concurrent_first_contact_creates_one_row() {
        let db = setup().await;
        let mut handles = Vec::new();
        for _ in 0..20 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                get_or_create(&db, &UserId::from("race"), "R", day("2026-05-01")).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let count: i64 = db
            .connection()
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM accounts", [], |r| r.get(0)))
            .await
            .map_err(map_tr_err)
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn debit_refuses_overdraft() {
        let db = setup().await;
        let uid = UserId::from("1");
        get_or_create(&db, &uid, "", day("2026-05-01")).await.unwrap();
        credit(&db, &uid, 15).await.unwrap();

        let after = debit(&db, &uid, 10).await.unwrap();
        assert_eq!(after.balance_cents, 5);

        let err = debit(&db, &uid, 10).await.unwrap_err();
        assert!(matches!(
            err,
            TollgateError::InsufficientBalance {
                balance_cents: 5,
                required_cents: 10
            }
        ));
        assert_eq!(get(&db, &uid).await.unwrap().unwrap().balance_cents, 5);
    }

    #[tokio::test]
    async fn negative_amounts_are_rejected() {
        let db = setup().await;
        let uid = UserId::from("1");
        get_or_create(&db, &uid, "", day("2026-05-01")).await.unwrap();
        assert!(matches!(
            credit(&db, &uid, -5).await.unwrap_err(),
            TollgateError::InvalidAmount { amount: -5 }
        ));
        assert!(matches!(
            debit(&db, &uid, -5).await.unwrap_err(),
            TollgateError::InvalidAmount { amount: -5 }
        ));
    }

    #[tokio::test]
    async fn credit_unknown_account() {
        let db = setup().await;
        let err = credit(&db, &UserId::from("ghost"), 10).await.unwrap_err();
        assert!(matches!(err, TollgateError::AccountNotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn reset_only_when_stale() {
        let db = setup().await;
        let uid = UserId::from("1");
        get_or_create(&db, &uid, "", day("2026-05-01")).await.unwrap();
        record_admission(&db, &uid, 4, day("2026-05-01"), 0).await.unwrap();

        assert!(!reset_daily_if_stale(&db, &uid, day("2026-05-01")).await.unwrap());
        assert!(reset_daily_if_stale(&db, &uid, day("2026-05-02")).await.unwrap());
        let account = get(&db, &uid).await.unwrap().unwrap();
        assert_eq!(account.daily_used, 0);
        assert_eq!(account.daily_reset_date, day("2026-05-02"));
        assert_eq!(account.total_requests, 1);
    }

    #[tokio::test]
    async fn record_admission_debits_and_counts() {
        let db = setup().await;
        let uid = UserId::from("1");
        get_or_create(&db, &uid, "", day("2026-05-01")).await.unwrap();
        credit(&db, &uid, 10).await.unwrap();

        let account = record_admission(&db, &uid, 10, day("2026-05-01"), 10).await.unwrap();
        assert_eq!(account.daily_used, 10);
        assert_eq!(account.total_requests, 1);
        assert_eq!(account.balance_cents, 0);

        let err = record_admission(&db, &uid, 10, day("2026-05-01"), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, TollgateError::InsufficientBalance { .. }));
        let unchanged = get(&db, &uid).await.unwrap().unwrap();
        assert_eq!(unchanged.total_requests, 1);
    }
}
