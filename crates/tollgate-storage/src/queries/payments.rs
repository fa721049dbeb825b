// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending payment tokens and the completed-payment log.

use rusqlite::{OptionalExtension, params};

use tollgate_core::{Account, PaymentStatus, TollgateError, UserId};

use crate::database::{Database, map_tr_err};
use crate::models::{PaymentRecord, PendingPayment, parse_text};
use crate::queries::accounts::{ACCOUNT_COLUMNS, row_to_account};

const PENDING_COLUMNS: &str =
    "token, user_id, package_id, channel, amount_minor, currency, status, created_at, updated_at";

const RECORD_COLUMNS: &str = "id, token, user_id, package_id, channel, amount_minor, currency, \
     normalized_cents, credited_cents, created_at";

fn row_to_pending(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingPayment> {
    Ok(PendingPayment {
        token: row.get(0)?,
        user_id: UserId(row.get(1)?),
        package_id: row.get(2)?,
        channel: parse_text(3, row.get(3)?)?,
        amount_minor: row.get(4)?,
        currency: row.get(5)?,
        status: parse_text(6, row.get(6)?)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PaymentRecord> {
    Ok(PaymentRecord {
        id: row.get(0)?,
        token: row.get(1)?,
        user_id: UserId(row.get(2)?),
        package_id: row.get(3)?,
        channel: parse_text(4, row.get(4)?)?,
        amount_minor: row.get(5)?,
        currency: row.get(6)?,
        normalized_cents: row.get(7)?,
        credited_cents: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn select_pending(
    conn: &rusqlite::Connection,
    token: &str,
) -> rusqlite::Result<Option<PendingPayment>> {
    conn.query_row(
        &format!("SELECT {PENDING_COLUMNS} FROM pending_payments WHERE token = ?1"),
        params![token],
        row_to_pending,
    )
    .optional()
}

/// Stores a freshly issued payment token. Fails if the token already exists.
pub async fn insert_pending(db: &Database, payment: &PendingPayment) -> Result<(), TollgateError> {
    let p = payment.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO pending_payments (token, user_id, package_id, channel, amount_minor, currency, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    p.token,
                    p.user_id.0,
                    p.package_id,
                    p.channel.to_string(),
                    p.amount_minor,
                    p.currency,
                    p.status.to_string(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_pending(
    db: &Database,
    token: &str,
) -> Result<Option<PendingPayment>, TollgateError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| select_pending(conn, &token))
        .await
        .map_err(map_tr_err)
}

/// Values the reconciler computes before asking storage to complete a token.
#[derive(Debug, Clone)]
pub struct Completion {
    pub record_id: String,
    pub credit_cents: i64,
    pub normalized_cents: i64,
}

/// What happened when a token was offered for completion.
#[derive(Debug, Clone)]
pub enum CompletionResult {
    /// This call moved the token to completed and credited the account.
    Completed {
        payment: PendingPayment,
        record: PaymentRecord,
        account: Account,
    },
    /// The token had already been completed; nothing changed.
    AlreadyCompleted(PendingPayment),
    /// The token is in a terminal non-completed state; nothing changed.
    NotPending(PendingPayment),
    /// No such token.
    NotFound,
}

/// Atomically completes a pending token and credits its owner.
///
/// The status flip is a compare-and-set (`WHERE status = 'pending'`) inside
/// one transaction with the balance increment and the payment record, so a
/// token can be credited at most once no matter how many times or through
/// how many channels completion is reported.
pub async fn complete_pending(
    db: &Database,
    token: &str,
    completion: Completion,
) -> Result<CompletionResult, TollgateError> {
    if completion.credit_cents < 0 {
        return Err(TollgateError::InvalidAmount {
            amount: completion.credit_cents,
        });
    }
    let token = token.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let flipped = tx.execute(
                "UPDATE pending_payments
                 SET status = 'completed', updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE token = ?1 AND status = 'pending'",
                params![token],
            )?;

            let Some(payment) = select_pending(&tx, &token)? else {
                return Ok(CompletionResult::NotFound);
            };

            if flipped == 0 {
                // Read-only outcome; dropping the transaction rolls back nothing.
                return Ok(match payment.status {
                    PaymentStatus::Completed => CompletionResult::AlreadyCompleted(payment),
                    _ => CompletionResult::NotPending(payment),
                });
            }

            let credited = tx.execute(
                "UPDATE accounts
                 SET balance_cents = balance_cents + ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE user_id = ?1",
                params![payment.user_id.0, completion.credit_cents],
            )?;
            if credited == 0 {
                // The buyer never messaged the bot; open the account now.
                tx.execute(
                    "INSERT INTO accounts (user_id, daily_reset_date, balance_cents)
                     VALUES (?1, date('now'), ?2)",
                    params![payment.user_id.0, completion.credit_cents],
                )?;
            }

            tx.execute(
                "INSERT INTO payment_records
                     (id, token, user_id, package_id, channel, amount_minor, currency, normalized_cents, credited_cents)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    completion.record_id,
                    payment.token,
                    payment.user_id.0,
                    payment.package_id,
                    payment.channel.to_string(),
                    payment.amount_minor,
                    payment.currency,
                    completion.normalized_cents,
                    completion.credit_cents,
                ],
            )?;

            let record = tx.query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM payment_records WHERE token = ?1"),
                params![payment.token],
                row_to_record,
            )?;
            let account = tx.query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ?1"),
                params![payment.user_id.0],
                row_to_account,
            )?;
            let payment = select_pending(&tx, &token)?.unwrap_or(payment);

            tx.commit()?;
            Ok(CompletionResult::Completed {
                payment,
                record,
                account,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Moves a pending token to failed.
///
/// Returns the token's status after the call, or `None` for an unknown token.
/// Completed tokens stay completed.
pub async fn mark_failed(db: &Database, token: &str) -> Result<Option<PaymentStatus>, TollgateError> {
    let token = token.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE pending_payments
                 SET status = 'failed', updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE token = ?1 AND status = 'pending'",
                params![token],
            )?;
            Ok(select_pending(conn, &token)?.map(|p| p.status))
        })
        .await
        .map_err(map_tr_err)
}

/// Completed payments for a user, newest first.
pub async fn list_records_for_user(
    db: &Database,
    user_id: &UserId,
) -> Result<Vec<PaymentRecord>, TollgateError> {
    let user_id = user_id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM payment_records
                 WHERE user_id = ?1 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map(params![user_id], row_to_record)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Tokens still waiting for completion for a user.
pub async fn list_pending_for_user(
    db: &Database,
    user_id: &UserId,
) -> Result<Vec<PendingPayment>, TollgateError> {
    let user_id = user_id.0.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PENDING_COLUMNS} FROM pending_payments
                 WHERE user_id = ?1 AND status = 'pending' ORDER BY created_at ASC"
            ))?;
            let rows = stmt.query_map(params![user_id], row_to_pending)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}
