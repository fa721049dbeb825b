// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User-facing texts.

use tollgate_core::{Package, format_cents};
use tollgate_ledger::{AccountSummary, PackageCatalog, RejectReason, Rejection};

pub const PROCESSING: &str = "Processing your request...";

pub const BUSY: &str = "I'm handling a lot of requests right now. Please try again in a moment.";

pub const UNKNOWN_COMMAND: &str = "Unknown command. Use /help to see what I can do.";

pub const INVOICE_FAILED: &str =
    "Could not create an invoice right now. Please try again later.";

pub const STATS_UNAVAILABLE: &str = "Could not load your statistics right now.";

/// Longest request or response text kept in a usage record.
pub const USAGE_TEXT_LIMIT: usize = 4000;

/// Shortens `text` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Rough token estimate used for usage records: four characters per token.
pub fn approx_tokens(text: &str) -> i64 {
    (text.chars().count() / 4) as i64
}

/// Formats an amount in minor units, e.g. `40000, "RUB"` as `400.00 RUB`.
pub fn format_minor(amount_minor: i64, currency: &str) -> String {
    let sign = if amount_minor < 0 { "-" } else { "" };
    let abs = amount_minor.unsigned_abs();
    format!("{sign}{}.{:02} {currency}", abs / 100, abs % 100)
}

pub fn welcome(display_name: &str, free_daily_limit: u32) -> String {
    let name = if display_name.trim().is_empty() {
        "there"
    } else {
        display_name
    };
    format!(
        "Welcome, {name}!\n\n\
         I'm an AI assistant. Ask me anything.\n\n\
         Statistics: /stats\n\
         Top up: /payment\n\
         Help: /help\n\n\
         You get {free_daily_limit} free requests every day. \
         After that, buy request packages to keep going."
    )
}

pub fn help(catalog: &PackageCatalog, free_daily_limit: u32, invoice_currency: &str) -> String {
    let mut text = format!(
        "Just write a question and I'll answer it.\n\
         Free: {free_daily_limit} requests per day. Paid requests are used once those run out.\n\n\
         Commands:\n\
         /start - get started\n\
         /stats - your usage and balance\n\
         /payment - request packages\n"
    );
    for package in catalog.iter() {
        text.push_str(&format!(
            "/buy_{} - buy {} requests ({})\n",
            package.id,
            package.requests,
            format_minor(package.invoice_price_minor, invoice_currency)
        ));
    }
    text.push_str("/help - this message");
    text
}

pub fn stats(summary: &AccountSummary, spent_cents: i64) -> String {
    let account = &summary.account;
    format!(
        "Your statistics\n\n\
         Free requests today: {used}/{limit} used, {left} left\n\
         Balance: {balance} ({paid} paid requests)\n\
         Total requests: {total}\n\
         Total spent: {spent}",
        used = account.daily_used.min(summary.free_daily_limit),
        limit = summary.free_daily_limit,
        left = summary.remaining_free,
        balance = format_cents(account.balance_cents),
        paid = summary.paid_requests_left,
        total = account.total_requests,
        spent = format_cents(spent_cents),
    )
}

pub fn catalog(catalog: &PackageCatalog, invoice_currency: &str) -> String {
    let mut text = String::from("Request packages\n\n");
    for package in catalog.iter() {
        text.push_str(&package_line(package, invoice_currency));
        text.push('\n');
    }
    text.push_str("\nRequests are added to your balance as soon as the payment goes through.");
    text
}

fn package_line(package: &Package, invoice_currency: &str) -> String {
    let per_request = if package.requests > 0 {
        package.invoice_price_minor / i64::from(package.requests)
    } else {
        0
    };
    format!(
        "{} requests - {} ({} per request, {} by card)\n   Command: /buy_{}",
        package.requests,
        format_minor(package.invoice_price_minor, invoice_currency),
        format_minor(per_request, invoice_currency),
        format_cents(package.checkout_price_cents),
        package.id
    )
}

pub fn unknown_package(id: &str, catalog: &PackageCatalog) -> String {
    let options: Vec<String> = catalog.iter().map(|p| format!("/buy_{}", p.id)).collect();
    format!(
        "There is no package \"{id}\". Use {}.",
        options.join(", ")
    )
}

pub fn rejection(rejection: &Rejection) -> String {
    match rejection.reason {
        RejectReason::QuotaExhausted => format!(
            "You have used all {} free requests for today.\n\n\
             To continue, top up your balance with /payment. \
             Free requests come back tomorrow.",
            rejection.free_daily_limit
        ),
        RejectReason::InsufficientBalance => format!(
            "Your balance ({}) does not cover another request ({}).\n\n\
             Top up with /payment to continue.",
            format_cents(rejection.balance_cents),
            format_cents(rejection.cost_cents)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tollgate_core::{Account, UserId};

    #[test]
    fn truncation_marks_the_cut() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello world", 8), "hello...");
        let long = "x".repeat(5000);
        let cut = truncate_chars(&long, USAGE_TEXT_LIMIT);
        assert_eq!(cut.chars().count(), USAGE_TEXT_LIMIT);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "привет мир";
        assert_eq!(truncate_chars(text, 6), "при...");
    }

    #[test]
    fn token_estimate() {
        assert_eq!(approx_tokens(""), 0);
        assert_eq!(approx_tokens("abcdefgh"), 2);
    }

    #[test]
    fn minor_units() {
        assert_eq!(format_minor(40_000, "RUB"), "400.00 RUB");
        assert_eq!(format_minor(705, "USD"), "7.05 USD");
    }

    #[test]
    fn rejection_texts() {
        let base = Rejection {
            reason: RejectReason::QuotaExhausted,
            free_daily_limit: 10,
            daily_used: 10,
            balance_cents: 0,
            cost_cents: 10,
        };
        assert!(rejection(&base).contains("all 10 free requests"));

        let short = Rejection {
            reason: RejectReason::InsufficientBalance,
            balance_cents: 5,
            ..base
        };
        let text = rejection(&short);
        assert!(text.contains("$0.05"));
        assert!(text.contains("$0.10"));
    }

    #[test]
    fn catalog_lists_every_package() {
        let text = catalog(&PackageCatalog::default(), "RUB");
        assert!(text.contains("/buy_10"));
        assert!(text.contains("/buy_50"));
        assert!(text.contains("/buy_100"));
        assert!(text.contains("700.00 RUB"));
        assert!(text.contains("7.00 RUB per request"));
    }

    #[test]
    fn stats_render() {
        let mut account = Account::new(
            UserId::from("1"),
            "A",
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        );
        account.daily_used = 4;
        account.balance_cents = 120;
        account.total_requests = 30;
        let summary = AccountSummary {
            account,
            free_daily_limit: 10,
            remaining_free: 6,
            cost_cents: 10,
            paid_requests_left: 12,
        };
        let text = stats(&summary, 250);
        assert!(text.contains("4/10 used, 6 left"));
        assert!(text.contains("$1.20 (12 paid requests)"));
        assert!(text.contains("Total spent: $2.50"));
    }
}
