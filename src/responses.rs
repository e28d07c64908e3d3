use actix_web::HttpResponse;
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::database::models;
use crate::database::mutations::{CancelResult, SettleResult};
use crate::database::queries::{BalanceCheck, WalletBalance};

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WalletBody {
    user_id: String,
    balance: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BalanceCheckBody {
    user_id: String,
    balance: String,
    sufficient: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderBody {
    id: String,
    user_id: String,
    status: String,
    total_amount: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBody {
    id: i64,
    order_id: Option<String>,
    kind: String,
    amount: String,
    balance_before: String,
    balance_after: String,
    reason: Option<String>,
    created_at: NaiveDateTime,
}

fn error_body(message: &str) -> ErrorBody {
    ErrorBody {
        error: message.to_string(),
    }
}

fn order_body(order: models::Order) -> OrderBody {
    OrderBody {
        id: order.id,
        user_id: order.user_id,
        status: order.status,
        total_amount: order.total_amount.map(|a| a.to_string()),
        created_at: order.created_at,
        updated_at: order.updated_at,
    }
}

pub fn bad_parameter_http_response(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(error_body(message))
}

pub fn wallet_http_response(balance: WalletBalance, user_id: &str) -> HttpResponse {
    match balance {
        WalletBalance::Ok(balance) => HttpResponse::Ok().json(WalletBody {
            user_id: user_id.to_string(),
            balance: balance.balance.to_string(),
        }),
        WalletBalance::NotFound => HttpResponse::NotFound().json(error_body("wallet not found")),
    }
}

pub fn balance_check_http_response(check: BalanceCheck, user_id: &str) -> HttpResponse {
    match check {
        BalanceCheck::Ok { balance, sufficient } => HttpResponse::Ok().json(BalanceCheckBody {
            user_id: user_id.to_string(),
            balance: balance.to_string(),
            sufficient,
        }),
        BalanceCheck::NotFound => HttpResponse::NotFound().json(error_body("wallet not found")),
    }
}

pub fn order_http_response(order: Option<models::Order>) -> HttpResponse {
    match order {
        Some(order) => HttpResponse::Ok().json(order_body(order)),
        None => HttpResponse::NotFound().json(error_body("order not found")),
    }
}

pub fn created_order_http_response(order: models::Order) -> HttpResponse {
    HttpResponse::Created().json(order_body(order))
}

pub fn order_not_quotable_http_response() -> HttpResponse {
    HttpResponse::NotFound().json(error_body("order not found or not quotable"))
}

pub fn cancel_error_http_response(res: CancelResult) -> HttpResponse {
    match res {
        CancelResult::NotCancellable => {
            HttpResponse::NotFound().json(error_body("order not found or not cancellable"))
        }
        CancelResult::NotOrderOwner => HttpResponse::Forbidden().json(error_body("not the order owner")),
        CancelResult::Ok => HttpResponse::Ok().finish(),
    }
}

pub fn settle_error_http_response(res: SettleResult) -> HttpResponse {
    match res {
        SettleResult::OrderNotPayable => {
            HttpResponse::NotFound().json(error_body("order not found or not payable"))
        }
        SettleResult::NotOrderOwner => HttpResponse::Forbidden().json(error_body("not the order owner")),
        SettleResult::WalletNotFound => HttpResponse::NotFound().json(error_body("wallet not found")),
        SettleResult::InsufficientBalance => {
            HttpResponse::BadRequest().json(error_body("insufficient balance"))
        }
        SettleResult::Ok(_) => HttpResponse::Ok().finish(),
    }
}

pub fn transactions_http_response(transactions: Vec<models::WalletTransaction>) -> HttpResponse {
    let body: Vec<TransactionBody> = transactions
        .into_iter()
        .map(|tx| TransactionBody {
            id: tx.id,
            order_id: tx.order_id,
            kind: tx.kind,
            amount: tx.amount.to_string(),
            balance_before: tx.balance_before.to_string(),
            balance_after: tx.balance_after.to_string(),
            reason: tx.reason,
            created_at: tx.created_at,
        })
        .collect();
    HttpResponse::Ok().json(body)
}
