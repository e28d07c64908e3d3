use std::ops::DerefMut;
use std::str::FromStr;

use actix_request_identifier::RequestId;
use actix_web::{get, post, web, HttpResponse};
use bigdecimal::{BigDecimal, Signed, Zero};
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use tracing::{error, instrument};

use crate::database::{mutations, queries};
use crate::{requests, responses};

fn parse_amount(raw: &str) -> Option<BigDecimal> {
    let amount = BigDecimal::from_str(raw).ok()?;
    if amount.is_negative() || amount.is_zero() {
        return None;
    }
    Some(amount)
}

#[get("/wallet/{user_id}")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn balance_handler(
    db: web::Data<Pool<ConnectionManager<PgConnection>>>,
    request_id: RequestId,
    user_id: web::Path<String>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let user_id = user_id.clone();

    let mut conn = db.get()?;

    let user_id1 = user_id.clone();
    web::block(move || queries::load_wallet(conn.deref_mut(), user_id1.as_str()).map_err(anyhow::Error::from))
        .await
        .unwrap_or_else(|e| {
            error!("{e}");
            Err(e.into())
        })
        .map(|balance| responses::wallet_http_response(balance, user_id.as_str()))
        .map_err(Into::into)
}

#[post("/wallet/check-balance")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn check_balance_handler(
    db: web::Data<Pool<ConnectionManager<PgConnection>>>,
    request_id: RequestId,
    check_request: web::Json<requests::CheckBalanceInput>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let mut conn = db.get()?;

    if check_request.user_id.is_empty() {
        return Ok(responses::bad_parameter_http_response("userId is empty"));
    }
    let req_amount = match parse_amount(check_request.amount.as_str()) {
        Some(req_amount) => req_amount,
        None => return Ok(responses::bad_parameter_http_response("amount is invalid")),
    };

    let user_id = check_request.user_id.clone();
    let user_id1 = user_id.clone();
    web::block(move || {
        queries::check_balance(conn.deref_mut(), user_id1.as_str(), &req_amount).map_err(anyhow::Error::from)
    })
    .await
    .unwrap_or_else(|e| {
        error!("{e}");
        Err(e.into())
    })
    .map(|check| responses::balance_check_http_response(check, user_id.as_str()))
    .map_err(Into::into)
}

#[post("/wallet/add")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn add_balance_handler(
    db: web::Data<Pool<ConnectionManager<PgConnection>>>,
    request_id: RequestId,
    add_request: web::Json<requests::AddBalanceInput>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let mut conn = db.get()?;

    if add_request.idempotency_key.is_empty() {
        return Ok(responses::bad_parameter_http_response("idempotencyKey is empty"));
    }
    if add_request.user_id.is_empty() {
        return Ok(responses::bad_parameter_http_response("userId is empty"));
    }
    let req_amount = match parse_amount(add_request.amount.as_str()) {
        Some(req_amount) => req_amount,
        None => return Ok(responses::bad_parameter_http_response("amount is invalid")),
    };

    let user_id = add_request.user_id.clone();
    web::block(move || {
        let req_reason = if add_request.reason.is_empty() {
            None
        } else {
            Some(add_request.reason.as_str())
        };
        mutations::credit(
            conn.deref_mut(),
            add_request.idempotency_key.as_str(),
            add_request.user_id.as_str(),
            req_amount,
            req_reason,
        )
        .map_err(anyhow::Error::from)?;
        queries::load_wallet(conn.deref_mut(), add_request.user_id.as_str()).map_err(anyhow::Error::from)
    })
    .await
    .unwrap_or_else(|e| {
        error!("{e}");
        Err(e.into())
    })
    .map(|balance| responses::wallet_http_response(balance, user_id.as_str()))
    .map_err(Into::into)
}

#[get("/wallet/{user_id}/transactions")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn transactions_handler(
    db: web::Data<Pool<ConnectionManager<PgConnection>>>,
    request_id: RequestId,
    user_id: web::Path<String>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let mut conn = db.get()?;

    let user_id = user_id.clone();
    web::block(move || queries::list_transactions(conn.deref_mut(), user_id.as_str()).map_err(anyhow::Error::from))
        .await
        .unwrap_or_else(|e| {
            error!("{e}");
            Err(e.into())
        })
        .map(responses::transactions_http_response)
        .map_err(Into::into)
}

#[post("/orders")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn create_order_handler(
    db: web::Data<Pool<ConnectionManager<PgConnection>>>,
    request_id: RequestId,
    create_request: web::Json<requests::CreateOrderInput>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let mut conn = db.get()?;

    if create_request.user_id.is_empty() {
        return Ok(responses::bad_parameter_http_response("userId is empty"));
    }

    web::block(move || {
        mutations::create_order(conn.deref_mut(), create_request.user_id.as_str()).map_err(anyhow::Error::from)
    })
    .await
    .unwrap_or_else(|e| {
        error!("{e}");
        Err(e.into())
    })
    .map(responses::created_order_http_response)
    .map_err(Into::into)
}

#[post("/orders/quote")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn quote_order_handler(
    db: web::Data<Pool<ConnectionManager<PgConnection>>>,
    request_id: RequestId,
    quote_request: web::Json<requests::QuoteOrderInput>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let mut conn = db.get()?;

    if quote_request.order_id.is_empty() {
        return Ok(responses::bad_parameter_http_response("orderId is empty"));
    }
    let req_amount = match parse_amount(quote_request.amount.as_str()) {
        Some(req_amount) => req_amount,
        None => return Ok(responses::bad_parameter_http_response("amount is invalid")),
    };

    enum BlockResult {
        NotQuotable,
        OrderResult(Option<crate::database::models::Order>),
        Error(anyhow::Error),
    }
    web::block(move || {
        let res = mutations::quote_order(conn.deref_mut(), quote_request.order_id.as_str(), req_amount);
        match res {
            Ok(mutations::QuoteResult::Ok) => {}
            Ok(mutations::QuoteResult::NotQuotable) => return BlockResult::NotQuotable,
            Err(e) => return BlockResult::Error(e.into()),
        };

        match queries::load_order(conn.deref_mut(), quote_request.order_id.as_str()) {
            Ok(res) => BlockResult::OrderResult(res),
            Err(e) => BlockResult::Error(e.into()),
        }
    })
    .await
    .map(|res| match res {
        BlockResult::NotQuotable => Ok(responses::order_not_quotable_http_response()),
        BlockResult::OrderResult(order) => Ok(responses::order_http_response(order)),
        BlockResult::Error(e) => Err(e.into()),
    })
    .unwrap_or_else(|e| {
        error!("{e}");
        Err(e.into())
    })
}

#[post("/orders/cancel")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn cancel_order_handler(
    db: web::Data<Pool<ConnectionManager<PgConnection>>>,
    request_id: RequestId,
    cancel_request: web::Json<requests::CancelOrderInput>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let mut conn = db.get()?;

    if cancel_request.order_id.is_empty() {
        return Ok(responses::bad_parameter_http_response("orderId is empty"));
    }
    if cancel_request.user_id.is_empty() {
        return Ok(responses::bad_parameter_http_response("userId is empty"));
    }

    enum BlockResult {
        CancelError(mutations::CancelResult),
        OrderResult(Option<crate::database::models::Order>),
        Error(anyhow::Error),
    }
    web::block(move || {
        let res = mutations::cancel_order(
            conn.deref_mut(),
            cancel_request.order_id.as_str(),
            cancel_request.user_id.as_str(),
        );
        match res {
            Ok(mutations::CancelResult::Ok) => {}
            Ok(res) => return BlockResult::CancelError(res),
            Err(e) => return BlockResult::Error(e.into()),
        };

        match queries::load_order(conn.deref_mut(), cancel_request.order_id.as_str()) {
            Ok(res) => BlockResult::OrderResult(res),
            Err(e) => BlockResult::Error(e.into()),
        }
    })
    .await
    .map(|res| match res {
        BlockResult::CancelError(res) => Ok(responses::cancel_error_http_response(res)),
        BlockResult::OrderResult(order) => Ok(responses::order_http_response(order)),
        BlockResult::Error(e) => Err(e.into()),
    })
    .unwrap_or_else(|e| {
        error!("{e}");
        Err(e.into())
    })
}

#[get("/orders/{order_id}")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn order_handler(
    db: web::Data<Pool<ConnectionManager<PgConnection>>>,
    request_id: RequestId,
    order_id: web::Path<String>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let mut conn = db.get()?;

    let order_id = order_id.clone();
    web::block(move || queries::load_order(conn.deref_mut(), order_id.as_str()).map_err(anyhow::Error::from))
        .await
        .unwrap_or_else(|e| {
            error!("{e}");
            Err(e.into())
        })
        .map(responses::order_http_response)
        .map_err(Into::into)
}

#[post("/orders/pay")]
#[instrument(skip(db), fields(request_id = request_id.as_str()))]
pub async fn pay_handler(
    db: web::Data<Pool<ConnectionManager<PgConnection>>>,
    request_id: RequestId,
    pay_request: web::Json<requests::PayOrderInput>,
) -> Result<HttpResponse, Box<dyn std::error::Error>> {
    let mut conn = db.get()?;

    if pay_request.order_id.is_empty() {
        return Ok(responses::bad_parameter_http_response("orderId is empty"));
    }
    if pay_request.user_id.is_empty() {
        return Ok(responses::bad_parameter_http_response("userId is empty"));
    }

    let req_user_id = pay_request.user_id.clone();
    enum BlockResult {
        SettleError(mutations::SettleResult),
        WalletResult(queries::WalletBalance),
        Error(anyhow::Error),
    }
    web::block(move || {
        let res = mutations::settle(
            conn.deref_mut(),
            pay_request.order_id.as_str(),
            pay_request.user_id.as_str(),
        );
        match res {
            Ok(mutations::SettleResult::Ok(_)) => {}
            Ok(res) => return BlockResult::SettleError(res),
            Err(e) => return BlockResult::Error(e.into()),
        };

        let res = queries::load_wallet(conn.deref_mut(), pay_request.user_id.as_str());
        match res {
            Ok(res) => BlockResult::WalletResult(res),
            Err(e) => BlockResult::Error(e.into()),
        }
    })
    .await
    .map(|res| match res {
        BlockResult::SettleError(res) => Ok(responses::settle_error_http_response(res)),
        BlockResult::WalletResult(balance) => Ok(responses::wallet_http_response(
            balance,
            req_user_id.as_str(),
        )),
        BlockResult::Error(e) => Err(e.into()),
    })
    .unwrap_or_else(|e| {
        error!("{e}");
        Err(e.into())
    })
}
