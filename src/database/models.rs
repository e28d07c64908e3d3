use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use diesel::prelude::*;

pub const KIND_CREDIT: &str = "CREDIT";
pub const KIND_DEBIT: &str = "DEBIT";

// order lifecycle, stored as plain varchar. total_amount is only
// meaningful while the order sits in AWAITING_PAYMENT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    AwaitingPayment,
    Ordering,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::AwaitingPayment => "AWAITING_PAYMENT",
            OrderStatus::Ordering => "ORDERING",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Queryable)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub total_amount: Option<BigDecimal>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct NewOrder {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub total_amount: Option<BigDecimal>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Queryable)]
pub struct Wallet {
    pub user_id: String,
    pub balance: BigDecimal,
    pub updated_at: NaiveDateTime,
}

#[derive(Queryable)]
pub struct WalletTransaction {
    pub id: i64,
    pub user_id: String,
    pub order_id: Option<String>,
    pub kind: String,
    pub amount: BigDecimal,
    pub balance_before: BigDecimal,
    pub balance_after: BigDecimal,
    pub reason: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::wallet_transactions)]
pub struct NewWalletTransaction {
    pub id: i64,
    pub user_id: String,
    pub order_id: Option<String>,
    pub kind: String,
    pub amount: BigDecimal,
    pub balance_before: BigDecimal,
    pub balance_after: BigDecimal,
    pub reason: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: NaiveDateTime,
}
