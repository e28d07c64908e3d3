use crate::database::models;
use bigdecimal::BigDecimal;
use diesel::{result::Error, ExpressionMethods, OptionalExtension, PgConnection, QueryDsl, RunQueryDsl};

#[derive(PartialEq, Debug)]
pub enum WalletBalance {
    Ok(WalletBalanceValues),
    NotFound,
}
#[derive(PartialEq, Debug)]
pub struct WalletBalanceValues {
    pub balance: BigDecimal,
}

#[derive(PartialEq, Debug)]
pub enum BalanceCheck {
    Ok { balance: BigDecimal, sufficient: bool },
    NotFound,
}

pub fn load_wallet(conn: &mut PgConnection, req_user_id: &str) -> Result<WalletBalance, Error> {
    use crate::schema::wallets::dsl::*;
    let wallet = wallets
        .filter(user_id.eq(req_user_id))
        .first::<models::Wallet>(conn)
        .optional()?;
    Ok(match wallet {
        Some(wallet) => WalletBalance::Ok(WalletBalanceValues {
            balance: wallet.balance,
        }),
        None => WalletBalance::NotFound,
    })
}

// advisory pre-check only, the settlement transaction re-checks under a row
// lock
pub fn check_balance(conn: &mut PgConnection, req_user_id: &str, req_amount: &BigDecimal) -> Result<BalanceCheck, Error> {
    use crate::schema::wallets::dsl::*;
    let wallet = wallets
        .filter(user_id.eq(req_user_id))
        .first::<models::Wallet>(conn)
        .optional()?;
    Ok(match wallet {
        Some(wallet) => BalanceCheck::Ok {
            sufficient: &wallet.balance >= req_amount,
            balance: wallet.balance,
        },
        None => BalanceCheck::NotFound,
    })
}

pub fn load_order(conn: &mut PgConnection, req_order_id: &str) -> Result<Option<models::Order>, Error> {
    use crate::schema::orders::dsl::*;
    orders
        .filter(id.eq(req_order_id))
        .first::<models::Order>(conn)
        .optional()
}

// audit trail, newest first
pub fn list_transactions(conn: &mut PgConnection, req_user_id: &str) -> Result<Vec<models::WalletTransaction>, Error> {
    use crate::schema::wallet_transactions::dsl::*;
    wallet_transactions
        .filter(user_id.eq(req_user_id))
        .order((created_at.desc(), id.desc()))
        .load::<models::WalletTransaction>(conn)
}
