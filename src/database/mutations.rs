use crate::database::models::{NewOrder, NewWalletTransaction, OrderStatus, KIND_CREDIT, KIND_DEBIT};
use crate::database::{idgen, models};
use bigdecimal::{BigDecimal, Signed, Zero};
use diesel::result::Error;
use diesel::{Connection, ExpressionMethods, OptionalExtension, PgConnection, QueryDsl, RunQueryDsl};

#[derive(PartialEq, Debug)]
pub enum SettleResult {
    Ok(i64),
    OrderNotPayable,
    NotOrderOwner,
    WalletNotFound,
    InsufficientBalance,
}

#[derive(PartialEq, Debug)]
pub enum QuoteResult {
    Ok,
    NotQuotable,
}

#[derive(PartialEq, Debug)]
pub enum CancelResult {
    Ok,
    NotCancellable,
    NotOrderOwner,
}

// creates new wallet record, on conflict does nothing
fn init_wallet(conn: &mut PgConnection, req_user_id: &str) -> Result<bool, Error> {
    use crate::schema::wallets::dsl::*;
    diesel::insert_into(wallets)
        .values((
            user_id.eq(req_user_id),
            balance.eq(BigDecimal::from(0)),
            updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .on_conflict(user_id)
        .do_nothing()
        .execute(conn)
        .map(|res| res > 0)
}

// adds value to the wallet balance, returns the transaction id
pub fn credit(
    conn: &mut PgConnection,
    req_idempotency_key: &str,
    req_user_id: &str,
    req_amount: BigDecimal,
    req_reason: Option<&str>,
) -> Result<i64, Error> {
    init_wallet(conn, req_user_id)?;

    conn.transaction::<_, Error, _>(|conn| {
        // load wallet record and lock for update
        let wallet = {
            use crate::schema::wallets::dsl::*;
            wallets
                .filter(user_id.eq(req_user_id))
                .for_update()
                .first::<models::Wallet>(conn)?
        };
        // idempotency check: replay the stored transaction id
        let existing = {
            use crate::schema::wallet_transactions::dsl::*;
            wallet_transactions
                .filter(idempotency_key.eq(req_idempotency_key))
                .first::<models::WalletTransaction>(conn)
                .optional()?
        };
        if let Some(existing) = existing {
            return Ok(existing.id);
        }

        let balance_after_credit = wallet.balance.clone() + req_amount.clone();

        let tx_id = idgen::next();
        {
            use crate::schema::wallet_transactions::dsl::*;

            let new_transaction = NewWalletTransaction {
                id: tx_id,
                user_id: req_user_id.to_string(),
                order_id: None,
                kind: KIND_CREDIT.to_string(),
                amount: req_amount,
                balance_before: wallet.balance.clone(),
                balance_after: balance_after_credit.clone(),
                reason: req_reason.map(|s| s.to_string()),
                idempotency_key: Some(req_idempotency_key.to_string()),
                created_at: chrono::Utc::now().naive_utc(),
            };
            diesel::insert_into(wallet_transactions)
                .values(&new_transaction)
                .execute(conn)?;
        }
        {
            use crate::schema::wallets::dsl::*;
            diesel::update(wallets.filter(user_id.eq(req_user_id)))
                .set((
                    balance.eq(balance_after_credit),
                    updated_at.eq(chrono::Utc::now().naive_utc()),
                ))
                .execute(conn)?;
        }

        Ok(tx_id)
    })
}

// debits the order amount from the owner's wallet and advances the order
// AWAITING_PAYMENT -> ORDERING. Fully succeeds or leaves order, wallet and
// transaction records unchanged.
pub fn settle(conn: &mut PgConnection, req_order_id: &str, req_user_id: &str) -> Result<SettleResult, Error> {
    conn.transaction::<_, Error, _>(|conn| {
        // load order record and lock for update
        let order = {
            use crate::schema::orders::dsl::*;
            orders
                .filter(id.eq(req_order_id))
                .for_update()
                .first::<models::Order>(conn)
                .optional()?
        };
        let order = match order {
            Some(order) if order.status == OrderStatus::AwaitingPayment.as_str() => order,
            // a second submission of the same order lands here: the status
            // gate already moved past AWAITING_PAYMENT
            _ => return Ok(SettleResult::OrderNotPayable),
        };
        if order.user_id != req_user_id {
            return Ok(SettleResult::NotOrderOwner);
        }
        let req_amount = match order.total_amount {
            Some(amount) if !amount.is_negative() && !amount.is_zero() => amount,
            _ => return Ok(SettleResult::OrderNotPayable),
        };

        // load wallet record and lock for update
        let wallet = {
            use crate::schema::wallets::dsl::*;
            wallets
                .filter(user_id.eq(req_user_id))
                .for_update()
                .first::<models::Wallet>(conn)
                .optional()?
        };
        let wallet = match wallet {
            Some(wallet) => wallet,
            None => return Ok(SettleResult::WalletNotFound),
        };
        if wallet.balance < req_amount {
            return Ok(SettleResult::InsufficientBalance);
        }

        let balance_after_debit = wallet.balance.clone() - req_amount.clone();

        let tx_id = idgen::next();
        {
            // the order-scoped idempotency key has a unique index, so a
            // double debit for one order cannot be committed
            use crate::schema::wallet_transactions::dsl::*;

            let new_transaction = NewWalletTransaction {
                id: tx_id,
                user_id: req_user_id.to_string(),
                order_id: Some(req_order_id.to_string()),
                kind: KIND_DEBIT.to_string(),
                amount: req_amount,
                balance_before: wallet.balance.clone(),
                balance_after: balance_after_debit.clone(),
                reason: Some("order payment".to_string()),
                idempotency_key: Some(format!("pay:{req_order_id}")),
                created_at: chrono::Utc::now().naive_utc(),
            };
            diesel::insert_into(wallet_transactions)
                .values(&new_transaction)
                .execute(conn)?;
        }
        {
            use crate::schema::wallets::dsl::*;
            diesel::update(wallets.filter(user_id.eq(req_user_id)))
                .set((
                    balance.eq(balance_after_debit),
                    updated_at.eq(chrono::Utc::now().naive_utc()),
                ))
                .execute(conn)?;
        }
        {
            // conditional status update, affected row count is the commit gate
            use crate::schema::orders::dsl::*;
            let updated = diesel::update(
                orders
                    .filter(id.eq(req_order_id))
                    .filter(status.eq(OrderStatus::AwaitingPayment.as_str())),
            )
            .set((
                status.eq(OrderStatus::Ordering.as_str()),
                updated_at.eq(chrono::Utc::now().naive_utc()),
            ))
            .execute(conn)?;
            if updated != 1 {
                return Err(Error::RollbackTransaction);
            }
        }

        Ok(SettleResult::Ok(tx_id))
    })
}

pub fn create_order(conn: &mut PgConnection, req_user_id: &str) -> Result<models::Order, Error> {
    use crate::schema::orders::dsl::*;
    let now = chrono::Utc::now().naive_utc();
    let new_order = NewOrder {
        id: idgen::next().to_string(),
        user_id: req_user_id.to_string(),
        status: OrderStatus::Pending.as_str().to_string(),
        total_amount: None,
        created_at: now,
        updated_at: now,
    };
    diesel::insert_into(orders).values(&new_order).get_result(conn)
}

// sets the order total and moves it PENDING -> AWAITING_PAYMENT
pub fn quote_order(conn: &mut PgConnection, req_order_id: &str, req_amount: BigDecimal) -> Result<QuoteResult, Error> {
    use crate::schema::orders::dsl::*;
    let updated = diesel::update(
        orders
            .filter(id.eq(req_order_id))
            .filter(status.eq(OrderStatus::Pending.as_str())),
    )
    .set((
        status.eq(OrderStatus::AwaitingPayment.as_str()),
        total_amount.eq(Some(req_amount)),
        updated_at.eq(chrono::Utc::now().naive_utc()),
    ))
    .execute(conn)?;
    if updated == 1 {
        Ok(QuoteResult::Ok)
    } else {
        Ok(QuoteResult::NotQuotable)
    }
}

// cancels an unpaid order. Paid (ORDERING) orders are out of reach, the
// debit already happened.
pub fn cancel_order(conn: &mut PgConnection, req_order_id: &str, req_user_id: &str) -> Result<CancelResult, Error> {
    conn.transaction::<_, Error, _>(|conn| {
        use crate::schema::orders::dsl::*;
        let order = orders
            .filter(id.eq(req_order_id))
            .for_update()
            .first::<models::Order>(conn)
            .optional()?;
        let order = match order {
            Some(order) => order,
            None => return Ok(CancelResult::NotCancellable),
        };
        if order.user_id != req_user_id {
            return Ok(CancelResult::NotOrderOwner);
        }
        if order.status != OrderStatus::Pending.as_str() && order.status != OrderStatus::AwaitingPayment.as_str() {
            return Ok(CancelResult::NotCancellable);
        }

        let updated = diesel::update(
            orders
                .filter(id.eq(req_order_id))
                .filter(status.eq_any([
                    OrderStatus::Pending.as_str(),
                    OrderStatus::AwaitingPayment.as_str(),
                ])),
        )
        .set((
            status.eq(OrderStatus::Cancelled.as_str()),
            updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(conn)?;
        if updated != 1 {
            return Err(Error::RollbackTransaction);
        }

        Ok(CancelResult::Ok)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use crate::database::queries;
    use crate::database::queries::{WalletBalance, WalletBalanceValues};
    use bigdecimal::BigDecimal;
    use diesel::result::Error;
    use diesel::{Connection, ExpressionMethods, QueryDsl, RunQueryDsl};
    use std::ops::DerefMut;

    fn debit_count(conn: &mut PgConnection, req_order_id: &str) -> i64 {
        use crate::schema::wallet_transactions::dsl::*;
        wallet_transactions
            .filter(order_id.eq(req_order_id))
            .filter(kind.eq(KIND_DEBIT))
            .count()
            .get_result(conn)
            .unwrap()
    }

    #[test]
    fn test_credit_is_idempotent() {
        dotenvy::dotenv().ok();

        let pool = database::connect::create_db_connection_pool();

        let user_id = "test_credit_user";
        let amount = BigDecimal::from(100);
        let idempotency_key = "test_credit";

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            let tx_id = credit(conn, idempotency_key, user_id, amount.clone(), None)?;
            assert!(tx_id > 0);

            let balance = queries::load_wallet(conn, user_id)?;
            assert_eq!(
                balance,
                WalletBalance::Ok(WalletBalanceValues {
                    balance: amount.clone(),
                })
            );

            let tx_id2 = credit(conn, idempotency_key, user_id, amount.clone(), None)?;
            assert_eq!(tx_id, tx_id2);

            let balance2 = queries::load_wallet(conn, user_id)?;
            assert_eq!(balance2, balance);

            Ok(())
        });
    }

    #[test]
    fn test_settle() {
        dotenvy::dotenv().ok();

        let pool = database::connect::create_db_connection_pool();
        let user_id = "test_settle_user";

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            credit(conn, "test_settle", user_id, BigDecimal::from(100), None)?;

            let order = create_order(conn, user_id)?;
            assert_eq!(order.status, OrderStatus::Pending.as_str());
            assert_eq!(quote_order(conn, &order.id, BigDecimal::from(40))?, QuoteResult::Ok);

            let res = settle(conn.deref_mut(), &order.id, user_id)?;
            assert!(matches!(res, SettleResult::Ok(_)));

            let balance = queries::load_wallet(conn, user_id)?;
            assert_eq!(
                balance,
                WalletBalance::Ok(WalletBalanceValues {
                    balance: BigDecimal::from(60),
                })
            );
            let order = queries::load_order(conn, &order.id)?.unwrap();
            assert_eq!(order.status, OrderStatus::Ordering.as_str());
            assert_eq!(debit_count(conn, &order.id), 1);

            // second submission: the status gate has moved on
            let res2 = settle(conn.deref_mut(), &order.id, user_id)?;
            assert_eq!(res2, SettleResult::OrderNotPayable);
            let balance2 = queries::load_wallet(conn, user_id)?;
            assert_eq!(balance2, balance);
            assert_eq!(debit_count(conn, &order.id), 1);

            Ok(())
        });
    }

    #[test]
    fn test_settle_insufficient_balance() {
        dotenvy::dotenv().ok();

        let pool = database::connect::create_db_connection_pool();
        let user_id = "test_settle_poor_user";

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            credit(conn, "test_settle_poor", user_id, BigDecimal::from(10), None)?;

            let order = create_order(conn, user_id)?;
            quote_order(conn, &order.id, BigDecimal::from(40))?;

            let res = settle(conn.deref_mut(), &order.id, user_id)?;
            assert_eq!(res, SettleResult::InsufficientBalance);

            // nothing changed
            let balance = queries::load_wallet(conn, user_id)?;
            assert_eq!(
                balance,
                WalletBalance::Ok(WalletBalanceValues {
                    balance: BigDecimal::from(10),
                })
            );
            let order = queries::load_order(conn, &order.id)?.unwrap();
            assert_eq!(order.status, OrderStatus::AwaitingPayment.as_str());
            assert_eq!(debit_count(conn, &order.id), 0);

            Ok(())
        });
    }

    #[test]
    fn test_settle_rejects_wrong_owner_and_missing_order() {
        dotenvy::dotenv().ok();

        let pool = database::connect::create_db_connection_pool();

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            credit(conn, "test_settle_owner", "owner", BigDecimal::from(100), None)?;
            credit(conn, "test_settle_other", "other", BigDecimal::from(100), None)?;

            let order = create_order(conn, "owner")?;
            quote_order(conn, &order.id, BigDecimal::from(40))?;

            let res = settle(conn.deref_mut(), &order.id, "other")?;
            assert_eq!(res, SettleResult::NotOrderOwner);

            let res = settle(conn.deref_mut(), "no_such_order", "owner")?;
            assert_eq!(res, SettleResult::OrderNotPayable);

            // not yet quoted orders are not payable either
            let unquoted = create_order(conn, "owner")?;
            let res = settle(conn.deref_mut(), &unquoted.id, "owner")?;
            assert_eq!(res, SettleResult::OrderNotPayable);

            Ok(())
        });
    }

    #[test]
    fn test_cancel_order() {
        dotenvy::dotenv().ok();

        let pool = database::connect::create_db_connection_pool();
        let user_id = "test_cancel_user";

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            let order = create_order(conn, user_id)?;
            assert_eq!(cancel_order(conn, &order.id, "someone_else")?, CancelResult::NotOrderOwner);
            assert_eq!(cancel_order(conn, &order.id, user_id)?, CancelResult::Ok);

            let order = queries::load_order(conn, &order.id)?.unwrap();
            assert_eq!(order.status, OrderStatus::Cancelled.as_str());

            // cancelled orders cannot be paid
            let res = settle(conn.deref_mut(), &order.id, user_id)?;
            assert_eq!(res, SettleResult::OrderNotPayable);

            // paid orders cannot be cancelled
            credit(conn, "test_cancel", user_id, BigDecimal::from(100), None)?;
            let paid = create_order(conn, user_id)?;
            quote_order(conn, &paid.id, BigDecimal::from(20))?;
            let res = settle(conn.deref_mut(), &paid.id, user_id)?;
            assert!(matches!(res, SettleResult::Ok(_)));
            assert_eq!(cancel_order(conn, &paid.id, user_id)?, CancelResult::NotCancellable);

            Ok(())
        });
    }

    // removes every row the concurrency test commits for real, it cannot
    // run inside test_transaction because the racing settles need their own
    // connections
    fn wipe_user_rows(conn: &mut PgConnection, req_user_id: &str) {
        {
            use crate::schema::wallet_transactions::dsl::*;
            diesel::delete(wallet_transactions.filter(user_id.eq(req_user_id)))
                .execute(conn)
                .unwrap();
        }
        {
            use crate::schema::orders::dsl::*;
            diesel::delete(orders.filter(user_id.eq(req_user_id)))
                .execute(conn)
                .unwrap();
        }
        {
            use crate::schema::wallets::dsl::*;
            diesel::delete(wallets.filter(user_id.eq(req_user_id)))
                .execute(conn)
                .unwrap();
        }
    }

    #[test]
    fn test_concurrent_settles_serialize() {
        dotenvy::dotenv().ok();

        let pool = database::connect::create_db_connection_pool();
        let user_id = "test_concurrent_settle_user";

        let mut conn = pool.get().unwrap();
        wipe_user_rows(conn.deref_mut(), user_id);

        credit(conn.deref_mut(), "test_concurrent_settle", user_id, BigDecimal::from(100), None).unwrap();
        let order_a = create_order(conn.deref_mut(), user_id).unwrap();
        quote_order(conn.deref_mut(), &order_a.id, BigDecimal::from(40)).unwrap();
        let order_b = create_order(conn.deref_mut(), user_id).unwrap();
        quote_order(conn.deref_mut(), &order_b.id, BigDecimal::from(30)).unwrap();
        let order_c = create_order(conn.deref_mut(), user_id).unwrap();
        quote_order(conn.deref_mut(), &order_c.id, BigDecimal::from(20)).unwrap();

        // two racing submissions of one order: whoever loses the row lock
        // re-reads the status past AWAITING_PAYMENT and is rejected
        let (r1, r2) = std::thread::scope(|s| {
            let t1 = s.spawn(|| {
                let mut conn = pool.get().unwrap();
                settle(conn.deref_mut(), &order_a.id, user_id).unwrap()
            });
            let t2 = s.spawn(|| {
                let mut conn = pool.get().unwrap();
                settle(conn.deref_mut(), &order_a.id, user_id).unwrap()
            });
            (t1.join().unwrap(), t2.join().unwrap())
        });
        let results = [r1, r2];
        let paid = results.iter().filter(|r| matches!(r, SettleResult::Ok(_))).count();
        let rejected = results
            .iter()
            .filter(|r| **r == SettleResult::OrderNotPayable)
            .count();
        assert_eq!((paid, rejected), (1, 1), "results: {:?}", results);
        assert_eq!(debit_count(conn.deref_mut(), &order_a.id), 1);

        // two different orders against the same wallet, both funded at their
        // serialization point: both debits land
        let (r1, r2) = std::thread::scope(|s| {
            let t1 = s.spawn(|| {
                let mut conn = pool.get().unwrap();
                settle(conn.deref_mut(), &order_b.id, user_id).unwrap()
            });
            let t2 = s.spawn(|| {
                let mut conn = pool.get().unwrap();
                settle(conn.deref_mut(), &order_c.id, user_id).unwrap()
            });
            (t1.join().unwrap(), t2.join().unwrap())
        });
        assert!(matches!(r1, SettleResult::Ok(_)), "r1: {:?}", r1);
        assert!(matches!(r2, SettleResult::Ok(_)), "r2: {:?}", r2);

        let balance = queries::load_wallet(conn.deref_mut(), user_id).unwrap();
        assert_eq!(
            balance,
            WalletBalance::Ok(WalletBalanceValues {
                balance: BigDecimal::from(10),
            })
        );

        wipe_user_rows(conn.deref_mut(), user_id);
    }

    #[test]
    fn test_quote_order_only_from_pending() {
        dotenvy::dotenv().ok();

        let pool = database::connect::create_db_connection_pool();

        pool.get().unwrap().test_transaction::<_, Error, _>(|conn| {
            let order = create_order(conn, "test_quote_user")?;

            assert_eq!(quote_order(conn, &order.id, BigDecimal::from(5))?, QuoteResult::Ok);
            assert_eq!(
                quote_order(conn, &order.id, BigDecimal::from(6))?,
                QuoteResult::NotQuotable
            );

            let order = queries::load_order(conn, &order.id)?.unwrap();
            assert_eq!(order.status, OrderStatus::AwaitingPayment.as_str());
            assert_eq!(order.total_amount, Some(BigDecimal::from(5)));

            Ok(())
        });
    }
}
