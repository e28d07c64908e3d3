diesel::table! {
    orders (id) {
        id -> Varchar,
        user_id -> Varchar,
        status -> Varchar,
        total_amount -> Nullable<Numeric>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    wallets (user_id) {
        user_id -> Varchar,
        balance -> Numeric,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    wallet_transactions (id) {
        id -> Int8,
        user_id -> Varchar,
        order_id -> Nullable<Varchar>,
        kind -> Varchar,
        amount -> Numeric,
        balance_before -> Numeric,
        balance_after -> Numeric,
        reason -> Nullable<Varchar>,
        idempotency_key -> Nullable<Varchar>,
        created_at -> Timestamp,
    }
}

diesel::joinable!(wallet_transactions -> wallets (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    orders,
    wallets,
    wallet_transactions,
);
