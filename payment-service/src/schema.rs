diesel::table! {
    payments (id) {
        id -> Int8,
        user_id -> Varchar,
        order_id -> Int8,
        amount -> Numeric,
        currency -> Varchar,
        status -> Varchar,
        card_last_four -> Varchar,
        card_type -> Varchar,
        transaction_id -> Varchar,
        failure_reason -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
