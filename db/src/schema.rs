// `blocks` mirrors the DDL in `providers/provider.rs`, `pipeline_loads` the one in `migrations/`.

diesel::table! {
    blocks (number) {
        number -> Int8,
        timestamp -> Int8,
        gas_limit -> Int8,
        gas_used -> Int8,
        size -> Int8,
        base_fee_per_gas -> Int8,
        transactions_count -> Int8,
        hash -> Text,
        parent_hash -> Text,
    }
}

diesel::table! {
    pipeline_loads (load_id) {
        load_id -> Int8,
        dataset -> Text,
        first_block -> Nullable<Int8>,
        last_block -> Nullable<Int8>,
        batches -> Int8,
        rows -> Int8,
        status -> Text,
        error -> Nullable<Text>,
        started_at -> Timestamp,
        finished_at -> Timestamp,
    }
}
