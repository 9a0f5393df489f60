diesel::table! {
    sessions (session_id) {
        session_id -> Text,
        state -> Text,
        last_activity -> BigInt,
    }
}

diesel::table! {
    stats (user_id) {
        user_id -> Text,
        wins -> Integer,
        losses -> Integer,
        draws -> Integer,
        win_streak -> Integer,
        best_streak -> Integer,
    }
}

diesel::allow_tables_to_appear_in_same_query!(sessions, stats,);
