// @generated by hand to match migrations/2024-01-01-000000_init; kept in
// sync manually since this crate does not run `diesel print-schema` as part
// of its build.

diesel::table! {
    users (name) {
        name -> Text,
        email -> Text,
        salt -> Text,
        hash -> Text,
        role -> Text,
    }
}

diesel::table! {
    elections (election_name) {
        election_name -> Text,
        owner_name -> Text,
        secret_ballot -> Bool,
        allow_vote -> Bool,
        allow_edit -> Bool,
        no_voting_before -> Nullable<Timestamp>,
        no_voting_after -> Nullable<Timestamp>,
        has_launched -> Bool,
    }
}

diesel::table! {
    candidates (election_name, candidate_name) {
        election_name -> Text,
        candidate_name -> Text,
    }
}

diesel::table! {
    eligible_voters (election_name, voter_name) {
        election_name -> Text,
        voter_name -> Text,
    }
}

diesel::table! {
    ballots (election_name, voter_name) {
        election_name -> Text,
        voter_name -> Text,
        confirmation -> Text,
        when_cast -> Timestamp,
        rankings -> Text,
    }
}

diesel::table! {
    events (event_id) {
        event_id -> BigInt,
        authority -> Text,
        when_occurred -> Timestamp,
        event_type -> Text,
        payload -> Text,
    }
}

diesel::table! {
    sync_state (id) {
        id -> Integer,
        last_synced -> BigInt,
    }
}

diesel::joinable!(elections -> users (owner_name));
diesel::allow_tables_to_appear_in_same_query!(
    users,
    elections,
    candidates,
    eligible_voters,
    ballots,
    events,
    sync_state,
);
