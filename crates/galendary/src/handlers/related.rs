//! Links between related groups.

use asupersync::Outcome;
use galendary_core::{Error, Value, try_result};
use galendary_pool::PoolFactory;

use super::{Call, require_all};
use crate::Payload;

pub const ADD_GROUP_TO_RELATED: &str = "CALL add_group_to_related(?, ?, ?, ?);";
pub const REMOVE_GROUP_FROM_RELATED: &str = "DELETE related_groups \
     FROM related_groups, users, user_group_join \
     WHERE related_groups.id_group_a = ? AND related_groups.id_group_b = ? \
     AND users.username = ? AND users.passhash = ? \
     AND user_group_join.user_id = users.id \
     AND user_group_join.group_id = related_groups.id_group_a \
     AND user_group_join.admin = true;";
pub const GET_RELATED_GROUPS: &str = "SELECT groups.id, groups.name, groups.enrollment_code \
     FROM users, groups, user_group_join, related_groups \
     WHERE users.username = ? AND users.passhash = ? \
     AND user_group_join.user_id = users.id AND user_group_join.group_id = ? \
     AND related_groups.id_group_b = user_group_join.group_id \
     AND groups.id = related_groups.id_group_a;";
pub const GET_EVENTS_OF_GROUP_MEMBERS: &str = "CALL get_group_member_entries(?, ?, ?);";

/// The caller's credentials and the `(a, b)` group pair.
fn credentials_and_pair<F: PoolFactory>(
    call: &Call<'_, F>,
) -> Result<(Vec<Value>, [Value; 2]), Error> {
    let auth = require_all(call, &["username", "passhash"])?;
    let a = call.require_int("group_id_a")?;
    let b = call.require_int("group_id_b")?;
    Ok((auth, [a, b]))
}

pub async fn add_group_to_related<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let (mut params, pair) = try_result!(credentials_and_pair(call));
    params.extend(pair);
    call.run(ADD_GROUP_TO_RELATED, &params)
        .await
        .map(Payload::from)
}

/// Remove the a→b link. Only an admin of group a removes anything.
pub async fn remove_group_from_related<F: PoolFactory>(
    call: &Call<'_, F>,
) -> Outcome<Payload, Error> {
    let (auth, [a, b]) = try_result!(credentials_and_pair(call));
    let mut params = vec![a, b];
    params.extend(auth);
    call.run(REMOVE_GROUP_FROM_RELATED, &params)
        .await
        .map(Payload::from)
}

pub async fn get_related_groups<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let mut params = try_result!(require_all(call, &["username", "passhash"]));
    params.push(try_result!(call.require_int("group_id")));
    call.run(GET_RELATED_GROUPS, &params)
        .await
        .map(Payload::from)
}

pub async fn get_events_of_group_members<F: PoolFactory>(
    call: &Call<'_, F>,
) -> Outcome<Payload, Error> {
    let mut params = try_result!(require_all(call, &["username", "passhash"]));
    params.push(try_result!(call.require_int("group_id")));
    call.run(GET_EVENTS_OF_GROUP_MEMBERS, &params)
        .await
        .map(Payload::from)
}
