//! Groups: creation, settings, lookup and membership lists.

use asupersync::Outcome;
use galendary_core::{Error, Value, try_result};
use galendary_pool::PoolFactory;

use super::{Call, require_all};
use crate::Payload;

pub const CREATE_GROUP: &str = "CALL create_group(?, ?, ?);";
pub const DISSOLVE_GROUP: &str = "CALL delete_group(?, ?, ?);";
pub const SEARCH_GROUP_NAME: &str = "SELECT groups.* FROM groups \
     WHERE LOWER(groups.name) LIKE CONCAT('%', LOWER(?), '%') AND groups.is_public = true;";
pub const GET_ALL_GROUPS: &str = "SELECT groups.*, user_group_join.admin \
     FROM groups, users, user_group_join \
     WHERE users.username = (?) AND users.passhash = (?) \
     AND user_group_join.user_id = users.id AND user_group_join.group_id = groups.id;";
pub const GET_GROUP_NAME: &str = "SELECT groups.name FROM groups WHERE groups.id = (?);";
pub const LOAD_GROUP_MEMBERS: &str = "SELECT users.* FROM users, user_group_join \
     WHERE user_group_join.group_id = ? AND user_group_join.user_id = users.id;";
pub const PROMOTE_TO_ADMIN: &str =
    "UPDATE user_group_join SET admin = true WHERE user_id = ? AND group_id = ?;";
pub const LEAVE_GROUP: &str = "DELETE FROM user_group_join WHERE user_id = ? AND group_id = ?;";

const ALTER_GROUP_WHERE: &str = " WHERE groups.id = ? AND users.username = ? \
     AND users.passhash = ? AND user_group_join.user_id = users.id \
     AND user_group_join.group_id = groups.id;";

pub async fn create_group<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(call, &["group_name", "username", "passhash"]));
    call.run(CREATE_GROUP, &params).await.map(Payload::from)
}

/// Render the `alter_group` update. Fields left null keep their current value.
/// Returns `None` when there is nothing to change.
pub fn alter_group_statement(
    group_name: Value,
    is_public: Option<bool>,
    looking_for_subgroups: Option<bool>,
) -> Option<(String, Vec<Value>)> {
    if group_name.is_null() && is_public.is_none() && looking_for_subgroups.is_none() {
        return None;
    }

    let mut params = Vec::with_capacity(6);
    let mut sql = String::from("UPDATE groups, users, user_group_join SET groups.name = ");
    if group_name.is_null() {
        sql.push_str("groups.name");
    } else {
        sql.push('?');
        params.push(group_name);
    }
    sql.push_str(", groups.is_public = ");
    match is_public {
        Some(flag) => {
            sql.push('?');
            params.push(Value::Bool(flag));
        }
        None => sql.push_str("groups.is_public"),
    }
    sql.push_str(", groups.looking_for_subgroups = ");
    match looking_for_subgroups {
        Some(flag) => {
            sql.push('?');
            params.push(Value::Bool(flag));
        }
        None => sql.push_str("groups.looking_for_subgroups"),
    }
    sql.push_str(ALTER_GROUP_WHERE);
    Some((sql, params))
}

pub async fn alter_group<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let username = try_result!(call.require("username"));
    let passhash = try_result!(call.require("passhash"));
    let group_id = try_result!(call.require("group_id"));

    let Some((sql, mut params)) = alter_group_statement(
        call.optional("group_name"),
        call.request.optional_flag("is_public"),
        call.request.optional_flag("looking_for_subgroups"),
    ) else {
        return Outcome::Err(Error::rejected("alter_group", "Will not alter anything"));
    };
    params.extend([group_id, username, passhash]);
    call.run(&sql, &params).await.map(Payload::from)
}

pub async fn dissolve_group<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(call, &["group_id", "username", "passhash"]));
    call.run(DISSOLVE_GROUP, &params).await.map(Payload::from)
}

/// Case-insensitive substring search over public groups.
pub async fn search_group_name<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let group_name = try_result!(call.require("group_name"));
    call.run(SEARCH_GROUP_NAME, &[group_name])
        .await
        .map(Payload::from)
}

pub async fn get_all_groups<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(call, &["username", "passhash"]));
    call.run(GET_ALL_GROUPS, &params).await.map(Payload::from)
}

pub async fn get_group_name<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let group_id = try_result!(call.require("group_id"));
    call.run(GET_GROUP_NAME, &[group_id]).await.map(Payload::from)
}

pub async fn load_group_members<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let group_id = try_result!(call.require("group_id"));
    call.run(LOAD_GROUP_MEMBERS, &[group_id])
        .await
        .map(Payload::from)
}

pub async fn promote_to_admin<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(call, &["user_id", "group_id"]));
    call.run(PROMOTE_TO_ADMIN, &params).await.map(Payload::from)
}

pub async fn leave_group<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let user_id = try_result!(call.require("user_id"));
    let group_id = try_result!(call.require_int("group_id"));
    call.run(LEAVE_GROUP, &[user_id, group_id])
        .await
        .map(Payload::from)
}
