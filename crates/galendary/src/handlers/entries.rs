//! Calendar entries.

use asupersync::Outcome;
use galendary_core::{Error, try_outcome, try_result};
use galendary_pool::PoolFactory;

use super::{Call, require_all};
use crate::Payload;

pub const CREATE_ENTRY: &str = "CALL create_entry(?, ?, ?, ?, ?, ?, ?, ?, ?);";
pub const UPDATE_ENTRY: &str = "CALL update_entry(?, ?, ?, ?, ?, ?, ?, ?, ?);";
pub const DELETE_ENTRY: &str = "CALL delete_entry(?, ?, ?);";
pub const GET_ALL_ENTRIES: &str = "SELECT groups.id AS gid, entries.* \
     FROM groups, entries, users, user_group_join, group_entry_join \
     WHERE users.username = ? AND users.passhash = ? \
     AND user_group_join.user_id = users.id AND user_group_join.group_id = groups.id \
     AND group_entry_join.group_id = groups.id AND group_entry_join.entry_id = entries.id;";

const ENTRY_DETAILS: [&str; 5] = ["start_time", "end_time", "recurrence", "priority", "description"];

pub async fn create_entry<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let mut params = try_result!(require_all(call, &["username", "passhash", "group_id"]));
    params.push(call.optional("title"));
    params.extend(ENTRY_DETAILS.iter().map(|name| call.optional(name)));
    call.run(CREATE_ENTRY, &params).await.map(Payload::from)
}

pub async fn update_entry<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let mut params = try_result!(require_all(
        call,
        &["username", "passhash", "entry_id", "title"]
    ));
    params.extend(ENTRY_DETAILS.iter().map(|name| call.optional(name)));
    call.run(UPDATE_ENTRY, &params).await.map(Payload::from)
}

pub async fn delete_entry<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(call, &["username", "passhash", "entry_id"]));
    call.run(DELETE_ENTRY, &params).await.map(Payload::from)
}

/// Entries of every group the caller belongs to, each tagged with `gid`.
pub async fn get_all_entries<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(call, &["username", "passhash"]));
    call.run(GET_ALL_ENTRIES, &params).await.map(Payload::from)
}

/// Entries, then groups. A failure in either stage discards everything.
pub async fn get_all_entries_and_groups<F: PoolFactory>(
    call: &Call<'_, F>,
) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(call, &["username", "passhash"]));
    let entries = try_outcome!(call.run(GET_ALL_ENTRIES, &params).await);
    let groups = try_outcome!(call.run(super::groups::GET_ALL_GROUPS, &params).await);
    Outcome::Ok(Payload::EntriesAndGroups { entries, groups })
}
