//! Admin contact addresses, enrollment codes and join requests.

use asupersync::Outcome;
use galendary_core::{Error, Value, try_outcome, try_result};
use galendary_pool::PoolFactory;

use super::{Call, require_all};
use crate::Payload;
use crate::credentials;

pub const GET_ADMIN_EMAIL: &str = "SELECT user_group_join.admin_email FROM user_group_join \
     WHERE user_group_join.group_id = (?) AND user_group_join.admin = true;";
pub const SET_ADMIN_EMAIL: &str = "UPDATE user_group_join SET admin_email = ? \
     WHERE user_group_join.group_id = ? AND user_group_join.user_id = ? \
     AND user_group_join.admin = true;";
pub const GENERATE_ENROLLMENT_CODE: &str = "UPDATE users, groups, user_group_join \
     SET groups.enrollment_code = ? \
     WHERE groups.id = ? AND users.username = ? AND users.passhash = ? \
     AND user_group_join.user_id = users.id AND user_group_join.group_id = groups.id \
     AND user_group_join.admin = true;";
pub const GET_ENROLLMENT_CODE: &str = "SELECT groups.enrollment_code \
     FROM groups, users, user_group_join \
     WHERE users.username = ? AND users.passhash = ? AND groups.id = ? \
     AND user_group_join.user_id = users.id AND user_group_join.group_id = groups.id;";
pub const JOIN_BY_ENROLLMENT_CODE: &str = "CALL join_group_by_enrollment_code(?, ?, ?);";
pub const CREATE_REQUEST: &str = "INSERT INTO group_requests (user_id, group_id) \
     SELECT users.id, groups.id FROM users, groups \
     WHERE users.username = (?) AND users.passhash = (?) AND groups.id = (?);";
pub const RESPOND_REQUEST: &str = "CALL request_decision(?, ?, ?, ?, ?);";
pub const GET_REQUESTS: &str = "SELECT group_requests.* \
     FROM group_requests, users, user_group_join \
     WHERE users.passhash = (?) AND users.username = (?) \
     AND users.email = user_group_join.admin_email \
     AND user_group_join.group_id = group_requests.group_id;";

pub async fn get_admin_email<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let group_id = try_result!(call.require("group_id"));
    call.run(GET_ADMIN_EMAIL, &[group_id])
        .await
        .map(Payload::from)
}

/// Set the contact address on the caller's own admin membership row. Also
/// serves `update_admin_email`.
pub async fn add_admin_email<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(call, &["admin_email", "group_id", "user_id"]));
    call.run(SET_ADMIN_EMAIL, &params).await.map(Payload::from)
}

/// Give the group a fresh enrollment code. Only an admin of the group changes
/// anything; any other caller is rejected.
pub async fn generate_enrollment_code<F: PoolFactory>(
    call: &Call<'_, F>,
) -> Outcome<Payload, Error> {
    let username = try_result!(call.require("username"));
    let passhash = try_result!(call.require("passhash"));
    let group_id = try_result!(call.require("group_id"));

    let code = credentials::enrollment_code();
    let result = try_outcome!(
        call.run(
            GENERATE_ENROLLMENT_CODE,
            &[Value::from(code.as_str()), group_id, username, passhash]
        )
        .await
    );

    if result.changed_rows() == 1 {
        Outcome::Ok(Payload::EnrollmentCode {
            enrollment_code: code,
        })
    } else {
        Outcome::Err(Error::rejected(
            "generate_enrollment_code",
            "enrollment code was not applied; caller is not an admin of the group",
        ))
    }
}

pub async fn get_enrollment_code<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let username = try_result!(call.require("username"));
    let passhash = try_result!(call.require("passhash"));
    let group_id = try_result!(call.require_int("group_id"));
    call.run(GET_ENROLLMENT_CODE, &[username, passhash, group_id])
        .await
        .map(Payload::from)
}

pub async fn join_group_by_enrollment_code<F: PoolFactory>(
    call: &Call<'_, F>,
) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(call, &["username", "passhash", "enrollment_code"]));
    call.run(JOIN_BY_ENROLLMENT_CODE, &params)
        .await
        .map(Payload::from)
}

/// Ask to join a group as the authenticated caller.
pub async fn create_request<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(call, &["username", "passhash", "group_id"]));
    call.run(CREATE_REQUEST, &params).await.map(Payload::from)
}

pub async fn respond_request<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(
        call,
        &[
            "request_id",
            "admin_username",
            "admin_passhash",
            "group_id",
            "decision",
        ]
    ));
    call.run(RESPOND_REQUEST, &params).await.map(Payload::from)
}

/// Pending requests for every group whose admin contact is the caller.
pub async fn get_requests<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(call, &["passhash", "username"]));
    call.run(GET_REQUESTS, &params).await.map(Payload::from)
}
