//! User accounts.

use asupersync::Outcome;
use galendary_core::{Error, Value, is_email, try_outcome, try_result};
use galendary_notify::Notifier;
use galendary_pool::PoolFactory;

use super::{Call, first_cell, require_all};
use crate::Payload;
use crate::credentials;

pub const VERIFY_LOGIN: &str =
    "SELECT COUNT(*) AS c FROM users WHERE username = ? AND passhash = ?;";
pub const CREATE_USER: &str = "INSERT INTO users (username, passhash) VALUES (?, ?);";
pub const GET_USER: &str = "SELECT * FROM users WHERE username = ? AND passhash = ?;";
pub const GET_USERNAME: &str = "SELECT users.username FROM users WHERE users.id = (?);";
pub const CHANGE_DISPLAY_NAME: &str =
    "UPDATE users SET name = ? WHERE username = ? AND passhash = ?;";
pub const CHANGE_PASSWORD: &str = "CALL change_password(?, ?, ?);";
pub const RESET_PASSWORD: &str = "CALL reset_password(?, ?);";
pub const DELETE_USER: &str = "DELETE FROM users WHERE username = ? AND passhash = ?;";

/// `true` iff exactly one user matches the pair.
pub async fn verify_login<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(call, &["username", "passhash"]));
    let result = try_outcome!(call.run(VERIFY_LOGIN, &params).await);
    let count = first_cell(&result, "c").and_then(Value::as_i64);
    Outcome::Ok(Payload::Flag(count == Some(1)))
}

pub async fn create_user<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(call, &["username", "passhash"]));
    let result = try_outcome!(call.run(CREATE_USER, &params).await);
    tracing::info!(affected_rows = result.affected_rows(), "Created user");
    Outcome::Ok(result.into())
}

pub async fn get_user<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(call, &["username", "passhash"]));
    call.run(GET_USER, &params).await.map(Payload::from)
}

pub async fn get_username<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let user_id = try_result!(call.require("user_id"));
    call.run(GET_USERNAME, &[user_id]).await.map(Payload::from)
}

pub async fn change_user_display_name<F: PoolFactory>(
    call: &Call<'_, F>,
) -> Outcome<Payload, Error> {
    let username = try_result!(call.require("username"));
    let passhash = try_result!(call.require("passhash"));
    let display_name = try_result!(call.require("display_name"));
    call.run(CHANGE_DISPLAY_NAME, &[display_name, username, passhash])
        .await
        .map(Payload::from)
}

pub async fn change_password<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(call, &["username", "passhash", "passhash_new"]));
    call.run(CHANGE_PASSWORD, &params).await.map(Payload::from)
}

pub async fn delete_user<F: PoolFactory>(call: &Call<'_, F>) -> Outcome<Payload, Error> {
    let params = try_result!(require_all(call, &["username", "passhash"]));
    call.run(DELETE_USER, &params).await.map(Payload::from)
}

/// Replace the password with a generated one and mail it to the user.
///
/// The username must be an e-mail address; it is checked before anything
/// touches the database.
pub async fn reset_password<F: PoolFactory, N: Notifier>(
    call: &Call<'_, F>,
    notifier: &N,
) -> Outcome<Payload, Error> {
    let username = try_result!(call.request.require_text("username"));
    if !is_email(&username) {
        return Outcome::Err(Error::invalid(
            "username",
            format!("not a valid e-mail address: {}", username),
        ));
    }

    let password = credentials::temporary_password();
    let passhash = credentials::sha1_hex(&password);
    let result = try_outcome!(
        call.run(
            RESET_PASSWORD,
            &[Value::from(username.as_str()), Value::from(passhash)]
        )
        .await
    );

    if first_cell(&result, "success").and_then(Value::as_i64) != Some(1) {
        tracing::info!("Password reset refused for unknown account");
        return Outcome::Ok(Payload::Success { success: false });
    }

    try_outcome!(
        notifier
            .send_temporary_password(call.cx, &username, &password)
            .await
    );
    Outcome::Ok(Payload::Success { success: true })
}
