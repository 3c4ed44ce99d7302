//! Generated credentials: temporary passwords and enrollment codes.

use rand::Rng;
use sha1::{Digest, Sha1};

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub const TEMPORARY_PASSWORD_LEN: usize = 10;
pub const ENROLLMENT_CODE_LEN: usize = 7;

/// A random lowercase base-36 string of exactly `len` characters.
pub fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect()
}

pub fn temporary_password() -> String {
    random_base36(TEMPORARY_PASSWORD_LEN)
}

pub fn enrollment_code() -> String {
    random_base36(ENROLLMENT_CODE_LEN)
}

/// Lowercase hex SHA-1, the form in which clients send `passhash`.
pub fn sha1_hex(input: &str) -> String {
    Sha1::digest(input.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
