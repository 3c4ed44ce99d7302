//! Authentication plugins.
//!
//! Both supported plugins prove knowledge of the password by scrambling it with
//! the server's 20-byte seed. Neither sends the password itself.

use sha1::{Digest, Sha1};
use sha2::Sha256;

pub const MYSQL_NATIVE_PASSWORD: &str = "mysql_native_password";
pub const CACHING_SHA2_PASSWORD: &str = "caching_sha2_password";

/// caching_sha2 status byte: the server had the password cached.
pub const FAST_AUTH_SUCCESS: u8 = 0x03;
/// caching_sha2 status byte: the server wants the full password exchange.
pub const PERFORM_FULL_AUTHENTICATION: u8 = 0x04;

/// Plugins this client can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPlugin {
    NativePassword,
    CachingSha2,
}

impl AuthPlugin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            MYSQL_NATIVE_PASSWORD => Some(AuthPlugin::NativePassword),
            CACHING_SHA2_PASSWORD => Some(AuthPlugin::CachingSha2),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            AuthPlugin::NativePassword => MYSQL_NATIVE_PASSWORD,
            AuthPlugin::CachingSha2 => CACHING_SHA2_PASSWORD,
        }
    }

    /// The auth response for `password` and `seed`. An empty password yields an
    /// empty response.
    pub fn scramble(self, password: &str, seed: &[u8]) -> Vec<u8> {
        if password.is_empty() {
            return Vec::new();
        }
        match self {
            AuthPlugin::NativePassword => scramble_native(password.as_bytes(), seed),
            AuthPlugin::CachingSha2 => scramble_caching_sha2(password.as_bytes(), seed),
        }
    }
}

/// `SHA1(password) XOR SHA1(seed + SHA1(SHA1(password)))`
pub fn scramble_native(password: &[u8], seed: &[u8]) -> Vec<u8> {
    let stage1 = Sha1::digest(password);
    let stage2 = Sha1::digest(stage1);
    let mut hasher = Sha1::new();
    hasher.update(seed);
    hasher.update(stage2);
    let mix = hasher.finalize();
    stage1.iter().zip(mix.iter()).map(|(a, b)| a ^ b).collect()
}

/// `SHA256(password) XOR SHA256(SHA256(SHA256(password)) + seed)`
pub fn scramble_caching_sha2(password: &[u8], seed: &[u8]) -> Vec<u8> {
    let stage1 = Sha256::digest(password);
    let stage2 = Sha256::digest(stage1);
    let mut hasher = Sha256::new();
    hasher.update(stage2);
    hasher.update(seed);
    let mix = hasher.finalize();
    stage1.iter().zip(mix.iter()).map(|(a, b)| a ^ b).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_names() {
        assert_eq!(
            AuthPlugin::from_name("mysql_native_password"),
            Some(AuthPlugin::NativePassword)
        );
        assert_eq!(
            AuthPlugin::from_name("caching_sha2_password"),
            Some(AuthPlugin::CachingSha2)
        );
        assert_eq!(AuthPlugin::from_name("sha256_password"), None);
        assert_eq!(AuthPlugin::CachingSha2.name(), "caching_sha2_password");
    }

    #[test]
    fn test_empty_password_sends_nothing() {
        assert!(AuthPlugin::NativePassword.scramble("", b"seed").is_empty());
        assert!(AuthPlugin::CachingSha2.scramble("", b"seed").is_empty());
    }

    #[test]
    fn test_scramble_lengths() {
        let seed = [7u8; 20];
        assert_eq!(scramble_native(b"secret", &seed).len(), 20);
        assert_eq!(scramble_caching_sha2(b"secret", &seed).len(), 32);
    }

    #[test]
    fn test_native_scramble_recoverable_by_server() {
        // The server stores SHA1(SHA1(pw)) and checks
        // SHA1(response XOR SHA1(seed + stored)) == stored.
        let seed = b"abcdefghijklmnopqrst";
        let response = scramble_native(b"secret", seed);
        let stored = Sha1::digest(Sha1::digest(b"secret"));
        let mut hasher = Sha1::new();
        hasher.update(seed);
        hasher.update(stored);
        let mix = hasher.finalize();
        let stage1: Vec<u8> = response.iter().zip(mix.iter()).map(|(a, b)| a ^ b).collect();
        assert_eq!(Sha1::digest(&stage1).as_slice(), stored.as_slice());
    }

    #[test]
    fn test_scramble_depends_on_seed() {
        assert_ne!(
            scramble_caching_sha2(b"secret", b"aaaaaaaaaaaaaaaaaaaa"),
            scramble_caching_sha2(b"secret", b"bbbbbbbbbbbbbbbbbbbb")
        );
    }
}
