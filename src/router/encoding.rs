//! Password encodings used by router login forms

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::digest::{SHA1_FOR_LEGACY_USE_ONLY, SHA256, digest};

/// How a login form expects the password
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordEncoding {
    /// As typed
    Plain,
    /// Lowercase hex MD5
    Md5Hex,
    /// Lowercase hex SHA-256
    Sha256Hex,
    /// Lowercase hex SHA-1 of password followed by a server nonce
    Sha1NonceHex,
    /// Standard base64
    Base64,
}

impl PasswordEncoding {
    /// Encode `password`; `nonce` is only used by [`PasswordEncoding::Sha1NonceHex`]
    pub fn encode(&self, password: &str, nonce: Option<&str>) -> String {
        match self {
            PasswordEncoding::Plain => password.to_string(),
            PasswordEncoding::Md5Hex => md5_hex(password.as_bytes()),
            PasswordEncoding::Sha256Hex => hex::encode(digest(&SHA256, password.as_bytes())),
            PasswordEncoding::Sha1NonceHex => {
                let salted = format!("{}{}", password, nonce.unwrap_or_default());
                hex::encode(digest(&SHA1_FOR_LEGACY_USE_ONLY, salted.as_bytes()))
            }
            PasswordEncoding::Base64 => BASE64.encode(password.as_bytes()),
        }
    }
}

/// Lowercase hex MD5 of `data`
pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}
