//! HTTP Digest authentication (RFC 2617, MD5)

use crate::router::encoding::md5_hex;
use rand::Rng;
use std::collections::HashMap;

/// Parsed `WWW-Authenticate: Digest ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    /// Protection space
    pub realm: String,
    /// Server nonce
    pub nonce: String,
    /// Opaque value to echo back
    pub opaque: Option<String>,
    /// Quality of protection; only `auth` is supported
    pub qop: Option<String>,
    /// Hash algorithm (MD5 when absent)
    pub algorithm: Option<String>,
}

impl DigestChallenge {
    /// Parse a `WWW-Authenticate` header value
    ///
    /// Returns `None` unless the scheme is Digest with realm and nonce.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }

        let params = parse_params(params);
        let qop = params.get("qop").and_then(|value| {
            value
                .split(',')
                .map(str::trim)
                .find(|option| option.eq_ignore_ascii_case("auth"))
                .map(str::to_string)
        });

        Some(Self {
            realm: params.get("realm")?.clone(),
            nonce: params.get("nonce")?.clone(),
            opaque: params.get("opaque").cloned(),
            qop,
            algorithm: params.get("algorithm").cloned(),
        })
    }

    /// `Authorization` header value for `method uri` with a random cnonce
    pub fn authorization(&self, method: &str, uri: &str, username: &str, password: &str) -> String {
        let cnonce = format!("{:016x}", rand::thread_rng().r#gen::<u64>());
        self.authorization_with_cnonce(method, uri, username, password, &cnonce)
    }

    /// `Authorization` header value with a fixed cnonce and nonce count 1
    pub fn authorization_with_cnonce(
        &self,
        method: &str,
        uri: &str,
        username: &str,
        password: &str,
        cnonce: &str,
    ) -> String {
        let ha1 = md5_hex(format!("{}:{}:{}", username, self.realm, password).as_bytes());
        let ha2 = md5_hex(format!("{}:{}", method, uri).as_bytes());

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\"",
            username, self.realm, self.nonce, uri
        );

        let response = match &self.qop {
            Some(qop) => {
                let nc = "00000001";
                header.push_str(&format!(", qop={}, nc={}, cnonce=\"{}\"", qop, nc, cnonce));
                md5_hex(format!("{}:{}:{}:{}:{}:{}", ha1, self.nonce, nc, cnonce, qop, ha2).as_bytes())
            }
            None => md5_hex(format!("{}:{}:{}", ha1, self.nonce, ha2).as_bytes()),
        };
        header.push_str(&format!(", response=\"{}\"", response));

        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(", opaque=\"{}\"", opaque));
        }
        if let Some(algorithm) = &self.algorithm {
            header.push_str(&format!(", algorithm={}", algorithm));
        }
        header
    }
}

/// Split `key=value, key="quoted, value"` pairs
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().trim_start_matches(',').trim().to_ascii_lowercase();
        let after = after.trim_start();

        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (after[..end].trim(), &after[end..]),
                None => (after.trim(), ""),
            }
        };

        params.insert(key, value.to_string());
        rest = remaining.trim_start().trim_start_matches(',').trim_start();
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 2617 section 3.5 example
    const RFC_CHALLENGE: &str = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;

    #[test]
    fn test_parse_challenge() {
        let challenge = DigestChallenge::parse(RFC_CHALLENGE).expect("challenge");
        assert_eq!(challenge.realm, "testrealm@host.com");
        assert_eq!(challenge.nonce, "dcd98b7102dd2f0e8b11d0f600bfb0c093");
        assert_eq!(challenge.qop.as_deref(), Some("auth"));
        assert_eq!(
            challenge.opaque.as_deref(),
            Some("5ccc069c403ebaf9f0171e9517f40e41")
        );
    }

    #[test]
    fn test_rfc_response() {
        let challenge = DigestChallenge::parse(RFC_CHALLENGE).expect("challenge");
        let header = challenge.authorization_with_cnonce(
            "GET",
            "/dir/index.html",
            "Mufasa",
            "Circle Of Life",
            "0a4f113b",
        );
        assert!(header.contains("response=\"6629fae49393a05397450978507c4ef1\""));
        assert!(header.contains("nc=00000001"));
    }

    #[test]
    fn test_basic_challenge_is_not_digest() {
        assert!(DigestChallenge::parse("Basic realm=\"router\"").is_none());
    }
}
