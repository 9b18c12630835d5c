// HTTP Digest access authentication (RFC 2617), MD5 with qop=auth

use md5::{Digest, Md5};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::collections::HashMap;

use crate::config::Credentials;

static PARAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([A-Za-z][\w-]*)\s*=\s*(?:"([^"]*)"|([^,\s]+))"#).unwrap());

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Parameters of a `WWW-Authenticate: Digest ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub algorithm: Option<String>,
    /// Offered quality-of-protection values
    pub qop: Vec<String>,
}

impl DigestChallenge {
    /// Parse a challenge header value. Returns `None` for other schemes or when realm/nonce are missing.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, rest) = header.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("digest") {
            return None;
        }

        let params: HashMap<String, String> = PARAM_RE
            .captures_iter(rest)
            .filter_map(|cap| {
                let key = cap.get(1)?.as_str().to_ascii_lowercase();
                let value = cap.get(2).or_else(|| cap.get(3))?.as_str().to_string();
                Some((key, value))
            })
            .collect();

        let algorithm = params.get("algorithm").cloned();
        if let Some(algorithm) = &algorithm {
            if !algorithm.eq_ignore_ascii_case("md5") {
                return None;
            }
        }

        Some(Self {
            realm: params.get("realm")?.clone(),
            nonce: params.get("nonce")?.clone(),
            opaque: params.get("opaque").cloned(),
            algorithm,
            qop: params
                .get("qop")
                .map(|qop| {
                    qop.split(',')
                        .map(|v| v.trim().to_string())
                        .filter(|v| !v.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    fn supports_auth_qop(&self) -> bool {
        self.qop.iter().any(|q| q.eq_ignore_ascii_case("auth"))
    }

    /// Request digest for `method uri`
    pub fn response(
        &self,
        credentials: &Credentials,
        method: &str,
        uri: &str,
        nc: u32,
        cnonce: &str,
    ) -> String {
        let ha1 = md5_hex(&format!(
            "{}:{}:{}",
            credentials.username, self.realm, credentials.password
        ));
        let ha2 = md5_hex(&format!("{}:{}", method, uri));

        if self.supports_auth_qop() {
            md5_hex(&format!(
                "{}:{}:{:08x}:{}:auth:{}",
                ha1, self.nonce, nc, cnonce, ha2
            ))
        } else {
            md5_hex(&format!("{}:{}:{}", ha1, self.nonce, ha2))
        }
    }

    /// Full `Authorization` header value
    pub fn authorization(
        &self,
        credentials: &Credentials,
        method: &str,
        uri: &str,
        nc: u32,
        cnonce: &str,
    ) -> String {
        let response = self.response(credentials, method, uri, nc, cnonce);
        let mut header = format!(
            r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", algorithm=MD5, response="{}""#,
            credentials.username, self.realm, self.nonce, uri, response
        );
        if self.supports_auth_qop() {
            header.push_str(&format!(r#", qop=auth, nc={:08x}, cnonce="{}""#, nc, cnonce));
        }
        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(r#", opaque="{}""#, opaque));
        }
        header
    }
}

/// Fresh client nonce
pub fn cnonce() -> String {
    format!("{:016x}", rand::thread_rng().gen::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mufasa() -> Credentials {
        Credentials {
            username: "Mufasa".to_string(),
            password: "Circle Of Life".to_string(),
        }
    }

    const CHALLENGE: &str = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;

    #[test]
    fn parses_challenge() {
        let challenge = DigestChallenge::parse(CHALLENGE).unwrap();
        assert_eq!(challenge.realm, "testrealm@host.com");
        assert_eq!(challenge.nonce, "dcd98b7102dd2f0e8b11d0f600bfb0c093");
        assert_eq!(
            challenge.opaque.as_deref(),
            Some("5ccc069c403ebaf9f0171e9517f40e41")
        );
        assert_eq!(challenge.qop, vec!["auth", "auth-int"]);
    }

    #[test]
    fn rfc2617_example_response() {
        let challenge = DigestChallenge::parse(CHALLENGE).unwrap();
        let response = challenge.response(&mufasa(), "GET", "/dir/index.html", 1, "0a4f113b");
        assert_eq!(response, "6629fae49393a05397450978507c4ef1");

        let header =
            challenge.authorization(&mufasa(), "GET", "/dir/index.html", 1, "0a4f113b");
        assert!(header.starts_with(r#"Digest username="Mufasa""#));
        assert!(header.contains("nc=00000001"));
        assert!(header.contains(r#"cnonce="0a4f113b""#));
        assert!(header.contains(r#"response="6629fae49393a05397450978507c4ef1""#));
        assert!(header.contains(r#"opaque="5ccc069c403ebaf9f0171e9517f40e41""#));
    }

    #[test]
    fn rejects_basic_and_unknown_algorithms() {
        assert!(DigestChallenge::parse(r#"Basic realm="cam""#).is_none());
        assert!(DigestChallenge::parse(
            r#"Digest realm="cam", nonce="n", algorithm=SHA-256"#
        )
        .is_none());
        assert!(DigestChallenge::parse(r#"Digest realm="cam""#).is_none());
    }

    #[test]
    fn legacy_challenge_without_qop() {
        let challenge = DigestChallenge::parse(r#"Digest realm="cam", nonce="abc""#).unwrap();
        let header = challenge.authorization(&mufasa(), "GET", "/x", 1, "c");
        assert!(!header.contains("qop="));
        assert!(!header.contains("cnonce"));
    }
}
