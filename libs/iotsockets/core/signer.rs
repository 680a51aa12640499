//! SigV4 presigning for the broker's WebSocket endpoint
//!
//! The broker authorizes the WebSocket upgrade from query parameters alone,
//! so the connection URL carries the whole proof:
//!
//! ```text
//! wss://<host>/mqtt?X-Amz-Algorithm=AWS4-HMAC-SHA256
//!                  &X-Amz-Credential=<akid>/<date>/<region>/iotdevicegateway/aws4_request
//!                  &X-Amz-Date=<YYYYMMDDTHHMMSSZ>
//!                  &X-Amz-SignedHeaders=host
//!                  &X-Amz-Signature=<64 hex>
//!                  [&X-Amz-Security-Token=<token>]
//! ```
//!
//! The security token is appended after signing and is not part of the
//! canonical query.

use crate::traits::Credentials;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const SERVICE: &str = "iotdevicegateway";
pub const REQUEST_TYPE: &str = "aws4_request";
pub const METHOD: &str = "GET";
pub const PROTOCOL: &str = "wss";
pub const PATH: &str = "/mqtt";
pub const SIGNED_HEADERS: &str = "host";

/// RFC 3986 unreserved characters stay as-is, everything else is escaped
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Inputs of one signing operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningContext {
    pub host: String,
    pub region: String,
    pub service: &'static str,
    pub algorithm: &'static str,
    /// Compact ISO-8601, e.g. `20240115T083000Z`
    pub timestamp: String,
    /// First 8 characters of `timestamp`
    pub date: String,
}

impl SigningContext {
    pub fn new(host: &str, region: &str, now: DateTime<Utc>) -> Self {
        let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = timestamp[..8].to_string();
        Self {
            host: host.to_string(),
            region: region.to_string(),
            service: SERVICE,
            algorithm: ALGORITHM,
            timestamp,
            date,
        }
    }

    /// `<date>/<region>/<service>/aws4_request`
    pub fn credential_scope(&self) -> String {
        format!("{}/{}/{}/{}", self.date, self.region, self.service, REQUEST_TYPE)
    }

    /// Canonical query string, without signature or token
    ///
    /// Parameters are already in byte order, as the canonical form requires.
    pub fn canonical_query(&self, access_key_id: &str) -> String {
        let credential = format!("{}/{}", access_key_id, self.credential_scope());
        format!(
            "X-Amz-Algorithm={}&X-Amz-Credential={}&X-Amz-Date={}&X-Amz-SignedHeaders={}",
            self.algorithm,
            encode(&credential),
            self.timestamp,
            SIGNED_HEADERS
        )
    }

    /// Canonical request for a bodiless `GET /mqtt` signed on `host` only
    pub fn canonical_request(&self, canonical_query: &str) -> String {
        format!(
            "{}\n{}\n{}\nhost:{}\n\n{}\n{}",
            METHOD,
            PATH,
            canonical_query,
            self.host,
            SIGNED_HEADERS,
            sha256_hex(b"")
        )
    }

    pub fn string_to_sign(&self, canonical_request: &str) -> String {
        format!(
            "{}\n{}\n{}\n{}",
            self.algorithm,
            self.timestamp,
            self.credential_scope(),
            sha256_hex(canonical_request.as_bytes())
        )
    }
}

/// A presigned connection URL
///
/// Contains the signature and possibly a session token, so `Debug` only
/// shows the host. Use [`SignedUrl::as_str`] to hand it to a transport.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedUrl {
    url: String,
    host: String,
    timestamp: String,
}

impl SignedUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn into_string(self) -> String {
        self.url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// `X-Amz-Date` the URL was signed at
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

impl fmt::Debug for SignedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedUrl")
            .field("host", &self.host)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

/// Presign a broker WebSocket URL
///
/// Deterministic for fixed inputs. Never fails: an empty key or a skewed
/// clock produce a URL the broker rejects at connect time.
pub fn sign(host: &str, region: &str, credentials: &Credentials, now: DateTime<Utc>) -> SignedUrl {
    let ctx = SigningContext::new(host, region, now);

    let mut query = ctx.canonical_query(&credentials.access_key_id);
    let canonical_request = ctx.canonical_request(&query);
    let string_to_sign = ctx.string_to_sign(&canonical_request);

    let key = signing_key(&credentials.secret_access_key, &ctx.date, region, SERVICE);
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    query.push_str("&X-Amz-Signature=");
    query.push_str(&signature);
    if let Some(token) = credentials.session_token.as_deref().filter(|t| !t.is_empty()) {
        query.push_str("&X-Amz-Security-Token=");
        query.push_str(&encode(token));
    }

    SignedUrl {
        url: format!("{}://{}{}?{}", PROTOCOL, host, PATH, query),
        host: host.to_string(),
        timestamp: ctx.timestamp,
    }
}

/// Derive the SigV4 signing key
///
/// `HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")`
pub fn signing_key(secret_access_key: &str, date: &str, region: &str, service: &str) -> [u8; 32] {
    let k_date = hmac_sha256(format!("AWS4{}", secret_access_key).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, REQUEST_TYPE.as_bytes())
}

/// Hex signature of `string_to_sign` under a derived key
pub fn signature(signing_key: &[u8; 32], string_to_sign: &str) -> String {
    hex::encode(hmac_sha256(signing_key, string_to_sign.as_bytes()))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}
