use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue};
use reqwest::{Client, Method, Response};
use sha2::Sha256;

/// Nonces are drawn below this value; the gateway rejects anything above 10000.
const NONCE_LIMIT: i64 = 10_000;

/// Signature of `payload` under `secret_key`: lowercase hex HMAC-SHA256.
pub fn sign(payload: &str, secret_key: &str) -> String {
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret_key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts keys of any length"),
    };
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// The authentication material the gateway expects on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub access_key: String,
    pub nonce: i64,
    pub timestamp: i64,
    pub body: String,
    pub sign: String,
}

impl SignedHeaders {
    pub fn to_header_map(&self) -> Result<HeaderMap, InvalidHeaderValue> {
        let mut headers = HeaderMap::new();
        headers.insert("accesskey", HeaderValue::from_str(&self.access_key)?);
        headers.insert("nonce", HeaderValue::from(self.nonce));
        headers.insert("timestamp", HeaderValue::from(self.timestamp));
        headers.insert("body", HeaderValue::from_str(&self.body)?);
        headers.insert("sign", HeaderValue::from_str(&self.sign)?);
        Ok(headers)
    }
}

/// HTTP client that signs every request for the gateway.
pub struct SignedClient {
    client: Client,
    gateway_url: String,
    access_key: String,
    secret_key: String,
}

impl SignedClient {
    pub fn new(gateway_url: &str, access_key: &str, secret_key: &str) -> Self {
        Self {
            client: Client::new(),
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    /// Headers for `payload` with an explicit nonce and timestamp.
    pub fn signed_headers_at(&self, payload: &str, nonce: i64, timestamp: i64) -> SignedHeaders {
        SignedHeaders {
            access_key: self.access_key.clone(),
            nonce,
            timestamp,
            body: payload.to_string(),
            sign: sign(payload, &self.secret_key),
        }
    }

    /// Headers for `payload` with a random nonce and the current time.
    pub fn signed_headers(&self, payload: &str) -> SignedHeaders {
        let nonce = rand::thread_rng().gen_range(0..NONCE_LIMIT);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        self.signed_headers_at(payload, nonce, timestamp)
    }

    /// Send a request carrying pre-built headers.
    pub async fn send_with(
        &self,
        method: Method,
        path: &str,
        headers: &SignedHeaders,
    ) -> Result<Response, Box<dyn std::error::Error>> {
        let res = self
            .client
            .request(method, format!("{}{}", self.gateway_url, path))
            .headers(headers.to_header_map()?)
            .send()
            .await?;
        Ok(res)
    }

    /// Signed GET of `path`, signing `payload`.
    pub async fn get(&self, path: &str, payload: &str) -> Result<Response, Box<dyn std::error::Error>> {
        self.send_with(Method::GET, path, &self.signed_headers(payload)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_matches_rfc4231() {
        assert_eq!(
            sign("what do ya want for nothing?", "Jefe"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_signed_headers() {
        let client = SignedClient::new("http://localhost:8090/", "k1", "s1");
        let headers = client.signed_headers("hello");

        assert_eq!(headers.access_key, "k1");
        assert!((0..NONCE_LIMIT).contains(&headers.nonce));
        assert_eq!(headers.sign, sign("hello", "s1"));

        let map = headers.to_header_map().unwrap();
        assert_eq!(map["accesskey"], "k1");
        assert_eq!(map["body"], "hello");
    }

    #[test]
    fn test_pinned_nonce_and_timestamp_fill_every_header() {
        let client = SignedClient::new("http://localhost:8090", "k1", "s1");
        let map = client
            .signed_headers_at("hello", 20_000, 1_700_000_000)
            .to_header_map()
            .unwrap();

        assert_eq!(map.len(), 5);
        assert_eq!(map["nonce"], "20000");
        assert_eq!(map["timestamp"], "1700000000");
        assert_eq!(map["sign"], sign("hello", "s1").as_str());
    }
}
