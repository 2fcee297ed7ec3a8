//! DTOs for interacting with the authorization endpoint

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// The form body of a client credentials grant
#[derive(Debug, Serialize)]
pub(super) struct ClientCredentialsGrant<'a> {
    grant_type: &'static str,
    scope: &'a str,
}

impl<'a> ClientCredentialsGrant<'a> {
    pub(super) fn new(scope: &'a str) -> Self {
        Self {
            grant_type: "client_credentials",
            scope,
        }
    }
}

/// A successful token response
///
/// Every field is optional: absent or `null` strings read as empty and an absent,
/// `null` or unparseable lifetime reads as zero.
#[derive(Deserialize)]
pub(super) struct TokenResponse {
    #[serde(default, deserialize_with = "nullable_string")]
    pub access_token: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub token_type: String,
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub expires_in: u64,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

fn nullable_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
    Whole(u64),
    Negative(i64),
    Fractional(f64),
    Text(String),
}

fn lenient_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let seconds = match Option::<Seconds>::deserialize(deserializer)? {
        Some(Seconds::Whole(s)) => s,
        Some(Seconds::Negative(_)) | None => 0,
        Some(Seconds::Fractional(s)) => s.max(0.0) as u64,
        Some(Seconds::Text(s)) => s.trim().parse().unwrap_or(0),
    };
    Ok(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> TokenResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn reads_complete_response() {
        let resp = parse(r#"{"access_token":"abc","token_type":"bearer","expires_in":3600}"#);
        assert_eq!(resp.access_token, "abc");
        assert_eq!(resp.token_type, "bearer");
        assert_eq!(resp.expires_in, 3600);
    }

    #[test]
    fn missing_fields_default() {
        let resp = parse(r#"{"scope":"client"}"#);
        assert_eq!(resp.access_token, "");
        assert_eq!(resp.token_type, "");
        assert_eq!(resp.expires_in, 0);
    }

    #[test]
    fn null_fields_default() {
        let resp = parse(r#"{"access_token":null,"token_type":"bearer","expires_in":null}"#);
        assert_eq!(resp.access_token, "");
        assert_eq!(resp.expires_in, 0);
    }

    #[test]
    fn lifetime_accepts_other_shapes() {
        assert_eq!(parse(r#"{"expires_in":"7200"}"#).expires_in, 7200);
        assert_eq!(parse(r#"{"expires_in":" 60 "}"#).expires_in, 60);
        assert_eq!(parse(r#"{"expires_in":"soon"}"#).expires_in, 0);
        assert_eq!(parse(r#"{"expires_in":-5}"#).expires_in, 0);
        assert_eq!(parse(r#"{"expires_in":59.9}"#).expires_in, 59);
    }

    #[test]
    fn rejects_non_object_bodies() {
        assert!(serde_json::from_str::<TokenResponse>("42").is_err());
        assert!(serde_json::from_str::<TokenResponse>("<html>").is_err());
    }

    #[test]
    fn grant_is_form_encoded() {
        let body = form_body(&ClientCredentialsGrant::new("client"));
        assert_eq!(body, "grant_type=client_credentials&scope=client");
    }

    fn form_body<T: Serialize>(value: &T) -> String {
        let url = reqwest::Url::parse("http://localhost/").unwrap();
        reqwest::Client::new()
            .post(url)
            .form(value)
            .build()
            .unwrap()
            .body()
            .and_then(|b| b.as_bytes())
            .map(|b| String::from_utf8(b.to_vec()).unwrap())
            .unwrap()
    }

    #[test]
    fn debug_redacts_token() {
        let resp = parse(r#"{"access_token":"super-secret-token","token_type":"bearer","expires_in":5}"#);
        let debug = format!("{resp:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("bearer"));
    }
}
