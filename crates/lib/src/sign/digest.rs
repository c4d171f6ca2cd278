//! Query-string signed URLs keyed by a shared secret.

use chrono::{DateTime, TimeDelta, Utc};
use url::Url;

use crate::util::hash::hash_bytes;

use super::{Capability, SignError, UrlSigner};

/// Signs storage URLs in the `GoogleAccessId` / `Expires` / `Signature` query
/// style, with a SHA-256 digest of the secret and the canonical request
/// standing in for an account key signature.
///
/// # Format
///
/// ```text
/// {endpoint}{path}?GoogleAccessId={account}&Expires={unix}&Signature={hex}
/// ```
///
/// where the signature covers `secret \n METHOD \n \n \n Expires \n path`.
#[derive(Debug, Clone)]
pub struct DigestSigner {
  endpoint: Url,
  account: String,
  secret: String,
  validity: TimeDelta,
}

impl DigestSigner {
  pub fn new(endpoint: Url, account: impl Into<String>, secret: impl Into<String>, validity: TimeDelta) -> Self {
    Self {
      endpoint,
      account: account.into(),
      secret: secret.into(),
      validity,
    }
  }

  fn string_to_sign(&self, method: &str, expires: i64, path: &str) -> String {
    format!("{}\n{}\n\n\n{}\n{}", self.secret, method, expires, path)
  }
}

impl UrlSigner for DigestSigner {
  fn sign(&self, path: &str, at: DateTime<Utc>, capability: Capability) -> Result<Url, SignError> {
    if !path.starts_with('/') || path.len() < 2 || path.chars().any(char::is_whitespace) {
      return Err(SignError::InvalidPath(path.to_string()));
    }

    let expires = at
      .checked_add_signed(self.validity)
      .ok_or(SignError::ValidityOutOfRange(self.validity))?
      .timestamp();
    let signature = hash_bytes(self.string_to_sign(capability.method(), expires, path).as_bytes());

    let mut url = self.endpoint.clone();
    url.set_path(path);
    url
      .query_pairs_mut()
      .append_pair("GoogleAccessId", &self.account)
      .append_pair("Expires", &expires.to_string())
      .append_pair("Signature", &signature.0);

    Ok(url)
  }
}
