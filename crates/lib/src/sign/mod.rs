//! Signed upload URLs.
//!
//! Issuing signatures belongs to an external service behind [`UrlSigner`].
//! [`SignedUrlResolver`] is the compiler's view of it: it pins the one
//! "build issued" instant captured at the start of a compilation, so every URL
//! in a plan shares the same time basis, and it stops signing as soon as the
//! compilation is cancelled.

mod digest;

pub use digest::DigestSigner;

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Access granted by a signed URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
  Read,
  Write,
}

impl Capability {
  /// HTTP method the URL is signed for.
  pub fn method(&self) -> &'static str {
    match self {
      Capability::Read => "GET",
      Capability::Write => "PUT",
    }
  }
}

impl fmt::Display for Capability {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.method())
  }
}

/// Failures reported by a signing service.
#[derive(Debug, Error)]
pub enum SignError {
  /// The artifact path cannot be signed.
  #[error("invalid artifact path '{0}'")]
  InvalidPath(String),

  /// The expiry time falls outside the representable range.
  #[error("url validity of {0} is out of range")]
  ValidityOutOfRange(TimeDelta),

  /// The signed URL could not be assembled.
  #[error("invalid signed url: {0}")]
  Url(#[from] url::ParseError),

  /// The service failed or could not be reached.
  #[error("signing service unavailable: {0}")]
  Unavailable(String),
}

/// The signing collaborator. Must be idempotent for identical inputs.
pub trait UrlSigner: Send + Sync {
  fn sign(&self, path: &str, at: DateTime<Utc>, capability: Capability) -> Result<Url, SignError>;
}

/// A signer that hands out the same URL for every request.
#[derive(Debug, Clone)]
pub struct StaticSigner {
  url: Url,
}

impl StaticSigner {
  pub fn new(url: Url) -> Self {
    Self { url }
  }
}

impl UrlSigner for StaticSigner {
  fn sign(&self, _path: &str, _at: DateTime<Utc>, _capability: Capability) -> Result<Url, SignError> {
    Ok(self.url.clone())
  }
}

/// Why a resolver refused to produce a URL.
#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("cancelled")]
  Cancelled,

  #[error("failed to sign {path}: {source}")]
  Sign {
    path: String,
    #[source]
    source: SignError,
  },
}

/// Signs write URLs at one fixed logical time.
pub struct SignedUrlResolver<'a> {
  signer: &'a dyn UrlSigner,
  issued_at: DateTime<Utc>,
  cancel: &'a CancellationToken,
}

impl<'a> SignedUrlResolver<'a> {
  pub fn new(signer: &'a dyn UrlSigner, issued_at: DateTime<Utc>, cancel: &'a CancellationToken) -> Self {
    Self {
      signer,
      issued_at,
      cancel,
    }
  }

  pub fn issued_at(&self) -> DateTime<Utc> {
    self.issued_at
  }

  /// A write-capable URL for `artifact_path`, signed at the issued time.
  pub fn resolve_upload_url(&self, artifact_path: &str) -> Result<Url, ResolveError> {
    if self.cancel.is_cancelled() {
      return Err(ResolveError::Cancelled);
    }

    debug!(path = %artifact_path, "signing upload url");
    self
      .signer
      .sign(artifact_path, self.issued_at, Capability::Write)
      .map_err(|source| ResolveError::Sign {
        path: artifact_path.to_string(),
        source,
      })
  }
}
