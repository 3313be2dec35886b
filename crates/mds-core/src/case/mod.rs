//! Case: one source→destination transfer unit under supervision.

mod name;
mod record;
mod registry;

pub use record::{CaseRecord, ErrorKind};
pub use registry::{CaseId, CaseRegistry, DuplicateCaseError};

use std::path::{Path, PathBuf};

/// A unit of work: a source URL, a destination path, and the accumulated
/// error/outcome history. The `(source, destination)` identity is immutable
/// for the case's lifetime; only the record changes.
#[derive(Debug, Clone)]
pub struct Case {
    source: String,
    destination: PathBuf,
    record: CaseRecord,
}

impl Case {
    pub fn new(source: String, destination: PathBuf) -> Self {
        Self {
            source,
            destination,
            record: CaseRecord::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn record(&self) -> &CaseRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut CaseRecord {
        &mut self.record
    }
}

/// Error building a case from a raw source string.
#[derive(Debug, thiserror::Error)]
pub enum CaseBuildError {
    #[error("invalid source URL {url:?}: {reason}")]
    InvalidSource {
        url: String,
        reason: url::ParseError,
    },
    #[error("unsupported URL scheme {scheme:?} in {url:?}")]
    UnsupportedScheme { url: String, scheme: String },
}

/// Builds cases for a download directory, deriving destination filenames
/// from the source URL.
#[derive(Debug, Clone)]
pub struct CaseFactory {
    default_dir: PathBuf,
}

impl CaseFactory {
    pub fn new(default_dir: PathBuf) -> Self {
        Self { default_dir }
    }

    pub fn default_dir(&self) -> &Path {
        &self.default_dir
    }

    /// Build a case saving into the factory's download directory.
    pub fn case(&self, source: &str) -> Result<Case, CaseBuildError> {
        let url = self.parse_source(source)?;
        let destination = self.default_dir.join(name::filename_from_source(&url));
        Ok(Case::new(source.to_string(), destination))
    }

    /// Build a case with an explicit destination path.
    pub fn case_with_destination(
        &self,
        source: &str,
        destination: PathBuf,
    ) -> Result<Case, CaseBuildError> {
        self.parse_source(source)?;
        Ok(Case::new(source.to_string(), destination))
    }

    fn parse_source(&self, source: &str) -> Result<url::Url, CaseBuildError> {
        let url = url::Url::parse(source).map_err(|reason| CaseBuildError::InvalidSource {
            url: source.to_string(),
            reason,
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(CaseBuildError::UnsupportedScheme {
                url: source.to_string(),
                scheme: other.to_string(),
            }),
        }
    }
}
