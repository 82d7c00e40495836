//! Submission validation, before any record is created.

use reqwest::Url;

use crate::config::LimitsConfig;
use crate::error::PixflowError;
use crate::types::{ProcessRequest, Stage};

/// Validates batch requests against the configured limits.
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Check a request before it is accepted.
    ///
    /// Checks:
    /// - At least one URL
    /// - Every URL parses and is http or https
    /// - Every stage has between 1 and `max_workers_per_stage` workers
    pub fn validate(&self, request: &ProcessRequest) -> Result<(), PixflowError> {
        if request.urls.is_empty() {
            return Err(PixflowError::InvalidRequest(
                "urls must contain at least one entry".into(),
            ));
        }

        for raw in &request.urls {
            let url = Url::parse(raw).map_err(|e| {
                PixflowError::InvalidRequest(format!("invalid url {raw:?}: {e}"))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(PixflowError::InvalidRequest(format!(
                    "unsupported scheme {:?} in {raw:?}",
                    url.scheme()
                )));
            }
        }

        for stage in Stage::ALL {
            let count = request.workers.for_stage(stage);
            if count == 0 {
                return Err(PixflowError::InvalidRequest(format!(
                    "workers.{stage} must be > 0"
                )));
            }
            if count > self.limits.max_workers_per_stage {
                return Err(PixflowError::InvalidRequest(format!(
                    "workers.{stage} must be <= {} (got {count})",
                    self.limits.max_workers_per_stage
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorkerCounts;

    fn request(urls: &[&str]) -> ProcessRequest {
        ProcessRequest {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            workers: WorkerCounts::default(),
        }
    }

    fn validator() -> Validator {
        Validator::new(LimitsConfig::default())
    }

    #[test]
    fn test_valid_request_passes() {
        let req = request(&["https://example.com/a.jpg", "http://example.com/b.png"]);
        assert!(validator().validate(&req).is_ok());
    }

    #[test]
    fn test_rejects_empty_urls() {
        let err = validator().validate(&request(&[])).unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn test_rejects_unparseable_url() {
        let err = validator().validate(&request(&["not a url"])).unwrap_err();
        assert!(matches!(err, PixflowError::InvalidRequest(_)));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let err = validator()
            .validate(&request(&["file:///etc/passwd"]))
            .unwrap_err();
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn test_rejects_zero_workers() {
        let mut req = request(&["https://example.com/a.jpg"]);
        req.workers.reformat = 0;
        let err = validator().validate(&req).unwrap_err();
        assert!(err.to_string().contains("workers.reformat"));
    }

    #[test]
    fn test_watermark_workers_are_not_checked() {
        let mut req = request(&["https://example.com/a.jpg"]);
        req.workers.watermark = 10_000;
        assert!(validator().validate(&req).is_ok());
    }

    #[test]
    fn test_rejects_too_many_workers() {
        let mut req = request(&["https://example.com/a.jpg"]);
        req.workers.download = 65;
        let err = validator().validate(&req).unwrap_err();
        assert!(err.to_string().contains("<= 64"));
    }
}
