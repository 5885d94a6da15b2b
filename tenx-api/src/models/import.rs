//! GitHub import request models

use serde::{Deserialize, Serialize};
use tenx_common::events::ImportStatus;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::services::github_client::{is_valid_branch, GithubRepo, MAX_BRANCH_LEN};
use crate::validation::Validator;

#[derive(Debug, Clone, Deserialize)]
pub struct StartImportRequest {
    pub url: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub use_ai: Option<bool>,
}

impl StartImportRequest {
    /// Validate and resolve the repository
    ///
    /// An explicit `branch` wins over one embedded in a `/tree/<branch>` URL.
    pub fn validate(&self) -> ApiResult<GithubRepo> {
        let mut v = Validator::new();
        let repo = GithubRepo::parse(&self.url);
        v.check(
            repo.is_ok(),
            "url",
            "must be a https://github.com/<owner>/<repo> URL",
        );
        if let Some(branch) = self.branch.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            v.length("branch", branch, 1, MAX_BRANCH_LEN);
            v.check(is_valid_branch(branch), "branch", "is not a valid branch name");
        }
        v.finish()?;

        let mut repo = repo.map_err(|e| crate::error::ApiError::field("url", e.to_string()))?;
        if let Some(branch) = super::non_blank(self.branch.as_deref()) {
            repo.branch = Some(branch);
        }
        Ok(repo)
    }
}

#[derive(Debug, Serialize)]
pub struct StartImportResponse {
    pub job_id: Uuid,
    pub status: ImportStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_branch_overrides_url_branch() {
        let req = StartImportRequest {
            url: "https://github.com/tokio-rs/axum/tree/v0.7.x".into(),
            branch: Some("main".into()),
            use_ai: None,
        };
        let repo = req.validate().unwrap();
        assert_eq!(repo.owner, "tokio-rs");
        assert_eq!(repo.branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_bad_branch_rejected() {
        let req = StartImportRequest {
            url: "https://github.com/tokio-rs/axum".into(),
            branch: Some("a b".into()),
            use_ai: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_branch_cannot_alter_request_url() {
        for branch in ["main?ref=other", "main#readme", "main%2F..%2F"] {
            let req = StartImportRequest {
                url: "https://github.com/tokio-rs/axum".into(),
                branch: Some(branch.into()),
                use_ai: None,
            };
            assert!(req.validate().is_err(), "{:?} should be rejected", branch);
        }
    }
}
