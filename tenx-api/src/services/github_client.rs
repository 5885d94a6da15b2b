//! GitHub repository URL parsing and archive download
//!
//! Archives are fetched through the REST API zipball endpoint
//! (`{api_base}/repos/<owner>/<repo>/zipball/<ref>`), which redirects to the
//! codeload host. The body is streamed and aborted once it exceeds the
//! configured size limit.

use std::time::Duration;
use thiserror::Error;
use tenx_common::config::GithubConfig;
use url::Url;

const USER_AGENT: &str = concat!("tenx-api/", env!("CARGO_PKG_VERSION"));
const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Longest accepted branch name
pub const MAX_BRANCH_LEN: usize = 255;

/// GitHub client errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GithubError {
    #[error("Invalid GitHub URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Repository or branch not found")]
    NotFound,

    #[error("GitHub API error {0}: {1}")]
    Api(u16, String),

    #[error("Archive exceeds {limit} bytes")]
    TooLarge { limit: u64 },
}

/// Repository reference parsed from a `https://github.com/<owner>/<repo>` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubRepo {
    pub owner: String,
    pub repo: String,
    /// Branch from a `/tree/<branch>` suffix; `None` means the default branch
    pub branch: Option<String>,
}

impl GithubRepo {
    /// Parse a repository URL
    ///
    /// Accepts an optional `.git` suffix, trailing slash and
    /// `/tree/<branch>` suffix. Only `https` and the `github.com` host are
    /// accepted.
    ///
    /// # Examples
    /// ```
    /// use tenx_api::services::github_client::GithubRepo;
    ///
    /// let repo = GithubRepo::parse("https://github.com/tokio-rs/axum.git").unwrap();
    /// assert_eq!((repo.owner.as_str(), repo.repo.as_str()), ("tokio-rs", "axum"));
    /// assert!(GithubRepo::parse("http://github.com/tokio-rs/axum").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, GithubError> {
        let invalid = || GithubError::InvalidUrl(raw.trim().to_string());

        let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
        if url.scheme() != "https" {
            return Err(invalid());
        }
        match url.host_str() {
            Some("github.com") | Some("www.github.com") => {}
            _ => return Err(invalid()),
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid());
        }

        let segments: Vec<&str> = url
            .path_segments()
            .ok_or_else(invalid)?
            .filter(|s| !s.is_empty())
            .collect();

        let (owner, repo, rest) = match segments.as_slice() {
            [owner, repo, rest @ ..] => (*owner, *repo, rest),
            _ => return Err(invalid()),
        };
        let repo = repo.strip_suffix(".git").unwrap_or(repo);

        if !is_valid_owner(owner) || !is_valid_repo(repo) {
            return Err(invalid());
        }

        let branch = match rest {
            [] => None,
            ["tree", branch @ ..] if !branch.is_empty() => Some(branch.join("/")),
            _ => return Err(invalid()),
        };
        if branch.as_deref().is_some_and(|b| !is_valid_branch(b)) {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch,
        })
    }

    /// `owner/repo`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Canonical browser URL
    pub fn html_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.repo)
    }
}

/// Branch names that are safe to splice into the zipball path
///
/// Follows git's ref-name rules (no `..`, whitespace, control characters or
/// `~ ^ : * [ \`) and additionally rejects `? # %`, which would change the
/// query, fragment or encoding of the API request.
pub fn is_valid_branch(branch: &str) -> bool {
    !branch.is_empty()
        && branch.len() <= MAX_BRANCH_LEN
        && !branch.contains("..")
        && !branch.starts_with('/')
        && !branch.ends_with('/')
        && !branch.contains("//")
        && !branch.chars().any(|c| {
            c.is_whitespace()
                || c.is_control()
                || matches!(c, '~' | '^' | ':' | '*' | '[' | '\\' | '?' | '#' | '%')
        })
}

fn is_valid_owner(owner: &str) -> bool {
    !owner.is_empty()
        && owner.len() <= 39
        && !owner.starts_with('-')
        && owner.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn is_valid_repo(repo: &str) -> bool {
    !repo.is_empty()
        && repo.len() <= 100
        && repo != "."
        && repo != ".."
        && repo
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// GitHub REST client
#[derive(Clone)]
pub struct GithubClient {
    http_client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Result<Self, GithubError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| GithubError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone().filter(|t| !t.trim().is_empty()),
        })
    }

    /// Zipball endpoint for a repository
    pub fn zipball_url(&self, repo: &GithubRepo) -> String {
        match &repo.branch {
            Some(branch) => format!(
                "{}/repos/{}/{}/zipball/{}",
                self.api_base, repo.owner, repo.repo, branch
            ),
            None => format!("{}/repos/{}/{}/zipball", self.api_base, repo.owner, repo.repo),
        }
    }

    /// Download the repository archive, enforcing `max_bytes`
    pub async fn download_zipball(
        &self,
        repo: &GithubRepo,
        max_bytes: u64,
    ) -> Result<Vec<u8>, GithubError> {
        let url = self.zipball_url(repo);
        tracing::debug!(url = %url, "Downloading repository archive");

        let mut request = self
            .http_client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| GithubError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GithubError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = body.chars().take(200).collect::<String>();
            return Err(GithubError::Api(status.as_u16(), message));
        }

        if let Some(len) = response.content_length() {
            if len > max_bytes {
                return Err(GithubError::TooLarge { limit: max_bytes });
            }
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| GithubError::Network(e.to_string()))?
        {
            if bytes.len() as u64 + chunk.len() as u64 > max_bytes {
                return Err(GithubError::TooLarge { limit: max_bytes });
            }
            bytes.extend_from_slice(&chunk);
        }

        tracing::debug!(bytes = bytes.len(), "Repository archive downloaded");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepted_forms() {
        let plain = GithubRepo::parse("https://github.com/rust-lang/rust-clippy").unwrap();
        assert_eq!(plain.owner, "rust-lang");
        assert_eq!(plain.repo, "rust-clippy");
        assert_eq!(plain.branch, None);

        let git = GithubRepo::parse("https://github.com/rust-lang/rust-clippy.git/").unwrap();
        assert_eq!(git.repo, "rust-clippy");

        let tree = GithubRepo::parse("https://www.github.com/vercel/next.js/tree/canary").unwrap();
        assert_eq!(tree.repo, "next.js");
        assert_eq!(tree.branch.as_deref(), Some("canary"));

        let nested = GithubRepo::parse("https://github.com/a/b/tree/feature/login").unwrap();
        assert_eq!(nested.branch.as_deref(), Some("feature/login"));
    }

    #[test]
    fn test_parse_rejected_forms() {
        for bad in [
            "",
            "github.com/a/b",
            "http://github.com/a/b",
            "https://gitlab.com/a/b",
            "https://github.com/a",
            "https://github.com/a/b/issues",
            "https://github.com/a/b/tree",
            "https://github.com/-a/b",
            "https://github.com/a/b?tab=readme",
            "https://github.com/a/b%20c",
            "https://evilgithub.com/a/b",
        ] {
            assert!(GithubRepo::parse(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_branch_names() {
        for ok in ["main", "feature/login", "v0.7.x", "release-2024_01"] {
            assert!(is_valid_branch(ok), "{:?} should be accepted", ok);
        }
        for bad in ["", "main?x=1", "main#frag", "a%2Fb", "a..b", "a b", "/main", "main/", "a//b", "a:b"] {
            assert!(!is_valid_branch(bad), "{:?} should be rejected", bad);
        }
        assert!(GithubRepo::parse("https://github.com/a/b/tree/x%3Fy").is_err());
    }

    #[test]
    fn test_zipball_url() {
        let client = GithubClient::new(&GithubConfig {
            api_base: "http://127.0.0.1:9/".to_string(),
            token: None,
        })
        .unwrap();

        let mut repo = GithubRepo::parse("https://github.com/a/b").unwrap();
        assert_eq!(client.zipball_url(&repo), "http://127.0.0.1:9/repos/a/b/zipball");

        repo.branch = Some("dev".into());
        assert_eq!(client.zipball_url(&repo), "http://127.0.0.1:9/repos/a/b/zipball/dev");
    }
}
