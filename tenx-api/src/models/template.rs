//! Project template models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::{normalize_tags, validate_tags};
use crate::error::ApiResult;
use crate::services::github_client::GithubRepo;
use crate::validation::Validator;

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;
pub const MAX_CATEGORY_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub github_url: Option<String>,
    pub zip_url: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn is_https_url(raw: &str) -> bool {
    Url::parse(raw.trim())
        .map(|u| u.scheme() == "https" && u.host_str().is_some())
        .unwrap_or(false)
}

fn validate_links(v: &mut Validator, github_url: Option<&str>, zip_url: Option<&str>) {
    if let Some(github_url) = github_url {
        v.check(
            GithubRepo::parse(github_url).is_ok(),
            "github_url",
            "must be a https://github.com/<owner>/<repo> URL",
        );
    }
    if let Some(zip_url) = zip_url {
        v.check(is_https_url(zip_url), "zip_url", "must be an https URL");
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub github_url: Option<String>,
    #[serde(default)]
    pub zip_url: Option<String>,
}

impl CreateTemplateRequest {
    pub fn validate(&self) -> ApiResult<()> {
        let mut v = Validator::new();
        v.length("name", &self.name, 1, MAX_NAME_CHARS);
        v.optional_length("description", self.description.as_deref(), 0, MAX_DESCRIPTION_CHARS);
        v.optional_length("category", self.category.as_deref(), 0, MAX_CATEGORY_CHARS);
        if let Some(tags) = &self.tags {
            validate_tags(&mut v, "tags", tags);
        }
        validate_links(&mut v, self.github_url.as_deref(), self.zip_url.as_deref());
        v.finish()
    }

    pub fn into_template(self, owner: Uuid) -> Template {
        let now = Utc::now();
        Template {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            description: self.description.unwrap_or_default().trim().to_string(),
            category: self.category.unwrap_or_default().trim().to_string(),
            tags: normalize_tags(&self.tags.unwrap_or_default()),
            github_url: super::non_blank(self.github_url.as_deref()),
            zip_url: super::non_blank(self.zip_url.as_deref()),
            created_by: Some(owner),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub github_url: Option<String>,
    pub zip_url: Option<String>,
}

impl UpdateTemplateRequest {
    pub fn validate(&self) -> ApiResult<()> {
        let mut v = Validator::new();
        v.optional_length("name", self.name.as_deref(), 1, MAX_NAME_CHARS);
        v.optional_length("description", self.description.as_deref(), 0, MAX_DESCRIPTION_CHARS);
        v.optional_length("category", self.category.as_deref(), 0, MAX_CATEGORY_CHARS);
        if let Some(tags) = &self.tags {
            validate_tags(&mut v, "tags", tags);
        }
        // An empty link clears it
        validate_links(
            &mut v,
            self.github_url.as_deref().filter(|s| !s.trim().is_empty()),
            self.zip_url.as_deref().filter(|s| !s.trim().is_empty()),
        );
        v.finish()
    }

    pub fn apply(self, template: &mut Template) {
        if let Some(name) = self.name {
            template.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            template.description = description.trim().to_string();
        }
        if let Some(category) = self.category {
            template.category = category.trim().to_string();
        }
        if let Some(tags) = self.tags {
            template.tags = normalize_tags(&tags);
        }
        if let Some(github_url) = self.github_url {
            template.github_url = super::non_blank(Some(&github_url));
        }
        if let Some(zip_url) = self.zip_url {
            template.zip_url = super::non_blank(Some(&zip_url));
        }
        template.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub category: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateTemplateRequest {
        CreateTemplateRequest {
            name: "Next.js starter".into(),
            description: None,
            category: Some("web".into()),
            tags: None,
            github_url: Some("https://github.com/vercel/next.js".into()),
            zip_url: Some("https://example.com/starter.zip".into()),
        }
    }

    #[test]
    fn test_valid_links() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_invalid_links() {
        let mut req = request();
        req.github_url = Some("https://gitlab.com/a/b".into());
        req.zip_url = Some("http://example.com/starter.zip".into());
        match req.validate() {
            Err(crate::error::ApiError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["github_url", "zip_url"]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_empty_link_clears_on_update() {
        let mut template = request().into_template(Uuid::new_v4());
        let update = UpdateTemplateRequest {
            zip_url: Some(String::new()),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
        update.apply(&mut template);
        assert_eq!(template.zip_url, None);
        assert!(template.github_url.is_some());
    }
}
