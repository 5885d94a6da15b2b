//! Project models
//!
//! A project groups card features for a team. Members are `owner` or
//! `member`; every project keeps at least one owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CardFeature;
use crate::error::ApiResult;
use crate::validation::{is_valid_email, Validator};

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Owner,
    Member,
}

impl ProjectRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Owner => "owner",
            ProjectRole::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(ProjectRole::Owner),
            "member" => Some(ProjectRole::Member),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectMember {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: ProjectRole,
    pub added_at: DateTime<Utc>,
}

/// Project with its members, as returned by `GET /api/projects/:id`
#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub members: Vec<ProjectMember>,
    pub card_count: i64,
}

/// Card within a project, in `position` order
#[derive(Debug, Serialize)]
pub struct ProjectCard {
    pub position: i64,
    pub added_at: DateTime<Utc>,
    pub card: CardFeature,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateProjectRequest {
    pub fn validate(&self) -> ApiResult<()> {
        let mut v = Validator::new();
        v.length("name", &self.name, 1, MAX_NAME_CHARS);
        v.optional_length("description", self.description.as_deref(), 0, MAX_DESCRIPTION_CHARS);
        v.finish()
    }

    pub fn into_project(self, owner: Uuid) -> Project {
        let now = Utc::now();
        Project {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            description: self.description.unwrap_or_default().trim().to_string(),
            created_by: Some(owner),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl UpdateProjectRequest {
    pub fn validate(&self) -> ApiResult<()> {
        let mut v = Validator::new();
        v.optional_length("name", self.name.as_deref(), 1, MAX_NAME_CHARS);
        v.optional_length("description", self.description.as_deref(), 0, MAX_DESCRIPTION_CHARS);
        v.finish()
    }

    pub fn apply(self, project: &mut Project) {
        if let Some(name) = self.name {
            project.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            project.description = description.trim().to_string();
        }
        project.updated_at = Utc::now();
    }
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub email: String,
}

impl AddMemberRequest {
    pub fn validate(&self) -> ApiResult<()> {
        let mut v = Validator::new();
        v.check(is_valid_email(self.email.trim()), "email", "must be a valid email address");
        v.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct AddProjectCardRequest {
    pub card_feature_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_validation() {
        let ok = CreateProjectRequest {
            name: "Launch".into(),
            description: None,
        };
        assert!(ok.validate().is_ok());

        let bad = CreateProjectRequest {
            name: "x".repeat(MAX_NAME_CHARS + 1),
            description: Some("d".repeat(MAX_DESCRIPTION_CHARS + 1)),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_detail_flattens_project() {
        let detail = ProjectDetail {
            project: CreateProjectRequest {
                name: "Launch".into(),
                description: None,
            }
            .into_project(Uuid::new_v4()),
            members: vec![],
            card_count: 3,
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["name"], "Launch");
        assert_eq!(json["card_count"], 3);
    }
}
