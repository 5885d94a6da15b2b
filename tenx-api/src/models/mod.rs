//! Request/response models and their validation rules

pub mod admin;
pub mod card_feature;
pub mod import;
pub mod project;
pub mod template;
pub mod user;
pub mod video;

pub use admin::{AdminStats, ApprovalRequest, UpdateRoleRequest};
pub use card_feature::{
    ApprovalStatus, BlockType, BulkCreateRequest, BulkCreateResponse, CardFeature, CardFeatureStats,
    CardFeatureQuery, CardType, ContentBlock, CreateCardFeatureRequest, Screen,
    UpdateCardFeatureRequest, Visibility,
};
pub use import::{StartImportRequest, StartImportResponse};
pub use project::{
    AddMemberRequest, AddProjectCardRequest, CreateProjectRequest, Project, ProjectCard,
    ProjectDetail, ProjectMember, ProjectRole, UpdateProjectRequest,
};
pub use template::{CreateTemplateRequest, Template, TemplateQuery, UpdateTemplateRequest};
pub use user::{AuthResponse, AuthUser, LoginRequest, RegisterRequest, UpdateProfileRequest, User};
pub use video::{CreateVideoRequest, UpdateVideoRequest, Video, VideoQuery};

use crate::validation::Validator;

/// Maximum tags per card or template
pub const MAX_TAGS: usize = 20;
/// Maximum characters per tag
pub const MAX_TAG_CHARS: usize = 30;

/// Trim tags and drop empty and duplicate entries, keeping first occurrence order
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            out.push(tag.to_string());
        }
    }
    out
}

pub(crate) fn validate_tags(v: &mut Validator, field: &str, tags: &[String]) {
    v.check(
        tags.len() <= MAX_TAGS,
        field,
        format!("at most {} tags allowed", MAX_TAGS),
    );
    for (i, tag) in tags.iter().enumerate() {
        v.check(
            tag.trim().chars().count() <= MAX_TAG_CHARS,
            format!("{}[{}]", field, i),
            format!("must be at most {} characters", MAX_TAG_CHARS),
        );
    }
}

/// Trimmed copy of an optional string, `None` when blank
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
