//! Video models and YouTube URL handling

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::validation::Validator;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;
pub const MAX_CATEGORY_CHARS: usize = 50;

const YOUTUBE_ID_LEN: usize = 11;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub url: String,
    pub youtube_id: String,
    pub thumbnail_url: String,
    pub category: String,
    pub card_feature_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Extract the 11-character video id from a YouTube URL
///
/// Accepts `youtube.com/watch?v=<id>`, `youtu.be/<id>`,
/// `youtube.com/embed/<id>` and `youtube.com/shorts/<id>` over http(s).
///
/// # Examples
/// ```
/// use tenx_api::models::video::parse_youtube_id;
///
/// assert_eq!(parse_youtube_id("https://youtu.be/dQw4w9WgXcQ?t=42").as_deref(), Some("dQw4w9WgXcQ"));
/// assert_eq!(parse_youtube_id("https://vimeo.com/123"), None);
/// ```
pub fn parse_youtube_id(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let host = host.strip_prefix("m.").unwrap_or(host);

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let candidate = match host {
        "youtu.be" => segments.next()?.to_string(),
        "youtube.com" | "youtube-nocookie.com" => match segments.next()? {
            "watch" => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned())?,
            "embed" | "shorts" | "v" | "live" => segments.next()?.to_string(),
            _ => return None,
        },
        _ => return None,
    };

    is_valid_youtube_id(&candidate).then_some(candidate)
}

fn is_valid_youtube_id(id: &str) -> bool {
    id.len() == YOUTUBE_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// High-quality thumbnail for a video id
pub fn thumbnail_url(youtube_id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/hqdefault.jpg", youtube_id)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVideoRequest {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub card_feature_id: Option<Uuid>,
}

impl CreateVideoRequest {
    /// Validate and return the parsed YouTube id
    pub fn validate(&self) -> ApiResult<String> {
        let mut v = Validator::new();
        v.length("title", &self.title, 1, MAX_TITLE_CHARS);
        v.optional_length("description", self.description.as_deref(), 0, MAX_DESCRIPTION_CHARS);
        v.optional_length("category", self.category.as_deref(), 0, MAX_CATEGORY_CHARS);
        let youtube_id = parse_youtube_id(&self.url);
        v.check(youtube_id.is_some(), "url", "must be a YouTube video URL");
        v.finish()?;
        Ok(youtube_id.unwrap_or_default())
    }

    pub fn into_video(self, youtube_id: String, owner: Uuid) -> Video {
        let now = Utc::now();
        Video {
            id: Uuid::new_v4(),
            title: self.title.trim().to_string(),
            description: self.description.unwrap_or_default().trim().to_string(),
            url: self.url.trim().to_string(),
            thumbnail_url: thumbnail_url(&youtube_id),
            youtube_id,
            category: self.category.unwrap_or_default().trim().to_string(),
            card_feature_id: self.card_feature_id,
            created_by: Some(owner),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateVideoRequest {
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Absent keeps the link, `null` removes it
    #[serde(default, deserialize_with = "present_or_null")]
    pub card_feature_id: Option<Option<Uuid>>,
}

/// Distinguish an explicit `null` (`Some(None)`) from a missing field (`None`)
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Uuid>::deserialize(deserializer).map(Some)
}

impl UpdateVideoRequest {
    /// Validate and return the parsed YouTube id when the URL changes
    pub fn validate(&self) -> ApiResult<Option<String>> {
        let mut v = Validator::new();
        v.optional_length("title", self.title.as_deref(), 1, MAX_TITLE_CHARS);
        v.optional_length("description", self.description.as_deref(), 0, MAX_DESCRIPTION_CHARS);
        v.optional_length("category", self.category.as_deref(), 0, MAX_CATEGORY_CHARS);
        let youtube_id = self.url.as_deref().map(parse_youtube_id);
        if let Some(parsed) = &youtube_id {
            v.check(parsed.is_some(), "url", "must be a YouTube video URL");
        }
        v.finish()?;
        Ok(youtube_id.flatten())
    }

    pub fn apply(self, video: &mut Video, youtube_id: Option<String>) {
        if let Some(title) = self.title {
            video.title = title.trim().to_string();
        }
        if let (Some(url), Some(id)) = (self.url, youtube_id) {
            video.url = url.trim().to_string();
            video.thumbnail_url = thumbnail_url(&id);
            video.youtube_id = id;
        }
        if let Some(description) = self.description {
            video.description = description.trim().to_string();
        }
        if let Some(category) = self.category {
            video.category = category.trim().to_string();
        }
        if let Some(card_feature_id) = self.card_feature_id {
            video.card_feature_id = card_feature_id;
        }
        video.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub category: Option<String>,
}
