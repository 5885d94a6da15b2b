//! Card feature models
//!
//! A card feature is a titled unit of developer content made of named
//! screens. Each screen holds ordered content blocks (code, prose or
//! terminal output).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{normalize_tags, validate_tags};
use crate::error::ApiResult;
use crate::validation::Validator;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_TECH_CHARS: usize = 50;
pub const MAX_LANGUAGE_CHARS: usize = 50;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;
pub const MAX_SCREENS: usize = 50;
pub const MAX_BLOCKS_PER_SCREEN: usize = 100;
pub const MAX_BLOCK_CHARS: usize = 100_000;
pub const MAX_SCREEN_NAME_CHARS: usize = 200;
pub const MAX_BULK_CARDS: usize = 100;

// ========================================
// Enumerations
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    #[default]
    Snippet,
    Tutorial,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Snippet => "snippet",
            CardType::Tutorial => "tutorial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "snippet" => Some(CardType::Snippet),
            "tutorial" => Some(CardType::Tutorial),
            _ => None,
        }
    }
}

/// Who can see a card
///
/// Unlisted cards are reachable by id but never appear in public listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Unlisted,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Unlisted => "unlisted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "unlisted" => Some(Visibility::Unlisted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ApprovalStatus::Pending),
            "approved" => Some(ApprovalStatus::Approved),
            "rejected" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }

    /// Status a newly created card starts in
    ///
    /// Public cards from regular users wait for moderation; everything else
    /// is approved immediately.
    pub fn initial(visibility: Visibility, is_admin: bool) -> Self {
        if visibility == Visibility::Public && !is_admin {
            ApprovalStatus::Pending
        } else {
            ApprovalStatus::Approved
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Code,
    Text,
    Terminal,
}

// ========================================
// Content
// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    /// Position within the screen, renumbered `0..n` on save
    #[serde(default)]
    pub order: i64,
}

impl ContentBlock {
    pub fn code(content: impl Into<String>, language: Option<String>, route: Option<String>) -> Self {
        Self {
            block_type: BlockType::Code,
            content: content.into(),
            language,
            title: None,
            route,
            order: 0,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            block_type: BlockType::Text,
            content: content.into(),
            language: None,
            title: None,
            route: None,
            order: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
}

/// Trim screen names and renumber block order by position
pub fn normalize_screens(screens: &mut [Screen]) {
    for screen in screens {
        screen.name = screen.name.trim().to_string();
        for (i, block) in screen.blocks.iter_mut().enumerate() {
            block.order = i as i64;
        }
    }
}

fn validate_screens(v: &mut Validator, prefix: &str, screens: &[Screen]) {
    let field = format!("{}screens", prefix);
    v.check(
        (1..=MAX_SCREENS).contains(&screens.len()),
        field.as_str(),
        format!("must contain between 1 and {} screens", MAX_SCREENS),
    );

    for (i, screen) in screens.iter().enumerate() {
        let screen_field = format!("{}[{}]", field, i);
        v.length(&format!("{}.name", screen_field), &screen.name, 1, MAX_SCREEN_NAME_CHARS);
        v.check(
            screen.blocks.len() <= MAX_BLOCKS_PER_SCREEN,
            format!("{}.blocks", screen_field),
            format!("at most {} blocks per screen", MAX_BLOCKS_PER_SCREEN),
        );
        for (j, block) in screen.blocks.iter().enumerate() {
            v.check(
                block.content.chars().count() <= MAX_BLOCK_CHARS,
                format!("{}.blocks[{}].content", screen_field, j),
                format!("must be at most {} characters", MAX_BLOCK_CHARS),
            );
        }
    }
}

// ========================================
// Stored card
// ========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardFeature {
    pub id: Uuid,
    pub title: String,
    pub tech: String,
    pub language: String,
    pub description: String,
    pub card_type: CardType,
    pub visibility: Visibility,
    pub approval_status: ApprovalStatus,
    pub screens: Vec<Screen>,
    pub tags: Vec<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CardFeature {
    /// Shown in public listings
    pub fn is_publicly_listed(&self) -> bool {
        self.visibility == Visibility::Public && self.approval_status == ApprovalStatus::Approved
    }

    /// Readable by `viewer` when fetched by id
    ///
    /// Anyone may open approved public cards and unlisted cards; private or
    /// unapproved cards are restricted to their owner and administrators.
    pub fn is_visible_to(&self, viewer: Option<&super::AuthUser>) -> bool {
        let open = match self.visibility {
            Visibility::Public => self.approval_status == ApprovalStatus::Approved,
            Visibility::Unlisted => true,
            Visibility::Private => false,
        };
        open || viewer.is_some_and(|u| u.can_manage(self.created_by))
    }
}

// ========================================
// Requests
// ========================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCardFeatureRequest {
    pub title: String,
    pub tech: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub card_type: Option<CardType>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    pub screens: Vec<Screen>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl CreateCardFeatureRequest {
    pub fn validate(&self) -> ApiResult<()> {
        let mut v = Validator::new();
        self.validate_into(&mut v, "");
        v.finish()
    }

    pub(crate) fn validate_into(&self, v: &mut Validator, prefix: &str) {
        v.length(&format!("{}title", prefix), &self.title, 1, MAX_TITLE_CHARS);
        v.length(&format!("{}tech", prefix), &self.tech, 1, MAX_TECH_CHARS);
        v.optional_length(&format!("{}language", prefix), self.language.as_deref(), 0, MAX_LANGUAGE_CHARS);
        v.optional_length(
            &format!("{}description", prefix),
            self.description.as_deref(),
            0,
            MAX_DESCRIPTION_CHARS,
        );
        validate_screens(v, prefix, &self.screens);
        if let Some(tags) = &self.tags {
            validate_tags(v, &format!("{}tags", prefix), tags);
        }
    }

    /// Build the card to store, applying defaults and normalization
    pub fn into_card(self, owner: Option<Uuid>, approval_status: ApprovalStatus) -> CardFeature {
        let now = Utc::now();
        let mut screens = self.screens;
        normalize_screens(&mut screens);
        CardFeature {
            id: Uuid::new_v4(),
            title: self.title.trim().to_string(),
            tech: self.tech.trim().to_string(),
            language: self.language.unwrap_or_default().trim().to_string(),
            description: self.description.unwrap_or_default().trim().to_string(),
            card_type: self.card_type.unwrap_or_default(),
            visibility: self.visibility.unwrap_or_default(),
            approval_status,
            screens,
            tags: normalize_tags(&self.tags.unwrap_or_default()),
            created_by: owner,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkCreateRequest {
    pub cards: Vec<CreateCardFeatureRequest>,
}

impl BulkCreateRequest {
    /// All-or-nothing: every card must pass before any is stored
    pub fn validate(&self) -> ApiResult<()> {
        let mut v = Validator::new();
        v.check(
            (1..=MAX_BULK_CARDS).contains(&self.cards.len()),
            "cards",
            format!("must contain between 1 and {} cards", MAX_BULK_CARDS),
        );
        for (i, card) in self.cards.iter().enumerate() {
            card.validate_into(&mut v, &format!("cards[{}].", i));
        }
        v.finish()
    }
}

#[derive(Debug, Serialize)]
pub struct BulkCreateResponse {
    pub created: usize,
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCardFeatureRequest {
    pub title: Option<String>,
    pub tech: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub card_type: Option<CardType>,
    pub visibility: Option<Visibility>,
    pub screens: Option<Vec<Screen>>,
    pub tags: Option<Vec<String>>,
}

impl UpdateCardFeatureRequest {
    pub fn validate(&self) -> ApiResult<()> {
        let mut v = Validator::new();
        v.optional_length("title", self.title.as_deref(), 1, MAX_TITLE_CHARS);
        v.optional_length("tech", self.tech.as_deref(), 1, MAX_TECH_CHARS);
        v.optional_length("language", self.language.as_deref(), 0, MAX_LANGUAGE_CHARS);
        v.optional_length("description", self.description.as_deref(), 0, MAX_DESCRIPTION_CHARS);
        if let Some(screens) = &self.screens {
            validate_screens(&mut v, "", screens);
        }
        if let Some(tags) = &self.tags {
            validate_tags(&mut v, "tags", tags);
        }
        v.finish()
    }

    /// Changes anything a moderator reviewed
    pub fn changes_content(&self) -> bool {
        self.title.is_some()
            || self.tech.is_some()
            || self.language.is_some()
            || self.description.is_some()
            || self.card_type.is_some()
            || self.screens.is_some()
            || self.tags.is_some()
    }

    /// Apply the update to `card`
    ///
    /// A non-admin edit that leaves the card public returns it to moderation
    /// when content changed or the card just became public.
    pub fn apply(self, card: &mut CardFeature, editor_is_admin: bool) {
        let was_public = card.visibility == Visibility::Public;
        let content_changed = self.changes_content();

        if let Some(title) = self.title {
            card.title = title.trim().to_string();
        }
        if let Some(tech) = self.tech {
            card.tech = tech.trim().to_string();
        }
        if let Some(language) = self.language {
            card.language = language.trim().to_string();
        }
        if let Some(description) = self.description {
            card.description = description.trim().to_string();
        }
        if let Some(card_type) = self.card_type {
            card.card_type = card_type;
        }
        if let Some(visibility) = self.visibility {
            card.visibility = visibility;
        }
        if let Some(mut screens) = self.screens {
            normalize_screens(&mut screens);
            card.screens = screens;
        }
        if let Some(tags) = self.tags {
            card.tags = normalize_tags(&tags);
        }

        let is_public = card.visibility == Visibility::Public;
        if !editor_is_admin && is_public && (content_changed || !was_public) {
            card.approval_status = ApprovalStatus::Pending;
        }
        card.updated_at = Utc::now();
    }
}

/// Listing filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardFeatureQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub tech: Option<String>,
    pub language: Option<String>,
    pub card_type: Option<CardType>,
    #[serde(default)]
    pub mine: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TechCount {
    pub tech: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardTypeCount {
    pub card_type: CardType,
    pub count: i64,
}

/// Aggregates over publicly listed cards
#[derive(Debug, Serialize)]
pub struct CardFeatureStats {
    pub total: i64,
    pub by_tech: Vec<TechCount>,
    pub by_card_type: Vec<CardTypeCount>,
}
