//! Administration models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tenx_common::auth::Role;

use super::ApprovalStatus;

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

/// Moderation decision; `pending` is not a decision and is rejected
#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub status: ApprovalStatus,
}

/// Row counts across the system
#[derive(Debug, Default, Serialize)]
pub struct AdminStats {
    pub users: i64,
    pub admins: i64,
    pub card_features: i64,
    /// Keyed by approval status
    pub card_features_by_status: BTreeMap<String, i64>,
    pub videos: i64,
    pub projects: i64,
    pub templates: i64,
    /// Keyed by import job status
    pub import_jobs_by_status: BTreeMap<String, i64>,
}
