//! Domain models.
//!
//! Organizations, users, forms, and submissions. All ids are UUIDs and all
//! timestamps are UTC. Wire names are camelCase with `_id` for record ids,
//! which is what the browser client reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A submission's answers: field id → value.
pub type Answers = serde_json::Map<String, serde_json::Value>;

// ── Roles ────────────────────────────────────────────────────────────

/// What a user may do inside their organization.
///
/// On the wire an admin is `"admin"` and a respondent is the empty string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Designs forms, edits submissions, provisions respondents.
    #[serde(rename = "admin")]
    Admin,
    /// Fills forms and reads their own submissions.
    #[default]
    #[serde(rename = "")]
    Respondent,
}

impl Role {
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Respondent => write!(f, "respondent"),
        }
    }
}

// ── Organizations ────────────────────────────────────────────────────

/// An organization (tenant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    /// The signup admin. Backfilled right after the admin is created.
    pub owner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ── Users ────────────────────────────────────────────────────────────

/// A stored user account, including the password hash.
///
/// Never serialize this to a client; convert to [`UserInfo`] or
/// [`SessionUser`] first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub organization_id: Uuid,
    #[serde(rename = "privilege")]
    pub role: Role,
    #[serde(default)]
    pub mobile_number: String,
    /// The admin who provisioned this user; `None` for signup admins.
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Public user info (safe to serialize).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(rename = "privilege")]
    pub role: Role,
    pub organization_id: Uuid,
    pub mobile_number: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            organization_id: u.organization_id,
            mobile_number: u.mobile_number,
            created_by: u.created_by,
            created_at: u.created_at,
        }
    }
}

/// The user summary returned alongside a session token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(rename = "privilege")]
    pub role: Role,
    pub organization_id: Uuid,
}

impl From<&User> for SessionUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role,
            organization_id: u.organization_id,
        }
    }
}

/// Name and email of a submitter, embedded in submission listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
        }
    }
}

// ── Forms ────────────────────────────────────────────────────────────

/// One field definition in a form.
///
/// Builder-specific properties the server does not interpret (placement,
/// placeholder text, ...) are kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A form designed by an organization's admin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub created_by: Uuid,
    pub name: String,
    pub description: String,
    pub status: String,
    pub items: Vec<FormItem>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// Default status of a newly created form.
pub const DEFAULT_FORM_STATUS: &str = "Published";

/// Default name of a form saved without one.
pub const DEFAULT_FORM_NAME: &str = "Untitled Form";

// ── Submissions ──────────────────────────────────────────────────────

/// Snapshot of a submission's answers taken just before an edit replaced
/// them. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub edited_by: Uuid,
    pub edited_at: DateTime<Utc>,
    /// `Version N`, where N is the entry's 1-based position in history.
    pub version_label: String,
    pub previous_data: Answers,
}

/// A respondent's answers to a form, with its edit history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub form_id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub form_name: String,
    pub data: Answers,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Number of edits applied; always equal to `history.len()`.
    #[serde(default)]
    pub revision: u64,
}

/// A submission with its submitter's name and email filled in.
///
/// Serializes `userId` as an object, matching what the admin response view
/// expects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionWithUser {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub form_id: Uuid,
    #[serde(rename = "userId")]
    pub user: Option<UserSummary>,
    pub organization_id: Uuid,
    pub form_name: String,
    pub data: Answers,
    pub history: Vec<HistoryEntry>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: u64,
}

impl SubmissionWithUser {
    #[must_use]
    pub fn new(sub: Submission, user: Option<UserSummary>) -> Self {
        Self {
            id: sub.id,
            form_id: sub.form_id,
            user,
            organization_id: sub.organization_id,
            form_name: sub.form_name,
            data: sub.data,
            history: sub.history,
            submitted_at: sub.submitted_at,
            updated_at: sub.updated_at,
            revision: sub.revision,
        }
    }
}

/// One version in a submission's reconstructed timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub version_label: String,
    pub edited_at: DateTime<Utc>,
    /// Who replaced this version; `None` for the current version.
    pub edited_by: Option<Uuid>,
    pub data: Answers,
    pub is_current: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), r#""admin""#);
        assert_eq!(serde_json::to_string(&Role::Respondent).unwrap(), r#""""#);
        assert_eq!(serde_json::from_str::<Role>(r#""""#).unwrap(), Role::Respondent);
    }

    #[test]
    fn form_item_keeps_unknown_builder_properties() {
        let item: FormItem = serde_json::from_value(serde_json::json!({
            "id": "f1",
            "type": "select",
            "label": "Colour",
            "options": ["red", "blue"],
            "placeholder": "pick one"
        }))
        .unwrap();

        assert_eq!(item.kind, "select");
        assert_eq!(item.options.as_deref(), Some(&["red".to_owned(), "blue".to_owned()][..]));
        assert_eq!(item.extra["placeholder"], "pick one");

        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["placeholder"], "pick one");
        assert_eq!(back["type"], "select");
    }

    #[test]
    fn user_info_never_carries_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Bob".to_owned(),
            email: "bob@x.com".to_owned(),
            password_hash: "$argon2id$secret".to_owned(),
            organization_id: Uuid::new_v4(),
            role: Role::Respondent,
            mobile_number: String::new(),
            created_by: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&UserInfo::from(user)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains(r#""privilege":"""#));
    }
}
