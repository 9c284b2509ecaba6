//! Submission store and versioning.
//!
//! A submission is created with an empty history. Every admin edit moves
//! the current answers into a new history entry (`Version N`, N = position)
//! and replaces them with the new answers, in one document write. History
//! only ever grows.
//!
//! # Concurrent edits
//!
//! An edit loads the document, applies the change in memory, then writes it
//! back with a compare-and-swap against the exact bytes it loaded. If another
//! edit landed in between, the write is refused with
//! [`SubmissionError::ConcurrentEdit`] rather than silently dropping the
//! other editor's version from history. Clients can also pass the
//! `revision` they were looking at; a stale revision is refused before any
//! write.
//!
//! # Visibility
//!
//! - respondents see only their own submissions;
//! - admins see every submission of their own organization;
//! - only admins edit, and only within their organization.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::document::DocumentStore;
use crate::error::SubmissionError;
use crate::models::{Answers, Form, HistoryEntry, Submission, TimelineEntry};
use crate::session::Identity;

const SUBMISSION_PREFIX: &str = "submissions/";
const FORM_SUBMISSIONS_PREFIX: &str = "form-submissions/";
const USER_SUBMISSIONS_PREFIX: &str = "user-submissions/";

/// Label of the synthetic newest entry in a timeline.
pub const CURRENT_VERSION_LABEL: &str = "Current Version";

impl Submission {
    /// Label for the history entry at 1-based position `n`.
    #[must_use]
    pub fn version_label(n: usize) -> String {
        format!("Version {n}")
    }

    /// Archive the current answers and replace them with `data`.
    pub fn record_edit(&mut self, editor: Uuid, data: Answers, at: DateTime<Utc>) {
        let previous = std::mem::replace(&mut self.data, data);
        self.history.push(HistoryEntry {
            edited_by: editor,
            edited_at: at,
            version_label: Self::version_label(self.history.len().saturating_add(1)),
            previous_data: previous,
        });
        self.updated_at = at;
        self.revision = self.revision.saturating_add(1);
    }

    /// Every version of this submission, newest first.
    ///
    /// The first entry is the current answers, stamped with the time of the
    /// last write. The rest are the history entries in reverse, each
    /// stamped with the moment it was replaced and by whom.
    #[must_use]
    pub fn timeline(&self) -> Vec<TimelineEntry> {
        let current = TimelineEntry {
            version_label: CURRENT_VERSION_LABEL.to_owned(),
            edited_at: self.updated_at,
            edited_by: None,
            data: self.data.clone(),
            is_current: true,
        };

        std::iter::once(current)
            .chain(self.history.iter().rev().map(|entry| TimelineEntry {
                version_label: entry.version_label.clone(),
                edited_at: entry.edited_at,
                edited_by: Some(entry.edited_by),
                data: entry.previous_data.clone(),
                is_current: false,
            }))
            .collect()
    }

    fn visible_to(&self, who: &Identity) -> bool {
        if who.is_admin() {
            self.organization_id == who.organization_id
        } else {
            self.user_id == who.user_id
        }
    }
}

/// Creates, reads, edits, and purges submissions.
#[derive(Debug)]
pub struct SubmissionStore {
    docs: Arc<DocumentStore>,
}

impl SubmissionStore {
    #[must_use]
    pub fn new(docs: Arc<DocumentStore>) -> Self {
        Self { docs }
    }

    /// Store a new submission by `who` for `form`.
    ///
    /// `form_name` defaults to the form's current name.
    ///
    /// # Errors
    ///
    /// - [`SubmissionError::Forbidden`] if the form belongs to another organization.
    /// - [`SubmissionError::Document`] on storage failure.
    pub async fn create(
        &self,
        who: &Identity,
        form: &Form,
        form_name: Option<String>,
        data: Answers,
    ) -> Result<Submission, SubmissionError> {
        if form.organization_id != who.organization_id {
            return Err(SubmissionError::Forbidden {
                reason: "Access Denied: Wrong Organization".to_owned(),
            });
        }

        let now = Utc::now();
        let submission = Submission {
            id: Uuid::new_v4(),
            form_id: form.id,
            user_id: who.user_id,
            organization_id: who.organization_id,
            form_name: form_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| form.name.clone()),
            data,
            history: Vec::new(),
            submitted_at: now,
            updated_at: now,
            revision: 0,
        };

        self.docs
            .put(&submission_key(submission.id), &submission)
            .await?;
        self.docs
            .index(&form_index_key(submission.form_id, submission.id))
            .await?;
        self.docs
            .index(&user_index_key(submission.user_id, submission.id))
            .await?;

        info!(submission_id = %submission.id, form_id = %form.id, user_id = %who.user_id, "submission created");
        Ok(submission)
    }

    /// Load a submission without any access check.
    ///
    /// # Errors
    ///
    /// - [`SubmissionError::NotFound`] if it does not exist.
    /// - [`SubmissionError::Document`] on storage failure.
    pub async fn get(&self, id: Uuid) -> Result<Submission, SubmissionError> {
        self.docs
            .get(&submission_key(id))
            .await?
            .ok_or(SubmissionError::NotFound)
    }

    /// Load a submission the caller is allowed to see.
    ///
    /// # Errors
    ///
    /// - [`SubmissionError::NotFound`] if it does not exist.
    /// - [`SubmissionError::Forbidden`] if it is not the caller's and the
    ///   caller is not an admin of its organization.
    pub async fn get_visible(&self, who: &Identity, id: Uuid) -> Result<Submission, SubmissionError> {
        let submission = self.get(id).await?;
        if !submission.visible_to(who) {
            return Err(access_denied());
        }
        Ok(submission)
    }

    /// The caller's timeline view of a submission, newest first.
    ///
    /// # Errors
    ///
    /// Same as [`get_visible`](Self::get_visible).
    pub async fn timeline(&self, who: &Identity, id: Uuid) -> Result<Vec<TimelineEntry>, SubmissionError> {
        Ok(self.get_visible(who, id).await?.timeline())
    }

    /// The caller's own submissions, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::Document`] on storage failure.
    pub async fn list_own(&self, who: &Identity) -> Result<Vec<Submission>, SubmissionError> {
        self.load_indexed(&format!("{USER_SUBMISSIONS_PREFIX}{}/", who.user_id))
            .await
    }

    /// A given user's submissions within the caller's organization (admin only).
    ///
    /// # Errors
    ///
    /// - [`SubmissionError::Forbidden`] if the caller is not an admin.
    /// - [`SubmissionError::Document`] on storage failure.
    pub async fn list_for_user(
        &self,
        who: &Identity,
        user_id: Uuid,
    ) -> Result<Vec<Submission>, SubmissionError> {
        if !who.is_admin() {
            return Err(SubmissionError::Forbidden {
                reason: "Not authorized".to_owned(),
            });
        }
        let mut submissions = self
            .load_indexed(&format!("{USER_SUBMISSIONS_PREFIX}{user_id}/"))
            .await?;
        submissions.retain(|s| s.organization_id == who.organization_id);
        Ok(submissions)
    }

    /// A form's submissions: all of them for an admin of the form's
    /// organization, only the caller's own for a respondent.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::Document`] on storage failure.
    pub async fn list_for_form(
        &self,
        who: &Identity,
        form_id: Uuid,
    ) -> Result<Vec<Submission>, SubmissionError> {
        let mut submissions = self
            .load_indexed(&format!("{FORM_SUBMISSIONS_PREFIX}{form_id}/"))
            .await?;
        submissions.retain(|s| s.organization_id == who.organization_id && s.visible_to(who));
        Ok(submissions)
    }

    /// Distinct ids of the forms a user has submitted to, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::Document`] on storage failure.
    pub async fn form_ids_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, SubmissionError> {
        let submissions = self
            .load_indexed(&format!("{USER_SUBMISSIONS_PREFIX}{user_id}/"))
            .await?;
        let mut seen = HashSet::new();
        Ok(submissions
            .into_iter()
            .map(|s| s.form_id)
            .filter(|id| seen.insert(*id))
            .collect())
    }

    /// Apply an admin edit, archiving the current answers into history.
    ///
    /// Nothing is written unless every check passes.
    ///
    /// # Errors
    ///
    /// - [`SubmissionError::Forbidden`] if the caller is not an admin, or is
    ///   an admin of another organization.
    /// - [`SubmissionError::NotFound`] if the submission does not exist.
    /// - [`SubmissionError::RevisionMismatch`] if `expected_revision` is stale.
    /// - [`SubmissionError::ConcurrentEdit`] if another edit landed first.
    /// - [`SubmissionError::Document`] on storage failure.
    pub async fn edit(
        &self,
        who: &Identity,
        id: Uuid,
        data: Answers,
        expected_revision: Option<u64>,
    ) -> Result<Submission, SubmissionError> {
        if !who.is_admin() {
            return Err(access_denied());
        }

        let key = submission_key(id);
        let loaded = self
            .docs
            .get_versioned::<Submission>(&key)
            .await?
            .ok_or(SubmissionError::NotFound)?;
        let mut submission = loaded.doc;

        if submission.organization_id != who.organization_id {
            return Err(access_denied());
        }
        if let Some(expected) = expected_revision {
            if expected != submission.revision {
                return Err(SubmissionError::RevisionMismatch {
                    expected,
                    actual: submission.revision,
                });
            }
        }

        submission.record_edit(who.user_id, data, Utc::now());

        if !self.docs.replace(&key, &loaded.raw, &submission).await? {
            return Err(SubmissionError::ConcurrentEdit);
        }

        info!(
            submission_id = %id,
            editor = %who.user_id,
            revision = submission.revision,
            "submission updated with history"
        );
        Ok(submission)
    }

    /// Delete every submission of a form. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::Document`] on storage failure.
    pub async fn purge_form(&self, form_id: Uuid) -> Result<usize, SubmissionError> {
        let ids = self
            .docs
            .indexed_ids(&format!("{FORM_SUBMISSIONS_PREFIX}{form_id}/"))
            .await?;

        let mut removed = 0usize;
        for id in ids {
            if let Some(submission) = self.docs.get::<Submission>(&submission_key(id)).await? {
                self.docs
                    .delete(&user_index_key(submission.user_id, id))
                    .await?;
                self.docs.delete(&submission_key(id)).await?;
                removed = removed.saturating_add(1);
            }
            self.docs.delete(&form_index_key(form_id, id)).await?;
        }
        Ok(removed)
    }

    /// Load the submissions behind an index prefix, newest first.
    async fn load_indexed(&self, prefix: &str) -> Result<Vec<Submission>, SubmissionError> {
        let ids = self.docs.indexed_ids(prefix).await?;
        let mut submissions = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(submission) = self.docs.get::<Submission>(&submission_key(id)).await? {
                submissions.push(submission);
            }
        }
        submissions.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(submissions)
    }
}

fn access_denied() -> SubmissionError {
    SubmissionError::Forbidden {
        reason: "Access Denied".to_owned(),
    }
}

fn submission_key(id: Uuid) -> String {
    format!("{SUBMISSION_PREFIX}{id}")
}

fn form_index_key(form_id: Uuid, id: Uuid) -> String {
    format!("{FORM_SUBMISSIONS_PREFIX}{form_id}/{id}")
}

fn user_index_key(user_id: Uuid, id: Uuid) -> String {
    format!("{USER_SUBMISSIONS_PREFIX}{user_id}/{id}")
}
