//! Organization store.
//!
//! Organizations are created once, at signup, and never renamed. The only
//! later write is the owner backfill once the signup admin exists. Names
//! are unique across the whole service (case-insensitive).

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::document::{DocumentStore, key_segment};
use crate::error::OrgError;
use crate::models::Organization;

const ORG_PREFIX: &str = "orgs/";
const ORG_NAME_PREFIX: &str = "org-names/";

/// Creates and loads organizations.
#[derive(Debug)]
pub struct OrgStore {
    docs: Arc<DocumentStore>,
}

impl OrgStore {
    #[must_use]
    pub fn new(docs: Arc<DocumentStore>) -> Self {
        Self { docs }
    }

    /// Create an organization with no owner yet.
    ///
    /// # Errors
    ///
    /// - [`OrgError::Invalid`] if the name is blank.
    /// - [`OrgError::NameTaken`] if another organization has this name.
    /// - [`OrgError::Document`] on storage failure.
    pub async fn create(&self, name: &str) -> Result<Organization, OrgError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OrgError::Invalid {
                reason: "organizationName is required".to_owned(),
            });
        }

        let org = Organization {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            owner_id: None,
            created_at: Utc::now(),
        };

        if !self.docs.claim(&name_key(name), org.id).await? {
            return Err(OrgError::NameTaken);
        }
        if let Err(e) = self.docs.put(&org_key(org.id), &org).await {
            self.discard(&org).await;
            return Err(e.into());
        }

        info!(org_id = %org.id, "organization created");
        Ok(org)
    }

    /// Whether an organization with this name exists.
    ///
    /// # Errors
    ///
    /// Returns [`OrgError::Document`] on storage failure.
    pub async fn name_taken(&self, name: &str) -> Result<bool, OrgError> {
        Ok(self.docs.exists(&name_key(name)).await?)
    }

    /// Load an organization by id.
    ///
    /// # Errors
    ///
    /// - [`OrgError::NotFound`] if it does not exist.
    /// - [`OrgError::Document`] on storage failure.
    pub async fn get(&self, org_id: Uuid) -> Result<Organization, OrgError> {
        self.docs
            .get(&org_key(org_id))
            .await?
            .ok_or(OrgError::NotFound)
    }

    /// Record the signup admin as the organization's owner.
    ///
    /// # Errors
    ///
    /// - [`OrgError::NotFound`] if the organization does not exist.
    /// - [`OrgError::Document`] on storage failure.
    pub async fn set_owner(&self, org_id: Uuid, owner_id: Uuid) -> Result<Organization, OrgError> {
        let mut org = self.get(org_id).await?;
        org.owner_id = Some(owner_id);
        self.docs.put(&org_key(org_id), &org).await?;
        Ok(org)
    }

    /// Remove an organization and release its name. Failures are logged,
    /// not returned.
    pub(crate) async fn discard(&self, org: &Organization) {
        for key in [org_key(org.id), name_key(&org.name)] {
            if let Err(e) = self.docs.delete(&key).await {
                warn!(error = %e, key = %key, "failed to roll back organization write");
            }
        }
    }
}

fn org_key(org_id: Uuid) -> String {
    format!("{ORG_PREFIX}{org_id}")
}

fn name_key(name: &str) -> String {
    format!("{ORG_NAME_PREFIX}{}", key_segment(name))
}
