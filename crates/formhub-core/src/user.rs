//! User store.
//!
//! Emails are unique across the whole service, not per organization: a
//! person cannot hold accounts in two organizations with one address. The
//! email key is claimed atomically so two concurrent registrations cannot
//! both succeed. A user's organization is fixed at creation.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::document::{DocumentStore, key_segment};
use crate::error::UserError;
use crate::models::{Role, User};

const USER_PREFIX: &str = "users/";
const USER_EMAIL_PREFIX: &str = "user-emails/";
const ORG_USERS_PREFIX: &str = "org-users/";

/// Fields for a new user. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub organization_id: Uuid,
    pub role: Role,
    pub mobile_number: String,
    pub created_by: Option<Uuid>,
}

/// Creates, loads, and lists users.
#[derive(Debug)]
pub struct UserStore {
    docs: Arc<DocumentStore>,
}

impl UserStore {
    #[must_use]
    pub fn new(docs: Arc<DocumentStore>) -> Self {
        Self { docs }
    }

    /// Store a new user.
    ///
    /// # Errors
    ///
    /// - [`UserError::EmailTaken`] if any account already uses the email.
    /// - [`UserError::Document`] on storage failure.
    pub async fn create(&self, new: NewUser) -> Result<User, UserError> {
        let user = User {
            id: Uuid::new_v4(),
            name: new.name.trim().to_owned(),
            email: new.email.trim().to_owned(),
            password_hash: new.password_hash,
            organization_id: new.organization_id,
            role: new.role,
            mobile_number: new.mobile_number,
            created_by: new.created_by,
            created_at: Utc::now(),
        };

        if !self.docs.claim(&email_key(&user.email), user.id).await? {
            return Err(UserError::EmailTaken);
        }
        if let Err(e) = self.persist(&user).await {
            self.discard(&user).await;
            return Err(e);
        }

        info!(user_id = %user.id, org_id = %user.organization_id, role = %user.role, "user created");
        Ok(user)
    }

    async fn persist(&self, user: &User) -> Result<(), UserError> {
        self.docs.put(&user_key(user.id), user).await?;
        self.docs
            .index(&org_user_key(user.organization_id, user.id))
            .await?;
        Ok(())
    }

    /// Remove every key written for `user`, releasing the email. Failures
    /// are logged, not returned.
    pub(crate) async fn discard(&self, user: &User) {
        for key in [
            org_user_key(user.organization_id, user.id),
            user_key(user.id),
            email_key(&user.email),
        ] {
            if let Err(e) = self.docs.delete(&key).await {
                warn!(error = %e, key = %key, "failed to roll back user write");
            }
        }
    }

    /// Whether any account uses this email.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Document`] on storage failure.
    pub async fn email_taken(&self, email: &str) -> Result<bool, UserError> {
        Ok(self.docs.exists(&email_key(email)).await?)
    }

    /// Load a user by id.
    ///
    /// # Errors
    ///
    /// - [`UserError::NotFound`] if it does not exist.
    /// - [`UserError::Document`] on storage failure.
    pub async fn get(&self, user_id: Uuid) -> Result<User, UserError> {
        self.docs
            .get(&user_key(user_id))
            .await?
            .ok_or(UserError::NotFound)
    }

    /// Look a user up by email (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Document`] on storage failure.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        let Some(user_id) = self.docs.claimed_by(&email_key(email)).await? else {
            return Ok(None);
        };
        Ok(self.docs.get(&user_key(user_id)).await?)
    }

    /// All respondents of an organization, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Document`] on storage failure.
    pub async fn list_respondents(&self, org_id: Uuid) -> Result<Vec<User>, UserError> {
        let ids = self
            .docs
            .indexed_ids(&format!("{ORG_USERS_PREFIX}{org_id}/"))
            .await?;

        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = self.docs.get::<User>(&user_key(id)).await? {
                if user.role == Role::Respondent {
                    users.push(user);
                }
            }
        }
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }
}

fn user_key(user_id: Uuid) -> String {
    format!("{USER_PREFIX}{user_id}")
}

fn email_key(email: &str) -> String {
    format!("{USER_EMAIL_PREFIX}{}", key_segment(email))
}

fn org_user_key(org_id: Uuid, user_id: Uuid) -> String {
    format!("{ORG_USERS_PREFIX}{org_id}/{user_id}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use formhub_storage::StorageBackend;

    use super::*;
    use crate::testing::{BrokenWrites, docs, docs_on};

    fn new_user(email: &str, org: Uuid, role: Role) -> NewUser {
        NewUser {
            name: "Bob".to_owned(),
            email: email.to_owned(),
            password_hash: "hash".to_owned(),
            organization_id: org,
            role,
            mobile_number: String::new(),
            created_by: None,
        }
    }

    #[tokio::test]
    async fn create_and_find_by_email_ignoring_case() {
        let users = UserStore::new(docs());
        let org = Uuid::new_v4();
        let bob = users.create(new_user("bob@x.com", org, Role::Respondent)).await.unwrap();

        let found = users.find_by_email("BOB@x.com ").await.unwrap().unwrap();
        assert_eq!(found, bob);
        assert_eq!(users.get(bob.id).await.unwrap(), bob);
        assert!(users.find_by_email("alice@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn email_is_unique_across_organizations() {
        let users = UserStore::new(docs());
        users
            .create(new_user("bob@x.com", Uuid::new_v4(), Role::Admin))
            .await
            .unwrap();
        let err = users
            .create(new_user("bob@x.com", Uuid::new_v4(), Role::Respondent))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::EmailTaken));
    }

    #[tokio::test]
    async fn list_respondents_is_scoped_and_skips_admins() {
        let users = UserStore::new(docs());
        let acme = Uuid::new_v4();
        let globex = Uuid::new_v4();
        users.create(new_user("admin@acme.test", acme, Role::Admin)).await.unwrap();
        let bob = users.create(new_user("bob@acme.test", acme, Role::Respondent)).await.unwrap();
        users.create(new_user("eve@globex.test", globex, Role::Respondent)).await.unwrap();

        let listed = users.list_respondents(acme).await.unwrap();
        assert_eq!(listed, vec![bob]);
    }

    #[tokio::test]
    async fn failed_write_releases_the_email() {
        let backend = BrokenWrites::new(USER_PREFIX);
        let users = UserStore::new(docs_on(Arc::clone(&backend) as Arc<dyn StorageBackend>));
        let org = Uuid::new_v4();

        let err = users
            .create(new_user("bob@x.com", org, Role::Respondent))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::Document(_)));
        assert!(!users.email_taken("bob@x.com").await.unwrap());
        assert!(users.find_by_email("bob@x.com").await.unwrap().is_none());

        backend.repair();
        let bob = users
            .create(new_user("bob@x.com", org, Role::Respondent))
            .await
            .unwrap();
        assert_eq!(users.find_by_email("bob@x.com").await.unwrap(), Some(bob));
    }

    #[tokio::test]
    async fn failed_index_write_leaves_no_user() {
        let backend = BrokenWrites::new(ORG_USERS_PREFIX);
        let users = UserStore::new(docs_on(Arc::clone(&backend) as Arc<dyn StorageBackend>));
        let org = Uuid::new_v4();

        users
            .create(new_user("bob@x.com", org, Role::Respondent))
            .await
            .unwrap_err();
        assert!(!users.email_taken("bob@x.com").await.unwrap());
        assert!(backend.list(USER_PREFIX).await.unwrap().is_empty());
    }
}
