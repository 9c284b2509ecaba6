//! Signup, login, and respondent provisioning.
//!
//! Ties the organization and user stores to password hashing and token
//! issuance. Signup is the only way to create an organization and its
//! admin; every later account is a respondent created by an admin.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{OrgError, UserError};
use crate::models::{Role, SessionUser, Submission, SubmissionWithUser, UserInfo, UserSummary};
use crate::org::OrgStore;
use crate::password::{hash_password, verify_password};
use crate::session::{Identity, TokenSigner};
use crate::user::{NewUser, UserStore};

/// Signup request: a new organization and its admin.
#[derive(Debug, Clone)]
pub struct Signup {
    pub name: String,
    pub email: String,
    pub password: String,
    pub organization_name: String,
}

/// An admin's request to add a respondent to their organization.
#[derive(Debug, Clone)]
pub struct NewRespondent {
    pub name: String,
    pub email: String,
    pub password: String,
    pub mobile_number: Option<String>,
}

/// Token plus user summary, returned by signup and login.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
}

#[derive(Debug)]
pub struct AccountService {
    orgs: Arc<OrgStore>,
    users: Arc<UserStore>,
    tokens: Arc<TokenSigner>,
}

impl AccountService {
    #[must_use]
    pub fn new(orgs: Arc<OrgStore>, users: Arc<UserStore>, tokens: Arc<TokenSigner>) -> Self {
        Self {
            orgs,
            users,
            tokens,
        }
    }

    /// Create an organization and its admin, and sign the admin in.
    ///
    /// # Errors
    ///
    /// - [`UserError::Invalid`] if a field is missing or the email is malformed.
    /// - [`UserError::EmailTaken`] if the email is in use.
    /// - [`UserError::Org`] with `NameTaken` if the organization name is in use.
    /// - [`UserError::Document`] / [`UserError::Auth`] on internal failure.
    pub async fn signup(&self, req: Signup) -> Result<Session, UserError> {
        require("name", &req.name)?;
        require("email", &req.email)?;
        require("password", &req.password)?;
        require("organizationName", &req.organization_name)?;
        check_email(&req.email)?;

        if self.users.email_taken(&req.email).await? {
            return Err(UserError::EmailTaken);
        }
        if self.orgs.name_taken(&req.organization_name).await? {
            return Err(OrgError::NameTaken.into());
        }

        let password_hash = hash_password(&req.password)?;
        let org = self.orgs.create(&req.organization_name).await?;

        let created = self
            .users
            .create(NewUser {
                name: req.name,
                email: req.email,
                password_hash,
                organization_id: org.id,
                role: Role::Admin,
                mobile_number: String::new(),
                created_by: None,
            })
            .await;

        let admin = match created {
            Ok(admin) => admin,
            Err(e) => {
                self.orgs.discard(&org).await;
                return Err(e);
            }
        };

        if let Err(e) = self.orgs.set_owner(org.id, admin.id).await {
            self.users.discard(&admin).await;
            self.orgs.discard(&org).await;
            return Err(e.into());
        }
        info!(org_id = %org.id, user_id = %admin.id, "signup completed");

        Ok(Session {
            token: self.tokens.issue(&admin)?,
            user: SessionUser::from(&admin),
        })
    }

    /// Check credentials and issue a token.
    ///
    /// # Errors
    ///
    /// - [`UserError::InvalidCredentials`] for an unknown email or a wrong
    ///   password.
    /// - [`UserError::Document`] / [`UserError::Auth`] on internal failure.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, UserError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            warn!("login failed: unknown email");
            return Err(UserError::InvalidCredentials);
        };
        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login failed: wrong password");
            return Err(UserError::InvalidCredentials);
        }

        info!(user_id = %user.id, "login succeeded");
        Ok(Session {
            token: self.tokens.issue(&user)?,
            user: SessionUser::from(&user),
        })
    }

    /// Create a respondent in the admin's organization.
    ///
    /// # Errors
    ///
    /// - [`UserError::Forbidden`] if the caller is not an admin.
    /// - [`UserError::Invalid`] if a field is missing or the email is malformed.
    /// - [`UserError::EmailTaken`] if the email is in use anywhere.
    pub async fn provision_respondent(
        &self,
        admin: &Identity,
        req: NewRespondent,
    ) -> Result<UserInfo, UserError> {
        require_admin(admin)?;
        require("name", &req.name)?;
        require("email", &req.email)?;
        require("password", &req.password)?;
        check_email(&req.email)?;

        if self.users.email_taken(&req.email).await? {
            return Err(UserError::EmailTaken);
        }

        let user = self
            .users
            .create(NewUser {
                name: req.name,
                email: req.email,
                password_hash: hash_password(&req.password)?,
                organization_id: admin.organization_id,
                role: Role::Respondent,
                mobile_number: req.mobile_number.unwrap_or_default(),
                created_by: Some(admin.user_id),
            })
            .await?;

        info!(user_id = %user.id, created_by = %admin.user_id, "respondent provisioned");
        Ok(UserInfo::from(user))
    }

    /// Respondents of the admin's organization.
    ///
    /// # Errors
    ///
    /// - [`UserError::Forbidden`] if the caller is not an admin.
    /// - [`UserError::Document`] on storage failure.
    pub async fn list_respondents(&self, admin: &Identity) -> Result<Vec<UserInfo>, UserError> {
        require_admin(admin)?;
        Ok(self
            .users
            .list_respondents(admin.organization_id)
            .await?
            .into_iter()
            .map(UserInfo::from)
            .collect())
    }

    /// Attach each submitter's name and email to a list of submissions.
    ///
    /// Submitters that no longer resolve are left as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Document`] on storage failure.
    pub async fn with_submitters(
        &self,
        submissions: Vec<Submission>,
    ) -> Result<Vec<SubmissionWithUser>, UserError> {
        let mut cache: HashMap<Uuid, Option<UserSummary>> = HashMap::new();
        let mut out = Vec::with_capacity(submissions.len());

        for sub in submissions {
            let summary = match cache.get(&sub.user_id) {
                Some(hit) => hit.clone(),
                None => {
                    let found = match self.users.get(sub.user_id).await {
                        Ok(user) => Some(UserSummary::from(&user)),
                        Err(UserError::NotFound) => None,
                        Err(e) => return Err(e),
                    };
                    cache.insert(sub.user_id, found.clone());
                    found
                }
            };
            out.push(SubmissionWithUser::new(sub, summary));
        }
        Ok(out)
    }
}

fn require(field: &str, value: &str) -> Result<(), UserError> {
    if value.trim().is_empty() {
        return Err(UserError::Invalid {
            reason: format!("{field} is required"),
        });
    }
    Ok(())
}

fn check_email(email: &str) -> Result<(), UserError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(UserError::Invalid {
            reason: "email is not valid".to_owned(),
        }),
    }
}

fn require_admin(who: &Identity) -> Result<(), UserError> {
    if who.is_admin() {
        Ok(())
    } else {
        Err(UserError::Forbidden {
            reason: "Not authorized".to_owned(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use formhub_storage::StorageBackend;

    use super::*;
    use crate::testing::{BrokenWrites, docs, docs_on};

    fn service() -> (AccountService, Arc<OrgStore>, Arc<TokenSigner>) {
        service_on(docs())
    }

    fn service_on(
        docs: Arc<crate::document::DocumentStore>,
    ) -> (AccountService, Arc<OrgStore>, Arc<TokenSigner>) {
        let orgs = Arc::new(OrgStore::new(Arc::clone(&docs)));
        let users = Arc::new(UserStore::new(docs));
        let tokens = Arc::new(TokenSigner::new(b"test-secret", 3600));
        (
            AccountService::new(Arc::clone(&orgs), users, Arc::clone(&tokens)),
            orgs,
            tokens,
        )
    }

    fn signup(email: &str, org: &str) -> Signup {
        Signup {
            name: "Ada".to_owned(),
            email: email.to_owned(),
            password: "hunter22".to_owned(),
            organization_name: org.to_owned(),
        }
    }

    fn respondent(email: &str) -> NewRespondent {
        NewRespondent {
            name: "Bob".to_owned(),
            email: email.to_owned(),
            password: "pw-bob".to_owned(),
            mobile_number: Some("555-0100".to_owned()),
        }
    }

    #[tokio::test]
    async fn signup_creates_owned_org_and_admin_session() {
        let (accounts, orgs, tokens) = service();
        let session = accounts.signup(signup("ada@acme.test", "Acme")).await.unwrap();

        assert_eq!(session.user.role, Role::Admin);
        let identity = tokens.verify(&session.token).unwrap();
        assert_eq!(identity.user_id, session.user.id);
        assert_eq!(identity.organization_id, session.user.organization_id);

        let org = orgs.get(session.user.organization_id).await.unwrap();
        assert_eq!(org.name, "Acme");
        assert_eq!(org.owner_id, Some(session.user.id));
    }

    #[tokio::test]
    async fn signup_rejects_duplicates_and_missing_fields() {
        let (accounts, _, _) = service();
        accounts.signup(signup("ada@acme.test", "Acme")).await.unwrap();

        assert!(matches!(
            accounts.signup(signup("ADA@acme.test", "Other")).await,
            Err(UserError::EmailTaken)
        ));
        assert!(matches!(
            accounts.signup(signup("zed@acme.test", "acme")).await,
            Err(UserError::Org(OrgError::NameTaken))
        ));
        assert!(matches!(
            accounts.signup(signup("", "Globex")).await,
            Err(UserError::Invalid { .. })
        ));
        assert!(matches!(
            accounts.signup(signup("not-an-email", "Globex")).await,
            Err(UserError::Invalid { .. })
        ));
    }

    #[tokio::test]
    async fn login_checks_credentials() {
        let (accounts, _, _) = service();
        let created = accounts.signup(signup("ada@acme.test", "Acme")).await.unwrap();

        let session = accounts.login("ada@acme.test", "hunter22").await.unwrap();
        assert_eq!(session.user.id, created.user.id);

        assert!(matches!(
            accounts.login("ada@acme.test", "wrong").await,
            Err(UserError::InvalidCredentials)
        ));
        assert!(matches!(
            accounts.login("nobody@acme.test", "hunter22").await,
            Err(UserError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn provisioned_respondent_can_log_in() {
        let (accounts, _, tokens) = service();
        let admin_session = accounts.signup(signup("ada@acme.test", "Acme")).await.unwrap();
        let admin = tokens.verify(&admin_session.token).unwrap();

        let bob = accounts
            .provision_respondent(&admin, respondent("bob@x.com"))
            .await
            .unwrap();
        assert_eq!(bob.role, Role::Respondent);
        assert_eq!(bob.organization_id, admin.organization_id);
        assert_eq!(bob.created_by, Some(admin.user_id));
        assert_eq!(bob.mobile_number, "555-0100");

        let session = accounts.login("bob@x.com", "pw-bob").await.unwrap();
        assert_eq!(session.user.role, Role::Respondent);

        let listed = accounts.list_respondents(&admin).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, bob.id);
    }

    #[tokio::test]
    async fn respondents_cannot_provision_or_list() {
        let (accounts, _, tokens) = service();
        let admin_session = accounts.signup(signup("ada@acme.test", "Acme")).await.unwrap();
        let admin = tokens.verify(&admin_session.token).unwrap();
        accounts
            .provision_respondent(&admin, respondent("bob@x.com"))
            .await
            .unwrap();
        let bob = tokens
            .verify(&accounts.login("bob@x.com", "pw-bob").await.unwrap().token)
            .unwrap();

        assert!(matches!(
            accounts.provision_respondent(&bob, respondent("eve@x.com")).await,
            Err(UserError::Forbidden { .. })
        ));
        assert!(matches!(
            accounts.list_respondents(&bob).await,
            Err(UserError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn provisioning_an_existing_email_fails() {
        let (accounts, _, tokens) = service();
        let acme = tokens
            .verify(&accounts.signup(signup("ada@acme.test", "Acme")).await.unwrap().token)
            .unwrap();

        assert!(matches!(
            accounts
                .provision_respondent(&acme, respondent("ada@acme.test"))
                .await,
            Err(UserError::EmailTaken)
        ));
    }

    #[tokio::test]
    async fn failed_admin_write_rolls_back_signup() {
        let backend = BrokenWrites::new("users/");
        let (accounts, _, _) = service_on(docs_on(Arc::clone(&backend) as Arc<dyn StorageBackend>));

        assert!(matches!(
            accounts.signup(signup("ada@acme.test", "Acme")).await,
            Err(UserError::Document(_))
        ));
        assert!(backend.list("orgs/").await.unwrap().is_empty());

        backend.repair();
        let session = accounts.signup(signup("ada@acme.test", "Acme")).await.unwrap();
        assert_eq!(
            accounts.login("ada@acme.test", "hunter22").await.unwrap().user.id,
            session.user.id
        );
    }
}
