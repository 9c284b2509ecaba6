//! Form store.
//!
//! Forms belong to exactly one organization. Only admins create, update,
//! or delete them. Respondents never list an organization's forms directly;
//! they see the forms they have already submitted to, and open any other
//! form of their organization by id.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::document::DocumentStore;
use crate::error::FormError;
use crate::models::{DEFAULT_FORM_NAME, DEFAULT_FORM_STATUS, Form, FormItem};
use crate::session::Identity;
use crate::submission::SubmissionStore;

const FORM_PREFIX: &str = "forms/";
const ORG_FORMS_PREFIX: &str = "org-forms/";

/// A create-or-update request for a form.
#[derive(Debug, Clone, Default)]
pub struct FormDraft {
    /// Set to update an existing form; `None` creates a new one.
    pub id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub items: Vec<FormItem>,
}

/// Result of [`FormStore::save`].
#[derive(Debug, Clone, PartialEq)]
pub enum Saved {
    Created(Form),
    Updated(Form),
}

impl Saved {
    #[must_use]
    pub fn into_form(self) -> Form {
        match self {
            Self::Created(form) | Self::Updated(form) => form,
        }
    }
}

#[derive(Debug)]
pub struct FormStore {
    docs: Arc<DocumentStore>,
}

impl FormStore {
    #[must_use]
    pub fn new(docs: Arc<DocumentStore>) -> Self {
        Self { docs }
    }

    /// Forms the caller should see in their dashboard.
    ///
    /// Admins get every form of their organization, most recently updated
    /// first. Respondents get each form they have submitted to, once.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Document`] or [`FormError::Submission`] on
    /// storage failure.
    pub async fn list_visible(
        &self,
        who: &Identity,
        submissions: &SubmissionStore,
    ) -> Result<Vec<Form>, FormError> {
        if who.is_admin() {
            let ids = self
                .docs
                .indexed_ids(&format!("{ORG_FORMS_PREFIX}{}/", who.organization_id))
                .await?;
            let mut forms = self.load_all(ids).await?;
            forms.retain(|f| f.organization_id == who.organization_id);
            forms.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
            return Ok(forms);
        }

        let ids = submissions.form_ids_for_user(who.user_id).await?;
        // A form deleted after submission simply drops out.
        self.load_all(ids).await
    }

    /// Load a form the caller's organization owns.
    ///
    /// # Errors
    ///
    /// - [`FormError::NotFound`] if the form does not exist.
    /// - [`FormError::WrongOrganization`] if it belongs to another organization.
    pub async fn get_scoped(&self, who: &Identity, id: Uuid) -> Result<Form, FormError> {
        let form: Form = self
            .docs
            .get(&form_key(id))
            .await?
            .ok_or_else(FormError::not_found)?;
        if form.organization_id != who.organization_id {
            return Err(FormError::WrongOrganization);
        }
        Ok(form)
    }

    /// Create a form, or update one in the caller's organization.
    ///
    /// An update replaces name, description, and items, and refreshes
    /// `last_updated`; creation time, creator, and status are kept.
    ///
    /// # Errors
    ///
    /// - [`FormError::Forbidden`] if the caller is not an admin.
    /// - [`FormError::Invalid`] if an item id is empty or repeated.
    /// - [`FormError::NotFound`] if updating a form that does not exist or
    ///   belongs to another organization.
    pub async fn save(&self, who: &Identity, draft: FormDraft) -> Result<Saved, FormError> {
        if !who.is_admin() {
            return Err(FormError::Forbidden {
                reason: "Only admins can manage forms".to_owned(),
            });
        }
        validate_items(&draft.items)?;

        let now = Utc::now();

        if let Some(id) = draft.id {
            let mut form = self.owned_by(who, id).await?;

            if let Some(name) = draft.name {
                form.name = name;
            }
            if let Some(description) = draft.description {
                form.description = description;
            }
            form.items = draft.items;
            form.last_updated = now;

            self.docs.put(&form_key(id), &form).await?;
            info!(form_id = %id, org_id = %who.organization_id, "form updated");
            return Ok(Saved::Updated(form));
        }

        let form = Form {
            id: Uuid::new_v4(),
            organization_id: who.organization_id,
            created_by: who.user_id,
            name: draft
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FORM_NAME.to_owned()),
            description: draft.description.unwrap_or_default(),
            status: DEFAULT_FORM_STATUS.to_owned(),
            items: draft.items,
            created_at: now,
            last_updated: now,
        };

        self.docs.put(&form_key(form.id), &form).await?;
        self.docs
            .index(&org_form_key(form.organization_id, form.id))
            .await?;

        info!(form_id = %form.id, org_id = %form.organization_id, "form created");
        Ok(Saved::Created(form))
    }

    /// Delete a form together with all of its submissions.
    ///
    /// # Errors
    ///
    /// - [`FormError::Forbidden`] if the caller is not an admin.
    /// - [`FormError::NotFound`] if the form does not exist or belongs to
    ///   another organization.
    pub async fn delete(
        &self,
        who: &Identity,
        id: Uuid,
        submissions: &SubmissionStore,
    ) -> Result<(), FormError> {
        if !who.is_admin() {
            return Err(FormError::Forbidden {
                reason: "Only admins can manage forms".to_owned(),
            });
        }
        let form = self.owned_by(who, id).await?;

        let removed = submissions.purge_form(form.id).await?;
        self.docs
            .delete(&org_form_key(form.organization_id, form.id))
            .await?;
        self.docs.delete(&form_key(form.id)).await?;

        info!(form_id = %id, submissions_removed = removed, "form deleted");
        Ok(())
    }

    /// Lookup for writes: a foreign form reads as missing.
    async fn owned_by(&self, who: &Identity, id: Uuid) -> Result<Form, FormError> {
        self.docs
            .get::<Form>(&form_key(id))
            .await?
            .filter(|f| f.organization_id == who.organization_id)
            .ok_or_else(FormError::not_found_or_unauthorized)
    }

    async fn load_all(&self, ids: Vec<Uuid>) -> Result<Vec<Form>, FormError> {
        let mut forms = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(form) = self.docs.get::<Form>(&form_key(id)).await? {
                forms.push(form);
            }
        }
        Ok(forms)
    }
}

fn validate_items(items: &[FormItem]) -> Result<(), FormError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if item.id.trim().is_empty() {
            return Err(FormError::Invalid {
                reason: "every form item needs an id".to_owned(),
            });
        }
        if !seen.insert(item.id.as_str()) {
            return Err(FormError::Invalid {
                reason: format!("duplicate form item id '{}'", item.id),
            });
        }
    }
    Ok(())
}

fn form_key(id: Uuid) -> String {
    format!("{FORM_PREFIX}{id}")
}

fn org_form_key(org_id: Uuid, id: Uuid) -> String {
    format!("{ORG_FORMS_PREFIX}{org_id}/{id}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::Role;
    use crate::testing::{answers, docs, identity};

    fn item(id: &str) -> FormItem {
        FormItem {
            id: id.to_owned(),
            kind: "text".to_owned(),
            label: id.to_uppercase(),
            options: None,
            extra: serde_json::Map::new(),
        }
    }

    fn stores() -> (FormStore, SubmissionStore) {
        let docs = docs();
        (FormStore::new(Arc::clone(&docs)), SubmissionStore::new(docs))
    }

    async fn create(forms: &FormStore, admin: &Identity, name: &str) -> Form {
        forms
            .save(
                admin,
                FormDraft {
                    name: Some(name.to_owned()),
                    items: vec![item("f1")],
                    ..FormDraft::default()
                },
            )
            .await
            .unwrap()
            .into_form()
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let (forms, _) = stores();
        let admin = identity(Uuid::new_v4(), Role::Admin);

        let saved = forms.save(&admin, FormDraft::default()).await.unwrap();
        let Saved::Created(form) = saved else {
            panic!("expected a new form");
        };
        assert_eq!(form.name, "Untitled Form");
        assert_eq!(form.status, "Published");
        assert_eq!(form.description, "");
        assert_eq!(form.organization_id, admin.organization_id);
        assert_eq!(form.created_by, admin.user_id);
    }

    #[tokio::test]
    async fn update_keeps_identity_and_bumps_last_updated() {
        let (forms, _) = stores();
        let admin = identity(Uuid::new_v4(), Role::Admin);
        let original = create(&forms, &admin, "Survey").await;

        let saved = forms
            .save(
                &admin,
                FormDraft {
                    id: Some(original.id),
                    name: Some("Survey v2".to_owned()),
                    description: None,
                    items: vec![item("f1"), item("f2")],
                },
            )
            .await
            .unwrap();
        let Saved::Updated(updated) = saved else {
            panic!("expected an update");
        };

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.name, "Survey v2");
        assert_eq!(updated.items.len(), 2);
        assert!(updated.last_updated >= original.last_updated);
    }

    #[tokio::test]
    async fn respondents_cannot_save_or_delete() {
        let (forms, subs) = stores();
        let org = Uuid::new_v4();
        let form = create(&forms, &identity(org, Role::Admin), "Survey").await;
        let bob = identity(org, Role::Respondent);

        assert!(matches!(
            forms.save(&bob, FormDraft::default()).await,
            Err(FormError::Forbidden { .. })
        ));
        assert!(matches!(
            forms.delete(&bob, form.id, &subs).await,
            Err(FormError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn update_of_foreign_form_is_not_found() {
        let (forms, _) = stores();
        let form = create(&forms, &identity(Uuid::new_v4(), Role::Admin), "Survey").await;
        let outsider = identity(Uuid::new_v4(), Role::Admin);

        let err = forms
            .save(
                &outsider,
                FormDraft {
                    id: Some(form.id),
                    ..FormDraft::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Form not found or unauthorized");
    }

    #[tokio::test]
    async fn get_scoped_distinguishes_missing_and_foreign() {
        let (forms, _) = stores();
        let form = create(&forms, &identity(Uuid::new_v4(), Role::Admin), "Survey").await;
        let outsider = identity(Uuid::new_v4(), Role::Respondent);

        assert!(matches!(
            forms.get_scoped(&outsider, form.id).await,
            Err(FormError::WrongOrganization)
        ));
        assert!(matches!(
            forms.get_scoped(&outsider, Uuid::new_v4()).await,
            Err(FormError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn item_ids_must_be_present_and_unique() {
        let (forms, _) = stores();
        let admin = identity(Uuid::new_v4(), Role::Admin);

        for items in [vec![item("")], vec![item("a"), item("a")]] {
            let err = forms
                .save(
                    &admin,
                    FormDraft {
                        items,
                        ..FormDraft::default()
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, FormError::Invalid { .. }));
        }
    }

    #[tokio::test]
    async fn admin_list_is_scoped_and_newest_first() {
        let (forms, subs) = stores();
        let acme = identity(Uuid::new_v4(), Role::Admin);
        let globex = identity(Uuid::new_v4(), Role::Admin);
        let first = create(&forms, &acme, "First").await;
        let second = create(&forms, &acme, "Second").await;
        create(&forms, &globex, "Theirs").await;

        let listed: Vec<_> = forms
            .list_visible(&acme, &subs)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(listed, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn respondent_list_is_distinct_submitted_forms() {
        let (forms, subs) = stores();
        let org = Uuid::new_v4();
        let admin = identity(org, Role::Admin);
        let bob = identity(org, Role::Respondent);
        let a = create(&forms, &admin, "A").await;
        let b = create(&forms, &admin, "B").await;
        create(&forms, &admin, "Never answered").await;

        for form in [&a, &a, &b] {
            subs.create(&bob, form, None, answers(json!({}))).await.unwrap();
        }

        let mut listed: Vec<_> = forms
            .list_visible(&bob, &subs)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        listed.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(listed, expected);
    }

    #[tokio::test]
    async fn delete_cascades_to_submissions() {
        let (forms, subs) = stores();
        let org = Uuid::new_v4();
        let admin = identity(org, Role::Admin);
        let bob = identity(org, Role::Respondent);
        let doomed = create(&forms, &admin, "Doomed").await;
        let kept = create(&forms, &admin, "Kept").await;
        let gone = subs.create(&bob, &doomed, None, answers(json!({}))).await.unwrap();
        subs.create(&bob, &kept, None, answers(json!({}))).await.unwrap();

        forms.delete(&admin, doomed.id, &subs).await.unwrap();

        assert!(matches!(
            forms.get_scoped(&admin, doomed.id).await,
            Err(FormError::NotFound { .. })
        ));
        assert!(subs.get(gone.id).await.is_err());
        assert!(subs.list_for_form(&admin, doomed.id).await.unwrap().is_empty());
        assert_eq!(subs.list_own(&bob).await.unwrap().len(), 1);
        let listed = forms.list_visible(&admin, &subs).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, kept.id);
    }

    #[tokio::test]
    async fn delete_of_foreign_form_leaves_it_alone() {
        let (forms, subs) = stores();
        let owner = identity(Uuid::new_v4(), Role::Admin);
        let form = create(&forms, &owner, "Survey").await;
        let outsider = identity(Uuid::new_v4(), Role::Admin);

        assert!(matches!(
            forms.delete(&outsider, form.id, &subs).await,
            Err(FormError::NotFound { .. })
        ));
        assert!(forms.get_scoped(&owner, form.id).await.is_ok());
    }
}
