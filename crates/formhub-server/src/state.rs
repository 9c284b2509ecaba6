//! Shared application state for the Formhub server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`. Every store sits on the same lazily-connected
//! storage handle.

use std::sync::Arc;

use formhub_core::accounts::AccountService;
use formhub_core::document::DocumentStore;
use formhub_core::form::FormStore;
use formhub_core::org::OrgStore;
use formhub_core::session::TokenSigner;
use formhub_core::submission::SubmissionStore;
use formhub_core::user::UserStore;
use formhub_storage::{LazyBackend, StorageBackend};

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// The storage handle. Connects on first use.
    pub storage: Arc<LazyBackend>,
    /// Session token issuer and verifier.
    pub tokens: Arc<TokenSigner>,
    /// Signup, login, provisioning.
    pub accounts: Arc<AccountService>,
    pub forms: Arc<FormStore>,
    pub submissions: Arc<SubmissionStore>,
}

impl AppState {
    /// Wire up every store over `storage`.
    #[must_use]
    pub fn new(storage: Arc<LazyBackend>, tokens: TokenSigner) -> Self {
        let docs = Arc::new(DocumentStore::new(
            Arc::clone(&storage) as Arc<dyn StorageBackend>
        ));
        let tokens = Arc::new(tokens);

        let orgs = Arc::new(OrgStore::new(Arc::clone(&docs)));
        let users = Arc::new(UserStore::new(Arc::clone(&docs)));
        let accounts = Arc::new(AccountService::new(orgs, users, Arc::clone(&tokens)));

        Self {
            storage,
            tokens,
            accounts,
            forms: Arc::new(FormStore::new(Arc::clone(&docs))),
            submissions: Arc::new(SubmissionStore::new(docs)),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
