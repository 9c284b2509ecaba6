//! Error types for `formhub-core`.
//!
//! One enum per subsystem. Every store function returns one of these; the
//! server maps each variant to an HTTP status in a single place. Variants
//! that can reach a client carry a message fit to show a user; storage
//! details only travel inside `Document`.

use formhub_storage::StorageError;

/// Errors from the JSON document layer.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The storage backend returned an error.
    #[error("document storage error: {0}")]
    Storage(#[from] StorageError),

    /// A record could not be serialized.
    #[error("failed to encode document '{key}': {reason}")]
    Encode { key: String, reason: String },

    /// A stored document could not be deserialized.
    #[error("failed to decode document '{key}': {reason}")]
    Decode { key: String, reason: String },

    /// An index key did not end in a valid record id.
    #[error("corrupt index entry '{key}'")]
    CorruptIndex { key: String },
}

/// Errors from password hashing and session tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credentials were presented.
    #[error("No token, authorization denied")]
    MissingToken,

    /// The token has expired.
    #[error("Token has expired")]
    Expired,

    /// Signature, structure, or claims are invalid.
    #[error("Token is not valid")]
    InvalidToken { reason: String },

    /// Signing a new token failed.
    #[error("failed to sign token: {reason}")]
    Signing { reason: String },

    /// The password hasher failed (not a wrong password).
    #[error("password hashing failed: {reason}")]
    PasswordHash { reason: String },
}

/// Errors from organization operations.
#[derive(Debug, thiserror::Error)]
pub enum OrgError {
    /// Another organization already uses this name.
    #[error("Organization name already taken")]
    NameTaken,

    /// The organization does not exist.
    #[error("Organization not found")]
    NotFound,

    /// Client input failed validation.
    #[error("{reason}")]
    Invalid { reason: String },

    /// The document layer returned an error.
    #[error("organization document error: {0}")]
    Document(#[from] DocumentError),
}

/// Errors from user accounts and provisioning.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    /// An account with this email already exists (in any organization).
    #[error("User already exists")]
    EmailTaken,

    /// The user does not exist.
    #[error("User not found")]
    NotFound,

    /// Unknown email or wrong password. Deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The caller's role does not allow this operation.
    #[error("{reason}")]
    Forbidden { reason: String },

    /// Client input failed validation.
    #[error("{reason}")]
    Invalid { reason: String },

    /// Organization setup failed during signup.
    #[error(transparent)]
    Org(#[from] OrgError),

    /// Hashing or token signing failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The document layer returned an error.
    #[error("user document error: {0}")]
    Document(#[from] DocumentError),
}

/// Errors from form operations.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    /// The form does not exist, or is not visible for an update/delete.
    #[error("{message}")]
    NotFound { message: String },

    /// The form exists but belongs to another organization.
    #[error("Access Denied: Wrong Organization")]
    WrongOrganization,

    /// The caller's role does not allow this operation.
    #[error("{reason}")]
    Forbidden { reason: String },

    /// Client input failed validation.
    #[error("{reason}")]
    Invalid { reason: String },

    /// Cascading to submissions failed.
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// The document layer returned an error.
    #[error("form document error: {0}")]
    Document(#[from] DocumentError),
}

impl FormError {
    pub(crate) fn not_found() -> Self {
        Self::NotFound {
            message: "Form not found".to_owned(),
        }
    }

    pub(crate) fn not_found_or_unauthorized() -> Self {
        Self::NotFound {
            message: "Form not found or unauthorized".to_owned(),
        }
    }
}

/// Errors from submission operations.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// The submission does not exist.
    #[error("Submission not found")]
    NotFound,

    /// The caller may not read or modify this submission.
    #[error("{reason}")]
    Forbidden { reason: String },

    /// The client edited an outdated revision.
    #[error("submission is at revision {actual}, edit was based on revision {expected}")]
    RevisionMismatch { expected: u64, actual: u64 },

    /// Another edit was persisted between load and write.
    #[error("submission was modified concurrently, reload and retry")]
    ConcurrentEdit,

    /// The document layer returned an error.
    #[error("submission document error: {0}")]
    Document(#[from] DocumentError),
}
