//! Core library for Formhub.
//!
//! Contains the document layer over the storage backend, the domain model,
//! the four record stores (organizations, users, forms, submissions), the
//! account flows (signup, login, respondent provisioning), submission
//! versioning, password hashing, and signed session tokens. This crate
//! depends on `formhub-storage` for the backend trait and knows nothing
//! about HTTP.

pub mod accounts;
pub mod document;
pub mod error;
pub mod form;
pub mod models;
pub mod org;
pub mod password;
pub mod session;
pub mod submission;
pub mod user;

#[cfg(test)]
pub(crate) mod testing;
