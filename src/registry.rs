//! The registry holds what the fallback engine iterates over: the API keys
//! ("credentials") and the model identifiers, each in priority order, plus the
//! model most recently seen to succeed.
//!
//! Both lists are built once, at startup, from configuration and never change
//! afterwards. Credentials are taken from four slots (a primary key and three
//! backups); empty slots are skipped. Models come from the provider's built-in
//! list with an optional override placed in front of it. The model list is
//! deduplicated, so an override naming a built-in model moves that model to the
//! front instead of trying it twice:
//! ```text
//! built-in: a, b, c    override: b    effective: b, a, c
//! ```
//!
//! The active model is informational. It starts out as the first model and is
//! rewritten by the engine after a fallback succeeds. It is never consulted when
//! choosing what to try; every call walks the lists from the top.

pub(crate) mod populate;
#[allow(clippy::module_inception)]
pub(crate) mod registry;

pub(crate) use registry::{Credential, CredentialSet, ModelPriorityList, Registry};
