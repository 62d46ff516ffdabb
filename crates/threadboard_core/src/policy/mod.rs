//! crates/threadboard_core/src/policy/mod.rs
//!
//! The access control policy: a pure decision over one proposed operation.
//!
//! The host loads an [`Ancestors`] snapshot for the request (see
//! [`Ancestors::load`]) and then calls [`authorize`], which performs no I/O.
//! Every rule is an explicit composition of the predicates in [`predicates`].

use serde::{Deserialize, Serialize};

use crate::domain::{Caller, DocPath, Fields, Resource};

pub mod ancestors;
pub mod predicates;
mod rules;

pub use ancestors::{Ancestors, Roles};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

/// A proposed operation as seen by the policy.
///
/// `proposed` is the full document as it would exist after the write;
/// for updates that is the existing document with the client's changes applied.
#[derive(Debug, Clone)]
pub struct Request {
    pub op: Operation,
    pub path: DocPath,
    pub caller: Option<Caller>,
    pub existing: Option<Fields>,
    pub proposed: Option<Fields>,
}

impl Request {
    pub fn new(op: Operation, path: DocPath, caller: Option<Caller>) -> Self {
        Self {
            op,
            path,
            caller,
            existing: None,
            proposed: None,
        }
    }

    pub fn with_existing(mut self, existing: Option<Fields>) -> Self {
        self.existing = existing;
        self
    }

    pub fn with_proposed(mut self, proposed: Option<Fields>) -> Self {
        self.proposed = proposed;
        self
    }

    pub fn caller_uid(&self) -> Option<&str> {
        self.caller.as_ref().map(|c| c.uid.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DenyReason {
    #[error("caller is not signed in")]
    Unauthenticated,
    #[error("caller's email address is not verified")]
    Unverified,
    #[error("invalid document: {0}")]
    Invalid(&'static str),
    #[error("required document does not exist: {0}")]
    MissingAncestor(&'static str),
    #[error("caller is banned from this category")]
    Banned,
    #[error("not permitted: {0}")]
    Forbidden(&'static str),
    #[error("no rule grants {0:?} on this path")]
    NoRule(Operation),
}

impl DenyReason {
    /// Shape or type mismatches, as opposed to missing privileges.
    pub fn is_validation(&self) -> bool {
        matches!(self, DenyReason::Invalid(_))
    }
}

pub(crate) type RuleResult = Result<(), DenyReason>;

pub(crate) fn ensure(condition: bool, reason: DenyReason) -> RuleResult {
    if condition {
        Ok(())
    } else {
        Err(reason)
    }
}

/// Decides whether `request` may be applied.
pub fn authorize(request: &Request, ancestors: &Ancestors) -> Decision {
    let resource = request.path.classify();
    if resource == Resource::Unknown {
        return Decision::Deny(DenyReason::NoRule(request.op));
    }
    if request.op == Operation::Read {
        return Decision::Allow;
    }

    let outcome = match &resource {
        Resource::User { uid } => rules::user(request, uid),
        Resource::Category { category_id } => rules::category(request, category_id, ancestors),
        Resource::Membership {
            category_id,
            role,
            uid,
        } => rules::membership(request, category_id, *role, uid, ancestors),
        Resource::Post { .. } => rules::post(request, ancestors),
        Resource::Comment { .. } => rules::comment(request, ancestors),
        Resource::Vote { target, uid, .. } => rules::vote(request, target, uid),
        Resource::Unknown => Err(DenyReason::NoRule(request.op)),
    };

    match outcome {
        Ok(()) => Decision::Allow,
        Err(reason) => Decision::Deny(reason),
    }
}
