//! Role-based access decisions for engine operations.
//!
//! Every authenticated engine entry point calls [`authorize`] with the
//! caller's claims. Verification is public and never passes through here. A denial is final: callers get
//! [`RegistryError::Forbidden`], never a reduced result.

use diploma_core::{Claims, Credential, CredentialId, Role};

use crate::error::RegistryError;
use crate::registry::ListFilter;

/// An operation a caller asks for, with its target where one exists.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Issue,
    Revoke(&'a CredentialId),
    /// Reading a specific record; the record itself is needed to check
    /// ownership.
    Get(&'a Credential),
    List,
}

impl Operation<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Revoke(_) => "revoke",
            Self::Get(_) => "get",
            Self::List => "list",
        }
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Allowed, restricted to the given subset.
    AllowFiltered(ListFilter),
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Deny(_))
    }
}

/// Pure access table.
pub fn decide(claims: &Claims, operation: &Operation<'_>) -> Decision {
    match (claims.role, operation) {
        (Role::Issuer, Operation::Issue)
        | (Role::Issuer, Operation::Revoke(_))
        | (Role::Issuer, Operation::Get(_)) => Decision::Allow,
        (Role::Issuer, Operation::List) => Decision::AllowFiltered(ListFilter::All),

        (Role::Holder, Operation::Issue) | (Role::Holder, Operation::Revoke(_)) => {
            Decision::Deny(format!("role '{}' may not {}", claims.role, operation.name()))
        }
        (Role::Holder, Operation::Get(credential)) => {
            if credential.is_owned_by(&claims.username) {
                Decision::Allow
            } else {
                Decision::Deny(format!(
                    "credential {} does not belong to '{}'",
                    credential.id, claims.username
                ))
            }
        }
        (Role::Holder, Operation::List) => {
            Decision::AllowFiltered(ListFilter::OwnedBy(claims.username.clone()))
        }
    }
}

/// Check access, logging and converting a denial into `Forbidden`.
pub fn authorize(claims: &Claims, operation: &Operation<'_>) -> Result<Decision, RegistryError> {
    match decide(claims, operation) {
        Decision::Deny(reason) => {
            tracing::warn!(
                username = %claims.username,
                role = %claims.role,
                operation = operation.name(),
                %reason,
                "access denied"
            );
            Err(RegistryError::Forbidden(reason))
        }
        decision => Ok(decision),
    }
}
