//! Student eligibility checks

use chrono::{DateTime, Local};
use rollcall_api::{IdentityFields, Session};
use rollcall_config::EligibilityPolicy;
use rollcall_util::{AttendanceError, Result, SessionId};

/// Proof that a student passed the eligibility gate for one session.
///
/// Only `EligibilityChecker::verify` can construct one.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    session_id: SessionId,
    identity: IdentityFields,
    verified_at: DateTime<Local>,
}

impl VerifiedIdentity {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Identity fields, trimmed
    pub fn identity(&self) -> &IdentityFields {
        &self.identity
    }

    pub fn verified_at(&self) -> DateTime<Local> {
        self.verified_at
    }
}

/// Validates identity fields against a session
#[derive(Debug, Clone, Default)]
pub struct EligibilityChecker {
    policy: EligibilityPolicy,
}

impl EligibilityChecker {
    pub fn new(policy: EligibilityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    /// Check that every identity field is present, that the email belongs
    /// to the institutional domain, and that the session is open, in that
    /// order. Pure; touches nothing.
    pub fn verify(&self, session: &Session, identity: &IdentityFields) -> Result<VerifiedIdentity> {
        let identity = IdentityFields {
            name: identity.name.trim().to_string(),
            enrollment_number: identity.enrollment_number.trim().to_string(),
            email: identity.email.trim().to_string(),
        };

        for (field, value) in [
            ("name", &identity.name),
            ("enrollment_number", &identity.enrollment_number),
            ("email", &identity.email),
        ] {
            if value.is_empty() {
                return Err(AttendanceError::missing_field(field));
            }
        }

        if !self.email_in_domain(&identity.email) {
            return Err(AttendanceError::DomainMismatch {
                email: identity.email,
                domain: self.policy.institutional_domain.clone(),
            });
        }

        if !session.is_open() {
            return Err(AttendanceError::SessionClosed(session.session_id.clone()));
        }

        Ok(VerifiedIdentity {
            session_id: session.session_id.clone(),
            identity,
            verified_at: rollcall_util::now(),
        })
    }

    /// `local@domain` with a non-empty local part and the exact domain
    fn email_in_domain(&self, email: &str) -> bool {
        let Some((local, domain)) = email.rsplit_once('@') else {
            return false;
        };
        if local.is_empty() {
            return false;
        }

        if self.policy.domain_case_sensitive {
            domain == self.policy.institutional_domain
        } else {
            domain.eq_ignore_ascii_case(&self.policy.institutional_domain)
        }
    }
}
