use tracing::warn;

use crate::auth::{
    error::IdentityError,
    repo_types::{ApprovalState, Role},
};

/// Decides whether an account in this role/approval state may obtain a session.
pub fn check(role: Role, approval: ApprovalState) -> Result<(), IdentityError> {
    match (role, approval) {
        (Role::Buyer | Role::Moderator, ApprovalState::NotApplicable) => Ok(()),
        (Role::Partner, ApprovalState::Approved) => Ok(()),
        (Role::Partner, ApprovalState::Pending | ApprovalState::Rejected) => {
            Err(IdentityError::PendingApproval)
        }
        (Role::Partner, ApprovalState::NotApplicable)
        | (
            Role::Buyer | Role::Moderator,
            ApprovalState::Pending | ApprovalState::Approved | ApprovalState::Rejected,
        ) => {
            warn!(%role, %approval, "inconsistent role/approval pair denied");
            Err(IdentityError::PendingApproval)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_table() {
        let cases = [
            (Role::Buyer, ApprovalState::NotApplicable, true),
            (Role::Moderator, ApprovalState::NotApplicable, true),
            (Role::Partner, ApprovalState::Pending, false),
            (Role::Partner, ApprovalState::Approved, true),
            (Role::Partner, ApprovalState::Rejected, false),
        ];
        for (role, approval, allowed) in cases {
            assert_eq!(check(role, approval).is_ok(), allowed, "{role} / {approval}");
        }
    }

    #[test]
    fn denial_is_pending_approval() {
        assert_eq!(
            check(Role::Partner, ApprovalState::Rejected),
            Err(IdentityError::PendingApproval)
        );
    }

    #[test]
    fn inconsistent_pairs_are_denied() {
        assert!(check(Role::Partner, ApprovalState::NotApplicable).is_err());
        assert!(check(Role::Buyer, ApprovalState::Approved).is_err());
        assert!(check(Role::Moderator, ApprovalState::Pending).is_err());
    }
}
