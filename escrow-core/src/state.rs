//! Escrow lifecycle state machine
//!
//! Happy path: `awaiting_deposit -> funded -> releasing -> released`.
//! Disputes branch out of `funded`/`releasing` and are resolved by an
//! admin toward release or refund. Expiry sends held funds back through
//! `refunding -> refunded`.
//!
//! The table below is the single source of truth for legal transitions;
//! callers must hold the escrow row lock while checking and applying.

use crate::error::{Error, Result};
use crate::types::EscrowStatus;

/// Whether `from -> to` is a legal transition.
pub fn can_transition(from: EscrowStatus, to: EscrowStatus) -> bool {
    use EscrowStatus::*;
    matches!(
        (from, to),
        (AwaitingDeposit, Funded)
            | (Funded, Releasing)
            | (Funded, Disputed)
            | (Funded, Refunding)
            | (Releasing, Released)
            | (Releasing, Disputed)
            | (Releasing, Refunding)
            | (Disputed, Releasing)
            | (Disputed, Refunding)
            | (Refunding, Refunded)
    )
}

/// Validate a transition, returning the new status.
pub fn apply(from: EscrowStatus, to: EscrowStatus) -> Result<EscrowStatus> {
    if can_transition(from, to) {
        Ok(to)
    } else {
        Err(Error::InvalidTransition { from, to })
    }
}

impl EscrowStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EscrowStatus::Released | EscrowStatus::Refunded)
    }

    /// States the expiry sweep may refund once `expires_at` has passed.
    ///
    /// `awaiting_deposit` never expires through the sweep: nothing was
    /// captured, so there is nothing to return. `released` and `refunded`
    /// are terminal.
    pub fn can_expire(&self) -> bool {
        matches!(
            self,
            EscrowStatus::Funded | EscrowStatus::Releasing | EscrowStatus::Disputed
        )
    }

    /// States from which a refund may start.
    pub fn is_refundable(&self) -> bool {
        self.can_expire() || matches!(self, EscrowStatus::Refunding)
    }

    /// States from which a release may start. `releasing` is included so
    /// an interrupted release can be retried.
    pub fn is_releasable(&self) -> bool {
        matches!(self, EscrowStatus::Funded | EscrowStatus::Releasing)
    }

    /// States from which a party may raise a dispute.
    pub fn is_disputable(&self) -> bool {
        matches!(self, EscrowStatus::Funded | EscrowStatus::Releasing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EscrowStatus::*;

    const ALL: [EscrowStatus; 7] = [
        AwaitingDeposit,
        Funded,
        Releasing,
        Released,
        Disputed,
        Refunding,
        Refunded,
    ];

    #[test]
    fn test_happy_path() {
        assert!(can_transition(AwaitingDeposit, Funded));
        assert!(can_transition(Funded, Releasing));
        assert!(can_transition(Releasing, Released));
    }

    #[test]
    fn test_dispute_paths() {
        assert!(can_transition(Funded, Disputed));
        assert!(can_transition(Releasing, Disputed));
        // Admin resolution
        assert!(can_transition(Disputed, Releasing));
        assert!(can_transition(Disputed, Refunding));
        // No dispute before funding or after settlement
        assert!(!can_transition(AwaitingDeposit, Disputed));
        assert!(!can_transition(Released, Disputed));
        assert!(!can_transition(Refunded, Disputed));
    }

    #[test]
    fn test_refund_paths() {
        assert!(can_transition(Funded, Refunding));
        assert!(can_transition(Releasing, Refunding));
        assert!(can_transition(Refunding, Refunded));
        assert!(!can_transition(AwaitingDeposit, Refunding));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in [Released, Refunded] {
            for to in ALL {
                assert!(
                    !can_transition(from, to),
                    "terminal {from} must not reach {to}"
                );
            }
        }
    }

    #[test]
    fn test_no_skipping_states() {
        // Funding cannot jump straight to settlement
        assert!(!can_transition(AwaitingDeposit, Released));
        assert!(!can_transition(AwaitingDeposit, Releasing));
        assert!(!can_transition(Funded, Released));
        assert!(!can_transition(Funded, Refunded));
        // No moving backwards
        assert!(!can_transition(Funded, AwaitingDeposit));
        assert!(!can_transition(Released, Releasing));
    }

    #[test]
    fn test_apply_reports_illegal_edges() {
        assert_eq!(apply(Funded, Releasing), Ok(Releasing));
        assert_eq!(
            apply(Released, Refunding),
            Err(Error::InvalidTransition {
                from: Released,
                to: Refunding
            })
        );
    }

    #[test]
    fn test_refundable_set() {
        assert!(Funded.is_refundable());
        assert!(Releasing.is_refundable());
        assert!(Disputed.is_refundable());
        // An interrupted refund can be retried
        assert!(Refunding.is_refundable());
        assert!(!AwaitingDeposit.is_refundable());
        assert!(!Released.is_refundable());
        assert!(!Refunded.is_refundable());
    }

    #[test]
    fn test_expiry_set() {
        assert!(Funded.can_expire());
        assert!(Releasing.can_expire());
        assert!(Disputed.can_expire());
        assert!(!AwaitingDeposit.can_expire());
        assert!(!Released.can_expire());
        assert!(!Refunded.can_expire());
    }
}
