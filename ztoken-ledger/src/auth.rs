//! Sender authorization capability.
//!
//! The ledger never checks signatures itself. Whatever authenticated the
//! caller (a signed HTTP request, a session, a host environment) hands the
//! ledger one of these, and debits are only applied for identities it
//! confirms.

use ztoken_common::PublicIdentity;

pub trait SenderAuthorization {
    /// `true` if the current caller may spend as `claimed`.
    fn verified_sender_authorization(&self, claimed: &PublicIdentity) -> bool;
}

/// Authorization already established for exactly one identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerifiedSender(pub PublicIdentity);

impl SenderAuthorization for VerifiedSender {
    fn verified_sender_authorization(&self, claimed: &PublicIdentity) -> bool {
        self.0 == *claimed
    }
}

/// No authenticated caller; every claim is refused.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unauthenticated;

impl SenderAuthorization for Unauthenticated {
    fn verified_sender_authorization(&self, _claimed: &PublicIdentity) -> bool {
        false
    }
}

impl<F> SenderAuthorization for F
where
    F: Fn(&PublicIdentity) -> bool,
{
    fn verified_sender_authorization(&self, claimed: &PublicIdentity) -> bool {
        self(claimed)
    }
}
