use common::{ParticipantStatus, WagerStatus};

/// Derives the wager-level status from its participants' statuses.
///
/// Cancellation is never derived; it is an explicit override applied by
/// `cancel_wager` and this function is not consulted afterwards.
pub fn derive_wager_status(statuses: &[ParticipantStatus]) -> WagerStatus {
    if !statuses.is_empty()
        && statuses
            .iter()
            .all(|status| *status == ParticipantStatus::Declined)
    {
        return WagerStatus::Declined;
    }
    if statuses
        .iter()
        .any(|status| matches!(status, ParticipantStatus::Won | ParticipantStatus::Lost))
    {
        return WagerStatus::Completed;
    }
    if statuses.iter().any(|status| {
        matches!(
            status,
            ParticipantStatus::Active | ParticipantStatus::OutcomePending
        )
    }) {
        return WagerStatus::Active;
    }
    WagerStatus::Proposed
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ParticipantStatus as P;

    #[test]
    fn all_invited_is_proposed() {
        assert_eq!(derive_wager_status(&[P::Invited, P::Invited]), WagerStatus::Proposed);
    }

    #[test]
    fn all_declined_is_declined() {
        assert_eq!(derive_wager_status(&[P::Declined, P::Declined]), WagerStatus::Declined);
    }

    #[test]
    fn one_decline_does_not_decline_the_wager() {
        assert_eq!(derive_wager_status(&[P::Declined, P::Invited]), WagerStatus::Proposed);
        assert_eq!(derive_wager_status(&[P::Declined, P::Active]), WagerStatus::Active);
    }

    #[test]
    fn any_acceptance_is_active() {
        assert_eq!(derive_wager_status(&[P::Active, P::Invited]), WagerStatus::Active);
    }

    #[test]
    fn pending_claims_keep_the_wager_active() {
        assert_eq!(
            derive_wager_status(&[P::OutcomePending, P::OutcomePending]),
            WagerStatus::Active
        );
    }

    #[test]
    fn any_settlement_is_completed() {
        assert_eq!(derive_wager_status(&[P::Won, P::Lost]), WagerStatus::Completed);
        assert_eq!(derive_wager_status(&[P::Lost, P::Invited]), WagerStatus::Completed);
    }

    #[test]
    fn no_participants_is_proposed() {
        assert_eq!(derive_wager_status(&[]), WagerStatus::Proposed);
    }
}
