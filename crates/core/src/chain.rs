use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::quote::QuoteId;
use crate::domain::transition::WorkflowTransition;

/// `prev_hash` of the first transition in every quote's chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Hash over the immutable fields of one transition row, linked to its
/// predecessor through `prev_hash`.
pub fn entry_hash(
    prev_hash: &str,
    quote_id: &QuoteId,
    seq: i64,
    from_status: &str,
    to_status: &str,
    actor_id: &str,
    occurred_at: &str,
) -> String {
    let material = format!(
        "{prev_hash}|{}|{seq}|{from_status}|{to_status}|{actor_id}|{occurred_at}",
        quote_id.0
    );
    sha256_hex(material.as_bytes())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub quote_id: QuoteId,
    pub valid: bool,
    pub verified_entries: usize,
    pub failure_reason: Option<String>,
}

/// Walks a quote's transition history in sequence order and recomputes every
/// link. Any retroactive edit to a row, a reordering, or a dropped row
/// surfaces as a broken link.
pub fn verify_chain(quote_id: &QuoteId, transitions: &[WorkflowTransition]) -> ChainVerification {
    let mut previous_hash = GENESIS_HASH.to_string();

    for (index, transition) in transitions.iter().enumerate() {
        let expected_seq = index as i64 + 1;
        if transition.seq != expected_seq {
            return broken(
                quote_id,
                index,
                format!(
                    "sequence gap at entry {}: expected {expected_seq}, found {}",
                    transition.id.0, transition.seq
                ),
            );
        }

        if transition.prev_hash != previous_hash {
            return broken(
                quote_id,
                index,
                format!("previous hash mismatch at entry {}", transition.id.0),
            );
        }

        let computed = entry_hash(
            &transition.prev_hash,
            &transition.quote_id,
            transition.seq,
            transition.from_status.as_str(),
            transition.to_status.as_str(),
            &transition.actor_id.0,
            &transition.occurred_at.to_rfc3339(),
        );
        if computed != transition.entry_hash {
            return broken(
                quote_id,
                index,
                format!("entry hash mismatch at entry {}", transition.id.0),
            );
        }

        previous_hash = transition.entry_hash.clone();
    }

    ChainVerification {
        quote_id: quote_id.clone(),
        valid: true,
        verified_entries: transitions.len(),
        failure_reason: None,
    }
}

fn broken(quote_id: &QuoteId, verified: usize, reason: String) -> ChainVerification {
    ChainVerification {
        quote_id: quote_id.clone(),
        valid: false,
        verified_entries: verified,
        failure_reason: Some(reason),
    }
}

fn sha256_hex(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    let mut output = String::with_capacity(digest.len() * 2);
    for byte in digest {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{entry_hash, verify_chain, GENESIS_HASH};
    use crate::domain::quote::{QuoteId, QuoteStatus};
    use crate::domain::transition::{TransitionId, WorkflowTransition};
    use crate::domain::UserId;
    use crate::roles::Role;

    fn chain(quote_id: &QuoteId, hops: &[(QuoteStatus, QuoteStatus)]) -> Vec<WorkflowTransition> {
        let mut transitions = Vec::new();
        let mut prev_hash = GENESIS_HASH.to_string();

        for (index, (from, to)) in hops.iter().enumerate() {
            let seq = index as i64 + 1;
            let occurred_at = Utc::now();
            let hash = entry_hash(
                &prev_hash,
                quote_id,
                seq,
                from.as_str(),
                to.as_str(),
                "u-actor",
                &occurred_at.to_rfc3339(),
            );
            transitions.push(WorkflowTransition {
                id: TransitionId(format!("t-{seq}")),
                quote_id: quote_id.clone(),
                seq,
                from_status: *from,
                to_status: *to,
                actor_id: UserId("u-actor".to_string()),
                role: Role::SalesManager,
                comment: None,
                prev_hash: prev_hash.clone(),
                entry_hash: hash.clone(),
                occurred_at,
            });
            prev_hash = hash;
        }

        transitions
    }

    #[test]
    fn untampered_chain_verifies() {
        let quote_id = QuoteId("q-1".to_string());
        let transitions = chain(
            &quote_id,
            &[
                (QuoteStatus::Draft, QuoteStatus::PendingProcurement),
                (QuoteStatus::PendingProcurement, QuoteStatus::PendingLogistics),
                (QuoteStatus::PendingLogistics, QuoteStatus::PendingSalesReview),
            ],
        );

        let result = verify_chain(&quote_id, &transitions);
        assert!(result.valid);
        assert_eq!(result.verified_entries, 3);
        assert!(result.failure_reason.is_none());
    }

    #[test]
    fn empty_history_is_a_valid_chain() {
        let quote_id = QuoteId("q-new".to_string());
        let result = verify_chain(&quote_id, &[]);
        assert!(result.valid);
        assert_eq!(result.verified_entries, 0);
    }

    #[test]
    fn edited_row_breaks_the_chain() {
        let quote_id = QuoteId("q-2".to_string());
        let mut transitions = chain(
            &quote_id,
            &[
                (QuoteStatus::Draft, QuoteStatus::PendingProcurement),
                (QuoteStatus::PendingProcurement, QuoteStatus::PendingCustoms),
            ],
        );
        transitions[1].actor_id = UserId("u-impostor".to_string());

        let result = verify_chain(&quote_id, &transitions);
        assert!(!result.valid);
        assert_eq!(result.verified_entries, 1);
        assert!(result.failure_reason.unwrap_or_default().contains("entry hash mismatch"));
    }

    #[test]
    fn dropped_row_breaks_the_sequence() {
        let quote_id = QuoteId("q-3".to_string());
        let mut transitions = chain(
            &quote_id,
            &[
                (QuoteStatus::Draft, QuoteStatus::PendingProcurement),
                (QuoteStatus::PendingProcurement, QuoteStatus::PendingLogistics),
                (QuoteStatus::PendingLogistics, QuoteStatus::PendingSalesReview),
            ],
        );
        transitions.remove(1);

        let result = verify_chain(&quote_id, &transitions);
        assert!(!result.valid);
        assert!(result.failure_reason.unwrap_or_default().contains("sequence gap"));
    }

    #[test]
    fn relinked_hashes_still_fail_on_recomputation() {
        let quote_id = QuoteId("q-4".to_string());
        let mut transitions = chain(
            &quote_id,
            &[
                (QuoteStatus::Draft, QuoteStatus::PendingProcurement),
                (QuoteStatus::PendingProcurement, QuoteStatus::PendingLogistics),
            ],
        );

        // An attacker edits a field and recomputes nothing downstream.
        transitions[0].to_status = QuoteStatus::Cancelled;

        let result = verify_chain(&quote_id, &transitions);
        assert!(!result.valid);
        assert_eq!(result.verified_entries, 0);
    }
}
