//! Candidate ranking.
//!
//! Pure and total: the same requirement and directory snapshot always give
//! the same ordered list, regardless of the snapshot's order.

use crate::entities::candidate::Candidate;
use crate::entities::requirement::Requirement;
use itertools::Itertools;

/// Verified candidates serving the requirement's location and category,
/// least loaded first, then longest registered, then by id. At most
/// `max_invited` are returned.
pub fn select_candidates(
    requirement: &Requirement,
    directory: &[Candidate],
    max_invited: usize,
) -> Vec<Candidate> {
    directory
        .iter()
        .filter(|c| c.is_verified())
        .filter(|c| c.serves_area(&requirement.location))
        .filter(|c| c.serves_category(&requirement.category))
        .sorted_by(|a, b| {
            a.active_leads
                .cmp(&b.active_leads)
                .then_with(|| a.registered_at.cmp(&b.registered_at))
                .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        })
        .take(max_invited)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::CandidateId;
    use crate::entities::candidate::VerificationStatus;
    use crate::entities::requirement::RequirementStatus;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use time::{Date, Month, PrimitiveDateTime, Time};
    use uuid::Uuid;

    fn epoch() -> PrimitiveDateTime {
        PrimitiveDateTime::new(
            Date::from_calendar_date(2024, Month::January, 1).unwrap(),
            Time::MIDNIGHT,
        )
    }

    fn requirement() -> Requirement {
        Requirement {
            requirement_id: Uuid::nil(),
            location: "Marina".into(),
            category: "apartment".into(),
            budget_min: None,
            budget_max: Some(Decimal::from(500_000)),
            bedrooms: None,
            client_ref: None,
            status: RequirementStatus::Open,
            created_at: epoch() + time::Duration::days(365),
        }
    }

    fn candidate(id: &str, load: i32, registered_day: u8) -> Candidate {
        Candidate {
            candidate_id: id.into(),
            name: id.to_uppercase(),
            service_areas: vec!["Marina".into()],
            categories: vec![],
            status: VerificationStatus::Verified,
            active_leads: load,
            registered_at: epoch() + time::Duration::days(registered_day.into()),
        }
    }

    fn ids(selected: &[Candidate]) -> Vec<&str> {
        selected.iter().map(|c| c.candidate_id.as_str()).collect()
    }

    #[test]
    fn test_ranks_by_load_then_seniority_then_id() {
        let directory = vec![
            candidate("d", 2, 0),
            candidate("c", 0, 5),
            candidate("b", 0, 1),
            candidate("a", 0, 1),
        ];
        let selected = select_candidates(&requirement(), &directory, 10);
        assert_eq!(ids(&selected), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_filters_ineligible() {
        let mut suspended = candidate("suspended", 0, 0);
        suspended.status = VerificationStatus::Suspended;
        let mut pending = candidate("pending", 0, 0);
        pending.status = VerificationStatus::Pending;
        let mut elsewhere = candidate("elsewhere", 0, 0);
        elsewhere.service_areas = vec!["Downtown".into()];
        let mut villas = candidate("villas", 0, 0);
        villas.categories = vec!["villa".into()];
        let directory = vec![
            suspended,
            pending,
            elsewhere,
            villas,
            candidate("ok", 3, 0),
        ];
        let selected = select_candidates(&requirement(), &directory, 10);
        assert_eq!(ids(&selected), vec!["ok"]);
    }

    #[test]
    fn test_truncates_and_handles_empty() {
        let directory: Vec<_> = (0..15)
            .map(|i| candidate(&format!("c{i:02}"), 0, i))
            .collect();
        assert_eq!(select_candidates(&requirement(), &directory, 10).len(), 10);
        assert!(select_candidates(&requirement(), &[], 10).is_empty());
    }

    fn arb_candidate() -> impl Strategy<Value = Candidate> {
        (
            "[a-f]{1,3}",
            0i32..4,
            0u8..5,
            prop_oneof![
                Just(VerificationStatus::Verified),
                Just(VerificationStatus::Pending),
                Just(VerificationStatus::Suspended),
            ],
            prop_oneof![Just("Marina"), Just("marina"), Just("JLT")],
        )
            .prop_map(|(id, load, day, status, area)| {
                let mut c = candidate(&id, load, day);
                c.status = status;
                c.service_areas = vec![area.to_owned()];
                c
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn prop_selection_ignores_snapshot_order(
            directory in proptest::collection::vec(arb_candidate(), 0..20),
            max in 1usize..12,
        ) {
            let directory: Vec<Candidate> = directory
                .into_iter()
                .unique_by(|c| c.candidate_id.clone())
                .collect();
            let forward = select_candidates(&requirement(), &directory, max);
            let mut reversed = directory.clone();
            reversed.reverse();
            let backward = select_candidates(&requirement(), &reversed, max);
            prop_assert_eq!(&forward, &backward);
            prop_assert!(forward.len() <= max);

            for c in &forward {
                prop_assert!(c.is_verified());
                prop_assert!(c.serves_area("Marina"));
            }
            for pair in forward.windows(2) {
                let key = |c: &Candidate| (c.active_leads, c.registered_at, c.candidate_id.clone());
                prop_assert!(key(&pair[0]) <= key(&pair[1]));
            }
            let unique: std::collections::HashSet<&CandidateId> =
                forward.iter().map(|c| &c.candidate_id).collect();
            prop_assert_eq!(unique.len(), forward.len());
        }
    }
}
