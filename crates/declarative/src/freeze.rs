//! Conditional freeze of computed attributes
//!
//! Digest and created-at are derived remotely from a write-only value. When
//! that value is not being changed, the next computed value is the current
//! one, and showing it as unknown would be a spurious diff.

use crate::types::{DesiredSecrets, ObservedSecrets, Tracked};
use std::collections::BTreeMap;

/// Decide whether a computed attribute keeps its prior value
///
/// The result is pinned to `prior` only when all of the following hold:
/// a prior value exists, `planned` is unresolved, `correlated_planned` is
/// known, and it equals `correlated_prior`. Otherwise `planned` is returned.
pub fn freeze<T: Clone, U: PartialEq>(
    prior: Option<&T>,
    planned: Tracked<T>,
    correlated_prior: Option<&Tracked<U>>,
    correlated_planned: &Tracked<U>,
) -> Tracked<T> {
    let Some(prior) = prior else {
        return planned;
    };
    if planned.is_known() {
        return planned;
    }
    let Some(correlated_planned) = correlated_planned.as_known() else {
        return planned;
    };
    match correlated_prior.and_then(Tracked::as_known) {
        Some(correlated_prior) if correlated_prior == correlated_planned => {
            Tracked::Known(prior.clone())
        }
        _ => planned,
    }
}

/// Planned computed attributes of one declared secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSecret {
    pub value: Tracked<String>,
    pub digest: Tracked<String>,
    pub created_at: Tracked<String>,
}

/// Plan the computed attributes of every declared secret
pub fn plan_secrets(
    desired: &DesiredSecrets,
    observed: &ObservedSecrets,
) -> BTreeMap<String, PlannedSecret> {
    desired
        .iter()
        .map(|(name, value)| {
            let planned_value = Tracked::Known(value.clone());
            let prior = observed.get(name);
            let prior_value = prior.map(|entry| &entry.value);

            let digest = freeze(
                prior.map(|entry| &entry.digest),
                Tracked::Unresolved,
                prior_value,
                &planned_value,
            );
            let created_at = freeze(
                prior.map(|entry| &entry.created_at),
                Tracked::Unresolved,
                prior_value,
                &planned_value,
            );

            (
                name.clone(),
                PlannedSecret {
                    value: planned_value,
                    digest,
                    created_at,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SecretEntry;

    fn known(s: &str) -> Tracked<String> {
        Tracked::Known(s.to_string())
    }

    #[test]
    fn test_freeze_when_correlated_unchanged() {
        let prior = "abc".to_string();
        let result = freeze(Some(&prior), Tracked::Unresolved, Some(&known("v")), &known("v"));
        assert_eq!(result, known("abc"));
    }

    #[test]
    fn test_no_freeze_when_correlated_changed() {
        let prior = "abc".to_string();
        let result = freeze(Some(&prior), Tracked::Unresolved, Some(&known("v")), &known("w"));
        assert!(result.is_unresolved());
    }

    #[test]
    fn test_no_freeze_when_correlated_unresolved() {
        let prior = "abc".to_string();
        let result = freeze(
            Some(&prior),
            Tracked::Unresolved,
            Some(&known("v")),
            &Tracked::<String>::Unresolved,
        );
        assert!(result.is_unresolved());

        let result = freeze(Some(&prior), Tracked::Unresolved, Some(&Tracked::Unresolved), &known("v"));
        assert!(result.is_unresolved());
    }

    #[test]
    fn test_no_freeze_without_prior() {
        let result: Tracked<String> =
            freeze(None, Tracked::Unresolved, Some(&known("v")), &known("v"));
        assert!(result.is_unresolved());

        let prior = "abc".to_string();
        let result = freeze(Some(&prior), Tracked::Unresolved, None, &known("v"));
        assert!(result.is_unresolved());
    }

    #[test]
    fn test_known_planned_is_kept() {
        let prior = "abc".to_string();
        let result = freeze(Some(&prior), known("xyz"), Some(&known("v")), &known("v"));
        assert_eq!(result, known("xyz"));
    }

    #[test]
    fn test_plan_secrets() {
        let mut observed = ObservedSecrets::new();
        observed.insert(
            "SAME".into(),
            SecretEntry {
                value: known("1"),
                digest: "abc".into(),
                created_at: "t1".into(),
            },
        );
        observed.insert(
            "CHANGED".into(),
            SecretEntry {
                value: known("1"),
                digest: "def".into(),
                created_at: "t1".into(),
            },
        );
        observed.insert(
            "DRIFTED".into(),
            SecretEntry {
                value: Tracked::Unresolved,
                digest: "ghi".into(),
                created_at: "t1".into(),
            },
        );

        let desired: DesiredSecrets = [("SAME", "1"), ("CHANGED", "2"), ("DRIFTED", "1"), ("NEW", "1")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let planned = plan_secrets(&desired, &observed);
        assert_eq!(planned["SAME"].digest, known("abc"));
        assert_eq!(planned["SAME"].created_at, known("t1"));
        assert!(planned["CHANGED"].digest.is_unresolved());
        assert!(planned["DRIFTED"].digest.is_unresolved());
        assert!(planned["NEW"].digest.is_unresolved());
        assert_eq!(planned["NEW"].value, known("1"));
    }
}
