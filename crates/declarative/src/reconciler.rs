//! Batched secret reconciliation
//!
//! Applies a [`SecretDiff`](crate::diff::SecretDiff) as at most two remote
//! calls: one unset batch, then one set batch. Results of a batch are staged
//! and only committed to observed state once the whole step succeeded.

use crate::context::{ApplyContext, BatchOp, BatchOutcome};
use crate::diff::diff;
use crate::error::{Error, Result};
use crate::types::{DesiredSecrets, ObservedSecrets, RemoteSecret, SecretEntry, SecretInput};
use std::collections::{BTreeSet, HashMap};

/// Remote secret store capability
///
/// Each batch is applied by the store as a unit: it either succeeds as a
/// whole or fails as a whole.
pub trait SecretStore {
    /// Set a batch of secrets and return the store's complete secret set
    fn set_secrets(&self, entity: &str, secrets: &[SecretInput]) -> Result<Vec<RemoteSecret>>;

    /// Unset a batch of secrets
    fn unset_secrets(&self, entity: &str, names: &[String]) -> Result<()>;

    /// Fetch the store's complete secret set
    fn get_secrets(&self, entity: &str) -> Result<Vec<RemoteSecret>>;
}

/// Outcome of a set batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The store applied the batch
    Applied,
    /// The store reported no effective change; values came from a compensating read
    NoOp,
}

/// What a reconciliation pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: usize,
    pub changed: usize,
    pub removed: usize,
    /// The set batch was a no-op
    pub no_op: bool,
}

impl ReconcileSummary {
    pub fn total_changes(&self) -> usize {
        self.added + self.changed + self.removed
    }

    /// Fold another summary into this one
    pub fn merge(&mut self, other: Self) {
        self.added += other.added;
        self.changed += other.changed;
        self.removed += other.removed;
        self.no_op |= other.no_op;
    }
}

/// Reconciles the secrets of one remote entity
#[derive(Debug, Clone, Copy)]
pub struct SecretReconciler<'e> {
    entity: &'e str,
}

impl<'e> SecretReconciler<'e> {
    pub fn new(entity: &'e str) -> Self {
        Self { entity }
    }

    /// Converge observed secrets to desired: diff, unset, then set
    ///
    /// Makes no remote call when there is nothing to do. An unset that
    /// succeeded before a failing set stays applied to `observed`.
    pub fn reconcile<C>(
        &self,
        ctx: &mut ApplyContext<'_, C>,
        desired: &DesiredSecrets,
        observed: &mut ObservedSecrets,
    ) -> Result<ReconcileSummary>
    where
        C: SecretStore + ?Sized,
    {
        let diff = diff(desired, observed);
        if diff.is_empty() {
            log::debug!("Secrets of {} are up to date", self.entity);
            return Ok(ReconcileSummary::default());
        }

        let mut summary = ReconcileSummary::default();

        if !diff.to_remove.is_empty() {
            self.unset(ctx, &diff.to_remove, observed)?;
            summary.removed = diff.to_remove.len();
        }

        let batch = diff.set_batch(desired);
        if !batch.is_empty() {
            let outcome = self.set(ctx, &batch, observed)?;
            summary.added = diff.to_add.len();
            summary.changed = diff.to_change.len();
            summary.no_op = outcome == SetOutcome::NoOp;
        }

        Ok(summary)
    }

    /// Issue one set batch and record digest/timestamp for the requested names
    pub fn set<C>(
        &self,
        ctx: &mut ApplyContext<'_, C>,
        batch: &DesiredSecrets,
        observed: &mut ObservedSecrets,
    ) -> Result<SetOutcome>
    where
        C: SecretStore + ?Sized,
    {
        let names: Vec<String> = batch.keys().cloned().collect();
        let inputs: Vec<SecretInput> = batch
            .iter()
            .map(|(name, value)| SecretInput::new(name.as_str(), value.as_str()))
            .collect();

        ctx.progress().on_batch_start(BatchOp::Set, self.entity, &names);
        log::debug!("Setting {} secret(s) on {}", names.len(), self.entity);

        let result = self.run_set(ctx, &inputs, batch);
        let outcome = match &result {
            Ok((_, SetOutcome::Applied)) => BatchOutcome::Applied,
            Ok((_, SetOutcome::NoOp)) => BatchOutcome::NoOp,
            Err(_) => BatchOutcome::Failed,
        };
        ctx.progress().on_batch_complete(BatchOp::Set, self.entity, outcome);

        let (staged, outcome) = result?;
        observed.extend(staged);
        Ok(outcome)
    }

    fn run_set<C>(
        &self,
        ctx: &mut ApplyContext<'_, C>,
        inputs: &[SecretInput],
        batch: &DesiredSecrets,
    ) -> Result<(ObservedSecrets, SetOutcome)>
    where
        C: SecretStore + ?Sized,
    {
        let client = ctx.client;
        let (snapshot, outcome) = match client.set_secrets(self.entity, inputs) {
            Ok(snapshot) => (snapshot, SetOutcome::Applied),
            Err(err) if err.is_no_op() => {
                ctx.warn(
                    "SetSecrets was no-op",
                    format!(
                        "The requested secrets of {} already match the stored content: {}",
                        self.entity, err
                    ),
                );
                let snapshot = client.get_secrets(self.entity)?;
                ctx.warn(
                    "State may have drifted",
                    "Another actor may have already set these values; digest and timestamp were re-read",
                );
                (snapshot, SetOutcome::NoOp)
            }
            Err(err) => return Err(err),
        };

        let staged = stage(batch, &snapshot)?;
        ctx.ensure_not_cancelled()?;
        Ok((staged, outcome))
    }

    /// Issue one unset batch and drop the names from observed state
    ///
    /// A no-op unset means the names are already gone; it is recorded as a
    /// warning and treated as success.
    pub fn unset<C>(
        &self,
        ctx: &mut ApplyContext<'_, C>,
        names: &BTreeSet<String>,
        observed: &mut ObservedSecrets,
    ) -> Result<()>
    where
        C: SecretStore + ?Sized,
    {
        let names: Vec<String> = names.iter().cloned().collect();
        ctx.progress().on_batch_start(BatchOp::Unset, self.entity, &names);
        log::debug!("Unsetting {} secret(s) on {}", names.len(), self.entity);

        let client = ctx.client;
        let result = match client.unset_secrets(self.entity, &names) {
            Ok(()) => Ok(BatchOutcome::Applied),
            Err(err) if err.is_no_op() => {
                ctx.warn(
                    "UnsetSecrets was no-op",
                    format!("The secrets of {} were already removed: {}", self.entity, err),
                );
                Ok(BatchOutcome::NoOp)
            }
            Err(err) => Err(err),
        }
        .and_then(|outcome| ctx.ensure_not_cancelled().map(|()| outcome));

        let outcome = result.as_ref().copied().unwrap_or(BatchOutcome::Failed);
        ctx.progress().on_batch_complete(BatchOp::Unset, self.entity, outcome);
        result?;

        for name in &names {
            observed.remove(name);
        }
        Ok(())
    }
}

/// Match the store's response by name for the requested secrets only
fn stage(batch: &DesiredSecrets, snapshot: &[RemoteSecret]) -> Result<ObservedSecrets> {
    let by_name: HashMap<&str, &RemoteSecret> =
        snapshot.iter().map(|s| (s.name.as_str(), s)).collect();

    batch
        .iter()
        .map(|(name, value)| {
            let remote = by_name
                .get(name.as_str())
                .ok_or_else(|| Error::MissingSecret { name: name.clone() })?;
            Ok((name.clone(), SecretEntry::from_remote(value.as_str(), remote)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Cancellation, ProgressCallback};
    use crate::types::Tracked;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Set(Vec<(String, String)>),
        Unset(Vec<String>),
        Get,
    }

    /// In-memory store: name -> (value, digest, created_at)
    #[derive(Default)]
    struct FakeStore {
        secrets: Mutex<BTreeMap<String, (String, String, String)>>,
        calls: Mutex<Vec<Call>>,
        clock: Mutex<u32>,
        drop_from_response: Option<String>,
        fail_set: bool,
        fail_get: bool,
        cancel_on_set: Option<Cancellation>,
    }

    impl FakeStore {
        fn seed(&self, name: &str, value: &str, digest: &str) {
            self.secrets.lock().unwrap().insert(
                name.to_string(),
                (value.to_string(), digest.to_string(), "t0".to_string()),
            );
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn snapshot(&self) -> Vec<RemoteSecret> {
            self.secrets
                .lock()
                .unwrap()
                .iter()
                .filter(|(name, _)| Some(*name) != self.drop_from_response.as_ref())
                .map(|(name, (_, digest, created_at))| RemoteSecret {
                    id: format!("id-{}", name),
                    name: name.clone(),
                    digest: digest.clone(),
                    created_at: created_at.clone(),
                })
                .collect()
        }
    }

    impl SecretStore for FakeStore {
        fn set_secrets(&self, _entity: &str, secrets: &[SecretInput]) -> Result<Vec<RemoteSecret>> {
            self.calls.lock().unwrap().push(Call::Set(
                secrets.iter().map(|s| (s.name.clone(), s.value.clone())).collect(),
            ));
            if let Some(cancel) = &self.cancel_on_set {
                cancel.cancel();
            }
            if self.fail_set {
                return Err(Error::remote("internal error"));
            }
            {
                let mut store = self.secrets.lock().unwrap();
                let unchanged = secrets
                    .iter()
                    .all(|s| store.get(&s.name).is_some_and(|(v, _, _)| *v == s.value));
                if unchanged {
                    return Err(Error::NoOp {
                        message: "No change detected".into(),
                    });
                }
                let mut clock = self.clock.lock().unwrap();
                for s in secrets {
                    *clock += 1;
                    store.insert(
                        s.name.clone(),
                        (s.value.clone(), format!("digest-{}", s.value), format!("t{}", clock)),
                    );
                }
            }
            Ok(self.snapshot())
        }

        fn unset_secrets(&self, _entity: &str, names: &[String]) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Unset(names.to_vec()));
            let mut store = self.secrets.lock().unwrap();
            let mut removed = false;
            for name in names {
                removed |= store.remove(name).is_some();
            }
            if !removed {
                return Err(Error::NoOp {
                    message: "No change detected".into(),
                });
            }
            Ok(())
        }

        fn get_secrets(&self, _entity: &str) -> Result<Vec<RemoteSecret>> {
            self.calls.lock().unwrap().push(Call::Get);
            if self.fail_get {
                return Err(Error::Transport {
                    message: "connection reset".into(),
                });
            }
            Ok(self.snapshot())
        }
    }

    fn desired(pairs: &[(&str, &str)]) -> DesiredSecrets {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn observed(name: &str, value: &str, digest: &str) -> ObservedSecrets {
        let mut o = ObservedSecrets::new();
        o.insert(
            name.to_string(),
            SecretEntry {
                value: Tracked::Known(value.to_string()),
                digest: digest.to_string(),
                created_at: "t0".to_string(),
            },
        );
        o
    }

    #[test]
    fn test_add_to_empty() {
        let store = FakeStore::default();
        let mut ctx = ApplyContext::new(&store);
        let mut obs = ObservedSecrets::new();

        let summary = SecretReconciler::new("app")
            .reconcile(&mut ctx, &desired(&[("A", "1")]), &mut obs)
            .unwrap();

        assert_eq!(store.calls(), vec![Call::Set(vec![("A".into(), "1".into())])]);
        assert_eq!(summary.added, 1);
        assert_eq!(obs["A"].value, Tracked::Known("1".into()));
        assert_eq!(obs["A"].digest, "digest-1");
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn test_change_updates_digest() {
        let store = FakeStore::default();
        store.seed("A", "1", "d1");
        let mut ctx = ApplyContext::new(&store);
        let mut obs = observed("A", "1", "d1");

        let summary = SecretReconciler::new("app")
            .reconcile(&mut ctx, &desired(&[("A", "2")]), &mut obs)
            .unwrap();

        assert_eq!(store.calls(), vec![Call::Set(vec![("A".into(), "2".into())])]);
        assert_eq!(summary.changed, 1);
        assert_eq!(obs["A"].value, Tracked::Known("2".into()));
        assert_ne!(obs["A"].digest, "d1");
    }

    #[test]
    fn test_no_op_triggers_compensating_read() {
        let store = FakeStore::default();
        store.seed("A", "1", "d-remote");
        let mut ctx = ApplyContext::new(&store);
        let mut obs = ObservedSecrets::new();

        let summary = SecretReconciler::new("app")
            .reconcile(&mut ctx, &desired(&[("A", "1")]), &mut obs)
            .unwrap();

        assert_eq!(
            store.calls(),
            vec![Call::Set(vec![("A".into(), "1".into())]), Call::Get]
        );
        assert!(summary.no_op);
        assert_eq!(obs["A"].value, Tracked::Known("1".into()));
        assert_eq!(obs["A"].digest, "d-remote");
        assert_eq!(obs["A"].created_at, "t0");

        let warnings: Vec<_> = ctx.diagnostics.warnings().map(|d| d.summary.clone()).collect();
        assert_eq!(warnings, vec!["SetSecrets was no-op", "State may have drifted"]);
    }

    #[test]
    fn test_failed_compensating_read_skips_drift_warning() {
        let store = FakeStore {
            fail_get: true,
            ..FakeStore::default()
        };
        store.seed("A", "1", "d-remote");
        let mut ctx = ApplyContext::new(&store);
        let mut obs = ObservedSecrets::new();

        let err = SecretReconciler::new("app")
            .reconcile(&mut ctx, &desired(&[("A", "1")]), &mut obs)
            .unwrap_err();

        assert!(matches!(err, Error::Transport { .. }));
        assert!(obs.is_empty());
        let warnings: Vec<_> = ctx.diagnostics.warnings().map(|d| d.summary.clone()).collect();
        assert_eq!(warnings, vec!["SetSecrets was no-op"]);
    }

    #[test]
    fn test_idempotent_makes_no_calls() {
        let store = FakeStore::default();
        store.seed("A", "1", "d1");
        let mut ctx = ApplyContext::new(&store);
        let mut obs = observed("A", "1", "d1");

        let summary = SecretReconciler::new("app")
            .reconcile(&mut ctx, &desired(&[("A", "1")]), &mut obs)
            .unwrap();

        assert!(store.calls().is_empty());
        assert_eq!(summary.total_changes(), 0);
    }

    #[test]
    fn test_unmanaged_never_in_batches() {
        let store = FakeStore::default();
        store.seed("UNMANAGED", "x", "dx");
        store.seed("OLD", "o", "do");
        let mut ctx = ApplyContext::new(&store);
        let mut obs = observed("OLD", "o", "do");

        SecretReconciler::new("app")
            .reconcile(&mut ctx, &desired(&[("NEW", "n")]), &mut obs)
            .unwrap();

        let calls = store.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], Call::Unset(vec!["OLD".into()]));
        assert_eq!(calls[1], Call::Set(vec![("NEW".into(), "n".into())]));
        assert!(!obs.contains_key("UNMANAGED"));
        assert!(!obs.contains_key("OLD"));
        assert!(store.secrets.lock().unwrap().contains_key("UNMANAGED"));
    }

    #[test]
    fn test_remove_before_add_keeps_partial_progress() {
        let store = FakeStore {
            fail_set: true,
            ..FakeStore::default()
        };
        store.seed("OLD", "o", "do");
        let mut ctx = ApplyContext::new(&store);
        let mut obs = observed("OLD", "o", "do");

        let err = SecretReconciler::new("app")
            .reconcile(&mut ctx, &desired(&[("NEW", "n")]), &mut obs)
            .unwrap_err();

        assert!(matches!(err, Error::Remote { .. }));
        assert!(!obs.contains_key("OLD"));
        assert!(!obs.contains_key("NEW"));
    }

    #[test]
    fn test_missing_name_fails_batch() {
        let store = FakeStore {
            drop_from_response: Some("B".into()),
            ..FakeStore::default()
        };
        let mut ctx = ApplyContext::new(&store);
        let mut obs = ObservedSecrets::new();

        let err = SecretReconciler::new("app")
            .reconcile(&mut ctx, &desired(&[("A", "1"), ("B", "2")]), &mut obs)
            .unwrap_err();

        assert!(matches!(err, Error::MissingSecret { ref name } if name == "B"));
        assert!(obs.is_empty());
    }

    #[test]
    fn test_cancelled_batch_is_not_committed() {
        let cancel = Cancellation::new();
        let store = FakeStore {
            cancel_on_set: Some(cancel.clone()),
            ..FakeStore::default()
        };
        let mut ctx = ApplyContext::new(&store).with_cancellation(cancel);
        let mut obs = ObservedSecrets::new();

        let err = SecretReconciler::new("app")
            .reconcile(&mut ctx, &desired(&[("A", "1")]), &mut obs)
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(obs.is_empty());
    }

    #[test]
    fn test_unset_no_op_is_warning() {
        let store = FakeStore::default();
        let mut ctx = ApplyContext::new(&store);
        let mut obs = observed("GONE", "v", "d");

        SecretReconciler::new("app")
            .reconcile(&mut ctx, &DesiredSecrets::new(), &mut obs)
            .unwrap();

        assert!(obs.is_empty());
        assert_eq!(ctx.diagnostics.warnings().count(), 1);
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl ProgressCallback for Recorder {
        fn on_batch_start(&mut self, op: BatchOp, entity: &str, names: &[String]) {
            self.0
                .lock()
                .unwrap()
                .push(format!("start {} {} {}", op, entity, names.join(",")));
        }

        fn on_batch_complete(&mut self, op: BatchOp, entity: &str, outcome: BatchOutcome) {
            self.0
                .lock()
                .unwrap()
                .push(format!("done {} {} {:?}", op, entity, outcome));
        }
    }

    #[test]
    fn test_progress_callbacks() {
        let store = FakeStore::default();
        store.seed("OLD", "o", "do");
        let recorder = Recorder::default();
        let mut ctx = ApplyContext::new(&store).with_progress(recorder.clone());
        let mut obs = observed("OLD", "o", "do");

        SecretReconciler::new("app")
            .reconcile(&mut ctx, &desired(&[("A", "1")]), &mut obs)
            .unwrap();

        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start unset app OLD",
                "done unset app Applied",
                "start set app A",
                "done set app Applied",
            ]
        );
    }

    #[test]
    fn test_summary_merge() {
        let mut a = ReconcileSummary {
            added: 1,
            ..Default::default()
        };
        a.merge(ReconcileSummary {
            removed: 2,
            no_op: true,
            ..Default::default()
        });
        assert_eq!(a.total_changes(), 3);
        assert!(a.no_op);
    }
}
