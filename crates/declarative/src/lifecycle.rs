//! Resource state machine
//!
//! [`Instance`] pairs a [`Lifecycle`] implementation with its tracked state
//! and enforces the allowed transitions:
//!
//! ```text
//! Absent --create--> Created --read--> Refreshing --> Created
//!                       |                  |
//!                       |                  +-- not found --> Deleted
//!                       +--update--> Updating --> Created
//!                       +--delete--> Deleted
//! Absent --import--> Created
//! ```

use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::resource::Lifecycle;
use std::fmt;

/// Lifecycle phase of a resource instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing tracked yet
    Absent,
    /// Entity exists and state is tracked
    Created,
    /// Read in progress
    Refreshing,
    /// Update in progress
    Updating,
    /// Entity deleted or found missing; nothing tracked
    Deleted,
}

impl Phase {
    /// Whether state is tracked in this phase
    pub fn is_tracked(&self) -> bool {
        matches!(self, Self::Created | Self::Refreshing | Self::Updating)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Absent => "absent",
            Self::Created => "created",
            Self::Refreshing => "refreshing",
            Self::Updating => "updating",
            Self::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

/// A resource instance with its tracked state
#[derive(Debug)]
pub struct Instance<L: Lifecycle> {
    resource: L,
    phase: Phase,
    state: Option<L::State>,
}

impl<L: Lifecycle> Instance<L> {
    /// A new, untracked instance
    pub fn new(resource: L) -> Self {
        Self {
            resource,
            phase: Phase::Absent,
            state: None,
        }
    }

    /// An instance resumed from previously tracked state
    pub fn tracked(resource: L, state: L::State) -> Self {
        Self {
            resource,
            phase: Phase::Created,
            state: Some(state),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> Option<&L::State> {
        self.state.as_ref()
    }

    pub fn resource(&self) -> &L {
        &self.resource
    }

    pub fn into_state(self) -> Option<L::State> {
        self.state
    }

    /// Create the entity, then converge its mutable attributes
    ///
    /// If convergence fails after the entity was created, the state stays
    /// tracked so the next pass can finish the job.
    pub fn create(
        &mut self,
        ctx: &mut ApplyContext<'_, L::Client>,
        config: &L::Config,
    ) -> Result<()> {
        if self.phase.is_tracked() {
            return Err(Error::validation(
                format!("Can't create {}", self.resource.type_name()),
                "Resource already exists in state",
            ));
        }

        let state = self.resource.create(ctx, config)?;
        log::info!("Created {}", self.resource.type_name());
        self.state = Some(state);
        self.phase = Phase::Created;

        let needs_update = self
            .state
            .as_ref()
            .is_some_and(|state| self.resource.needs_update(config, state));
        if needs_update {
            self.update(ctx, config)?;
        }
        Ok(())
    }

    /// Refresh tracked state from the remote
    ///
    /// An entity that no longer exists is dropped from state; that is not
    /// an error.
    pub fn refresh(&mut self, ctx: &mut ApplyContext<'_, L::Client>) -> Result<()> {
        let Some(state) = self.state.as_ref() else {
            return Ok(());
        };

        self.phase = Phase::Refreshing;
        match self.resource.read(ctx, state) {
            Ok(Some(refreshed)) => {
                self.state = Some(refreshed);
                self.phase = Phase::Created;
                Ok(())
            }
            Ok(None) => {
                log::info!("{} no longer exists, removing from state", self.resource.type_name());
                self.state = None;
                self.phase = Phase::Deleted;
                Ok(())
            }
            Err(err) => {
                self.phase = Phase::Created;
                Err(err)
            }
        }
    }

    /// Converge the tracked entity to the declared configuration
    pub fn update(
        &mut self,
        ctx: &mut ApplyContext<'_, L::Client>,
        config: &L::Config,
    ) -> Result<()> {
        let type_name = self.resource.type_name();
        let Some(state) = self.state.as_mut() else {
            return Err(Error::validation(
                format!("Can't update {}", type_name),
                "Resource is not tracked in state",
            ));
        };

        self.phase = Phase::Updating;
        let result = self.resource.update(ctx, config, state);
        self.phase = Phase::Created;
        if result.is_ok() {
            log::info!("Updated {}", type_name);
        }
        result
    }

    /// Delete the entity
    ///
    /// State is kept when the remote deletion fails.
    pub fn delete(&mut self, ctx: &mut ApplyContext<'_, L::Client>) -> Result<()> {
        let Some(state) = self.state.as_ref() else {
            return Ok(());
        };

        self.resource.delete(ctx, state)?;
        log::info!("Deleted {}", self.resource.type_name());
        self.state = None;
        self.phase = Phase::Deleted;
        Ok(())
    }

    /// Bind an external identifier and hydrate the state from the remote
    pub fn import(&mut self, ctx: &mut ApplyContext<'_, L::Client>, id: &str) -> Result<()> {
        match self.resource.import(ctx, id)? {
            Some(state) => {
                log::info!("Imported {} {}", self.resource.type_name(), id);
                self.state = Some(state);
                self.phase = Phase::Created;
                Ok(())
            }
            None => Err(Error::NotFound {
                entity: format!("{} {}", self.resource.type_name(), id),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::{SecretReconciler, SecretStore};
    use crate::resource::ensure_unchanged;
    use crate::types::{DesiredSecrets, ObservedSecrets, RemoteSecret, SecretInput};
    use crate::drift;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Entities by name, each with name -> (value, digest)
    #[derive(Default)]
    struct FakeClient {
        entities: Mutex<BTreeMap<String, BTreeMap<String, (String, String)>>>,
        calls: Mutex<Vec<String>>,
        fail_delete: bool,
    }

    impl FakeClient {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn snapshot(&self, entity: &str) -> Result<Vec<RemoteSecret>> {
            let entities = self.entities.lock().unwrap();
            let secrets = entities.get(entity).ok_or_else(|| Error::NotFound {
                entity: entity.to_string(),
            })?;
            Ok(secrets
                .iter()
                .map(|(name, (_, digest))| RemoteSecret {
                    id: name.clone(),
                    name: name.clone(),
                    digest: digest.clone(),
                    created_at: "t".into(),
                })
                .collect())
        }
    }

    impl SecretStore for FakeClient {
        fn set_secrets(&self, entity: &str, secrets: &[SecretInput]) -> Result<Vec<RemoteSecret>> {
            self.record("set");
            {
                let mut entities = self.entities.lock().unwrap();
                let stored = entities.get_mut(entity).ok_or_else(|| Error::NotFound {
                    entity: entity.to_string(),
                })?;
                for s in secrets {
                    stored.insert(s.name.clone(), (s.value.clone(), format!("d-{}", s.value)));
                }
            }
            self.snapshot(entity)
        }

        fn unset_secrets(&self, entity: &str, names: &[String]) -> Result<()> {
            self.record("unset");
            let mut entities = self.entities.lock().unwrap();
            if let Some(stored) = entities.get_mut(entity) {
                for name in names {
                    stored.remove(name);
                }
            }
            Ok(())
        }

        fn get_secrets(&self, entity: &str) -> Result<Vec<RemoteSecret>> {
            self.record("get");
            self.snapshot(entity)
        }
    }

    struct BoxConfig {
        name: String,
        secrets: DesiredSecrets,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct BoxState {
        name: String,
        secrets: ObservedSecrets,
    }

    #[derive(Debug)]
    struct BoxResource;

    impl Lifecycle for BoxResource {
        type Client = FakeClient;
        type Config = BoxConfig;
        type State = BoxState;

        fn type_name(&self) -> &'static str {
            "box"
        }

        fn create(&self, ctx: &mut ApplyContext<'_, FakeClient>, config: &BoxConfig) -> Result<BoxState> {
            ctx.client.record("create");
            ctx.client
                .entities
                .lock()
                .unwrap()
                .insert(config.name.clone(), BTreeMap::new());
            Ok(BoxState {
                name: config.name.clone(),
                secrets: ObservedSecrets::new(),
            })
        }

        fn read(&self, ctx: &mut ApplyContext<'_, FakeClient>, state: &BoxState) -> Result<Option<BoxState>> {
            match ctx.client.get_secrets(&state.name) {
                Ok(snapshot) => Ok(Some(BoxState {
                    name: state.name.clone(),
                    secrets: drift::refresh(&state.secrets, &snapshot).observed,
                })),
                Err(err) if err.is_not_found() => Ok(None),
                Err(err) => Err(err),
            }
        }

        fn update(
            &self,
            ctx: &mut ApplyContext<'_, FakeClient>,
            config: &BoxConfig,
            state: &mut BoxState,
        ) -> Result<()> {
            ensure_unchanged("name", state.name.as_str(), config.name.as_str())?;
            SecretReconciler::new(&state.name).reconcile(ctx, &config.secrets, &mut state.secrets)?;
            Ok(())
        }

        fn delete(&self, ctx: &mut ApplyContext<'_, FakeClient>, state: &BoxState) -> Result<()> {
            ctx.client.record("delete");
            if ctx.client.fail_delete {
                return Err(Error::transport("connection reset"));
            }
            ctx.client.entities.lock().unwrap().remove(&state.name);
            Ok(())
        }

        fn bind_import(&self, id: &str) -> Result<BoxState> {
            Ok(BoxState {
                name: id.to_string(),
                secrets: ObservedSecrets::new(),
            })
        }

        fn needs_update(&self, config: &BoxConfig, state: &BoxState) -> bool {
            config.name != state.name || !crate::diff::diff(&config.secrets, &state.secrets).is_empty()
        }
    }

    fn config(name: &str, secrets: &[(&str, &str)]) -> BoxConfig {
        BoxConfig {
            name: name.to_string(),
            secrets: secrets
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_create_converges_initial_secrets() {
        let client = FakeClient::default();
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::new(BoxResource);
        assert_eq!(instance.phase(), Phase::Absent);

        instance.create(&mut ctx, &config("web", &[("A", "1")])).unwrap();

        assert_eq!(instance.phase(), Phase::Created);
        assert_eq!(client.calls(), vec!["create", "set"]);
        assert_eq!(instance.state().unwrap().secrets["A"].digest, "d-1");
    }

    #[test]
    fn test_create_without_secrets_makes_one_call() {
        let client = FakeClient::default();
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::new(BoxResource);

        instance.create(&mut ctx, &config("web", &[])).unwrap();
        assert_eq!(client.calls(), vec!["create"]);
    }

    #[test]
    fn test_create_twice_is_rejected() {
        let client = FakeClient::default();
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::new(BoxResource);
        instance.create(&mut ctx, &config("web", &[])).unwrap();

        assert!(instance.create(&mut ctx, &config("web", &[])).is_err());
    }

    #[test]
    fn test_refresh_missing_entity_drops_state() {
        let client = FakeClient::default();
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::new(BoxResource);
        instance.create(&mut ctx, &config("web", &[])).unwrap();

        client.entities.lock().unwrap().clear();
        instance.refresh(&mut ctx).unwrap();

        assert_eq!(instance.phase(), Phase::Deleted);
        assert!(instance.state().is_none());
    }

    #[test]
    fn test_update_rejects_immutable_change_before_remote_call() {
        let client = FakeClient::default();
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::tracked(
            BoxResource,
            BoxState {
                name: "web".into(),
                secrets: ObservedSecrets::new(),
            },
        );

        let err = instance
            .update(&mut ctx, &config("api", &[("A", "1")]))
            .unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Validation);
        assert!(client.calls().is_empty());
        assert_eq!(instance.phase(), Phase::Created);
    }

    #[test]
    fn test_delete_keeps_state_on_error() {
        let client = FakeClient {
            fail_delete: true,
            ..FakeClient::default()
        };
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::new(BoxResource);
        instance.create(&mut ctx, &config("web", &[("A", "1")])).unwrap();

        assert!(instance.delete(&mut ctx).is_err());
        assert!(instance.state().is_some());
        assert_eq!(instance.phase(), Phase::Created);
    }

    #[test]
    fn test_delete_does_not_unset_children() {
        let client = FakeClient::default();
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::new(BoxResource);
        instance.create(&mut ctx, &config("web", &[("A", "1")])).unwrap();

        instance.delete(&mut ctx).unwrap();
        assert_eq!(client.calls(), vec!["create", "set", "delete"]);
        assert_eq!(instance.phase(), Phase::Deleted);
        assert!(instance.into_state().is_none());
    }

    #[test]
    fn test_import_binds_then_reads() {
        let client = FakeClient::default();
        client
            .entities
            .lock()
            .unwrap()
            .insert("web".into(), BTreeMap::new());
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::new(BoxResource);

        instance.import(&mut ctx, "web").unwrap();
        assert_eq!(instance.phase(), Phase::Created);
        assert_eq!(instance.state().unwrap().name, "web");
        assert_eq!(client.calls(), vec!["get"]);

        let mut missing = Instance::new(BoxResource);
        assert!(missing.import(&mut ctx, "nope").unwrap_err().is_not_found());
    }
}
