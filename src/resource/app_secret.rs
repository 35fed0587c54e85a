//! A single secret managed on its own
//!
//! Unlike the secret map of an app, each secret here is a resource of its
//! own: one set batch per create or update, one unset on delete.

use super::{Describe, KNOWN_AFTER_APPLY, ResourceKind, parse_import_id};
use declarative::{
    ApplyContext, Error, Lifecycle, RemoteSecret, Result, SecretEntry, SecretInput, SecretStore,
    Tracked, ensure_unchanged, freeze, refresh_entry,
};
use flyapi::Client;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared secret
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretConfig {
    /// Owning app name; immutable
    pub app: String,
    /// Secret name; immutable
    pub name: String,
    pub value: String,
}

impl fmt::Debug for SecretConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretConfig")
            .field("app", &self.app)
            .field("name", &self.name)
            .field("value", &"<sensitive>")
            .finish()
    }
}

/// Tracked secret
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSecretState {
    pub app: String,
    pub name: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Tracked::is_unresolved")]
    pub value: Tracked<String>,
    pub digest: String,
    pub created_at: String,
}

impl AppSecretState {
    fn entry(&self) -> SecretEntry {
        SecretEntry {
            value: self.value.clone(),
            digest: self.digest.clone(),
            created_at: self.created_at.clone(),
        }
    }

    fn from_remote(app: &str, value: Tracked<String>, remote: &RemoteSecret) -> Self {
        Self {
            app: app.to_string(),
            name: remote.name.clone(),
            id: remote.id.clone(),
            value,
            digest: remote.digest.clone(),
            created_at: remote.created_at.clone(),
        }
    }
}

impl fmt::Debug for AppSecretState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppSecretState")
            .field("app", &self.app)
            .field("name", &self.name)
            .field("id", &self.id)
            .field("value", &self.value.as_known().map(|_| "<sensitive>"))
            .field("digest", &self.digest)
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AppSecretResource;

impl AppSecretResource {
    /// Set the secret and record what the store assigned to it
    fn write(&self, ctx: &mut ApplyContext<'_, Client>, config: &SecretConfig) -> Result<AppSecretState> {
        let client = ctx.client;
        let input = [SecretInput::new(config.name.as_str(), config.value.as_str())];
        let snapshot = match client.set_secrets(&config.app, &input) {
            Ok(snapshot) => snapshot,
            Err(err) if err.is_no_op() => {
                ctx.warn(
                    "SetSecrets was no-op",
                    format!(
                        "Secret {} of {} already holds this value: {}",
                        config.name, config.app, err
                    ),
                );
                let snapshot = client.get_secrets(&config.app)?;
                ctx.warn(
                    "State may have drifted",
                    format!(
                        "Another actor may have already set {}; digest and timestamp were re-read",
                        config.name
                    ),
                );
                snapshot
            }
            Err(err) => return Err(err),
        };

        let remote = snapshot
            .iter()
            .find(|s| s.name == config.name)
            .ok_or_else(|| Error::MissingSecret {
                name: config.name.clone(),
            })?;
        ctx.ensure_not_cancelled()?;
        Ok(AppSecretState::from_remote(
            &config.app,
            Tracked::Known(config.value.clone()),
            remote,
        ))
    }
}

impl Lifecycle for AppSecretResource {
    type Client = Client;
    type Config = SecretConfig;
    type State = AppSecretState;

    fn type_name(&self) -> &'static str {
        "secret"
    }

    fn create(
        &self,
        ctx: &mut ApplyContext<'_, Client>,
        config: &SecretConfig,
    ) -> Result<AppSecretState> {
        self.write(ctx, config)
    }

    fn read(
        &self,
        ctx: &mut ApplyContext<'_, Client>,
        state: &AppSecretState,
    ) -> Result<Option<AppSecretState>> {
        let snapshot = match ctx.client.get_secrets(&state.app) {
            Ok(snapshot) => snapshot,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };

        let remote = snapshot.iter().find(|s| s.name == state.name);
        let Some(entry) = refresh_entry(&state.entry(), remote) else {
            return Ok(None);
        };
        let Some(remote) = remote else {
            return Ok(None);
        };

        let value = if state.id.is_empty() || state.id == remote.id {
            entry.value
        } else {
            Tracked::Unresolved
        };
        Ok(Some(AppSecretState::from_remote(&state.app, value, remote)))
    }

    fn update(
        &self,
        ctx: &mut ApplyContext<'_, Client>,
        config: &SecretConfig,
        state: &mut AppSecretState,
    ) -> Result<()> {
        ensure_unchanged("app", state.app.as_str(), config.app.as_str())?;
        ensure_unchanged("name", state.name.as_str(), config.name.as_str())?;
        if state.value.as_known() == Some(&config.value) {
            return Ok(());
        }
        *state = self.write(ctx, config)?;
        Ok(())
    }

    fn delete(&self, ctx: &mut ApplyContext<'_, Client>, state: &AppSecretState) -> Result<()> {
        match ctx
            .client
            .unset_secrets(&state.app, std::slice::from_ref(&state.name))
        {
            Err(err) if err.is_not_found() || err.is_no_op() => {
                log::debug!("Secret {} of {} already gone: {}", state.name, state.app, err);
                Ok(())
            }
            other => other,
        }
    }

    fn bind_import(&self, id: &str) -> Result<AppSecretState> {
        let mut fields = parse_import_id(ResourceKind::Secret, id, 2)?;
        let name = fields.remove(1);
        let app = fields.remove(0);
        Ok(AppSecretState {
            app,
            name,
            ..AppSecretState::default()
        })
    }

    fn needs_update(&self, config: &SecretConfig, state: &AppSecretState) -> bool {
        config.app != state.app
            || config.name != state.name
            || state.value.as_known() != Some(&config.value)
    }
}

impl Describe for AppSecretResource {
    const KIND: ResourceKind = ResourceKind::Secret;

    fn key(config: &SecretConfig) -> String {
        format!("{}.{}", config.app, config.name)
    }

    fn tracked_key(state: &AppSecretState) -> String {
        format!("{}.{}", state.app, state.name)
    }

    fn describe(config: &SecretConfig, state: Option<&AppSecretState>) -> Vec<String> {
        let Some(state) = state else {
            return vec![
                format!("app = {}", config.app),
                format!("name = {}", config.name),
                "value = (sensitive)".to_string(),
                format!("id = {}", KNOWN_AFTER_APPLY),
                format!("digest = {}", KNOWN_AFTER_APPLY),
                format!("created_at = {}", KNOWN_AFTER_APPLY),
            ];
        };

        let mut lines = Vec::new();
        if config.app != state.app {
            lines.push(format!("app: {} -> {} (immutable)", state.app, config.app));
        }
        if config.name != state.name {
            lines.push(format!("name: {} -> {} (immutable)", state.name, config.name));
        }

        let planned = Tracked::Known(config.value.clone());
        let digest = freeze(
            Some(&state.digest),
            Tracked::Unresolved,
            Some(&state.value),
            &planned,
        );
        if digest.is_unresolved() {
            lines.push("~ value (sensitive)".to_string());
            lines.push(format!("~ digest {} -> {}", state.digest, KNOWN_AFTER_APPLY));
        }
        lines
    }

    fn summarize(state: &AppSecretState) -> Vec<String> {
        vec![
            format!("id = {}", state.id),
            format!("digest = {}", state.digest),
            format!("created_at = {}", state.created_at),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{ErrorCategory, Instance, Phase};
    use flyapi::backend::{Call, MockBackend, mock_digest};

    fn setup() -> (Client, MockBackend) {
        let mock = MockBackend::new();
        mock.seed_app("web");
        (Client::with_backend(Box::new(mock.clone())), mock)
    }

    fn config(name: &str, value: &str) -> SecretConfig {
        SecretConfig {
            app: "web".into(),
            name: name.into(),
            value: value.into(),
        }
    }

    #[test]
    fn test_create_records_id_and_digest() {
        let (client, mock) = setup();
        let mut ctx = ApplyContext::new(&client);

        let state = AppSecretResource.create(&mut ctx, &config("TOKEN", "s3cret")).unwrap();
        assert!(!state.id.is_empty());
        assert_eq!(state.digest, mock_digest("s3cret"));
        assert_eq!(state.value, Tracked::Known("s3cret".into()));
        assert_eq!(mock.secret_names("web"), vec!["TOKEN".to_string()]);
    }

    #[test]
    fn test_create_existing_value_is_no_op_with_warning() {
        let (client, mock) = setup();
        mock.seed_secret("web", "TOKEN", "s3cret").unwrap();
        let mut ctx = ApplyContext::new(&client);

        let state = AppSecretResource.create(&mut ctx, &config("TOKEN", "s3cret")).unwrap();
        assert_eq!(state.digest, mock_digest("s3cret"));
        let summaries: Vec<&str> = ctx.diagnostics.warnings().map(|w| w.summary.as_str()).collect();
        assert_eq!(summaries, vec!["SetSecrets was no-op", "State may have drifted"]);
        assert_eq!(mock.calls().last(), Some(&Call::GetSecrets("web".into())));
    }

    #[test]
    fn test_read_marks_value_unresolved_on_drift() {
        let (client, mock) = setup();
        let mut ctx = ApplyContext::new(&client);
        let state = AppSecretResource.create(&mut ctx, &config("TOKEN", "a")).unwrap();

        let same = AppSecretResource.read(&mut ctx, &state).unwrap().unwrap();
        assert_eq!(same, state);

        mock.seed_secret("web", "TOKEN", "b").unwrap();
        let drifted = AppSecretResource.read(&mut ctx, &state).unwrap().unwrap();
        assert!(drifted.value.is_unresolved());
        assert_eq!(drifted.digest, mock_digest("b"));
        assert!(AppSecretResource.needs_update(&config("TOKEN", "a"), &drifted));
    }

    #[test]
    fn test_read_missing_secret_or_app() {
        let (client, mock) = setup();
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::new(AppSecretResource);
        instance.create(&mut ctx, &config("TOKEN", "a")).unwrap();

        mock.remove_secret("web", "TOKEN");
        instance.refresh(&mut ctx).unwrap();
        assert_eq!(instance.phase(), Phase::Deleted);

        let mut instance = Instance::new(AppSecretResource);
        instance.create(&mut ctx, &config("OTHER", "a")).unwrap();
        mock.remove_app("web");
        instance.refresh(&mut ctx).unwrap();
        assert!(instance.state().is_none());
    }

    #[test]
    fn test_update_rewrites_changed_value_only() {
        let (client, mock) = setup();
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::new(AppSecretResource);
        instance.create(&mut ctx, &config("TOKEN", "a")).unwrap();

        mock.clear_calls();
        instance.update(&mut ctx, &config("TOKEN", "a")).unwrap();
        assert!(mock.calls().is_empty());

        instance.update(&mut ctx, &config("TOKEN", "b")).unwrap();
        assert_eq!(instance.state().unwrap().digest, mock_digest("b"));

        let err = instance.update(&mut ctx, &config("RENAMED", "b")).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_delete_unsets_one_name() {
        let (client, mock) = setup();
        mock.seed_secret("web", "KEEP", "x").unwrap();
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::new(AppSecretResource);
        instance.create(&mut ctx, &config("TOKEN", "a")).unwrap();

        instance.delete(&mut ctx).unwrap();
        assert_eq!(mock.secret_names("web"), vec!["KEEP".to_string()]);

        let gone = AppSecretState {
            app: "web".into(),
            name: "TOKEN".into(),
            ..AppSecretState::default()
        };
        assert!(AppSecretResource.delete(&mut ctx, &gone).is_ok());
    }

    #[test]
    fn test_import() {
        let (client, mock) = setup();
        mock.seed_secret("web", "TOKEN", "a").unwrap();
        let mut ctx = ApplyContext::new(&client);

        let state = AppSecretResource.import(&mut ctx, "web,TOKEN").unwrap().unwrap();
        assert_eq!(state.digest, mock_digest("a"));
        assert!(state.value.is_unresolved());

        let err = AppSecretResource.bind_import("web").unwrap_err();
        assert!(err.to_string().contains("<app_name>,<secret_name>"));
    }

    #[test]
    fn test_describe_freezes_unchanged_digest() {
        let state = AppSecretState {
            app: "web".into(),
            name: "TOKEN".into(),
            id: "sec_1".into(),
            value: Tracked::Known("a".into()),
            digest: "abc".into(),
            created_at: "2024-01-01T00:00:00Z".into(),
        };
        assert!(AppSecretResource::describe(&config("TOKEN", "a"), Some(&state)).is_empty());

        let lines = AppSecretResource::describe(&config("TOKEN", "b"), Some(&state));
        assert_eq!(lines[1], format!("~ digest abc -> {}", KNOWN_AFTER_APPLY));

        let lines = AppSecretResource::describe(&config("TOKEN", "b"), None);
        assert!(lines.contains(&"value = (sensitive)".to_string()));
    }

    #[test]
    fn test_debug_redacts_value() {
        let cfg = config("TOKEN", "hunter2");
        assert!(!format!("{:?}", cfg).contains("hunter2"));
    }
}
