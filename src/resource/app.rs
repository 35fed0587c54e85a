//! Fly app with its managed secret set
//!
//! The app owns a map of secrets declared alongside it. Secrets set on the
//! app by anything else are unmanaged and never touched.

use super::{Describe, KNOWN_AFTER_APPLY, ResourceKind, found, ignore_missing, parse_import_id};
use declarative::{
    ApplyContext, DesiredSecrets, Lifecycle, ObservedSecrets, RemoteSecret, Result,
    SecretReconciler, Tracked, diff, ensure_unchanged, plan_secrets, refresh,
};
use flyapi::Client;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared app
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// App name; immutable
    pub name: String,
    /// Organization slug; immutable. The personal organization when omitted.
    #[serde(default)]
    pub org: Option<String>,
    /// Managed secrets
    #[serde(default)]
    pub secrets: DesiredSecrets,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("name", &self.name)
            .field("org", &self.org)
            .field("secrets", &self.secrets.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Tracked app
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    pub id: String,
    pub name: String,
    /// Organization slug
    pub org: String,
    pub org_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_url: Option<String>,
    #[serde(default)]
    pub secrets: ObservedSecrets,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AppResource;

impl Lifecycle for AppResource {
    type Client = Client;
    type Config = AppConfig;
    type State = AppState;

    fn type_name(&self) -> &'static str {
        "app"
    }

    fn create(&self, ctx: &mut ApplyContext<'_, Client>, config: &AppConfig) -> Result<AppState> {
        let org = ctx.client.resolve_org(config.org.as_deref())?;
        let app = ctx.client.create_app(&config.name, &org.id)?;
        Ok(AppState {
            id: app.id,
            name: app.name,
            org: org.slug,
            org_id: org.id,
            app_url: app.app_url,
            secrets: ObservedSecrets::new(),
        })
    }

    fn read(&self, ctx: &mut ApplyContext<'_, Client>, state: &AppState) -> Result<Option<AppState>> {
        let Some(app) = found(ctx.client.get_app(&state.name))? else {
            return Ok(None);
        };

        let snapshot: Vec<RemoteSecret> = app.secrets.iter().map(RemoteSecret::from).collect();
        let refreshed = refresh(&state.secrets, &snapshot);
        if refreshed.has_drift() {
            let mut names = refreshed.drifted.clone();
            names.extend(refreshed.removed.iter().cloned());
            ctx.warn(
                format!("Secrets of {} changed outside flyform", state.name),
                format!("Affected: {}", names.join(", ")),
            );
        }

        Ok(Some(AppState {
            id: app.id,
            name: app.name,
            org: app.organization.slug,
            org_id: app.organization.id,
            app_url: app.app_url,
            secrets: refreshed.observed,
        }))
    }

    fn update(
        &self,
        ctx: &mut ApplyContext<'_, Client>,
        config: &AppConfig,
        state: &mut AppState,
    ) -> Result<()> {
        ensure_unchanged("name", state.name.as_str(), config.name.as_str())?;
        if let Some(org) = &config.org {
            ensure_unchanged("org", state.org.as_str(), org.as_str())?;
        }

        let name = state.name.clone();
        let summary =
            SecretReconciler::new(&name).reconcile(ctx, &config.secrets, &mut state.secrets)?;
        log::debug!(
            "App {}: {} secret(s) added, {} changed, {} removed",
            name,
            summary.added,
            summary.changed,
            summary.removed
        );
        Ok(())
    }

    fn delete(&self, ctx: &mut ApplyContext<'_, Client>, state: &AppState) -> Result<()> {
        ignore_missing(ctx.client.delete_app(&state.name))
    }

    fn bind_import(&self, id: &str) -> Result<AppState> {
        let mut fields = parse_import_id(ResourceKind::App, id, 1)?;
        Ok(AppState {
            name: fields.remove(0),
            ..AppState::default()
        })
    }

    fn needs_update(&self, config: &AppConfig, state: &AppState) -> bool {
        config.name != state.name
            || config.org.as_ref().is_some_and(|org| *org != state.org)
            || !diff(&config.secrets, &state.secrets).is_empty()
    }
}

impl Describe for AppResource {
    const KIND: ResourceKind = ResourceKind::App;

    fn key(config: &AppConfig) -> String {
        config.name.clone()
    }

    fn tracked_key(state: &AppState) -> String {
        state.name.clone()
    }

    fn describe(config: &AppConfig, state: Option<&AppState>) -> Vec<String> {
        let empty = ObservedSecrets::new();
        let mut lines = Vec::new();

        match state {
            None => {
                lines.push(format!("name = {}", config.name));
                lines.push(format!(
                    "org = {}",
                    config.org.as_deref().unwrap_or("(personal)")
                ));
                lines.push(format!("id = {}", KNOWN_AFTER_APPLY));
                lines.push(format!("app_url = {}", KNOWN_AFTER_APPLY));
            }
            Some(state) => {
                if config.name != state.name {
                    lines.push(format!("name: {} -> {} (immutable)", state.name, config.name));
                }
                if let Some(org) = config.org.as_ref().filter(|org| **org != state.org) {
                    lines.push(format!("org: {} -> {} (immutable)", state.org, org));
                }
            }
        }

        let observed = state.map_or(&empty, |s| &s.secrets);
        let changes = diff(&config.secrets, observed);
        let planned = plan_secrets(&config.secrets, observed);
        for (name, secret) in &planned {
            let digest = match &secret.digest {
                Tracked::Known(digest) => digest.as_str(),
                Tracked::Unresolved => KNOWN_AFTER_APPLY,
            };
            if changes.to_add.contains(name) {
                lines.push(format!("+ secrets.{} (digest {})", name, digest));
            } else if changes.to_change.contains(name) {
                lines.push(format!("~ secrets.{} (digest {})", name, digest));
            }
        }
        for name in &changes.to_remove {
            lines.push(format!("- secrets.{}", name));
        }
        lines
    }

    fn summarize(state: &AppState) -> Vec<String> {
        vec![
            format!("id = {}", state.id),
            format!("org = {}", state.org),
            format!("app_url = {}", state.app_url.as_deref().unwrap_or("-")),
            format!(
                "secrets = [{}]",
                state.secrets.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{ErrorCategory, Instance, Phase};
    use flyapi::backend::{Call, MockBackend};
    use flyapi::{Organization, backend::mock_digest};

    fn setup() -> (Client, MockBackend) {
        let mock = MockBackend::new();
        (Client::with_backend(Box::new(mock.clone())), mock)
    }

    fn config(name: &str, secrets: &[(&str, &str)]) -> AppConfig {
        AppConfig {
            name: name.to_string(),
            org: None,
            secrets: secrets
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_create_sets_initial_secrets() {
        let (client, mock) = setup();
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::new(AppResource);

        instance
            .create(&mut ctx, &config("web", &[("A", "1"), ("B", "2")]))
            .unwrap();

        let state = instance.state().unwrap();
        assert_eq!(instance.phase(), Phase::Created);
        assert_eq!(state.org, "personal");
        assert_eq!(state.secrets["A"].digest, mock_digest("1"));
        assert_eq!(state.secrets["B"].value, Tracked::Known("2".into()));
        assert_eq!(
            mock.mutations(),
            vec![
                Call::CreateApp {
                    name: "web".into(),
                    org_id: "org_personal".into(),
                },
                Call::SetSecrets {
                    app: "web".into(),
                    secrets: vec![("A".into(), "1".into()), ("B".into(), "2".into())],
                },
            ]
        );
    }

    #[test]
    fn test_create_in_named_org() {
        let (client, mock) = setup();
        mock.add_org(Organization {
            id: "org_acme".into(),
            slug: "acme".into(),
            name: "Acme".into(),
        });
        let mut ctx = ApplyContext::new(&client);
        let mut cfg = config("web", &[]);
        cfg.org = Some("acme".into());

        let state = AppResource.create(&mut ctx, &cfg).unwrap();
        assert_eq!(state.org, "acme");
        assert_eq!(state.org_id, "org_acme");
        assert!(!AppResource.needs_update(&cfg, &state));
    }

    #[test]
    fn test_update_rejects_immutable_changes_before_remote_calls() {
        let (client, mock) = setup();
        let mut ctx = ApplyContext::new(&client);
        let mut state = AppState {
            name: "web".into(),
            org: "personal".into(),
            ..AppState::default()
        };

        let err = AppResource
            .update(&mut ctx, &config("api", &[("A", "1")]), &mut state)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);

        let mut cfg = config("web", &[("A", "1")]);
        cfg.org = Some("acme".into());
        let err = AppResource.update(&mut ctx, &cfg, &mut state).unwrap_err();
        assert!(err.to_string().contains("Can't switch org personal to acme"));

        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_read_detects_drift_and_keeps_unmanaged() {
        let (client, mock) = setup();
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::new(AppResource);
        instance
            .create(&mut ctx, &config("web", &[("A", "1"), ("B", "2")]))
            .unwrap();

        mock.seed_secret("web", "A", "changed").unwrap();
        mock.remove_secret("web", "B");
        mock.seed_secret("web", "OTHER", "x").unwrap();

        instance.refresh(&mut ctx).unwrap();
        let state = instance.state().unwrap();
        assert_eq!(state.secrets["A"].value, Tracked::Unresolved);
        assert_eq!(state.secrets["A"].digest, mock_digest("changed"));
        assert!(!state.secrets.contains_key("B"));
        assert!(!state.secrets.contains_key("OTHER"));
        assert_eq!(ctx.diagnostics.warnings().count(), 1);
    }

    #[test]
    fn test_drifted_secret_converges_on_update() {
        let (client, mock) = setup();
        let mut ctx = ApplyContext::new(&client);
        let cfg = config("web", &[("A", "1")]);
        let mut instance = Instance::new(AppResource);
        instance.create(&mut ctx, &cfg).unwrap();

        mock.seed_secret("web", "A", "changed").unwrap();
        instance.refresh(&mut ctx).unwrap();
        assert!(AppResource.needs_update(&cfg, instance.state().unwrap()));

        mock.clear_calls();
        instance.update(&mut ctx, &cfg).unwrap();
        assert_eq!(
            mock.mutations(),
            vec![Call::SetSecrets {
                app: "web".into(),
                secrets: vec![("A".into(), "1".into())],
            }]
        );
        assert!(!AppResource.needs_update(&cfg, instance.state().unwrap()));
    }

    #[test]
    fn test_refresh_missing_app_removes_state() {
        let (client, mock) = setup();
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::new(AppResource);
        instance.create(&mut ctx, &config("web", &[])).unwrap();

        mock.remove_app("web");
        instance.refresh(&mut ctx).unwrap();
        assert_eq!(instance.phase(), Phase::Deleted);
        assert!(instance.state().is_none());
    }

    #[test]
    fn test_import_binds_name_and_hydrates() {
        let (client, mock) = setup();
        mock.seed_app("web");
        mock.seed_secret("web", "A", "1").unwrap();
        let mut ctx = ApplyContext::new(&client);

        let mut instance = Instance::new(AppResource);
        instance.import(&mut ctx, "web").unwrap();
        let state = instance.state().unwrap();
        assert_eq!(state.name, "web");
        assert_eq!(state.org, "personal");
        assert!(state.secrets.is_empty());

        let mut missing = Instance::new(AppResource);
        assert!(missing.import(&mut ctx, "api").unwrap_err().is_not_found());
        assert!(AppResource.bind_import("web,extra").is_err());
        assert!(AppResource.bind_import("").is_err());
    }

    #[test]
    fn test_delete_only_deletes_app() {
        let (client, mock) = setup();
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::new(AppResource);
        instance
            .create(&mut ctx, &config("web", &[("A", "1")]))
            .unwrap();

        mock.clear_calls();
        instance.delete(&mut ctx).unwrap();
        assert_eq!(mock.mutations(), vec![Call::DeleteApp("web".into())]);
        assert_eq!(instance.phase(), Phase::Deleted);

        let gone = AppState {
            name: "web".into(),
            ..AppState::default()
        };
        assert!(AppResource.delete(&mut ctx, &gone).is_ok());
    }

    #[test]
    fn test_describe() {
        let cfg = config("web", &[("A", "1"), ("B", "2")]);
        let lines = AppResource::describe(&cfg, None);
        assert!(lines.contains(&"name = web".to_string()));
        assert!(lines.contains(&format!("+ secrets.A (digest {})", KNOWN_AFTER_APPLY)));

        let (client, _mock) = setup();
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::new(AppResource);
        instance
            .create(&mut ctx, &config("web", &[("A", "1"), ("C", "3")]))
            .unwrap();
        let lines = AppResource::describe(&cfg, instance.state());
        assert_eq!(
            lines,
            vec![
                format!("+ secrets.B (digest {})", KNOWN_AFTER_APPLY),
                "- secrets.C".to_string(),
            ]
        );
    }
}
