//! Persistent volume attached to an app

use super::{Describe, KNOWN_AFTER_APPLY, ResourceKind, found, ignore_missing, parse_import_id};
use declarative::{ApplyContext, Lifecycle, Result, ensure_unchanged};
use flyapi::{Client, CreateVolumeInput, Volume};
use serde::{Deserialize, Serialize};

/// Declared volume; every attribute is immutable
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VolumeConfig {
    pub app: String,
    pub name: String,
    pub region: String,
    pub size_gb: u32,
}

/// Tracked volume
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeState {
    pub id: String,
    pub app: String,
    pub name: String,
    pub region: String,
    pub size_gb: u32,
    pub internal_id: String,
}

impl VolumeState {
    fn from_remote(app: &str, volume: Volume) -> Self {
        Self {
            id: volume.id,
            app: app.to_string(),
            name: volume.name,
            region: volume.region,
            size_gb: volume.size_gb,
            internal_id: volume.internal_id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeResource;

impl Lifecycle for VolumeResource {
    type Client = Client;
    type Config = VolumeConfig;
    type State = VolumeState;

    fn type_name(&self) -> &'static str {
        "volume"
    }

    fn create(&self, ctx: &mut ApplyContext<'_, Client>, config: &VolumeConfig) -> Result<VolumeState> {
        let volume = ctx.client.create_volume(&CreateVolumeInput {
            app_id: config.app.clone(),
            name: config.name.clone(),
            region: config.region.clone(),
            size_gb: config.size_gb,
        })?;
        Ok(VolumeState::from_remote(&config.app, volume))
    }

    fn read(
        &self,
        ctx: &mut ApplyContext<'_, Client>,
        state: &VolumeState,
    ) -> Result<Option<VolumeState>> {
        let volume = found(ctx.client.get_volume(&state.app, &state.internal_id))?;
        Ok(volume.map(|v| VolumeState::from_remote(&state.app, v)))
    }

    fn update(
        &self,
        _ctx: &mut ApplyContext<'_, Client>,
        config: &VolumeConfig,
        state: &mut VolumeState,
    ) -> Result<()> {
        ensure_unchanged("app", state.app.as_str(), config.app.as_str())?;
        ensure_unchanged("name", state.name.as_str(), config.name.as_str())?;
        ensure_unchanged("region", state.region.as_str(), config.region.as_str())?;
        ensure_unchanged("size_gb", &state.size_gb, &config.size_gb)
    }

    fn delete(&self, ctx: &mut ApplyContext<'_, Client>, state: &VolumeState) -> Result<()> {
        ignore_missing(ctx.client.delete_volume(&state.id))
    }

    fn bind_import(&self, id: &str) -> Result<VolumeState> {
        let mut fields = parse_import_id(ResourceKind::Volume, id, 2)?;
        let internal_id = fields.remove(1);
        Ok(VolumeState {
            app: fields.remove(0),
            internal_id,
            ..VolumeState::default()
        })
    }

    fn needs_update(&self, config: &VolumeConfig, state: &VolumeState) -> bool {
        config.app != state.app
            || config.name != state.name
            || config.region != state.region
            || config.size_gb != state.size_gb
    }
}

impl Describe for VolumeResource {
    const KIND: ResourceKind = ResourceKind::Volume;

    fn key(config: &VolumeConfig) -> String {
        format!("{}.{}", config.app, config.name)
    }

    fn tracked_key(state: &VolumeState) -> String {
        format!("{}.{}", state.app, state.name)
    }

    fn describe(config: &VolumeConfig, state: Option<&VolumeState>) -> Vec<String> {
        let Some(state) = state else {
            return vec![
                format!("app = {}", config.app),
                format!("name = {}", config.name),
                format!("region = {}", config.region),
                format!("size_gb = {}", config.size_gb),
                format!("id = {}", KNOWN_AFTER_APPLY),
                format!("internal_id = {}", KNOWN_AFTER_APPLY),
            ];
        };

        let mut lines = Vec::new();
        let pairs = [
            ("app", &state.app, &config.app),
            ("name", &state.name, &config.name),
            ("region", &state.region, &config.region),
        ];
        for (attribute, prior, planned) in pairs {
            if prior != planned {
                lines.push(format!("{}: {} -> {} (immutable)", attribute, prior, planned));
            }
        }
        if state.size_gb != config.size_gb {
            lines.push(format!(
                "size_gb: {} -> {} (immutable)",
                state.size_gb, config.size_gb
            ));
        }
        lines
    }

    fn summarize(state: &VolumeState) -> Vec<String> {
        vec![
            format!("id = {}", state.id),
            format!("internal_id = {}", state.internal_id),
            format!("region = {}", state.region),
            format!("size_gb = {}", state.size_gb),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{ErrorCategory, Instance, Phase};
    use flyapi::backend::MockBackend;

    fn setup() -> (Client, MockBackend) {
        let mock = MockBackend::new();
        mock.seed_app("web");
        (Client::with_backend(Box::new(mock.clone())), mock)
    }

    fn config() -> VolumeConfig {
        VolumeConfig {
            app: "web".into(),
            name: "data".into(),
            region: "ams".into(),
            size_gb: 10,
        }
    }

    #[test]
    fn test_create_read_delete() {
        let (client, _mock) = setup();
        let mut ctx = ApplyContext::new(&client);
        let mut instance = Instance::new(VolumeResource);

        instance.create(&mut ctx, &config()).unwrap();
        let state = instance.state().unwrap().clone();
        assert!(state.internal_id.starts_with("int_"));
        assert!(!VolumeResource.needs_update(&config(), &state));

        instance.refresh(&mut ctx).unwrap();
        assert_eq!(instance.state(), Some(&state));

        instance.delete(&mut ctx).unwrap();
        assert_eq!(instance.phase(), Phase::Deleted);
        assert!(VolumeResource.read(&mut ctx, &state).unwrap().is_none());
    }

    #[test]
    fn test_any_change_is_rejected() {
        let (client, mock) = setup();
        let mut ctx = ApplyContext::new(&client);
        let mut state = VolumeResource.create(&mut ctx, &config()).unwrap();
        mock.clear_calls();

        let mut bigger = config();
        bigger.size_gb = 20;
        assert!(VolumeResource.needs_update(&bigger, &state));
        let err = VolumeResource
            .update(&mut ctx, &bigger, &mut state)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(err.to_string().contains("Can't switch size_gb 10 to 20"));
        assert!(mock.calls().is_empty());

        let lines = VolumeResource::describe(&bigger, Some(&state));
        assert_eq!(lines, vec!["size_gb: 10 -> 20 (immutable)".to_string()]);
    }

    #[test]
    fn test_import_by_internal_id() {
        let (client, _mock) = setup();
        let mut ctx = ApplyContext::new(&client);
        let created = VolumeResource.create(&mut ctx, &config()).unwrap();

        let id = format!("web,{}", created.internal_id);
        let imported = VolumeResource.import(&mut ctx, &id).unwrap().unwrap();
        assert_eq!(imported, created);

        assert!(VolumeResource.import(&mut ctx, "web,int_999").unwrap().is_none());
        assert!(VolumeResource.bind_import(&created.internal_id).is_err());
    }
}
