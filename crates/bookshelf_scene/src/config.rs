use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flecs_ecs::macros::Component;
use serde::{Deserialize, Serialize};

use crate::ConfigFetchError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub name: String,
    pub display_name: String,
    #[serde(alias = "assetPath")]
    pub path: String,
    #[serde(default)]
    pub location: Option<[f32; 3]>,
    /// Euler angles in degrees, XYZ order.
    #[serde(default)]
    pub rotation: Option<[f32; 3]>,
    #[serde(default)]
    pub scale: Option<f32>,
    #[serde(default)]
    pub template: Option<TemplateConfig>,
    #[serde(default)]
    pub focusable: Option<FocusableConfig>,
    #[serde(default)]
    pub animation: Option<AnimationConfig>,
    #[serde(default)]
    pub page_surface: Option<PageSurfaceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateConfig {
    pub offset: [f32; 3],
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FocusableConfig {
    #[serde(default)]
    pub rotation: Option<[f32; 3]>,
    #[serde(default)]
    pub offset_position: Option<[f32; 3]>,
    #[serde(default)]
    pub distance: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnimationConfig {
    /// Name of the open/closed toggle.
    #[serde(alias = "stateKey")]
    pub state: String,
    #[serde(default)]
    pub options: ClipOptions,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ClipOptions {
    pub hold_on_last_frame: bool,
    pub in_reverse: bool,
}

/// Where the page slots of a book-like model live in its hierarchy.
#[derive(Component, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct PageSurfaceConfig {
    pub anchor_path: Vec<usize>,
    pub first_slot: usize,
}

impl Default for PageSurfaceConfig {
    fn default() -> Self {
        Self {
            anchor_path: vec![0, 0],
            first_slot: 24,
        }
    }
}

#[derive(Component, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PageDescriptor {
    pub path: String,
}

#[derive(Debug, Deserialize)]
struct ModelManifest {
    models: Vec<ModelConfig>,
}

#[derive(Debug, Deserialize)]
struct PageManifest {
    pages: HashMap<String, Vec<PageDescriptor>>,
}

pub type PageTable = HashMap<String, Vec<PageDescriptor>>;

pub fn parse_model_manifest(text: &str) -> Result<Vec<ModelConfig>, serde_json::Error> {
    serde_json::from_str::<ModelManifest>(text).map(|manifest| manifest.models)
}

pub fn parse_page_manifest(text: &str) -> Result<PageTable, serde_json::Error> {
    serde_json::from_str::<PageManifest>(text).map(|manifest| manifest.pages)
}

/// Static configuration documents. Each is fetched at most once per session by its
/// consumer.
#[async_trait]
pub trait ConfigSource: Send + Sync + 'static {
    async fn models(&self) -> Result<Vec<ModelConfig>, ConfigFetchError>;
    async fn pages(&self) -> Result<PageTable, ConfigFetchError>;
}

/// Reads `models/models.json` and `pages/pages.json` below an asset root.
pub struct FileConfigSource {
    root: PathBuf,
}

impl FileConfigSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read(&self, relative: &str) -> Result<String, ConfigFetchError> {
        let path = self.root.join(relative);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ConfigFetchError::Unreachable {
                document: display(&path),
                message: e.to_string(),
            })
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn models(&self) -> Result<Vec<ModelConfig>, ConfigFetchError> {
        let text = self.read("models/models.json").await?;
        parse_model_manifest(&text).map_err(|e| ConfigFetchError::Invalid {
            document: "models/models.json".into(),
            message: e.to_string(),
        })
    }

    async fn pages(&self) -> Result<PageTable, ConfigFetchError> {
        let text = self.read("pages/pages.json").await?;
        parse_page_manifest(&text).map_err(|e| ConfigFetchError::Invalid {
            document: "pages/pages.json".into(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_model_entry() {
        let models = parse_model_manifest(
            r#"{ "models": [ {
                "name": "book",
                "displayName": "Book",
                "path": "models/book.glb",
                "location": [-6, 4.5, -1.2],
                "rotation": [0, 90, 0],
                "scale": 0.5,
                "template": { "offset": [0, 0, 0.3] },
                "focusable": { "rotation": [90, 0, 0], "distance": 1.2 },
                "animation": { "state": "open", "options": { "holdOnLastFrame": true } }
            } ] }"#,
        )
        .unwrap();

        let book = &models[0];
        assert_eq!(book.display_name, "Book");
        assert_eq!(book.scale, Some(0.5));
        assert_eq!(book.template.as_ref().unwrap().offset, [0.0, 0.0, 0.3]);
        assert_eq!(book.focusable.as_ref().unwrap().distance, Some(1.2));
        assert!(book.focusable.as_ref().unwrap().offset_position.is_none());
        let animation = book.animation.as_ref().unwrap();
        assert_eq!(animation.state, "open");
        assert!(animation.options.hold_on_last_frame);
        assert!(!animation.options.in_reverse);
        assert!(book.page_surface.is_none());
    }

    #[test]
    fn accepts_alternate_field_names() {
        let models = parse_model_manifest(
            r#"{ "models": [ {
                "name": "bonsai",
                "displayName": "Bonsai",
                "assetPath": "models/bonsai.glb",
                "animation": { "stateKey": "grown" },
                "pageSurface": { "firstSlot": 2 }
            } ] }"#,
        )
        .unwrap();
        assert_eq!(models[0].path, "models/bonsai.glb");
        assert_eq!(models[0].animation.as_ref().unwrap().state, "grown");
        let surface = models[0].page_surface.as_ref().unwrap();
        assert_eq!(surface.anchor_path, vec![0, 0]);
        assert_eq!(surface.first_slot, 2);
    }

    #[test]
    fn parses_page_manifest() {
        let pages = parse_page_manifest(
            r#"{ "pages": { "book": [ { "path": "about.md" }, { "path": "projects.md" } ] } }"#,
        )
        .unwrap();
        assert_eq!(pages["book"].len(), 2);
        assert_eq!(pages["book"][1].path, "projects.md");
    }

    #[tokio::test]
    async fn missing_manifest_is_unreachable() {
        let source = FileConfigSource::new("/definitely/not/here");
        assert!(matches!(
            source.models().await,
            Err(ConfigFetchError::Unreachable { .. })
        ));
    }
}
