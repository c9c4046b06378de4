use std::collections::BTreeMap;
use std::path::Path;

use anyhow::anyhow;
use config::{Config, File};
use serde::Deserialize;

use crate::convert::ConversionContext;
use crate::mapping::FALLBACK_SHAPE;
use crate::tree::TreeOptions;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Flowchart direction when a graph type's mapping declares none
    pub direction: String,
    /// Node shape when a mapping has none for a node's type
    pub default_shape: String,
    /// Dotted path of the integer that selects a graph type version
    pub version_field: String,
    /// Dotted path of an optional explicit graph type id
    pub type_field: String,
    /// Function named in `click` directives of interactive output
    pub click_callback: String,
    #[serde(default)]
    pub icon_overrides: BTreeMap<String, String>,
}

impl Settings {
    pub fn new(root_dir: &Path) -> anyhow::Result<Settings> {
        let expanded = shellexpand::tilde("~/.config/yamlgraph/settings");
        let settings = Config::builder()
            .add_source(File::with_name(&expanded).required(false))
            .add_source(
                File::with_name(&format!(
                    "{}/.yamlgraph",
                    root_dir
                        .to_str()
                        .ok_or(anyhow!("Can't convert root_dir to str"))?
                ))
                .required(false),
            )
            .set_default("direction", "TD")?
            .set_default("default_shape", FALLBACK_SHAPE)?
            .set_default("version_field", "meta.graph-version")?
            .set_default("type_field", "meta.graph-type")?
            .set_default("click_callback", "reveal")?
            .build()
            .map_err(|err| anyhow!("Build err: {err}"))?;

        let settings = settings.try_deserialize::<Settings>()?;

        anyhow::Ok(settings)
    }

    pub fn conversion_context(&self) -> ConversionContext {
        ConversionContext {
            variables: BTreeMap::new(),
            direction: Some(self.direction.clone()),
            default_shape: Some(self.default_shape.clone()),
        }
    }

    pub fn tree_options(&self) -> TreeOptions {
        TreeOptions {
            icon_overrides: self.icon_overrides.clone(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            direction: "TD".to_string(),
            default_shape: FALLBACK_SHAPE.to_string(),
            version_field: "meta.graph-version".to_string(),
            type_field: "meta.graph-type".to_string(),
            click_callback: "reveal".to_string(),
            icon_overrides: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_catalog_dir;

    #[test]
    fn test_project_file_overrides_defaults() {
        let (_temp_dir, root) = create_test_catalog_dir();
        std::fs::write(
            root.join(".yamlgraph.toml"),
            "direction = \"LR\"\n\n[icon_overrides]\nprocess = \"tools\"\n",
        )
        .unwrap();

        let settings = Settings::new(&root).unwrap();
        assert_eq!(settings.direction, "LR");
        assert_eq!(settings.version_field, "meta.graph-version");
        assert_eq!(settings.icon_overrides.get("process").map(String::as_str), Some("tools"));
        assert_eq!(settings.tree_options().icon_overrides.len(), 1);
    }

    #[test]
    fn test_defaults_feed_conversion_context() {
        let context = Settings::default().conversion_context();
        assert_eq!(context.direction.as_deref(), Some("TD"));
        assert_eq!(context.default_shape.as_deref(), Some(FALLBACK_SHAPE));
        assert!(context.variables.is_empty());
    }
}
