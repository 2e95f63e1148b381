use crate::blocks;
use crate::generator::Generator;
use crate::schema::SchemaRegistry;
use crate::toolbox::{self, ToolboxDefinition};
use crate::{automation, canvas, javascript};
use anyhow::{bail, Context, Result};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Named block vocabulary. Every vocabulary includes the standard blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Vocabulary {
    #[default]
    Standard,
    Automation,
    Canvas,
}

impl Vocabulary {
    pub const ALL: [Vocabulary; 3] = [Vocabulary::Standard, Vocabulary::Automation, Vocabulary::Canvas];

    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "standard" | "" => Ok(Vocabulary::Standard),
            "automation" | "sap" => Ok(Vocabulary::Automation),
            "canvas" => Ok(Vocabulary::Canvas),
            other => bail!(
                "Unknown vocabulary '{}'. Expected one of: standard, automation, canvas.",
                other
            ),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Vocabulary::Standard => "standard",
            Vocabulary::Automation => "automation",
            Vocabulary::Canvas => "canvas",
        }
    }

    pub fn build(self) -> Result<Preset> {
        self.build_with(None)
    }

    /// Builds the preset, registering `extra_blocks` (a JSON descriptor
    /// array) after the built-in definitions.
    pub fn build_with(self, extra_blocks: Option<&str>) -> Result<Preset> {
        let mut registry = SchemaRegistry::new();
        registry
            .register(blocks::standard_definitions()?)
            .context("Failed to register standard blocks")?;
        let mut categories = toolbox::standard_categories();
        match self {
            Vocabulary::Standard => {}
            Vocabulary::Automation => {
                registry.register(blocks::automation_definitions()?)?;
                categories.extend(toolbox::automation_categories());
            }
            Vocabulary::Canvas => {
                registry.register(blocks::canvas_definitions()?)?;
                categories.extend(toolbox::canvas_categories());
            }
        }
        if let Some(source) = extra_blocks {
            registry
                .register_json(source)
                .context("Failed to register custom block definitions")?;
        }

        let registry = Arc::new(registry);
        let base = javascript::generator().with_registry(Arc::clone(&registry));
        let generator = match self {
            Vocabulary::Standard => base,
            Vocabulary::Automation => automation::generator(&base),
            Vocabulary::Canvas => canvas::generator(&base),
        };
        tracing::debug!(
            vocabulary = self.name(),
            types = registry.len(),
            rules = generator.rules().len(),
            "vocabulary ready"
        );
        Ok(Preset {
            vocabulary: self,
            registry,
            generator,
            toolbox: ToolboxDefinition { categories },
        })
    }
}

impl Display for Vocabulary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Registry, generator and toolbox for one vocabulary, built once.
#[derive(Debug, Clone)]
pub struct Preset {
    pub vocabulary: Vocabulary,
    pub registry: Arc<SchemaRegistry>,
    pub generator: Generator,
    pub toolbox: ToolboxDefinition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!(Vocabulary::parse("Automation").unwrap(), Vocabulary::Automation);
        assert_eq!(Vocabulary::parse("canvas").unwrap(), Vocabulary::Canvas);
        assert!(Vocabulary::parse("python").is_err());
    }

    #[test]
    fn every_preset_has_a_consistent_toolbox() {
        for vocabulary in Vocabulary::ALL {
            let preset = vocabulary.build().unwrap();
            assert!(
                preset.toolbox.unknown_types(&preset.registry).is_empty(),
                "{} toolbox references unknown types",
                vocabulary
            );
        }
    }

    #[test]
    fn presets_only_carry_their_own_rules() {
        let standard = Vocabulary::Standard.build().unwrap();
        let automation = Vocabulary::Automation.build().unwrap();
        assert!(!standard.generator.rules().contains("sap_login"));
        assert!(automation.generator.rules().contains("sap_login"));
        assert!(!automation.generator.rules().contains("draw_circle"));
    }

    #[test]
    fn custom_blocks_extend_the_registry() {
        let extra = r#"[{"type": "beep", "message0": "beep", "previousStatement": null}]"#;
        let preset = Vocabulary::Standard.build_with(Some(extra)).unwrap();
        assert!(preset.registry.contains("beep"));
    }

    #[test]
    fn custom_blocks_cannot_shadow_builtins() {
        let extra = r#"[{"type": "math_number", "message0": "n"}]"#;
        assert!(Vocabulary::Standard.build_with(Some(extra)).is_err());
    }
}
