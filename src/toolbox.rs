use crate::schema::SchemaRegistry;
use anyhow::{anyhow, Result};
use std::io::Cursor;
use xmltree::{Element, EmitterConfig, XMLNode};

/// A shadow block pre-filled into an input of a toolbox entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowPreset {
    pub input: String,
    pub type_id: String,
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolboxEntry {
    pub type_id: String,
    pub shadows: Vec<ShadowPreset>,
}

impl ToolboxEntry {
    pub fn new(type_id: &str) -> Self {
        Self {
            type_id: type_id.to_string(),
            shadows: Vec::new(),
        }
    }

    pub fn with_shadow(mut self, input: &str, type_id: &str, field: &str, value: &str) -> Self {
        self.shadows.push(ShadowPreset {
            input: input.to_string(),
            type_id: type_id.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolboxCategory {
    pub name: String,
    pub colour: String,
    pub entries: Vec<ToolboxEntry>,
}

impl ToolboxCategory {
    pub fn new(name: &str, colour: &str, entries: Vec<ToolboxEntry>) -> Self {
        Self {
            name: name.to_string(),
            colour: colour.to_string(),
            entries,
        }
    }
}

/// Category grouping shown by the editor. No effect on generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolboxDefinition {
    pub categories: Vec<ToolboxCategory>,
}

impl ToolboxDefinition {
    pub fn type_ids(&self) -> Vec<&str> {
        self.categories
            .iter()
            .flat_map(|c| c.entries.iter().map(|e| e.type_id.as_str()))
            .collect()
    }

    /// Type ids (entries and shadows) the registry does not know.
    pub fn unknown_types(&self, registry: &SchemaRegistry) -> Vec<String> {
        let mut unknown = Vec::new();
        for category in &self.categories {
            for entry in &category.entries {
                let ids = std::iter::once(entry.type_id.as_str())
                    .chain(entry.shadows.iter().map(|s| s.type_id.as_str()));
                for id in ids {
                    if !registry.contains(id) && !unknown.iter().any(|u| u == id) {
                        unknown.push(id.to_string());
                    }
                }
            }
        }
        unknown
    }

    pub fn from_xml(source: &str) -> Result<Self> {
        let root = Element::parse(Cursor::new(source.as_bytes()))
            .map_err(|e| anyhow!("Invalid toolbox XML: {}.", e))?;
        let mut categories = Vec::new();
        for category in elements(&root).filter(|e| e.name == "category") {
            let name = category
                .attributes
                .get("name")
                .cloned()
                .ok_or_else(|| anyhow!("Toolbox <category> missing 'name'."))?;
            let colour = category.attributes.get("colour").cloned().unwrap_or_default();
            let mut entries = Vec::new();
            for block in elements(category).filter(|e| e.name == "block") {
                entries.push(read_entry(block)?);
            }
            categories.push(ToolboxCategory {
                name,
                colour,
                entries,
            });
        }
        Ok(Self { categories })
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut root = Element::new("xml");
        for category in &self.categories {
            let mut cat = Element::new("category");
            cat.attributes.insert("name".to_string(), category.name.clone());
            cat.attributes.insert("colour".to_string(), category.colour.clone());
            for entry in &category.entries {
                cat.children.push(XMLNode::Element(write_entry(entry)));
            }
            root.children.push(XMLNode::Element(cat));
        }
        let mut out = Vec::new();
        let config = EmitterConfig::new()
            .perform_indent(true)
            .write_document_declaration(false);
        root.write_with_config(&mut out, config)?;
        Ok(String::from_utf8(out)?)
    }
}

fn read_entry(block: &Element) -> Result<ToolboxEntry> {
    let type_id = block
        .attributes
        .get("type")
        .cloned()
        .ok_or_else(|| anyhow!("Toolbox <block> missing 'type'."))?;
    let mut entry = ToolboxEntry::new(&type_id);
    for value in elements(block).filter(|e| e.name == "value") {
        let input = value.attributes.get("name").cloned().unwrap_or_default();
        for shadow in elements(value).filter(|e| e.name == "shadow") {
            let shadow_type = shadow.attributes.get("type").cloned().unwrap_or_default();
            let field = elements(shadow).find(|e| e.name == "field");
            let (field_name, field_value) = match field {
                Some(f) => (
                    f.attributes.get("name").cloned().unwrap_or_default(),
                    f.get_text().map(|t| t.to_string()).unwrap_or_default(),
                ),
                None => (String::new(), String::new()),
            };
            entry = entry.with_shadow(&input, &shadow_type, &field_name, &field_value);
        }
    }
    Ok(entry)
}

fn write_entry(entry: &ToolboxEntry) -> Element {
    let mut block = Element::new("block");
    block.attributes.insert("type".to_string(), entry.type_id.clone());
    for preset in &entry.shadows {
        let mut field = Element::new("field");
        field.attributes.insert("name".to_string(), preset.field.clone());
        field.children.push(XMLNode::Text(preset.value.clone()));
        let mut shadow = Element::new("shadow");
        shadow.attributes.insert("type".to_string(), preset.type_id.clone());
        shadow.children.push(XMLNode::Element(field));
        let mut value = Element::new("value");
        value.attributes.insert("name".to_string(), preset.input.clone());
        value.children.push(XMLNode::Element(shadow));
        block.children.push(XMLNode::Element(value));
    }
    block
}

fn elements(el: &Element) -> impl Iterator<Item = &Element> {
    el.children.iter().filter_map(|node| match node {
        XMLNode::Element(e) => Some(e),
        _ => None,
    })
}

/// The editor's standard categories.
pub fn standard_categories() -> Vec<ToolboxCategory> {
    vec![
        ToolboxCategory::new(
            "Logic",
            "%{BKY_LOGIC_HUE}",
            vec![
                ToolboxEntry::new("controls_if"),
                ToolboxEntry::new("logic_compare"),
                ToolboxEntry::new("logic_operation"),
                ToolboxEntry::new("logic_negate"),
                ToolboxEntry::new("logic_boolean"),
            ],
        ),
        ToolboxCategory::new(
            "Loops",
            "%{BKY_LOOPS_HUE}",
            vec![ToolboxEntry::new("controls_repeat_ext").with_shadow(
                "TIMES",
                "math_number",
                "NUM",
                "10",
            )],
        ),
        ToolboxCategory::new(
            "Math",
            "%{BKY_MATH_HUE}",
            vec![
                ToolboxEntry::new("math_number"),
                ToolboxEntry::new("math_arithmetic"),
            ],
        ),
    ]
}

pub fn automation_categories() -> Vec<ToolboxCategory> {
    vec![
        ToolboxCategory::new(
            "Session",
            "230",
            vec![
                ToolboxEntry::new("sap_login"),
                ToolboxEntry::new("sap_logout"),
                ToolboxEntry::new("sap_start_transaction"),
            ],
        ),
        ToolboxCategory::new(
            "Screen",
            "200",
            vec![
                ToolboxEntry::new("sap_set_field"),
                ToolboxEntry::new("sap_get_field"),
                ToolboxEntry::new("sap_press_key"),
            ],
        ),
        ToolboxCategory::new(
            "Tables",
            "160",
            vec![
                ToolboxEntry::new("sap_in_table"),
                ToolboxEntry::new("sap_table_set_cell").with_shadow("ROW", "math_number", "NUM", "1"),
                ToolboxEntry::new("sap_table_row_count"),
            ],
        ),
        ToolboxCategory::new("Text", "%{BKY_TEXTS_HUE}", vec![ToolboxEntry::new("text")]),
    ]
}

pub fn canvas_categories() -> Vec<ToolboxCategory> {
    vec![ToolboxCategory::new(
        "Canvas",
        "20",
        vec![ToolboxEntry::new("draw_circle")
            .with_shadow("X", "math_number", "NUM", "0")
            .with_shadow("Y", "math_number", "NUM", "0")
            .with_shadow("RADIUS", "math_number", "NUM", "10")],
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks;

    const EDITOR_TOOLBOX: &str = r#"
      <xml>
        <category name="Logic" colour="%{BKY_LOGIC_HUE}">
          <block type="controls_if"></block>
          <block type="logic_compare"></block>
        </category>
        <category name="Loops" colour="%{BKY_LOOPS_HUE}">
          <block type="controls_repeat_ext">
            <value name="TIMES">
              <shadow type="math_number">
                <field name="NUM">10</field>
              </shadow>
            </value>
          </block>
        </category>
      </xml>
    "#;

    #[test]
    fn parses_editor_toolbox_with_shadow_presets() {
        let toolbox = ToolboxDefinition::from_xml(EDITOR_TOOLBOX).unwrap();
        assert_eq!(toolbox.categories.len(), 2);
        assert_eq!(toolbox.categories[1].name, "Loops");
        let repeat = &toolbox.categories[1].entries[0];
        assert_eq!(repeat.type_id, "controls_repeat_ext");
        assert_eq!(
            repeat.shadows,
            vec![ShadowPreset {
                input: "TIMES".to_string(),
                type_id: "math_number".to_string(),
                field: "NUM".to_string(),
                value: "10".to_string(),
            }]
        );
    }

    #[test]
    fn emitted_xml_reads_back_identically() {
        let toolbox = ToolboxDefinition {
            categories: standard_categories(),
        };
        let xml = toolbox.to_xml().unwrap();
        assert_eq!(ToolboxDefinition::from_xml(&xml).unwrap(), toolbox);
    }

    #[test]
    fn builtin_toolboxes_only_reference_registered_types() {
        let mut registry = SchemaRegistry::new();
        registry.register(blocks::standard_definitions().unwrap()).unwrap();
        registry.register(blocks::automation_definitions().unwrap()).unwrap();
        registry.register(blocks::canvas_definitions().unwrap()).unwrap();
        let mut categories = standard_categories();
        categories.extend(automation_categories());
        categories.extend(canvas_categories());
        let toolbox = ToolboxDefinition { categories };
        assert!(toolbox.unknown_types(&registry).is_empty());
    }

    #[test]
    fn reports_unknown_types() {
        let toolbox = ToolboxDefinition {
            categories: vec![ToolboxCategory::new("X", "0", vec![ToolboxEntry::new("nope")])],
        };
        assert_eq!(toolbox.unknown_types(&SchemaRegistry::new()), vec!["nope"]);
    }
}
