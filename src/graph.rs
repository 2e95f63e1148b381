use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Cursor;
use xmltree::{Element, XMLNode};

/// Read-only view of a block graph, the only thing the generator needs.
pub trait BlockGraph {
    /// Top-level blocks in reading order.
    fn top_blocks(&self) -> Vec<&str>;
    fn block_type(&self, id: &str) -> Option<&str>;
    fn field(&self, id: &str, name: &str) -> Option<&str>;
    /// Block plugged into a value socket, or the head of a statement socket.
    fn input(&self, id: &str, name: &str) -> Option<&str>;
    fn next(&self, id: &str) -> Option<&str>;
    fn previous(&self, id: &str) -> Option<&str>;
    fn mutation(&self, id: &str, key: &str) -> Option<&str>;
}

#[derive(Debug, Clone)]
pub struct GraphError {
    pub message: String,
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for GraphError {}

fn graph_error<T>(message: impl Into<String>) -> Result<T, GraphError> {
    Err(GraphError {
        message: message.into(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParentLink {
    /// Previous block in a statement chain.
    Previous,
    /// Owning block through a named input.
    Input,
}

#[derive(Debug, Clone)]
pub struct BlockNode {
    pub id: String,
    pub type_id: String,
    pub x: i64,
    pub y: i64,
    pub shadow: bool,
    pub fields: BTreeMap<String, String>,
    pub inputs: BTreeMap<String, String>,
    pub mutation: BTreeMap<String, String>,
    pub next: Option<String>,
    parent: Option<(String, ParentLink)>,
    created: usize,
}

/// In-memory workspace: owns every block, keeps the tree shape.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    blocks: HashMap<String, BlockNode>,
    created: usize,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&BlockNode> {
        self.blocks.get(id)
    }

    /// Owning block: the previous block in a chain or the block holding the input.
    pub fn parent(&self, id: &str) -> Option<&str> {
        self.blocks.get(id)?.parent.as_ref().map(|(p, _)| p.as_str())
    }

    pub fn block_ids(&self) -> Vec<&str> {
        let mut ids = self.blocks.values().collect::<Vec<_>>();
        ids.sort_by_key(|b| b.created);
        ids.into_iter().map(|b| b.id.as_str()).collect()
    }

    pub fn add_block(&mut self, id: &str, type_id: &str) -> Result<&mut BlockNode, GraphError> {
        if id.is_empty() {
            return graph_error("Block id must not be empty.");
        }
        if self.blocks.contains_key(id) {
            return graph_error(format!("Duplicate block id '{}'.", id));
        }
        self.created += 1;
        let node = BlockNode {
            id: id.to_string(),
            type_id: type_id.to_string(),
            x: 0,
            y: 0,
            shadow: false,
            fields: BTreeMap::new(),
            inputs: BTreeMap::new(),
            mutation: BTreeMap::new(),
            next: None,
            parent: None,
            created: self.created,
        };
        Ok(self.blocks.entry(id.to_string()).or_insert(node))
    }

    pub fn set_field(&mut self, id: &str, name: &str, value: &str) -> Result<(), GraphError> {
        self.node_mut(id)?
            .fields
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn set_mutation(&mut self, id: &str, key: &str, value: &str) -> Result<(), GraphError> {
        self.node_mut(id)?
            .mutation
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn set_position(&mut self, id: &str, x: i64, y: i64) -> Result<(), GraphError> {
        let node = self.node_mut(id)?;
        node.x = x;
        node.y = y;
        Ok(())
    }

    /// Plugs `child` into the named input of `parent`, replacing nothing.
    pub fn connect_input(&mut self, parent: &str, name: &str, child: &str) -> Result<(), GraphError> {
        self.check_attach(parent, child)?;
        if self.node(parent)?.inputs.contains_key(name) {
            return graph_error(format!(
                "Input '{}' of block '{}' is already connected.",
                name, parent
            ));
        }
        self.node_mut(parent)?
            .inputs
            .insert(name.to_string(), child.to_string());
        self.node_mut(child)?.parent = Some((parent.to_string(), ParentLink::Input));
        Ok(())
    }

    /// Attaches `child` below `block` in a statement chain.
    pub fn connect_next(&mut self, block: &str, child: &str) -> Result<(), GraphError> {
        self.check_attach(block, child)?;
        if self.node(block)?.next.is_some() {
            return graph_error(format!("Block '{}' already has a next block.", block));
        }
        self.node_mut(block)?.next = Some(child.to_string());
        self.node_mut(child)?.parent = Some((block.to_string(), ParentLink::Previous));
        Ok(())
    }

    /// Detaches a block (and everything below it) from its parent.
    pub fn disconnect(&mut self, id: &str) -> Result<(), GraphError> {
        let Some((parent, link)) = self.node_mut(id)?.parent.take() else {
            return Ok(());
        };
        let parent_node = self.node_mut(&parent)?;
        match link {
            ParentLink::Previous => parent_node.next = None,
            ParentLink::Input => parent_node.inputs.retain(|_, child| child != id),
        }
        Ok(())
    }

    /// Deletes a block together with its inputs and the rest of its chain.
    pub fn remove_block(&mut self, id: &str) -> Result<(), GraphError> {
        self.disconnect(id)?;
        let mut pending = vec![id.to_string()];
        while let Some(current) = pending.pop() {
            if let Some(node) = self.blocks.remove(&current) {
                pending.extend(node.inputs.into_values());
                pending.extend(node.next);
            }
        }
        Ok(())
    }

    fn check_attach(&self, parent: &str, child: &str) -> Result<(), GraphError> {
        self.node(parent)?;
        if self.node(child)?.parent.is_some() {
            return graph_error(format!("Block '{}' is already connected.", child));
        }
        let mut cursor = Some(parent.to_string());
        while let Some(current) = cursor {
            if current == child {
                return graph_error(format!(
                    "Connecting '{}' under '{}' would create a cycle.",
                    child, parent
                ));
            }
            cursor = self
                .blocks
                .get(&current)
                .and_then(|n| n.parent.as_ref().map(|(p, _)| p.clone()));
        }
        Ok(())
    }

    fn node(&self, id: &str) -> Result<&BlockNode, GraphError> {
        match self.blocks.get(id) {
            Some(node) => Ok(node),
            None => graph_error(format!("Unknown block '{}'.", id)),
        }
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut BlockNode, GraphError> {
        match self.blocks.get_mut(id) {
            Some(node) => Ok(node),
            None => graph_error(format!("Unknown block '{}'.", id)),
        }
    }

    /// Loads the editor's JSON serialization (`{"blocks": {"blocks": [...]}}`).
    pub fn from_json_str(source: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(source).context("Invalid workspace JSON.")?;
        Self::from_json(&value)
    }

    /// A save with no `blocks` key is an empty workspace. Variable fields that
    /// carry only an id are named through the top-level `variables` table.
    pub fn from_json(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(anyhow!("Invalid workspace JSON: expected an object."));
        }
        let mut ws = Workspace::new();
        let Some(blocks) = value.get("blocks") else {
            return Ok(ws);
        };
        let top = blocks
            .get("blocks")
            .or(Some(blocks))
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("Invalid workspace JSON: 'blocks' must hold a 'blocks' array."))?;
        let names = json_variable_names(value);
        for block in top {
            let id = ws.load_json_block(block, false, &names)?;
            let x = block.get("x").and_then(Value::as_f64).unwrap_or(0.0) as i64;
            let y = block.get("y").and_then(Value::as_f64).unwrap_or(0.0) as i64;
            ws.set_position(&id, x, y)?;
        }
        Ok(ws)
    }

    fn load_json_block(
        &mut self,
        block: &Value,
        shadow: bool,
        names: &HashMap<String, String>,
    ) -> Result<String> {
        let type_id = block
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Block missing 'type'."))?;
        let id = match block.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => self.fresh_id(),
        };
        self.add_block(&id, type_id)?.shadow = shadow;

        if let Some(fields) = block.get("fields").and_then(Value::as_object) {
            for (name, value) in fields {
                self.set_field(&id, name, &json_field_text(value, names))?;
            }
        }
        if let Some(extra) = block.get("extraState").and_then(Value::as_object) {
            for (key, value) in extra {
                self.set_mutation(&id, &mutation_key(key), &json_field_text(value, names))?;
            }
        }
        if let Some(inputs) = block.get("inputs").and_then(Value::as_object) {
            for (name, input) in inputs {
                if let Some(child) = self.load_json_connection(input, names)? {
                    self.connect_input(&id, name, &child)?;
                }
            }
        }
        if let Some(next) = block.get("next") {
            if let Some(child) = self.load_json_connection(next, names)? {
                self.connect_next(&id, &child)?;
            }
        }
        Ok(id)
    }

    /// A connection slot holds a real block, a shadow, or both; the real block wins.
    fn load_json_connection(
        &mut self,
        slot: &Value,
        names: &HashMap<String, String>,
    ) -> Result<Option<String>> {
        let Some(obj) = slot.as_object() else {
            return Ok(None);
        };
        if let Some(block) = obj.get("block") {
            return self.load_json_block(block, false, names).map(Some);
        }
        if let Some(shadow) = obj.get("shadow") {
            return self.load_json_block(shadow, true, names).map(Some);
        }
        Ok(None)
    }

    /// Loads the editor's XML serialization (`<xml><block type=".."/></xml>`).
    pub fn from_xml_str(source: &str) -> Result<Self> {
        let root = Element::parse(Cursor::new(source.as_bytes()))
            .map_err(|e| anyhow!("Invalid workspace XML: {}.", e))?;
        let mut ws = Workspace::new();
        for child in child_elements(&root) {
            if child.name != "block" && child.name != "shadow" {
                continue;
            }
            let id = ws.load_xml_block(child)?;
            let x = attr_i64(child, "x");
            let y = attr_i64(child, "y");
            ws.set_position(&id, x, y)?;
        }
        Ok(ws)
    }

    fn load_xml_block(&mut self, el: &Element) -> Result<String> {
        let type_id = el
            .attributes
            .get("type")
            .cloned()
            .ok_or_else(|| anyhow!("<{}> element missing 'type' attribute.", el.name))?;
        let id = match el.attributes.get("id") {
            Some(id) => id.clone(),
            None => self.fresh_id(),
        };
        self.add_block(&id, &type_id)?.shadow = el.name == "shadow";

        for child in child_elements(el) {
            match child.name.as_str() {
                "field" => {
                    let name = required_attr(child, "name")?;
                    let text = child.get_text().map(|t| t.to_string()).unwrap_or_default();
                    self.set_field(&id, &name, &text)?;
                }
                "mutation" => {
                    for (key, value) in &child.attributes {
                        self.set_mutation(&id, key, value)?;
                    }
                }
                "value" | "statement" => {
                    let name = required_attr(child, "name")?;
                    if let Some(target) = self.load_xml_connection(child)? {
                        self.connect_input(&id, &name, &target)?;
                    }
                }
                "next" => {
                    if let Some(target) = self.load_xml_connection(child)? {
                        self.connect_next(&id, &target)?;
                    }
                }
                _ => {}
            }
        }
        Ok(id)
    }

    fn load_xml_connection(&mut self, slot: &Element) -> Result<Option<String>> {
        let children = child_elements(slot).collect::<Vec<_>>();
        if let Some(block) = children.iter().find(|c| c.name == "block") {
            return self.load_xml_block(block).map(Some);
        }
        if let Some(shadow) = children.iter().find(|c| c.name == "shadow") {
            return self.load_xml_block(shadow).map(Some);
        }
        Ok(None)
    }

    /// Loads JSON or XML depending on the first non-blank character.
    pub fn from_source(source: &str) -> Result<Self> {
        if source.trim_start().starts_with('<') {
            Self::from_xml_str(source)
        } else {
            Self::from_json_str(source)
        }
    }

    fn fresh_id(&self) -> String {
        let mut n = self.blocks.len() + 1;
        loop {
            let id = format!("b{}", n);
            if !self.blocks.contains_key(&id) {
                return id;
            }
            n += 1;
        }
    }
}

impl BlockGraph for Workspace {
    fn top_blocks(&self) -> Vec<&str> {
        let mut top = self
            .blocks
            .values()
            .filter(|b| b.parent.is_none())
            .collect::<Vec<_>>();
        top.sort_by_key(|b| (b.y, b.x, b.created));
        top.into_iter().map(|b| b.id.as_str()).collect()
    }

    fn block_type(&self, id: &str) -> Option<&str> {
        self.blocks.get(id).map(|b| b.type_id.as_str())
    }

    fn field(&self, id: &str, name: &str) -> Option<&str> {
        self.blocks.get(id)?.fields.get(name).map(String::as_str)
    }

    fn input(&self, id: &str, name: &str) -> Option<&str> {
        self.blocks.get(id)?.inputs.get(name).map(String::as_str)
    }

    fn next(&self, id: &str) -> Option<&str> {
        self.blocks.get(id)?.next.as_deref()
    }

    fn previous(&self, id: &str) -> Option<&str> {
        match self.blocks.get(id)?.parent.as_ref()? {
            (parent, ParentLink::Previous) => Some(parent.as_str()),
            _ => None,
        }
    }

    fn mutation(&self, id: &str, key: &str) -> Option<&str> {
        self.blocks.get(id)?.mutation.get(key).map(String::as_str)
    }
}

/// Variable id to name, from the save's top-level `variables` array.
fn json_variable_names(value: &Value) -> HashMap<String, String> {
    value
        .get("variables")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|var| {
            let id = var.get("id")?.as_str()?;
            let name = var.get("name")?.as_str()?;
            Some((id.to_string(), name.to_string()))
        })
        .collect()
}

fn json_field_text(value: &Value, names: &HashMap<String, String>) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        // Variable fields serialize as {"id": ...}, sometimes with "name".
        Value::Object(obj) => {
            if let Some(name) = obj.get("name").and_then(Value::as_str) {
                return name.to_string();
            }
            match obj.get("id").and_then(Value::as_str) {
                Some(id) => names.get(id).cloned().unwrap_or_else(|| id.to_string()),
                None => String::new(),
            }
        }
        Value::Null | Value::Array(_) => String::new(),
    }
}

/// JSON extra-state keys map onto the XML mutation attribute names.
fn mutation_key(key: &str) -> String {
    match key {
        "elseIfCount" => "elseif".to_string(),
        "hasElse" => "else".to_string(),
        "itemCount" => "items".to_string(),
        other => other.to_string(),
    }
}

fn child_elements(el: &Element) -> impl Iterator<Item = &Element> {
    el.children.iter().filter_map(|node| match node {
        XMLNode::Element(e) => Some(e),
        _ => None,
    })
}

fn required_attr(el: &Element, name: &str) -> Result<String> {
    el.attributes
        .get(name)
        .cloned()
        .ok_or_else(|| anyhow!("<{}> element missing '{}' attribute.", el.name, name))
}

fn attr_i64(el: &Element, name: &str) -> i64 {
    el.attributes
        .get(name)
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| v as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_enforces_tree_shape() {
        let mut ws = Workspace::new();
        ws.add_block("a", "text_print").unwrap();
        ws.add_block("b", "text_print").unwrap();
        ws.add_block("c", "text_print").unwrap();
        ws.connect_next("a", "b").unwrap();
        assert!(ws.connect_next("c", "b").is_err());
        assert!(ws.connect_next("b", "a").is_err());
        assert_eq!(ws.previous("b"), Some("a"));
        assert_eq!(ws.top_blocks(), vec!["a", "c"]);
    }

    #[test]
    fn top_blocks_follow_position_not_creation() {
        let mut ws = Workspace::new();
        ws.add_block("late", "text").unwrap();
        ws.add_block("early", "text").unwrap();
        ws.set_position("late", 0, 200).unwrap();
        ws.set_position("early", 0, 10).unwrap();
        assert_eq!(ws.top_blocks(), vec!["early", "late"]);
    }

    #[test]
    fn remove_block_drops_subtree() {
        let mut ws = Workspace::new();
        ws.add_block("p", "text_print").unwrap();
        ws.add_block("t", "text").unwrap();
        ws.add_block("n", "text_print").unwrap();
        ws.connect_input("p", "TEXT", "t").unwrap();
        ws.connect_next("p", "n").unwrap();
        ws.remove_block("p").unwrap();
        assert!(ws.is_empty());
    }

    #[test]
    fn loads_json_serialization_with_shadows() {
        let ws = Workspace::from_json_str(
            r#"{"blocks": {"languageVersion": 0, "blocks": [
                {"type": "controls_repeat_ext", "id": "loop", "x": 10, "y": 20,
                 "inputs": {"TIMES": {"shadow": {"type": "math_number", "id": "n", "fields": {"NUM": 10}}}},
                 "next": {"block": {"type": "variables_set", "id": "set",
                    "fields": {"VAR": {"id": "v1", "name": "total"}}}}}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(ws.input("loop", "TIMES"), Some("n"));
        assert_eq!(ws.field("n", "NUM"), Some("10"));
        assert!(ws.get("n").unwrap().shadow);
        assert_eq!(ws.next("loop"), Some("set"));
        assert_eq!(ws.field("set", "VAR"), Some("total"));
        assert_eq!(ws.top_blocks(), vec!["loop"]);
    }

    #[test]
    fn loads_xml_serialization() {
        let ws = Workspace::from_xml_str(
            r#"<xml xmlns="https://developers.google.com/blockly/xml">
                 <block type="controls_if" id="if1" x="5" y="5">
                   <mutation else="1"></mutation>
                   <value name="IF0"><block type="logic_boolean" id="cond"><field name="BOOL">TRUE</field></block></value>
                   <statement name="DO0"><block type="text_print" id="p1"></block></statement>
                 </block>
               </xml>"#,
        )
        .unwrap();
        assert_eq!(ws.mutation("if1", "else"), Some("1"));
        assert_eq!(ws.input("if1", "IF0"), Some("cond"));
        assert_eq!(ws.input("if1", "DO0"), Some("p1"));
        assert_eq!(ws.field("cond", "BOOL"), Some("TRUE"));
    }

    #[test]
    fn json_without_blocks_key_is_empty() {
        assert!(Workspace::from_json_str("{}").unwrap().is_empty());
        let ws = Workspace::from_json_str(r#"{"variables": [{"name": "a", "id": "v"}]}"#).unwrap();
        assert!(ws.is_empty());
    }

    #[test]
    fn json_with_malformed_blocks_is_an_error() {
        assert!(Workspace::from_json_str(r#"{"blocks": {"languageVersion": 0}}"#).is_err());
        assert!(Workspace::from_json_str(r#"{"blocks": 3}"#).is_err());
        assert!(Workspace::from_json_str("[]").is_err());
    }

    #[test]
    fn id_only_variable_fields_use_saved_names() {
        let ws = Workspace::from_json_str(
            r#"{
              "blocks": {"blocks": [
                {"type": "variables_get", "id": "known", "fields": {"VAR": {"id": "k#9Vz"}}},
                {"type": "variables_get", "id": "orphan", "fields": {"VAR": {"id": "gone"}}}
              ]},
              "variables": [{"name": "total", "id": "k#9Vz"}]
            }"#,
        )
        .unwrap();
        assert_eq!(ws.field("known", "VAR"), Some("total"));
        assert_eq!(ws.field("orphan", "VAR"), Some("gone"));
    }
}
