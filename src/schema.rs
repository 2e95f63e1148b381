use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct DefinitionError {
    pub type_id: Option<String>,
    pub message: String,
}

impl DefinitionError {
    fn new(type_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            type_id: type_id.map(ToString::to_string),
            message: message.into(),
        }
    }
}

impl Display for DefinitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.type_id {
            Some(type_id) => write!(f, "Block type '{}': {}", type_id, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Error for DefinitionError {}

/// Kind of value a socket accepts or a block produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Other(String),
}

impl ValueKind {
    pub fn parse(name: &str) -> Self {
        match name {
            "String" => ValueKind::String,
            "Number" => ValueKind::Number,
            "Boolean" => ValueKind::Boolean,
            other => ValueKind::Other(other.to_string()),
        }
    }

    pub fn default_literal(&self) -> &'static str {
        match self {
            ValueKind::String => "''",
            ValueKind::Number => "0",
            ValueKind::Boolean => "false",
            ValueKind::Other(_) => "null",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldWidget {
    Text { default: String },
    Number { default: f64 },
    Dropdown { options: Vec<(String, String)> },
    Checkbox { checked: bool },
    Variable { default: String },
    Label { text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketKind {
    Value {
        check: Vec<ValueKind>,
        default: String,
    },
    Statement,
    Field(FieldWidget),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Socket {
    pub name: String,
    pub kind: SocketKind,
}

impl Socket {
    pub fn is_value(&self) -> bool {
        matches!(self.kind, SocketKind::Value { .. })
    }

    pub fn is_statement(&self) -> bool {
        matches!(self.kind, SocketKind::Statement)
    }

    /// Literal substituted when nothing is plugged into a value socket.
    pub fn default_literal(&self) -> Option<&str> {
        match &self.kind {
            SocketKind::Value { default, .. } => Some(default.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Connections {
    pub accepts_previous: bool,
    pub accepts_next: bool,
    /// `Some(check)` when the block plugs into value sockets.
    pub produces_value: Option<Vec<ValueKind>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Presentation {
    pub messages: Vec<String>,
    pub colour: String,
    pub tooltip: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockTypeDefinition {
    pub type_id: String,
    pub sockets: Vec<Socket>,
    pub connections: Connections,
    pub presentation: Presentation,
}

impl BlockTypeDefinition {
    pub fn socket(&self, name: &str) -> Option<&Socket> {
        self.sockets.iter().find(|s| s.name == name)
    }

    pub fn produces_value(&self) -> bool {
        self.connections.produces_value.is_some()
    }

    pub fn is_statement(&self) -> bool {
        self.connections.accepts_previous || self.connections.accepts_next
    }

    /// Parses one descriptor in the JSON format the editor uses for dynamic
    /// block registration.
    pub fn from_json(desc: &Value) -> Result<Self, DefinitionError> {
        let obj = desc
            .as_object()
            .ok_or_else(|| DefinitionError::new(None, "Block descriptor must be a JSON object."))?;
        let type_id = obj
            .get("type")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| DefinitionError::new(None, "Block descriptor missing 'type'."))?
            .to_string();

        let placeholder_re = Regex::new(r"%(\d+)")
            .map_err(|e| DefinitionError::new(Some(&type_id), e.to_string()))?;

        let mut messages = Vec::new();
        let mut sockets = Vec::new();
        let mut line = 0usize;
        while let Some(message) = obj.get(&format!("message{}", line)).and_then(Value::as_str) {
            let args = obj
                .get(&format!("args{}", line))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let mut referenced = HashSet::new();
            for cap in placeholder_re.captures_iter(message) {
                let index = cap[1].parse::<usize>().unwrap_or(0);
                if index == 0 || index > args.len() {
                    return Err(DefinitionError::new(
                        Some(&type_id),
                        format!(
                            "message{} placeholder %{} has no matching argument in args{}.",
                            line, index, line
                        ),
                    ));
                }
                referenced.insert(index);
            }
            if referenced.len() != args.len() {
                return Err(DefinitionError::new(
                    Some(&type_id),
                    format!(
                        "message{} references {} of {} arguments in args{}.",
                        line,
                        referenced.len(),
                        args.len(),
                        line
                    ),
                ));
            }
            for arg in &args {
                if let Some(socket) = socket_from_arg(&type_id, arg)? {
                    sockets.push(socket);
                }
            }
            messages.push(message.to_string());
            line += 1;
        }

        let produces_value = match obj.get("output") {
            None => None,
            Some(Value::Null) => Some(Vec::new()),
            Some(check) => Some(read_check(check)),
        };
        let connections = Connections {
            accepts_previous: obj.contains_key("previousStatement"),
            accepts_next: obj.contains_key("nextStatement"),
            produces_value,
        };
        let colour = match obj.get("colour") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let tooltip = obj
            .get("tooltip")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            type_id,
            sockets,
            connections,
            presentation: Presentation {
                messages,
                colour,
                tooltip,
            },
        })
    }
}

fn socket_from_arg(type_id: &str, arg: &Value) -> Result<Option<Socket>, DefinitionError> {
    let kind = arg.get("type").and_then(Value::as_str).unwrap_or("");
    if kind == "input_dummy" || kind == "input_end_row" {
        return Ok(None);
    }
    let name = arg.get("name").and_then(Value::as_str);
    let socket_kind = match kind {
        "input_value" => {
            let check = arg.get("check").map(read_check).unwrap_or_default();
            let default = match arg.get("default") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Bool(b)) => b.to_string(),
                _ => check
                    .first()
                    .map(|k| k.default_literal().to_string())
                    .unwrap_or_else(|| "''".to_string()),
            };
            SocketKind::Value { check, default }
        }
        "input_statement" => SocketKind::Statement,
        "field_input" | "field_multilinetext" => SocketKind::Field(FieldWidget::Text {
            default: arg
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        "field_number" => SocketKind::Field(FieldWidget::Number {
            default: arg.get("value").and_then(Value::as_f64).unwrap_or(0.0),
        }),
        "field_dropdown" => {
            let options = arg
                .get("options")
                .and_then(Value::as_array)
                .map(|opts| {
                    opts.iter()
                        .filter_map(|pair| {
                            let pair = pair.as_array()?;
                            let label = pair.first()?.as_str()?.to_string();
                            let value = pair.get(1)?.as_str()?.to_string();
                            Some((label, value))
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            if options.is_empty() {
                return Err(DefinitionError::new(
                    Some(type_id),
                    format!("Dropdown '{}' has no options.", name.unwrap_or("?")),
                ));
            }
            SocketKind::Field(FieldWidget::Dropdown { options })
        }
        "field_checkbox" => SocketKind::Field(FieldWidget::Checkbox {
            checked: arg
                .get("checked")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }),
        "field_variable" => SocketKind::Field(FieldWidget::Variable {
            default: arg
                .get("variable")
                .and_then(Value::as_str)
                .unwrap_or("item")
                .to_string(),
        }),
        "field_label" | "field_label_serializable" => {
            let text = arg
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            // Plain labels are presentation only.
            if name.is_none() {
                return Ok(None);
            }
            SocketKind::Field(FieldWidget::Label { text })
        }
        other => {
            return Err(DefinitionError::new(
                Some(type_id),
                format!("Unsupported argument type '{}'.", other),
            ))
        }
    };
    let name = name.filter(|n| !n.is_empty()).ok_or_else(|| {
        DefinitionError::new(Some(type_id), format!("Argument of type '{}' missing 'name'.", kind))
    })?;
    Ok(Some(Socket {
        name: name.to_string(),
        kind: socket_kind,
    }))
}

fn read_check(check: &Value) -> Vec<ValueKind> {
    match check {
        Value::String(s) => vec![ValueKind::parse(s)],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(ValueKind::parse)
            .collect(),
        _ => Vec::new(),
    }
}

/// Registry of block type definitions. Built once at startup, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    definitions: Vec<BlockTypeDefinition>,
    by_type: HashMap<String, usize>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<I>(&mut self, definitions: I) -> Result<(), DefinitionError>
    where
        I: IntoIterator<Item = BlockTypeDefinition>,
    {
        let batch = definitions.into_iter().collect::<Vec<_>>();
        let mut batch_types = HashSet::new();
        for def in &batch {
            if self.by_type.contains_key(&def.type_id) || !batch_types.insert(def.type_id.as_str()) {
                return Err(DefinitionError::new(
                    Some(&def.type_id),
                    "type is already registered.",
                ));
            }
            let mut names = HashSet::new();
            for socket in &def.sockets {
                if !names.insert(socket.name.as_str()) {
                    return Err(DefinitionError::new(
                        Some(&def.type_id),
                        format!("socket name '{}' is used more than once.", socket.name),
                    ));
                }
            }
            if def.produces_value() && def.is_statement() {
                warn!(
                    type_id = %def.type_id,
                    "block type declares both an output and statement connections"
                );
            }
        }
        for def in batch {
            debug!(type_id = %def.type_id, sockets = def.sockets.len(), "registered block type");
            self.by_type.insert(def.type_id.clone(), self.definitions.len());
            self.definitions.push(def);
        }
        Ok(())
    }

    /// Parses a JSON array of descriptors and registers all of them.
    pub fn register_json(&mut self, source: &str) -> Result<(), DefinitionError> {
        let parsed: Value = serde_json::from_str(source)
            .map_err(|e| DefinitionError::new(None, format!("Invalid block descriptor JSON: {}", e)))?;
        let items = match &parsed {
            Value::Array(items) => items.as_slice(),
            Value::Object(_) => std::slice::from_ref(&parsed),
            _ => {
                return Err(DefinitionError::new(
                    None,
                    "Block descriptors must be a JSON array or object.",
                ))
            }
        };
        let defs = items
            .iter()
            .map(BlockTypeDefinition::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        self.register(defs)
    }

    pub fn get(&self, type_id: &str) -> Option<&BlockTypeDefinition> {
        self.by_type.get(type_id).map(|&i| &self.definitions[i])
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.by_type.contains_key(type_id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockTypeDefinition> {
        self.definitions.iter()
    }

    pub fn socket_names(&self, type_id: &str) -> Option<Vec<&str>> {
        self.get(type_id)
            .map(|def| def.sockets.iter().map(|s| s.name.as_str()).collect())
    }

    pub fn socket_default(&self, type_id: &str, socket: &str) -> Option<&str> {
        self.get(type_id)?.socket(socket)?.default_literal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn login_descriptor() -> Value {
        json!({
            "type": "sap_login",
            "message0": "login system %1 client %2 user %3 password %4",
            "args0": [
                {"type": "input_value", "name": "SYSTEM_ID", "check": "String"},
                {"type": "input_value", "name": "CLIENT", "check": "String"},
                {"type": "input_value", "name": "USER", "check": "String"},
                {"type": "input_value", "name": "PASSWORD", "check": "String", "default": "'***'"}
            ],
            "previousStatement": null,
            "nextStatement": null,
            "colour": 210,
            "tooltip": "Log on"
        })
    }

    #[test]
    fn parses_descriptor_sockets_and_connections() {
        let def = BlockTypeDefinition::from_json(&login_descriptor()).unwrap();
        assert_eq!(def.type_id, "sap_login");
        assert_eq!(def.sockets.len(), 4);
        assert!(def.connections.accepts_previous);
        assert!(def.connections.accepts_next);
        assert!(!def.produces_value());
        assert_eq!(def.presentation.colour, "210");
        assert_eq!(def.socket("USER").and_then(Socket::default_literal), Some("''"));
        assert_eq!(def.socket("PASSWORD").and_then(Socket::default_literal), Some("'***'"));
    }

    #[test]
    fn dummy_inputs_are_not_sockets() {
        let def = BlockTypeDefinition::from_json(&json!({
            "type": "engine_logout",
            "message0": "log out %1",
            "args0": [{"type": "input_dummy"}],
            "previousStatement": null
        }))
        .unwrap();
        assert!(def.sockets.is_empty());
    }

    #[test]
    fn rejects_placeholder_without_argument() {
        let err = BlockTypeDefinition::from_json(&json!({
            "type": "broken",
            "message0": "value %1 and %2",
            "args0": [{"type": "input_value", "name": "A"}]
        }))
        .unwrap_err();
        assert_eq!(err.type_id.as_deref(), Some("broken"));
        assert!(err.message.contains("%2"));
    }

    #[test]
    fn duplicate_type_is_rejected() {
        let mut registry = SchemaRegistry::new();
        let def = BlockTypeDefinition::from_json(&login_descriptor()).unwrap();
        registry.register(vec![def.clone()]).unwrap();
        let err = registry.register(vec![def]).unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_within_batch_registers_nothing() {
        let mut registry = SchemaRegistry::new();
        let def = BlockTypeDefinition::from_json(&login_descriptor()).unwrap();
        assert!(registry.register(vec![def.clone(), def]).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn socket_name_collision_is_rejected() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .register_json(
                r#"[{
                    "type": "twice",
                    "message0": "%1 %2",
                    "args0": [
                        {"type": "input_value", "name": "X"},
                        {"type": "field_input", "name": "X", "text": ""}
                    ]
                }]"#,
            )
            .unwrap_err();
        assert!(err.message.contains("'X'"));
    }

    #[test]
    fn multi_line_messages_collect_all_sockets() {
        let mut registry = SchemaRegistry::new();
        registry
            .register_json(
                r#"{
                    "type": "engine_in_table",
                    "message0": "in table %1",
                    "args0": [{"type": "input_value", "name": "TABLE_ID", "check": "String"}],
                    "message1": "do %1",
                    "args1": [{"type": "input_statement", "name": "DO"}],
                    "previousStatement": null,
                    "nextStatement": null
                }"#,
            )
            .unwrap();
        assert_eq!(
            registry.socket_names("engine_in_table"),
            Some(vec!["TABLE_ID", "DO"])
        );
        assert!(registry.get("engine_in_table").unwrap().socket("DO").unwrap().is_statement());
    }
}
