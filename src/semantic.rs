use crate::graph::{BlockGraph, Workspace};
use crate::schema::{SchemaRegistry, SocketKind};
use std::fmt::{Display, Formatter};

/// Containers that give table-cell blocks their context.
const TABLE_CONTAINERS: &[&str] = &["sap_in_table"];
const TABLE_CELL_BLOCKS: &[&str] = &["sap_table_set_cell", "sap_table_row_count"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    UnknownType,
    UndeclaredInput,
    UndeclaredField,
    ShapeMismatch,
    OutsideTable,
}

#[derive(Debug, Clone)]
pub struct SemanticWarning {
    pub kind: WarningKind,
    pub block_id: String,
    pub message: String,
}

impl Display for SemanticWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "block '{}': {}", self.block_id, self.message)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SemanticOptions {
    pub check_table_context: bool,
}

impl Default for SemanticOptions {
    fn default() -> Self {
        Self {
            check_table_context: true,
        }
    }
}

/// Non-fatal findings. Generation never depends on them.
#[derive(Debug, Clone, Default)]
pub struct SemanticReport {
    pub warnings: Vec<SemanticWarning>,
}

impl SemanticReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    fn push(&mut self, kind: WarningKind, block_id: &str, message: String) {
        self.warnings.push(SemanticWarning {
            kind,
            block_id: block_id.to_string(),
            message,
        });
    }
}

pub fn analyze(workspace: &Workspace, registry: &SchemaRegistry) -> SemanticReport {
    analyze_with_options(workspace, registry, SemanticOptions::default())
}

pub fn analyze_with_options(
    workspace: &Workspace,
    registry: &SchemaRegistry,
    options: SemanticOptions,
) -> SemanticReport {
    let mut report = SemanticReport::default();
    for id in workspace.block_ids() {
        let Some(node) = workspace.get(id) else {
            continue;
        };
        let Some(def) = registry.get(&node.type_id) else {
            report.push(
                WarningKind::UnknownType,
                id,
                format!("unknown block type '{}'", node.type_id),
            );
            continue;
        };

        for name in node.fields.keys() {
            let declared = matches!(def.socket(name).map(|s| &s.kind), Some(SocketKind::Field(_)));
            if !declared {
                report.push(
                    WarningKind::UndeclaredField,
                    id,
                    format!("field '{}' is not declared by '{}'", name, def.type_id),
                );
            }
        }

        for (name, child) in &node.inputs {
            let socket = def.socket(name).or_else(|| {
                let stem = digit_stem(name);
                def.sockets
                    .iter()
                    .find(|s| stem.len() < name.len() && digit_stem(&s.name) == stem)
            });
            if socket.is_none() && (digit_stem(name).len() < name.len() || node.mutation.is_empty()) {
                report.push(
                    WarningKind::UndeclaredInput,
                    id,
                    format!("input '{}' is not declared by '{}'", name, def.type_id),
                );
                continue;
            }
            // Mutator tails such as `ELSE` have no declared shape.
            let Some(socket) = socket else {
                continue;
            };
            let Some(child_def) = workspace.block_type(child).and_then(|t| registry.get(t)) else {
                continue;
            };
            let wants_value = socket.is_value();
            if wants_value != child_def.produces_value() {
                report.push(
                    WarningKind::ShapeMismatch,
                    id,
                    format!(
                        "'{}' block '{}' plugged into {} input '{}'",
                        child_def.type_id,
                        child,
                        if wants_value { "value" } else { "statement" },
                        name
                    ),
                );
            }
        }

        if options.check_table_context
            && TABLE_CELL_BLOCKS.contains(&node.type_id.as_str())
            && !inside_table(workspace, id)
        {
            report.push(
                WarningKind::OutsideTable,
                id,
                format!("'{}' used outside a table block", node.type_id),
            );
        }
    }
    for warning in &report.warnings {
        tracing::debug!(block = %warning.block_id, "{}", warning.message);
    }
    report
}

/// Mutated blocks grow numbered copies of declared sockets (`IF1`, `ADD2`).
fn digit_stem(name: &str) -> &str {
    name.trim_end_matches(|c: char| c.is_ascii_digit())
}

fn inside_table(workspace: &Workspace, id: &str) -> bool {
    let mut cursor = workspace.parent(id);
    while let Some(current) = cursor {
        if workspace
            .block_type(current)
            .map(|t| TABLE_CONTAINERS.contains(&t))
            .unwrap_or(false)
        {
            return true;
        }
        cursor = workspace.parent(current);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::Vocabulary;

    fn registry() -> std::sync::Arc<SchemaRegistry> {
        Vocabulary::Automation.build().unwrap().registry
    }

    #[test]
    fn clean_workspace_has_no_warnings() {
        let mut ws = Workspace::new();
        ws.add_block("p", "text_print").unwrap();
        ws.add_block("t", "text").unwrap();
        ws.set_field("t", "TEXT", "hi").unwrap();
        ws.connect_input("p", "TEXT", "t").unwrap();
        assert!(analyze(&ws, &registry()).is_clean());
    }

    #[test]
    fn reports_unknown_types() {
        let mut ws = Workspace::new();
        ws.add_block("x", "foo_bar").unwrap();
        let report = analyze(&ws, &registry());
        assert_eq!(report.count(WarningKind::UnknownType), 1);
        assert_eq!(report.warnings[0].block_id, "x");
    }

    #[test]
    fn table_cell_outside_table_is_only_a_warning() {
        let mut ws = Workspace::new();
        ws.add_block("cell", "sap_table_set_cell").unwrap();
        let report = analyze(&ws, &registry());
        assert_eq!(report.count(WarningKind::OutsideTable), 1);

        let relaxed = analyze_with_options(
            &ws,
            &registry(),
            SemanticOptions {
                check_table_context: false,
            },
        );
        assert!(relaxed.is_clean());
    }

    #[test]
    fn table_cell_nested_in_table_chain_is_fine() {
        let mut ws = Workspace::new();
        ws.add_block("tbl", "sap_in_table").unwrap();
        ws.add_block("key", "sap_press_key").unwrap();
        ws.add_block("cell", "sap_table_set_cell").unwrap();
        ws.connect_input("tbl", "DO", "key").unwrap();
        ws.connect_next("key", "cell").unwrap();
        assert_eq!(analyze(&ws, &registry()).count(WarningKind::OutsideTable), 0);
    }

    #[test]
    fn mutator_inputs_are_accepted() {
        let mut ws = Workspace::new();
        ws.add_block("if", "controls_if").unwrap();
        ws.set_mutation("if", "elseif", "1").unwrap();
        ws.add_block("c", "logic_boolean").unwrap();
        ws.connect_input("if", "IF1", "c").unwrap();
        assert!(analyze(&ws, &registry()).is_clean());
    }

    #[test]
    fn statement_block_in_value_socket_is_flagged() {
        let mut ws = Workspace::new();
        ws.add_block("p", "text_print").unwrap();
        ws.add_block("q", "sap_logout").unwrap();
        ws.connect_input("p", "TEXT", "q").unwrap();
        assert_eq!(analyze(&ws, &registry()).count(WarningKind::ShapeMismatch), 1);
    }

    #[test]
    fn undeclared_field_is_flagged() {
        let mut ws = Workspace::new();
        ws.add_block("n", "math_number").unwrap();
        ws.set_field("n", "NUMBER", "3").unwrap();
        assert_eq!(analyze(&ws, &registry()).count(WarningKind::UndeclaredField), 1);
    }
}
