use crate::graph::BlockGraph;
use crate::schema::SchemaRegistry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Precedence tag attached to an expression fragment. Lower binds tighter;
/// values are tenths so that `class()` groups related operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Order(pub u16);

impl Order {
    pub const ATOMIC: Order = Order(0);
    pub const NONE: Order = Order(990);

    pub fn class(self) -> u16 {
        self.0 / 10
    }
}

pub type StatementRule = fn(&mut GenContext<'_>, &str) -> String;
pub type ValueRule = fn(&mut GenContext<'_>, &str) -> (String, Order);

/// Emission rule for one block type.
#[derive(Clone, Copy)]
pub enum Rule {
    Statement(StatementRule),
    Value(ValueRule),
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::Statement(_) => write!(f, "Rule::Statement"),
            Rule::Value(_) => write!(f, "Rule::Value"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: HashMap<String, Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statement(mut self, type_id: &str, rule: StatementRule) -> Self {
        self.rules.insert(type_id.to_string(), Rule::Statement(rule));
        self
    }

    pub fn value(mut self, type_id: &str, rule: ValueRule) -> Self {
        self.rules.insert(type_id.to_string(), Rule::Value(rule));
        self
    }

    pub fn get(&self, type_id: &str) -> Option<Rule> {
        self.rules.get(type_id).copied()
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.rules.contains_key(type_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn type_ids(&self) -> Vec<&str> {
        let mut ids = self.rules.keys().map(String::as_str).collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }
}

/// Target-language conventions the generator core needs.
#[derive(Debug, Clone)]
pub struct LanguageSyntax {
    pub line_comment: &'static str,
    pub block_comment: (&'static str, &'static str),
    /// (outer, inner) pairs that never need parentheses, e.g. `a + (b + c)`.
    pub order_overrides: Vec<(Order, Order)>,
    pub reserved_words: &'static [&'static str],
}

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub indent: String,
    pub declare_variables: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            declare_variables: true,
        }
    }
}

/// Immutable rule table plus language conventions. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Generator {
    name: String,
    rules: Arc<RuleSet>,
    syntax: Arc<LanguageSyntax>,
    registry: Option<Arc<SchemaRegistry>>,
    options: GeneratorOptions,
}

impl Generator {
    pub fn new(name: &str, rules: RuleSet, syntax: LanguageSyntax) -> Self {
        Self {
            name: name.to_string(),
            rules: Arc::new(rules),
            syntax: Arc::new(syntax),
            registry: None,
            options: GeneratorOptions::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn syntax(&self) -> &LanguageSyntax {
        &self.syntax
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    pub fn with_options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Attaches the registry used for per-socket default literals.
    pub fn with_registry(mut self, registry: Arc<SchemaRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn registry(&self) -> Option<&SchemaRegistry> {
        self.registry.as_deref()
    }

    /// New generator whose table is this one's merged with `overrides`.
    /// `self` is left untouched.
    pub fn extend(&self, name: &str, overrides: RuleSet) -> Generator {
        let mut merged = (*self.rules).clone();
        for (type_id, rule) in overrides.rules {
            merged.rules.insert(type_id, rule);
        }
        debug!(
            base = %self.name,
            name,
            rules = merged.len(),
            "extended generator"
        );
        Generator {
            name: name.to_string(),
            rules: Arc::new(merged),
            syntax: Arc::clone(&self.syntax),
            registry: self.registry.clone(),
            options: self.options.clone(),
        }
    }

    pub fn workspace_to_code(&self, graph: &dyn BlockGraph) -> String {
        let roots = graph.top_blocks();
        self.generate(graph, &roots)
    }

    /// One generation pass over the given top-level blocks.
    pub fn generate(&self, graph: &dyn BlockGraph, roots: &[&str]) -> String {
        let mut ctx = GenContext::new(self, graph);
        let mut chunks = Vec::new();
        for &root in roots {
            let code = match self.rules.get(graph.block_type(root).unwrap_or("")) {
                Some(Rule::Value(_)) => {
                    let (expr, _) = ctx.expression(root);
                    let mut code = format!("{};\n", expr);
                    if let Some(next) = graph.next(root) {
                        code.push_str(&ctx.chain_to_code(Some(next)));
                    }
                    code
                }
                _ => ctx.chain_to_code(Some(root)),
            };
            if !code.is_empty() {
                chunks.push(code);
            }
        }
        let body = chunks.join("\n");
        let code = if ctx.variables.is_empty() || !self.options.declare_variables {
            body
        } else {
            format!("var {};\n\n{}", ctx.variables.join(", "), body)
        };
        finish(&code)
    }
}

/// Trims trailing blanks on every line and collapses trailing blank lines.
fn finish(code: &str) -> String {
    let mut lines = code.lines().map(str::trim_end).collect::<Vec<_>>();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    if lines.is_empty() {
        return String::new();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Per-pass state handed to every rule.
pub struct GenContext<'a> {
    generator: &'a Generator,
    graph: &'a dyn BlockGraph,
    variables: Vec<String>,
    variable_names: HashMap<String, String>,
    names: HashSet<String>,
    visited: HashSet<String>,
}

impl<'a> GenContext<'a> {
    fn new(generator: &'a Generator, graph: &'a dyn BlockGraph) -> Self {
        Self {
            generator,
            graph,
            variables: Vec::new(),
            variable_names: HashMap::new(),
            names: HashSet::new(),
            visited: HashSet::new(),
        }
    }

    pub fn graph(&self) -> &'a dyn BlockGraph {
        self.graph
    }

    pub fn field(&self, id: &str, name: &str) -> Option<&'a str> {
        self.graph.field(id, name)
    }

    pub fn field_or(&self, id: &str, name: &str, default: &str) -> String {
        self.field(id, name).unwrap_or(default).to_string()
    }

    pub fn mutation(&self, id: &str, key: &str) -> Option<&'a str> {
        self.graph.mutation(id, key)
    }

    pub fn indent(&self) -> &str {
        &self.generator.options.indent
    }

    pub fn line_comment(&self, text: &str) -> String {
        format!("{} {}\n", self.generator.syntax.line_comment, text)
    }

    /// `text` wrapped in the language's block comment. A closing delimiter
    /// inside `text` is broken up so the comment cannot end early.
    pub fn inline_comment(&self, text: &str) -> String {
        let (open, close) = self.generator.syntax.block_comment;
        let spaced = close.chars().map(String::from).collect::<Vec<_>>().join(" ");
        format!("{} {} {}", open, text.replace(close, &spaced), close)
    }

    /// Literal matching the output kind a block type declares, `''` when unknown.
    pub fn output_default(&self, id: &str) -> String {
        self.graph
            .block_type(id)
            .and_then(|t| self.generator.registry()?.get(t))
            .and_then(|def| def.connections.produces_value.as_ref()?.first())
            .map(|kind| kind.default_literal())
            .unwrap_or("''")
            .to_string()
    }

    /// Code for the block plugged into `socket`, parenthesized for `outer`.
    /// Unconnected sockets fall back to the registry's declared default.
    pub fn value_to_code(&mut self, id: &str, socket: &str, outer: Order) -> String {
        let fallback = self.socket_default(id, socket);
        self.value_or(id, socket, outer, &fallback)
    }

    /// Like `value_to_code` with an explicit default literal.
    pub fn value_or(&mut self, id: &str, socket: &str, outer: Order, default: &str) -> String {
        let graph = self.graph;
        match graph.input(id, socket) {
            Some(child) => {
                let (code, inner) = self.expression_or(child, default);
                if self.needs_parens(outer, inner) {
                    format!("({})", code)
                } else {
                    code
                }
            }
            None => default.to_string(),
        }
    }

    /// Code of the chain in a statement socket, each line indented once.
    pub fn statement_to_code(&mut self, id: &str, socket: &str) -> String {
        let graph = self.graph;
        let code = self.chain_to_code(graph.input(id, socket));
        prefix_lines(&code, &self.generator.options.indent)
    }

    /// Same as `statement_to_code` without indentation.
    pub fn statement_to_code_flat(&mut self, id: &str, socket: &str) -> String {
        let graph = self.graph;
        self.chain_to_code(graph.input(id, socket))
    }

    /// Records a variable for the top-level declaration and returns its safe name.
    /// Distinct raw names that sanitize alike get numbered: `my_var`, `my_var2`.
    pub fn variable(&mut self, raw: &str) -> String {
        if let Some(name) = self.variable_names.get(raw) {
            return name.clone();
        }
        let base = self.safe_name(raw);
        let mut name = base.clone();
        let mut n = 2usize;
        while self.variables.contains(&name) {
            name = format!("{}{}", base, n);
            n += 1;
        }
        self.variables.push(name.clone());
        self.variable_names.insert(raw.to_string(), name.clone());
        name
    }

    /// A loop counter name not used elsewhere in this pass: `count`, `count2`, ...
    pub fn fresh_name(&mut self, base: &str) -> String {
        let base = self.safe_name(base);
        let mut candidate = base.clone();
        let mut n = 2usize;
        while !self.names.insert(candidate.clone()) || self.variables.contains(&candidate) {
            candidate = format!("{}{}", base, n);
            n += 1;
        }
        candidate
    }

    pub fn safe_name(&self, raw: &str) -> String {
        safe_identifier(raw, self.generator.syntax.reserved_words)
    }

    fn socket_default(&self, id: &str, socket: &str) -> String {
        self.graph
            .block_type(id)
            .and_then(|t| self.generator.registry()?.socket_default(t, socket))
            .unwrap_or("''")
            .to_string()
    }

    fn needs_parens(&self, outer: Order, inner: Order) -> bool {
        if inner == Order::ATOMIC {
            return false;
        }
        let (outer_class, inner_class) = (outer.class(), inner.class());
        if outer_class > inner_class {
            return false;
        }
        if outer_class == inner_class && (outer_class == 0 || outer_class == Order::NONE.class()) {
            return false;
        }
        !self
            .generator
            .syntax
            .order_overrides
            .iter()
            .any(|&(o, i)| o == outer && i == inner)
    }

    fn expression(&mut self, id: &str) -> (String, Order) {
        self.expression_or(id, "null")
    }

    fn expression_or(&mut self, id: &str, default: &str) -> (String, Order) {
        let graph = self.graph;
        let type_id = graph.block_type(id).unwrap_or("");
        match self.generator.rules.get(type_id) {
            Some(Rule::Value(rule)) => rule(self, id),
            Some(Rule::Statement(_)) => {
                debug!(block = id, type_id, "statement block used as a value");
                (self.unsupported_inline(type_id, default), Order::ATOMIC)
            }
            None => (self.unsupported_inline(type_id, default), Order::ATOMIC),
        }
    }

    fn unsupported_inline(&self, type_id: &str, default: &str) -> String {
        let comment = self.inline_comment(&format!("Unsupported block type: {}", type_id));
        format!("{} {}", comment, default)
    }

    /// Walks a statement chain from `start`, emitting each block in order.
    pub fn chain_to_code(&mut self, start: Option<&str>) -> String {
        let mut out = String::new();
        let mut current = start.map(ToString::to_string);
        while let Some(id) = current {
            if !self.visited.insert(id.clone()) {
                out.push_str(&self.line_comment(&format!("warning: cyclic block chain at {}", id)));
                break;
            }
            out.push_str(&self.block_to_code(&id));
            current = self.graph.next(&id).map(ToString::to_string);
        }
        out
    }

    fn block_to_code(&mut self, id: &str) -> String {
        let graph = self.graph;
        let type_id = graph.block_type(id).unwrap_or("");
        match self.generator.rules.get(type_id) {
            Some(Rule::Statement(rule)) => {
                let code = rule(self, id);
                if code.is_empty() || code.ends_with('\n') {
                    code
                } else {
                    format!("{}\n", code)
                }
            }
            Some(Rule::Value(rule)) => {
                let (expr, _) = rule(self, id);
                format!("{};\n", expr)
            }
            None => {
                debug!(block = id, type_id, "no emission rule");
                self.line_comment(&format!("Unsupported block type: {} (block {})", type_id, id))
            }
        }
    }
}

pub fn prefix_lines(code: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(code.len());
    for line in code.split_inclusive('\n') {
        if line.trim().is_empty() {
            out.push_str(line);
        } else {
            out.push_str(prefix);
            out.push_str(line);
        }
    }
    out
}

pub fn safe_identifier(raw: &str, reserved: &[&str]) -> String {
    let mut name = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect::<String>();
    if name.is_empty() {
        name.push_str("unnamed");
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    if reserved.contains(&name.as_str()) {
        name.push('_');
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Workspace;

    fn say(ctx: &mut GenContext<'_>, id: &str) -> String {
        let text = ctx.value_or(id, "TEXT", Order::NONE, "''");
        format!("say({});", text)
    }

    fn word(ctx: &mut GenContext<'_>, id: &str) -> (String, Order) {
        (format!("'{}'", ctx.field_or(id, "W", "")), Order::ATOMIC)
    }

    fn sum(ctx: &mut GenContext<'_>, id: &str) -> (String, Order) {
        let a = ctx.value_or(id, "A", Order(62), "0");
        let b = ctx.value_or(id, "B", Order(62), "0");
        (format!("{} + {}", a, b), Order(62))
    }

    fn product(ctx: &mut GenContext<'_>, id: &str) -> (String, Order) {
        let a = ctx.value_or(id, "A", Order(51), "0");
        let b = ctx.value_or(id, "B", Order(51), "0");
        (format!("{} * {}", a, b), Order(51))
    }

    fn test_generator() -> Generator {
        let rules = RuleSet::new()
            .statement("say", say)
            .value("word", word)
            .value("sum", sum)
            .value("product", product);
        Generator::new(
            "test",
            rules,
            LanguageSyntax {
                line_comment: "//",
                block_comment: ("/*", "*/"),
                order_overrides: vec![(Order(62), Order(62))],
                reserved_words: &["var"],
            },
        )
    }

    #[test]
    fn empty_graph_generates_nothing() {
        let ws = Workspace::new();
        assert_eq!(test_generator().workspace_to_code(&ws), "");
    }

    #[test]
    fn chain_order_follows_links_not_creation() {
        let mut ws = Workspace::new();
        for id in ["c", "b", "a"] {
            ws.add_block(id, "say").unwrap();
            ws.add_block(&format!("{}_w", id), "word").unwrap();
            ws.set_field(&format!("{}_w", id), "W", id).unwrap();
            ws.connect_input(id, "TEXT", &format!("{}_w", id)).unwrap();
        }
        ws.connect_next("a", "b").unwrap();
        ws.connect_next("b", "c").unwrap();
        let code = test_generator().workspace_to_code(&ws);
        assert_eq!(code, "say('a');\nsay('b');\nsay('c');\n");
    }

    #[test]
    fn unknown_statement_block_becomes_comment() {
        let mut ws = Workspace::new();
        ws.add_block("x", "foo_bar").unwrap();
        ws.add_block("s", "say").unwrap();
        ws.connect_next("x", "s").unwrap();
        let code = test_generator().workspace_to_code(&ws);
        assert_eq!(code, "// Unsupported block type: foo_bar (block x)\nsay('');\n");
    }

    #[test]
    fn parenthesizes_looser_inner_expression() {
        let mut ws = Workspace::new();
        ws.add_block("p", "product").unwrap();
        ws.add_block("s", "sum").unwrap();
        ws.connect_input("p", "A", "s").unwrap();
        let code = test_generator().workspace_to_code(&ws);
        assert_eq!(code, "(0 + 0) * 0;\n");
    }

    #[test]
    fn override_pair_skips_parentheses() {
        let mut ws = Workspace::new();
        ws.add_block("outer", "sum").unwrap();
        ws.add_block("inner", "sum").unwrap();
        ws.connect_input("outer", "B", "inner").unwrap();
        let code = test_generator().workspace_to_code(&ws);
        assert_eq!(code, "0 + 0 + 0;\n");
    }

    #[test]
    fn extend_does_not_touch_base() {
        fn shout(_: &mut GenContext<'_>, _: &str) -> String {
            "SHOUT;".to_string()
        }
        let base = test_generator();
        let extended = base.extend("loud", RuleSet::new().statement("say", shout).statement("shout", shout));
        let mut ws = Workspace::new();
        ws.add_block("s", "say").unwrap();
        assert_eq!(base.workspace_to_code(&ws), "say('');\n");
        assert_eq!(extended.workspace_to_code(&ws), "SHOUT;\n");
        assert!(!base.rules().contains("shout"));
        assert!(extended.rules().contains("shout"));
    }

    #[test]
    fn unknown_type_cannot_close_the_inline_comment() {
        let mut ws = Workspace::new();
        ws.add_block("s", "say").unwrap();
        ws.add_block("x", "evil*/x").unwrap();
        ws.connect_input("s", "TEXT", "x").unwrap();
        let code = test_generator().workspace_to_code(&ws);
        assert_eq!(code, "say(/* Unsupported block type: evil* /x */ '');\n");
        assert_eq!(code.matches("*/").count(), 1);
    }

    #[test]
    fn variables_that_sanitize_alike_stay_distinct() {
        let generator = test_generator();
        let ws = Workspace::new();
        let mut ctx = GenContext::new(&generator, &ws);
        assert_eq!(ctx.variable("my var"), "my_var");
        assert_eq!(ctx.variable("my_var"), "my_var2");
        assert_eq!(ctx.variable("my var"), "my_var");
        assert_eq!(ctx.variable("my_var"), "my_var2");
        assert_eq!(ctx.variables, ["my_var", "my_var2"]);
    }

    #[test]
    fn safe_identifier_rewrites_awkward_names() {
        assert_eq!(safe_identifier("my var", &[]), "my_var");
        assert_eq!(safe_identifier("1st", &[]), "_1st");
        assert_eq!(safe_identifier("var", &["var"]), "var_");
    }
}
