//! Base rule set for the standard block vocabulary, emitting JavaScript.

use crate::generator::{GenContext, Generator, LanguageSyntax, Order, RuleSet};

pub const ORDER_ATOMIC: Order = Order::ATOMIC;
pub const ORDER_MEMBER: Order = Order(12);
pub const ORDER_FUNCTION_CALL: Order = Order(20);
pub const ORDER_UNARY_NEGATION: Order = Order(43);
pub const ORDER_LOGICAL_NOT: Order = Order(44);
pub const ORDER_MULTIPLICATION: Order = Order(51);
pub const ORDER_DIVISION: Order = Order(52);
pub const ORDER_MODULUS: Order = Order(53);
pub const ORDER_SUBTRACTION: Order = Order(61);
pub const ORDER_ADDITION: Order = Order(62);
pub const ORDER_RELATIONAL: Order = Order(80);
pub const ORDER_EQUALITY: Order = Order(90);
pub const ORDER_LOGICAL_AND: Order = Order(130);
pub const ORDER_LOGICAL_OR: Order = Order(140);
pub const ORDER_CONDITIONAL: Order = Order(150);
pub const ORDER_ASSIGNMENT: Order = Order(160);
pub const ORDER_COMMA: Order = Order(180);
pub const ORDER_NONE: Order = Order::NONE;

const RESERVED_WORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "export", "extends", "finally", "for", "function", "if", "import", "in", "instanceof",
    "new", "return", "super", "switch", "this", "throw", "try", "typeof", "var", "void", "while",
    "with", "yield", "let", "static", "true", "false", "null", "undefined", "Math", "window",
    "drawCircle",
];

pub fn syntax() -> LanguageSyntax {
    LanguageSyntax {
        line_comment: "//",
        block_comment: ("/*", "*/"),
        order_overrides: vec![
            (ORDER_FUNCTION_CALL, ORDER_MEMBER),
            (ORDER_FUNCTION_CALL, ORDER_FUNCTION_CALL),
            (ORDER_MEMBER, ORDER_MEMBER),
            (ORDER_MEMBER, ORDER_FUNCTION_CALL),
            (ORDER_LOGICAL_NOT, ORDER_LOGICAL_NOT),
            (ORDER_MULTIPLICATION, ORDER_MULTIPLICATION),
            (ORDER_ADDITION, ORDER_ADDITION),
            (ORDER_LOGICAL_AND, ORDER_LOGICAL_AND),
            (ORDER_LOGICAL_OR, ORDER_LOGICAL_OR),
        ],
        reserved_words: RESERVED_WORDS,
    }
}

pub fn rules() -> RuleSet {
    RuleSet::new()
        .statement("controls_if", controls_if)
        .statement("controls_repeat_ext", controls_repeat_ext)
        .statement("controls_repeat", controls_repeat)
        .statement("controls_whileUntil", controls_while_until)
        .value("logic_compare", logic_compare)
        .value("logic_operation", logic_operation)
        .value("logic_negate", logic_negate)
        .value("logic_boolean", logic_boolean)
        .value("logic_null", logic_null)
        .value("logic_ternary", logic_ternary)
        .value("math_number", math_number)
        .value("math_arithmetic", math_arithmetic)
        .statement("math_change", math_change)
        .value("text", text)
        .value("text_join", text_join)
        .statement("text_print", text_print)
        .value("variables_get", variables_get)
        .statement("variables_set", variables_set)
}

pub fn generator() -> Generator {
    Generator::new("javascript", rules(), syntax())
}

/// Single-quoted JavaScript string literal.
pub fn quote(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r");
    format!("'{}'", escaped)
}

fn controls_if(ctx: &mut GenContext<'_>, id: &str) -> String {
    let else_ifs = ctx
        .mutation(id, "elseif")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut code = String::new();
    for n in 0..=else_ifs {
        let condition = ctx.value_or(id, &format!("IF{}", n), ORDER_NONE, "false");
        let branch = ctx.statement_to_code(id, &format!("DO{}", n));
        if n > 0 {
            code.push_str(" else ");
        }
        code.push_str(&format!("if ({}) {{\n{}}}", condition, branch));
    }
    let has_else = matches!(ctx.mutation(id, "else"), Some("1") | Some("true"));
    if has_else || ctx.graph().input(id, "ELSE").is_some() {
        let branch = ctx.statement_to_code(id, "ELSE");
        code.push_str(&format!(" else {{\n{}}}", branch));
    }
    code.push('\n');
    code
}

fn repeat_loop(ctx: &mut GenContext<'_>, times: String, id: &str) -> String {
    let branch = ctx.statement_to_code(id, "DO");
    let counter = ctx.fresh_name("count");
    format!(
        "for (var {c} = 0; {c} < {t}; {c}++) {{\n{b}}}\n",
        c = counter,
        t = times,
        b = branch
    )
}

fn controls_repeat_ext(ctx: &mut GenContext<'_>, id: &str) -> String {
    let times = ctx.value_or(id, "TIMES", ORDER_RELATIONAL, "0");
    repeat_loop(ctx, times, id)
}

fn controls_repeat(ctx: &mut GenContext<'_>, id: &str) -> String {
    let times = ctx.field_or(id, "TIMES", "0");
    let times = match times.parse::<f64>() {
        Ok(n) => format_number(n),
        Err(_) => "0".to_string(),
    };
    repeat_loop(ctx, times, id)
}

fn controls_while_until(ctx: &mut GenContext<'_>, id: &str) -> String {
    let until = ctx.field(id, "MODE") == Some("UNTIL");
    let condition = if until {
        let inner = ctx.value_or(id, "BOOL", ORDER_LOGICAL_NOT, "false");
        format!("!{}", inner)
    } else {
        ctx.value_or(id, "BOOL", ORDER_NONE, "false")
    };
    let branch = ctx.statement_to_code(id, "DO");
    format!("while ({}) {{\n{}}}\n", condition, branch)
}

fn logic_compare(ctx: &mut GenContext<'_>, id: &str) -> (String, Order) {
    let op = match ctx.field(id, "OP").unwrap_or("EQ") {
        "NEQ" => "!=",
        "LT" => "<",
        "LTE" => "<=",
        "GT" => ">",
        "GTE" => ">=",
        _ => "==",
    };
    let order = if op == "==" || op == "!=" {
        ORDER_EQUALITY
    } else {
        ORDER_RELATIONAL
    };
    let a = ctx.value_or(id, "A", order, "0");
    let b = ctx.value_or(id, "B", order, "0");
    (format!("{} {} {}", a, op, b), order)
}

fn logic_operation(ctx: &mut GenContext<'_>, id: &str) -> (String, Order) {
    let and = ctx.field(id, "OP") != Some("OR");
    let (op, order) = if and {
        ("&&", ORDER_LOGICAL_AND)
    } else {
        ("||", ORDER_LOGICAL_OR)
    };
    let has_a = ctx.graph().input(id, "A").is_some();
    let has_b = ctx.graph().input(id, "B").is_some();
    // One missing operand must not change the result of the other.
    let missing = match (has_a, has_b) {
        (false, false) => "false",
        _ if and => "true",
        _ => "false",
    };
    let a = ctx.value_or(id, "A", order, missing);
    let b = ctx.value_or(id, "B", order, missing);
    (format!("{} {} {}", a, op, b), order)
}

fn logic_negate(ctx: &mut GenContext<'_>, id: &str) -> (String, Order) {
    let arg = ctx.value_or(id, "BOOL", ORDER_LOGICAL_NOT, "true");
    (format!("!{}", arg), ORDER_LOGICAL_NOT)
}

fn logic_boolean(ctx: &mut GenContext<'_>, id: &str) -> (String, Order) {
    let value = if ctx.field(id, "BOOL") == Some("TRUE") {
        "true"
    } else {
        "false"
    };
    (value.to_string(), ORDER_ATOMIC)
}

fn logic_null(_: &mut GenContext<'_>, _: &str) -> (String, Order) {
    ("null".to_string(), ORDER_ATOMIC)
}

fn logic_ternary(ctx: &mut GenContext<'_>, id: &str) -> (String, Order) {
    let condition = ctx.value_or(id, "IF", ORDER_CONDITIONAL, "false");
    let then = ctx.value_or(id, "THEN", ORDER_CONDITIONAL, "null");
    let otherwise = ctx.value_or(id, "ELSE", ORDER_CONDITIONAL, "null");
    (
        format!("{} ? {} : {}", condition, then, otherwise),
        ORDER_CONDITIONAL,
    )
}

fn math_number(ctx: &mut GenContext<'_>, id: &str) -> (String, Order) {
    let n = ctx
        .field(id, "NUM")
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or(0.0);
    let order = if n < 0.0 {
        ORDER_UNARY_NEGATION
    } else {
        ORDER_ATOMIC
    };
    (format_number(n), order)
}

fn math_arithmetic(ctx: &mut GenContext<'_>, id: &str) -> (String, Order) {
    let (op, order) = match ctx.field(id, "OP").unwrap_or("ADD") {
        "MINUS" => (Some(" - "), ORDER_SUBTRACTION),
        "MULTIPLY" => (Some(" * "), ORDER_MULTIPLICATION),
        "DIVIDE" => (Some(" / "), ORDER_DIVISION),
        "POWER" => (None, ORDER_COMMA),
        _ => (Some(" + "), ORDER_ADDITION),
    };
    let a = ctx.value_or(id, "A", order, "0");
    let b = ctx.value_or(id, "B", order, "0");
    match op {
        Some(op) => (format!("{}{}{}", a, op, b), order),
        None => (format!("Math.pow({}, {})", a, b), ORDER_FUNCTION_CALL),
    }
}

fn math_change(ctx: &mut GenContext<'_>, id: &str) -> String {
    let delta = ctx.value_or(id, "DELTA", ORDER_ASSIGNMENT, "0");
    let raw = ctx.field_or(id, "VAR", "item");
    let name = ctx.variable(&raw);
    format!("{} += {};", name, delta)
}

fn text(ctx: &mut GenContext<'_>, id: &str) -> (String, Order) {
    (quote(ctx.field(id, "TEXT").unwrap_or("")), ORDER_ATOMIC)
}

fn text_join(ctx: &mut GenContext<'_>, id: &str) -> (String, Order) {
    let items = ctx
        .mutation(id, "items")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(2);
    match items {
        0 => ("''".to_string(), ORDER_ATOMIC),
        1 => {
            let only = ctx.value_or(id, "ADD0", ORDER_NONE, "''");
            (format!("String({})", only), ORDER_FUNCTION_CALL)
        }
        _ => {
            let parts = (0..items)
                .map(|n| ctx.value_or(id, &format!("ADD{}", n), ORDER_ADDITION, "''"))
                .collect::<Vec<_>>();
            (parts.join(" + "), ORDER_ADDITION)
        }
    }
}

fn text_print(ctx: &mut GenContext<'_>, id: &str) -> String {
    let msg = ctx.value_or(id, "TEXT", ORDER_NONE, "''");
    format!("window.alert({});", msg)
}

fn variables_get(ctx: &mut GenContext<'_>, id: &str) -> (String, Order) {
    let raw = ctx.field_or(id, "VAR", "item");
    let name = ctx.variable(&raw);
    (name, ORDER_ATOMIC)
}

fn variables_set(ctx: &mut GenContext<'_>, id: &str) -> String {
    let value = ctx.value_or(id, "VALUE", ORDER_ASSIGNMENT, "0");
    let raw = ctx.field_or(id, "VAR", "item");
    let name = ctx.variable(&raw);
    format!("{} = {};", name, value)
}

pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Workspace;

    fn number(ws: &mut Workspace, id: &str, n: &str) {
        ws.add_block(id, "math_number").unwrap();
        ws.set_field(id, "NUM", n).unwrap();
    }

    #[test]
    fn arithmetic_nests_with_parentheses() {
        let mut ws = Workspace::new();
        ws.add_block("mul", "math_arithmetic").unwrap();
        ws.set_field("mul", "OP", "MULTIPLY").unwrap();
        ws.add_block("add", "math_arithmetic").unwrap();
        ws.set_field("add", "OP", "ADD").unwrap();
        number(&mut ws, "one", "1");
        number(&mut ws, "two", "2");
        number(&mut ws, "three", "3");
        ws.connect_input("add", "A", "one").unwrap();
        ws.connect_input("add", "B", "two").unwrap();
        ws.connect_input("mul", "A", "add").unwrap();
        ws.connect_input("mul", "B", "three").unwrap();
        assert_eq!(generator().workspace_to_code(&ws), "(1 + 2) * 3;\n");
    }

    #[test]
    fn if_else_if_else_chain() {
        let mut ws = Workspace::new();
        ws.add_block("if", "controls_if").unwrap();
        ws.set_mutation("if", "elseif", "1").unwrap();
        ws.set_mutation("if", "else", "1").unwrap();
        ws.add_block("t", "logic_boolean").unwrap();
        ws.set_field("t", "BOOL", "TRUE").unwrap();
        ws.connect_input("if", "IF0", "t").unwrap();
        ws.add_block("p", "text_print").unwrap();
        ws.connect_input("if", "DO0", "p").unwrap();
        let code = generator().workspace_to_code(&ws);
        assert_eq!(
            code,
            "if (true) {\n  window.alert('');\n} else if (false) {\n} else {\n}\n"
        );
    }

    #[test]
    fn repeat_declares_distinct_counters() {
        let mut ws = Workspace::new();
        ws.add_block("outer", "controls_repeat_ext").unwrap();
        ws.add_block("inner", "controls_repeat_ext").unwrap();
        number(&mut ws, "n1", "3");
        number(&mut ws, "n2", "2");
        ws.connect_input("outer", "TIMES", "n1").unwrap();
        ws.connect_input("inner", "TIMES", "n2").unwrap();
        ws.connect_input("outer", "DO", "inner").unwrap();
        let code = generator().workspace_to_code(&ws);
        assert!(code.contains("for (var count2 = 0; count2 < 3; count2++) {"));
        assert!(code.contains("  for (var count = 0; count < 2; count++) {"));
    }

    #[test]
    fn variables_are_declared_once_in_first_use_order() {
        let mut ws = Workspace::new();
        ws.add_block("s1", "variables_set").unwrap();
        ws.set_field("s1", "VAR", "total").unwrap();
        ws.add_block("s2", "variables_set").unwrap();
        ws.set_field("s2", "VAR", "my item").unwrap();
        ws.add_block("g", "variables_get").unwrap();
        ws.set_field("g", "VAR", "total").unwrap();
        ws.connect_input("s2", "VALUE", "g").unwrap();
        ws.connect_next("s1", "s2").unwrap();
        let code = generator().workspace_to_code(&ws);
        assert_eq!(code, "var total, my_item;\n\ntotal = 0;\nmy_item = total;\n");
    }

    #[test]
    fn logic_operation_defaults_keep_other_operand_meaningful() {
        let mut ws = Workspace::new();
        ws.add_block("and", "logic_operation").unwrap();
        ws.set_field("and", "OP", "AND").unwrap();
        ws.add_block("b", "logic_boolean").unwrap();
        ws.set_field("b", "BOOL", "FALSE").unwrap();
        ws.connect_input("and", "A", "b").unwrap();
        assert_eq!(generator().workspace_to_code(&ws), "false && true;\n");
    }

    #[test]
    fn quote_escapes_quotes_and_newlines() {
        assert_eq!(quote("it's\nok"), "'it\\'s\\nok'");
    }

    #[test]
    fn negative_numbers_are_parenthesized_under_negation() {
        let mut ws = Workspace::new();
        ws.add_block("not", "logic_negate").unwrap();
        number(&mut ws, "neg", "-2");
        ws.connect_input("not", "BOOL", "neg").unwrap();
        assert_eq!(generator().workspace_to_code(&ws), "!(-2);\n");
    }
}
