//! Automation vocabulary: every block becomes a commented stub call against
//! the external engine, so the output is inert until an engine binding exists.

use crate::generator::{GenContext, Generator, Order, RuleSet};
use crate::javascript::{quote, ORDER_NONE};

pub const ENGINE: &str = "engine";

pub fn rules() -> RuleSet {
    RuleSet::new()
        .statement("sap_login", sap_login)
        .statement("sap_logout", sap_logout)
        .statement("sap_start_transaction", sap_start_transaction)
        .statement("sap_set_field", sap_set_field)
        .value("sap_get_field", sap_get_field)
        .statement("sap_press_key", sap_press_key)
        .statement("sap_in_table", sap_in_table)
        .statement("sap_table_set_cell", sap_table_set_cell)
        .value("sap_table_row_count", sap_table_row_count)
}

/// Base generator plus the automation rules; `base` is not modified.
pub fn generator(base: &Generator) -> Generator {
    base.extend("automation", rules())
}

fn stub_call(ctx: &GenContext<'_>, method: &str, args: &[String]) -> String {
    ctx.line_comment(&format!("{}.{}({});", ENGINE, method, args.join(", ")))
}

fn sap_login(ctx: &mut GenContext<'_>, id: &str) -> String {
    let args = ["SYSTEM_ID", "CLIENT", "USER", "PASSWORD"]
        .iter()
        .map(|socket| ctx.value_to_code(id, socket, ORDER_NONE))
        .collect::<Vec<_>>();
    stub_call(ctx, "login", &args)
}

fn sap_logout(ctx: &mut GenContext<'_>, _: &str) -> String {
    stub_call(ctx, "logout", &[])
}

fn sap_start_transaction(ctx: &mut GenContext<'_>, id: &str) -> String {
    let tcode = ctx.value_to_code(id, "TCODE", ORDER_NONE);
    stub_call(ctx, "startTransaction", &[tcode])
}

fn sap_set_field(ctx: &mut GenContext<'_>, id: &str) -> String {
    let field = ctx.value_to_code(id, "FIELD_ID", ORDER_NONE);
    let value = ctx.value_to_code(id, "VALUE", ORDER_NONE);
    stub_call(ctx, "setField", &[field, value])
}

/// Value-position stub: the call stays in a comment and the declared output
/// kind's default literal stands in for its result.
fn stub_value(ctx: &GenContext<'_>, id: &str, method: &str, args: &[String]) -> (String, Order) {
    let call = format!("{}.{}({})", ENGINE, method, args.join(", "));
    (
        format!("{} {}", ctx.inline_comment(&call), ctx.output_default(id)),
        Order::ATOMIC,
    )
}

fn sap_get_field(ctx: &mut GenContext<'_>, id: &str) -> (String, Order) {
    let field = ctx.value_to_code(id, "FIELD_ID", ORDER_NONE);
    stub_value(ctx, id, "getField", &[field])
}

fn sap_press_key(ctx: &mut GenContext<'_>, id: &str) -> String {
    let key = quote(ctx.field(id, "KEY").unwrap_or("ENTER"));
    stub_call(ctx, "pressKey", &[key])
}

/// Container: the inner chain is fenced by begin/end marker comments.
fn sap_in_table(ctx: &mut GenContext<'_>, id: &str) -> String {
    let table = ctx.value_to_code(id, "TABLE_ID", ORDER_NONE);
    let body = ctx.statement_to_code(id, "DO");
    let mut code = ctx.line_comment(&format!("--- begin table {} ---", table));
    code.push_str(&body);
    code.push_str(&ctx.line_comment(&format!("--- end table {} ---", table)));
    code
}

fn sap_table_set_cell(ctx: &mut GenContext<'_>, id: &str) -> String {
    let row = ctx.value_to_code(id, "ROW", ORDER_NONE);
    let column = ctx.value_to_code(id, "COLUMN", ORDER_NONE);
    let value = ctx.value_to_code(id, "VALUE", ORDER_NONE);
    stub_call(ctx, "table.setCell", &[row, column, value])
}

fn sap_table_row_count(ctx: &mut GenContext<'_>, id: &str) -> (String, Order) {
    stub_value(ctx, id, "table.rowCount", &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks;
    use crate::graph::Workspace;
    use crate::javascript;
    use crate::schema::SchemaRegistry;
    use std::sync::Arc;

    fn automation() -> Generator {
        let mut registry = SchemaRegistry::new();
        registry.register(blocks::standard_definitions().unwrap()).unwrap();
        registry.register(blocks::automation_definitions().unwrap()).unwrap();
        generator(&javascript::generator().with_registry(Arc::new(registry)))
    }

    fn text(ws: &mut Workspace, id: &str, value: &str) {
        ws.add_block(id, "text").unwrap();
        ws.set_field(id, "TEXT", value).unwrap();
    }

    #[test]
    fn login_emits_one_comment_line_in_socket_order() {
        let mut ws = Workspace::new();
        ws.add_block("login", "sap_login").unwrap();
        for (socket, value) in [
            ("SYSTEM_ID", "PRD"),
            ("CLIENT", "100"),
            ("USER", "bob"),
            ("PASSWORD", "secret"),
        ] {
            let id = format!("t_{}", socket);
            text(&mut ws, &id, value);
            ws.connect_input("login", socket, &id).unwrap();
        }
        let code = automation().workspace_to_code(&ws);
        assert_eq!(code, "// engine.login('PRD', '100', 'bob', 'secret');\n");
    }

    #[test]
    fn unconnected_string_socket_uses_empty_literal() {
        let mut ws = Workspace::new();
        ws.add_block("tx", "sap_start_transaction").unwrap();
        let code = automation().workspace_to_code(&ws);
        assert_eq!(code, "// engine.startTransaction('');\n");
    }

    #[test]
    fn empty_table_emits_only_markers() {
        let mut ws = Workspace::new();
        ws.add_block("tbl", "sap_in_table").unwrap();
        text(&mut ws, "name", "ITEMS");
        ws.connect_input("tbl", "TABLE_ID", "name").unwrap();
        let code = automation().workspace_to_code(&ws);
        assert_eq!(
            code,
            "// --- begin table 'ITEMS' ---\n// --- end table 'ITEMS' ---\n"
        );
    }

    #[test]
    fn table_body_is_fenced_in_chain_order() {
        let mut ws = Workspace::new();
        ws.add_block("tbl", "sap_in_table").unwrap();
        ws.add_block("c1", "sap_table_set_cell").unwrap();
        ws.add_block("c2", "sap_press_key").unwrap();
        ws.set_field("c2", "KEY", "SAVE").unwrap();
        ws.connect_input("tbl", "DO", "c1").unwrap();
        ws.connect_next("c1", "c2").unwrap();
        let code = automation().workspace_to_code(&ws);
        let lines = code.lines().collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec![
                "// --- begin table '' ---",
                "  // engine.table.setCell(0, '', '');",
                "  // engine.pressKey('SAVE');",
                "// --- end table '' ---",
            ]
        );
    }

    #[test]
    fn value_stubs_stay_in_comments_with_kind_defaults() {
        let mut ws = Workspace::new();
        ws.add_block("p", "text_print").unwrap();
        ws.add_block("get", "sap_get_field").unwrap();
        text(&mut ws, "f", "F1");
        ws.connect_input("get", "FIELD_ID", "f").unwrap();
        ws.connect_input("p", "TEXT", "get").unwrap();
        ws.add_block("q", "text_print").unwrap();
        ws.add_block("rows", "sap_table_row_count").unwrap();
        ws.connect_input("q", "TEXT", "rows").unwrap();
        ws.connect_next("p", "q").unwrap();
        let code = automation().workspace_to_code(&ws);
        assert_eq!(
            code,
            "window.alert(/* engine.getField('F1') */ '');\nwindow.alert(/* engine.table.rowCount() */ 0);\n"
        );
    }

    #[test]
    fn automation_rules_do_not_leak_into_base() {
        let base = javascript::generator();
        let extended = generator(&base);
        assert!(extended.rules().contains("sap_login"));
        assert!(extended.rules().contains("controls_if"));
        assert!(!base.rules().contains("sap_login"));
    }
}
