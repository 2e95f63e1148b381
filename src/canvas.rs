//! Canvas vocabulary: one block calling the sandbox's drawing capability.

use crate::generator::{GenContext, Generator, RuleSet};
use crate::javascript::ORDER_NONE;

pub const DRAW_CIRCLE: &str = "drawCircle";

pub fn rules() -> RuleSet {
    RuleSet::new().statement("draw_circle", draw_circle)
}

pub fn generator(base: &Generator) -> Generator {
    base.extend("canvas", rules())
}

fn draw_circle(ctx: &mut GenContext<'_>, id: &str) -> String {
    let x = ctx.value_to_code(id, "X", ORDER_NONE);
    let y = ctx.value_to_code(id, "Y", ORDER_NONE);
    let radius = ctx.value_to_code(id, "RADIUS", ORDER_NONE);
    format!("{}({}, {}, {});", DRAW_CIRCLE, x, y, radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks;
    use crate::graph::Workspace;
    use crate::javascript;
    use crate::schema::SchemaRegistry;
    use std::sync::Arc;

    #[test]
    fn draw_circle_uses_declared_defaults() {
        let mut registry = SchemaRegistry::new();
        registry.register(blocks::canvas_definitions().unwrap()).unwrap();
        let gen = generator(&javascript::generator().with_registry(Arc::new(registry)));
        let mut ws = Workspace::new();
        ws.add_block("c", "draw_circle").unwrap();
        ws.add_block("x", "math_number").unwrap();
        ws.set_field("x", "NUM", "40").unwrap();
        ws.connect_input("c", "X", "x").unwrap();
        assert_eq!(gen.workspace_to_code(&ws), "drawCircle(40, 0, 10);\n");
    }
}
