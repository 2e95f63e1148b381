//! Built-in block descriptors, in the JSON format the editor registers.

use crate::schema::{BlockTypeDefinition, DefinitionError};
use serde_json::Value;

pub const STANDARD_BLOCKS_JSON: &str = r##"[
  {
    "type": "controls_if",
    "message0": "if %1",
    "args0": [{"type": "input_value", "name": "IF0", "check": "Boolean"}],
    "message1": "do %1",
    "args1": [{"type": "input_statement", "name": "DO0"}],
    "previousStatement": null,
    "nextStatement": null,
    "colour": "%{BKY_LOGIC_HUE}",
    "tooltip": "If a value is true, then do some statements."
  },
  {
    "type": "logic_compare",
    "message0": "%1 %2 %3",
    "args0": [
      {"type": "input_value", "name": "A"},
      {"type": "field_dropdown", "name": "OP", "options": [
        ["=", "EQ"], ["≠", "NEQ"], ["<", "LT"], ["≤", "LTE"], [">", "GT"], ["≥", "GTE"]
      ]},
      {"type": "input_value", "name": "B"}
    ],
    "inputsInline": true,
    "output": "Boolean",
    "colour": "%{BKY_LOGIC_HUE}",
    "tooltip": "Compare two values."
  },
  {
    "type": "logic_operation",
    "message0": "%1 %2 %3",
    "args0": [
      {"type": "input_value", "name": "A", "check": "Boolean"},
      {"type": "field_dropdown", "name": "OP", "options": [["and", "AND"], ["or", "OR"]]},
      {"type": "input_value", "name": "B", "check": "Boolean"}
    ],
    "inputsInline": true,
    "output": "Boolean",
    "colour": "%{BKY_LOGIC_HUE}"
  },
  {
    "type": "logic_negate",
    "message0": "not %1",
    "args0": [{"type": "input_value", "name": "BOOL", "check": "Boolean", "default": "true"}],
    "output": "Boolean",
    "colour": "%{BKY_LOGIC_HUE}"
  },
  {
    "type": "logic_boolean",
    "message0": "%1",
    "args0": [{"type": "field_dropdown", "name": "BOOL", "options": [["true", "TRUE"], ["false", "FALSE"]]}],
    "output": "Boolean",
    "colour": "%{BKY_LOGIC_HUE}"
  },
  {
    "type": "logic_null",
    "message0": "null",
    "output": null,
    "colour": "%{BKY_LOGIC_HUE}"
  },
  {
    "type": "logic_ternary",
    "message0": "test %1",
    "args0": [{"type": "input_value", "name": "IF", "check": "Boolean"}],
    "message1": "if true %1",
    "args1": [{"type": "input_value", "name": "THEN"}],
    "message2": "if false %1",
    "args2": [{"type": "input_value", "name": "ELSE"}],
    "output": null,
    "colour": "%{BKY_LOGIC_HUE}"
  },
  {
    "type": "controls_repeat_ext",
    "message0": "repeat %1 times",
    "args0": [{"type": "input_value", "name": "TIMES", "check": "Number"}],
    "message1": "do %1",
    "args1": [{"type": "input_statement", "name": "DO"}],
    "previousStatement": null,
    "nextStatement": null,
    "colour": "%{BKY_LOOPS_HUE}"
  },
  {
    "type": "controls_repeat",
    "message0": "repeat %1 times",
    "args0": [{"type": "field_number", "name": "TIMES", "value": 10, "min": 0, "precision": 1}],
    "message1": "do %1",
    "args1": [{"type": "input_statement", "name": "DO"}],
    "previousStatement": null,
    "nextStatement": null,
    "colour": "%{BKY_LOOPS_HUE}"
  },
  {
    "type": "controls_whileUntil",
    "message0": "%1 %2",
    "args0": [
      {"type": "field_dropdown", "name": "MODE", "options": [["repeat while", "WHILE"], ["repeat until", "UNTIL"]]},
      {"type": "input_value", "name": "BOOL", "check": "Boolean"}
    ],
    "message1": "do %1",
    "args1": [{"type": "input_statement", "name": "DO"}],
    "previousStatement": null,
    "nextStatement": null,
    "colour": "%{BKY_LOOPS_HUE}"
  },
  {
    "type": "math_number",
    "message0": "%1",
    "args0": [{"type": "field_number", "name": "NUM", "value": 0}],
    "output": "Number",
    "colour": "%{BKY_MATH_HUE}"
  },
  {
    "type": "math_arithmetic",
    "message0": "%1 %2 %3",
    "args0": [
      {"type": "input_value", "name": "A", "check": "Number"},
      {"type": "field_dropdown", "name": "OP", "options": [
        ["+", "ADD"], ["-", "MINUS"], ["×", "MULTIPLY"], ["÷", "DIVIDE"], ["^", "POWER"]
      ]},
      {"type": "input_value", "name": "B", "check": "Number"}
    ],
    "inputsInline": true,
    "output": "Number",
    "colour": "%{BKY_MATH_HUE}"
  },
  {
    "type": "math_change",
    "message0": "change %1 by %2",
    "args0": [
      {"type": "field_variable", "name": "VAR", "variable": "item"},
      {"type": "input_value", "name": "DELTA", "check": "Number"}
    ],
    "previousStatement": null,
    "nextStatement": null,
    "colour": "%{BKY_VARIABLES_HUE}"
  },
  {
    "type": "text",
    "message0": "%1",
    "args0": [{"type": "field_input", "name": "TEXT", "text": ""}],
    "output": "String",
    "colour": "%{BKY_TEXTS_HUE}"
  },
  {
    "type": "text_join",
    "message0": "create text with %1 %2",
    "args0": [
      {"type": "input_value", "name": "ADD0"},
      {"type": "input_value", "name": "ADD1"}
    ],
    "output": "String",
    "colour": "%{BKY_TEXTS_HUE}"
  },
  {
    "type": "text_print",
    "message0": "print %1",
    "args0": [{"type": "input_value", "name": "TEXT"}],
    "previousStatement": null,
    "nextStatement": null,
    "colour": "%{BKY_TEXTS_HUE}"
  },
  {
    "type": "variables_get",
    "message0": "%1",
    "args0": [{"type": "field_variable", "name": "VAR", "variable": "item"}],
    "output": null,
    "colour": "%{BKY_VARIABLES_HUE}"
  },
  {
    "type": "variables_set",
    "message0": "set %1 to %2",
    "args0": [
      {"type": "field_variable", "name": "VAR", "variable": "item"},
      {"type": "input_value", "name": "VALUE", "default": "0"}
    ],
    "previousStatement": null,
    "nextStatement": null,
    "colour": "%{BKY_VARIABLES_HUE}"
  }
]"##;

pub const AUTOMATION_BLOCKS_JSON: &str = r##"[
  {
    "type": "sap_login",
    "message0": "log on to system %1 client %2 user %3 password %4",
    "args0": [
      {"type": "input_value", "name": "SYSTEM_ID", "check": "String"},
      {"type": "input_value", "name": "CLIENT", "check": "String"},
      {"type": "input_value", "name": "USER", "check": "String"},
      {"type": "input_value", "name": "PASSWORD", "check": "String"}
    ],
    "previousStatement": null,
    "nextStatement": null,
    "colour": 230,
    "tooltip": "Open a session on the given system and client."
  },
  {
    "type": "sap_logout",
    "message0": "log off",
    "previousStatement": null,
    "nextStatement": null,
    "colour": 230,
    "tooltip": "Close the current session."
  },
  {
    "type": "sap_start_transaction",
    "message0": "start transaction %1",
    "args0": [{"type": "input_value", "name": "TCODE", "check": "String"}],
    "previousStatement": null,
    "nextStatement": null,
    "colour": 200,
    "tooltip": "Start a transaction by its code."
  },
  {
    "type": "sap_set_field",
    "message0": "set field %1 to %2",
    "args0": [
      {"type": "input_value", "name": "FIELD_ID", "check": "String"},
      {"type": "input_value", "name": "VALUE"}
    ],
    "inputsInline": true,
    "previousStatement": null,
    "nextStatement": null,
    "colour": 200,
    "tooltip": "Type a value into a screen field."
  },
  {
    "type": "sap_get_field",
    "message0": "value of field %1",
    "args0": [{"type": "input_value", "name": "FIELD_ID", "check": "String"}],
    "output": "String",
    "colour": 200,
    "tooltip": "Read the current value of a screen field."
  },
  {
    "type": "sap_press_key",
    "message0": "press %1",
    "args0": [{"type": "field_dropdown", "name": "KEY", "options": [
      ["Enter", "ENTER"], ["Save", "SAVE"], ["Back", "BACK"], ["Execute (F8)", "F8"], ["Cancel", "CANCEL"]
    ]}],
    "previousStatement": null,
    "nextStatement": null,
    "colour": 200,
    "tooltip": "Send a function key to the active window."
  },
  {
    "type": "sap_in_table",
    "message0": "in table %1",
    "args0": [{"type": "input_value", "name": "TABLE_ID", "check": "String"}],
    "message1": "do %1",
    "args1": [{"type": "input_statement", "name": "DO"}],
    "previousStatement": null,
    "nextStatement": null,
    "colour": 160,
    "tooltip": "Run the inner blocks against one table control."
  },
  {
    "type": "sap_table_set_cell",
    "message0": "set cell row %1 column %2 to %3",
    "args0": [
      {"type": "input_value", "name": "ROW", "check": "Number"},
      {"type": "input_value", "name": "COLUMN", "check": "String"},
      {"type": "input_value", "name": "VALUE"}
    ],
    "inputsInline": true,
    "previousStatement": null,
    "nextStatement": null,
    "colour": 160,
    "tooltip": "Write a value into a cell of the enclosing table."
  },
  {
    "type": "sap_table_row_count",
    "message0": "row count",
    "output": "Number",
    "colour": 160,
    "tooltip": "Number of rows in the enclosing table."
  }
]"##;

pub const CANVAS_BLOCKS_JSON: &str = r##"[
  {
    "type": "draw_circle",
    "message0": "draw circle at x %1 y %2 radius %3",
    "args0": [
      {"type": "input_value", "name": "X", "check": "Number"},
      {"type": "input_value", "name": "Y", "check": "Number"},
      {"type": "input_value", "name": "RADIUS", "check": "Number", "default": "10"}
    ],
    "inputsInline": true,
    "previousStatement": null,
    "nextStatement": null,
    "colour": 20,
    "tooltip": "Draw a filled circle on the canvas."
  }
]"##;

fn parse_descriptors(source: &str) -> Result<Vec<BlockTypeDefinition>, DefinitionError> {
    let parsed: Value = serde_json::from_str(source).map_err(|e| DefinitionError {
        type_id: None,
        message: format!("Invalid built-in descriptors: {}", e),
    })?;
    parsed
        .as_array()
        .map(|items| items.iter().map(BlockTypeDefinition::from_json).collect())
        .unwrap_or_else(|| Ok(Vec::new()))
}

pub fn standard_definitions() -> Result<Vec<BlockTypeDefinition>, DefinitionError> {
    parse_descriptors(STANDARD_BLOCKS_JSON)
}

pub fn automation_definitions() -> Result<Vec<BlockTypeDefinition>, DefinitionError> {
    parse_descriptors(AUTOMATION_BLOCKS_JSON)
}

pub fn canvas_definitions() -> Result<Vec<BlockTypeDefinition>, DefinitionError> {
    parse_descriptors(CANVAS_BLOCKS_JSON)
}
