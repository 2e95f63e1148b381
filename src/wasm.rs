use wasm_bindgen::prelude::*;

/// Generates script text for a serialized workspace (JSON or XML).
#[wasm_bindgen]
pub fn generate_code(workspace: &str, vocabulary: &str) -> Result<String, JsValue> {
    crate::generate_source(workspace, vocabulary).map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}

/// Toolbox XML for a named vocabulary.
#[wasm_bindgen]
pub fn toolbox_xml(vocabulary: &str) -> Result<String, JsValue> {
    crate::vocabulary::Vocabulary::parse(vocabulary)
        .and_then(|v| v.build())
        .and_then(|preset| preset.toolbox.to_xml())
        .map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}
