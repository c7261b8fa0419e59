use serde::Serialize;
use wasm_bindgen::prelude::*;

use hapticscore::{ConversionParameters, ConvertError, Diagnostic};

#[derive(Serialize)]
struct PartEntry<'a> {
    id: &'a str,
    name: &'a str,
}

fn error_json(e: &ConvertError) -> String {
    serde_json::to_string(&e.diagnostics())
        .or_else(|_| serde_json::to_string(&e.to_string()))
        .unwrap_or_else(|_| "[]".to_string())
}

fn to_js_error(e: ConvertError) -> JsValue {
    JsValue::from_str(&error_json(&e))
}

fn parameters(params_json: &str) -> Result<ConversionParameters, ConvertError> {
    if params_json.trim().is_empty() {
        return Ok(ConversionParameters::default());
    }
    ConversionParameters::from_json_str(params_json)
}

/// List the score's parts as a JSON array of `{id, name}`
#[wasm_bindgen]
pub fn parse_parts(xml: &str) -> Result<String, JsValue> {
    let score = hapticscore::parse_musicxml(xml).map_err(to_js_error)?;
    let parts: Vec<PartEntry> = score
        .part_names()
        .into_iter()
        .map(|(id, name)| PartEntry { id, name })
        .collect();
    serde_json::to_string(&parts).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Compile a score to schedule JSON.
/// Errors are thrown as a JSON array of diagnostics
#[wasm_bindgen]
pub fn convert(xml: &str, params_json: &str) -> Result<String, JsValue> {
    let params = parameters(params_json).map_err(to_js_error)?;
    hapticscore::convert_to_json(xml, &params).map_err(to_js_error)
}

/// Check a score against a role mapping and return diagnostics as a JSON array
#[wasm_bindgen]
pub fn check(xml: &str, params_json: &str) -> String {
    let diagnostics: Vec<Diagnostic> = match parameters(params_json) {
        Ok(params) => hapticscore::check(xml, &params),
        Err(e) => e.diagnostics(),
    };
    serde_json::to_string(&diagnostics).unwrap_or_else(|_| "[]".to_string())
}
