use wasm_bindgen::prelude::*;

use crate::{ExportConfig, SessionContext};

/// Page and capture a report. `config_json` may be empty for defaults.
/// Returns an empty array when there is nothing to export.
#[wasm_bindgen]
pub fn render_report(json: &str, config_json: &str) -> Result<Vec<u8>, JsValue> {
    let config = if config_json.trim().is_empty() {
        ExportConfig::default()
    } else {
        ExportConfig::from_json(config_json).map_err(to_js)?
    };
    let doc = crate::render_report_json(json, config, SessionContext::default()).map_err(to_js)?;
    Ok(doc.map(|d| d.bytes).unwrap_or_default())
}

/// The page partition, for a preview pane.
#[wasm_bindgen]
pub fn page_layout(json: &str, config_json: &str) -> Result<JsValue, JsValue> {
    let config = if config_json.trim().is_empty() {
        ExportConfig::default()
    } else {
        ExportConfig::from_json(config_json).map_err(to_js)?
    };
    let report = crate::parse_report(json).map_err(to_js)?;
    let mut preview = crate::ReportPreview::new(config, SessionContext::default());
    let pages = preview.refresh(&report);
    serde_wasm_bindgen::to_value(pages).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn to_js(e: crate::LaminaError) -> JsValue {
    let message = match e.hint() {
        Some(hint) => format!("{e}\nHint: {hint}"),
        None => e.to_string(),
    };
    js_sys::Error::new(&message).into()
}
