use std::path::Path;

use survey_analysis::Value;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Maps a raw text cell to a table value. Blank content is a missing answer.
pub fn text_to_value(s: &str) -> Value {
    if s.is_empty() {
        Value::Empty
    } else {
        Value::Text(s.to_string())
    }
}

/// The name given to a header cell with no usable content.
pub fn default_column_name(idx: usize) -> String {
    format!("column_{}", idx + 1)
}
