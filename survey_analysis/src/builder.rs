use log::warn;

pub use crate::config::*;

/// A builder for assembling one language's [ResponseSet] from raw tabular
/// rows.
///
/// The builder attaches the `form_id`, `language`, `form_title` and
/// `translated` control columns to every row, the way the form retrieval
/// adapters annotate their payloads, and pads short rows so that every row
/// keeps the width of the header.
///
/// ```
/// pub use survey_analysis::builder::ResponseSetBuilder;
///
/// let mut builder = ResponseSetBuilder::new("en", "form-1", "Customer survey")
///     .header(&["Timestamp".to_string(), "Q1".to_string()]);
///
/// builder.add_text_row(&["2024-01-01 10:00:00".to_string(), "yes".to_string()]);
/// // A short row: Q1 is padded with an empty cell.
/// builder.add_text_row(&["2024-01-02 11:30:00".to_string()]);
///
/// let rs = builder.build();
/// assert_eq!(rs.response_count(), 2);
/// assert_eq!(rs.columns.len(), 6);
/// ```
pub struct ResponseSetBuilder {
    language: String,
    form_id: String,
    form_title: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    translated: bool,
}

impl ResponseSetBuilder {
    pub fn new(language: &str, form_id: &str, form_title: &str) -> ResponseSetBuilder {
        ResponseSetBuilder {
            language: language.to_string(),
            form_id: form_id.to_string(),
            form_title: form_title.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
            translated: false,
        }
    }

    /// The question columns of the source, in order.
    pub fn header(mut self, columns: &[String]) -> ResponseSetBuilder {
        self.columns = columns.to_vec();
        self
    }

    /// Marks the rows of this set as carrying translated text. The flag is
    /// set by the translation stage, never by the source adapters.
    pub fn translated(mut self, translated: bool) -> ResponseSetBuilder {
        self.translated = translated;
        self
    }

    /// Adds a row of raw text cells. Blank cells become missing values;
    /// rows shorter than the header are padded with missing values.
    pub fn add_text_row(&mut self, cells: &[String]) {
        let values: Vec<Value> = cells
            .iter()
            .map(|s| {
                if s.is_empty() {
                    Value::Empty
                } else {
                    Value::Text(s.clone())
                }
            })
            .collect();
        self.add_row(values);
    }

    /// Adds a row of already-typed cells, padding to the header width.
    /// Cells beyond the header width are dropped with a warning.
    pub fn add_row(&mut self, mut values: Vec<Value>) {
        if values.len() > self.columns.len() {
            warn!(
                "add_row: row {} has {} cells for {} columns, dropping the extra cells",
                self.rows.len(),
                values.len(),
                self.columns.len()
            );
        }
        values.resize(self.columns.len(), Value::Empty);
        self.rows.push(values);
    }

    pub fn build(self) -> ResponseSet {
        let mut columns = self.columns;
        let mut rows = self.rows;

        // Control columns carried per row, after the question columns.
        columns.push("form_id".to_string());
        columns.push("language".to_string());
        columns.push("form_title".to_string());
        columns.push("translated".to_string());
        let translated = if self.translated { "true" } else { "false" };
        for row in rows.iter_mut() {
            row.push(Value::Text(self.form_id.clone()));
            row.push(Value::Text(self.language.clone()));
            row.push(Value::Text(self.form_title.clone()));
            row.push(Value::Text(translated.to_string()));
        }

        ResponseSet {
            language: self.language,
            form_id: self.form_id,
            form_title: self.form_title,
            columns,
            rows,
        }
    }
}
