// Primitives for reading CSV response files.

use survey_analysis::builder::ResponseSetBuilder;
use survey_analysis::ResponseSet;

use crate::survey::io_common::{default_column_name, simplify_file_name, text_to_value};
use crate::survey::*;

/// Reads one language's responses from a CSV file with a header row.
///
/// Rows shorter than the header are padded with missing values by the
/// builder, never rejected.
pub fn read_csv_responses(path: String, source: &ResponseSource) -> SurveyResult<ResponseSet> {
    debug!(
        "read_csv_responses: path: {:?} language: {:?}",
        simplify_file_name(path.as_str()),
        source.language
    );

    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu {})?;
    let mut records = rdr.into_records();

    let header = match records.next() {
        Some(line_r) => line_r.context(CsvLineParseSnafu {})?,
        None => whatever!("The response file has no header row"),
    };
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            if s.is_empty() {
                default_column_name(idx)
            } else {
                s.to_string()
            }
        })
        .collect();
    debug!("read_csv_responses: header: {:?}", columns);

    let mut builder =
        ResponseSetBuilder::new(&source.language, &source.form_id, &source.form_title)
            .header(&columns);
    for (idx, line_r) in records.enumerate() {
        let line = line_r.context(CsvLineParseSnafu {})?;
        debug!("read_csv_responses: {:?} {:?}", idx, line);
        let values = line.iter().map(text_to_value).collect();
        builder.add_row(values);
    }
    Ok(builder.build())
}
