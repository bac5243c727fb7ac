// Primitives for reading Excel (.xlsx) response exports.

use calamine::{open_workbook, DataType, Reader, Xlsx};

use survey_analysis::builder::ResponseSetBuilder;
use survey_analysis::{ResponseSet, Value};

use crate::survey::io_common::{default_column_name, text_to_value};
use crate::survey::*;

/// Reads one language's responses from the first row (header) and following
/// rows of a worksheet.
pub fn read_excel_responses(path: String, source: &ResponseSource) -> SurveyResult<ResponseSet> {
    let wrange = get_range(&path, source)?;

    let mut iter = wrange.rows();
    let header = match iter.next() {
        Some(row) => row,
        None => whatever!("The worksheet has no header row"),
    };
    debug!("read_excel_responses: header: {:?}", header);
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(idx, cell)| match cell {
            DataType::String(s) if !s.is_empty() => s.clone(),
            _ => default_column_name(idx),
        })
        .collect();

    let mut builder =
        ResponseSetBuilder::new(&source.language, &source.form_id, &source.form_title)
            .header(&columns);
    for (idx, row) in iter.enumerate() {
        debug!("read_excel_responses: idx: {:?} row: {:?}", idx, row);
        let mut values: Vec<Value> = Vec::new();
        for cell in row.iter() {
            values.push(read_cell(cell, idx)?);
        }
        builder.add_row(values);
    }
    Ok(builder.build())
}

fn read_cell(cell: &DataType, lineno: usize) -> SurveyResult<Value> {
    match cell {
        DataType::String(s) => Ok(text_to_value(s.as_str())),
        DataType::Float(f) => Ok(Value::Number(*f)),
        DataType::Int(i) => Ok(Value::Number(*i as f64)),
        DataType::Bool(b) => Ok(Value::Text(b.to_string())),
        DataType::Empty => Ok(Value::Empty),
        _ => Err(SurveyError::ExcelWrongCellType {
            lineno: lineno as u64,
            content: format!("{:?}", cell),
        }),
    }
}

fn get_range(path: &String, source: &ResponseSource) -> SurveyResult<calamine::Range<DataType>> {
    let worksheet_name_o = source.worksheet_name.clone();
    debug!(
        "read_excel_responses: path: {:?} worksheet: {:?}",
        &path, &worksheet_name_o
    );
    let p = path.clone();
    let mut workbook: Xlsx<_> =
        open_workbook(p).context(OpeningExcelSnafu { path: path.clone() })?;

    // A worksheet name was provided, use it.
    if let Some(worksheet_name) = worksheet_name_o {
        let wrange = workbook
            .worksheet_range(&worksheet_name)
            .context(EmptyExcelSnafu { path: path.clone() })?
            .context(OpeningExcelSnafu { path: path.clone() })?;
        Ok(wrange)
    } else {
        let all_worksheets = workbook.worksheets();
        match all_worksheets.as_slice() {
            [] => Err(SurveyError::EmptyExcel { path: path.clone() }),
            [(worksheet_name, wrange)] => {
                debug!(
                    "read_excel_responses: path: {:?} worksheet: {:?}",
                    &path, &worksheet_name
                );
                Ok(wrange.clone())
            }
            _ => {
                whatever!(
                    "Workbook {} has several worksheets, the worksheet name must be provided",
                    path
                )
            }
        }
    }
}
