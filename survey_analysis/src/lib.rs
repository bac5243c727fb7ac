mod config;
pub mod builder;

use log::{debug, info, warn};

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime};

pub use crate::config::*;

// **** Private structures ****

/// The classification of one column of the combined table.
///
/// A column is numeric when every non-missing value has a numeric reading.
/// A column with no non-missing value at all is `Empty`: it is reported with
/// categorical statistics over zero values rather than numeric statistics,
/// so the numeric branch never divides by zero.
#[derive(PartialEq, Debug, Clone)]
enum ColumnClass {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
    Empty,
}

/// Combines the per-language response sets into one flat table.
///
/// Arguments:
/// * `sources` the response sets keyed by language code. A `None` entry
///   models a source that failed upstream; it contributes nothing, as does a
///   set with zero rows. The `BTreeMap` iteration order (language-code
///   order) fixes the row order of the output.
///
/// The union of the per-source columns is taken in first-seen order; a row
/// lacking a column introduced by another source has that cell marked
/// missing. The inputs are never mutated.
pub fn combine_responses(
    sources: &BTreeMap<String, Option<ResponseSet>>,
) -> (CombinedDataset, AggregationMetadata) {
    let mut combined = CombinedDataset::default();
    let mut col_index: HashMap<String, usize> = HashMap::new();
    let mut metadata = AggregationMetadata {
        source_forms: Vec::new(),
        total_responses: 0,
        responses_by_language: BTreeMap::new(),
        timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    };

    for (lang_code, source) in sources.iter() {
        let rs = match source {
            Some(rs) if !rs.rows.is_empty() => rs,
            Some(_) => {
                debug!("combine_responses: {}: empty response set, skipping", lang_code);
                continue;
            }
            None => {
                debug!("combine_responses: {}: no response set, skipping", lang_code);
                continue;
            }
        };

        // Extend the column union with the columns this source introduces,
        // padding the rows already collected.
        for col in rs.columns.iter() {
            if !col_index.contains_key(col) {
                col_index.insert(col.clone(), combined.columns.len());
                combined.columns.push(col.clone());
                for row in combined.rows.iter_mut() {
                    row.push(Value::Empty);
                }
            }
        }

        for src_row in rs.rows.iter() {
            let mut row = vec![Value::Empty; combined.columns.len()];
            for (idx, col) in rs.columns.iter().enumerate() {
                if let Some(value) = src_row.get(idx) {
                    row[col_index[col]] = value.clone();
                }
            }
            combined.rows.push(row);
        }

        let response_count = rs.response_count();
        metadata.source_forms.push(SourceForm {
            form_id: rs.form_id.clone(),
            form_title: rs.form_title.clone(),
            language: rs.language.clone(),
            response_count,
        });
        metadata
            .responses_by_language
            .insert(lang_code.clone(), response_count);
        metadata.total_responses += response_count;
    }

    info!(
        "combine_responses: {} rows from {} sources, {} columns",
        combined.rows.len(),
        metadata.source_forms.len(),
        combined.columns.len()
    );
    (combined, metadata)
}

/// Derives the per-question statistics from a combined table.
///
/// Returns [AnalysisErrors::EmptyInput] when the table has no rows, so that
/// callers can render a "no data" state. Calling this twice on the same
/// inputs yields identical results: the inputs are never mutated.
pub fn analyze_responses(
    combined: &CombinedDataset,
    metadata: &AggregationMetadata,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisErrors> {
    if combined.rows.is_empty() {
        return Err(AnalysisErrors::EmptyInput);
    }

    info!(
        "analyze_responses: {} rows, {} columns",
        combined.rows.len(),
        combined.columns.len()
    );

    let language_distribution =
        match column_values(combined, &config.language_column) {
            Some(values) => {
                let texts: Vec<String> =
                    values.iter().filter_map(|v| v.as_text()).collect();
                value_counts(&texts)
            }
            None => Vec::new(),
        };

    let timestamp_analysis = column_values(combined, &config.timestamp_column)
        .and_then(|values| analyze_timestamps(&values));

    let mut questions: Vec<QuestionAnalysis> = Vec::new();
    for (idx, column) in combined.columns.iter().enumerate() {
        if config.control_columns.contains(column) || column.ends_with(&config.shadow_suffix) {
            continue;
        }
        let values: Vec<&Value> = combined.rows.iter().map(|row| &row[idx]).collect();
        questions.push(analyze_question(column, &values));
    }

    Ok(AnalysisResult {
        summary: AnalysisSummary {
            total_responses: metadata.total_responses,
            responses_by_language: metadata.responses_by_language.clone(),
        },
        language_distribution,
        timestamp_analysis,
        questions,
    })
}

fn column_values<'a>(combined: &'a CombinedDataset, column: &str) -> Option<Vec<&'a Value>> {
    let idx = combined.columns.iter().position(|c| c == column)?;
    Some(combined.rows.iter().map(|row| &row[idx]).collect())
}

fn analyze_question(column: &str, values: &[&Value]) -> QuestionAnalysis {
    let total = values.len() as u64;
    let (response_count, stats) = match classify_column(values) {
        ColumnClass::Numeric(nums) => {
            let n = nums.len() as u64;
            (n, numeric_stats(&nums))
        }
        ColumnClass::Categorical(texts) => {
            let n = texts.len() as u64;
            (n, categorical_stats(&texts))
        }
        ColumnClass::Empty => (
            0,
            QuestionStats::Categorical {
                value_counts: Vec::new(),
                value_percentages: Vec::new(),
            },
        ),
    };
    debug!(
        "analyze_question: {}: {} responses, {} missing",
        column,
        response_count,
        total - response_count
    );
    QuestionAnalysis {
        question: column.to_string(),
        response_count,
        missing_count: total - response_count,
        stats,
    }
}

fn classify_column(values: &[&Value]) -> ColumnClass {
    let present: Vec<&Value> = values.iter().filter(|v| !v.is_empty()).cloned().collect();
    if present.is_empty() {
        return ColumnClass::Empty;
    }
    let numbers: Vec<f64> = present.iter().filter_map(|v| v.as_number()).collect();
    if numbers.len() == present.len() {
        ColumnClass::Numeric(numbers)
    } else {
        // At least one value with no numeric reading: treat the whole column
        // as categorical text.
        ColumnClass::Categorical(present.iter().filter_map(|v| v.as_text()).collect())
    }
}

fn categorical_stats(texts: &[String]) -> QuestionStats {
    let counts = value_counts(texts);
    let total = texts.len() as f64;
    let value_percentages: Vec<(String, f64)> = counts
        .iter()
        .map(|(value, count)| (value.clone(), round1(100.0 * *count as f64 / total)))
        .collect();
    QuestionStats::Categorical {
        value_counts: counts,
        value_percentages,
    }
}

fn numeric_stats(nums: &[f64]) -> QuestionStats {
    let mut sorted = nums.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    };
    let std = if n < 2 {
        None
    } else {
        let var = sorted.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (n - 1) as f64;
        Some(var.sqrt())
    };
    QuestionStats::Numeric {
        mean,
        median,
        min: sorted[0],
        max: sorted[n - 1],
        std,
    }
}

/// Counts the occurrences of each distinct value, most frequent first with
/// ties broken by value.
fn value_counts(texts: &[String]) -> Vec<(String, u64)> {
    let mut counts: HashMap<&String, u64> = HashMap::new();
    for t in texts.iter() {
        *counts.entry(t).or_insert(0) += 1;
    }
    let mut res: Vec<(String, u64)> = counts
        .iter()
        .map(|(value, count)| ((*value).clone(), *count))
        .collect();
    res.sort_by_key(|(value, count)| (Reverse(*count), value.clone()));
    res
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Buckets the response timestamps by calendar day.
///
/// Missing cells do not contribute, but a single non-missing value that does
/// not parse under any of the common formats disables the whole analysis:
/// a partially-populated bucketing over inconsistent content would be
/// misleading in the reports.
fn analyze_timestamps(values: &[&Value]) -> Option<TimestampAnalysis> {
    let mut dates: Vec<NaiveDate> = Vec::new();
    for v in values.iter() {
        match v {
            Value::Empty => {}
            Value::Text(s) => match parse_timestamp(s) {
                Some(date) => dates.push(date),
                None => {
                    warn!(
                        "analyze_timestamps: unparseable timestamp {:?}, skipping timestamp analysis",
                        s
                    );
                    return None;
                }
            },
            Value::Number(x) => {
                warn!(
                    "analyze_timestamps: numeric timestamp cell {:?}, skipping timestamp analysis",
                    x
                );
                return None;
            }
        }
    }
    if dates.is_empty() {
        return None;
    }

    let mut by_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for date in dates.iter() {
        *by_day.entry(*date).or_insert(0) += 1;
    }

    // BTreeMap iteration is ascending by date, so the first and last keys
    // are the first and last response days.
    let first = *by_day.keys().next().unwrap();
    let last = *by_day.keys().last().unwrap();
    Some(TimestampAnalysis {
        first_response: first.format("%Y-%m-%d").to_string(),
        last_response: last.format("%Y-%m-%d").to_string(),
        responses_by_day: by_day
            .iter()
            .map(|(date, count)| (date.format("%Y-%m-%d").to_string(), *count))
            .collect(),
    })
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Best-effort parsing of a response timestamp under the formats commonly
/// emitted by the form collection tools.
fn parse_timestamp(s: &str) -> Option<NaiveDate> {
    let t = s.trim();
    for fmt in DATETIME_FORMATS.iter() {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS.iter() {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return Some(d);
        }
    }
    None
}
