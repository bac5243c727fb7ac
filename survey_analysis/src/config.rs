// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

/// One cell of a tabular response set.
///
/// Source adapters are expected to map blank or absent cells to `Empty`
/// rather than dropping them, so that every row keeps the width of the
/// header.
#[derive(PartialEq, Debug, Clone)]
pub enum Value {
    Text(String),
    Number(f64),
    /// A missing or blank answer.
    Empty,
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// The numeric reading of this cell, if it has one.
    ///
    /// Text is parsed permissively (surrounding whitespace is ignored), but
    /// only finite readings count: text such as "NaN" or "inf" is an answer,
    /// not a measurement, and the statistics are only defined over finite
    /// numbers.
    pub fn as_number(&self) -> Option<f64> {
        let x = match self {
            Value::Number(x) => Some(*x),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            Value::Empty => None,
        };
        x.filter(|x| x.is_finite())
    }

    /// The textual rendering used when counting distinct categorical answers.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Number(x) => Some(format!("{}", x)),
            Value::Empty => None,
        }
    }
}

/// One language's raw tabular form responses, plus the metadata of the form
/// they were collected with.
///
/// Invariant: every row has exactly `columns.len()` cells. The builder API
/// maintains this; adapters constructing the struct directly are expected to
/// pad short rows with [Value::Empty].
#[derive(PartialEq, Debug, Clone)]
pub struct ResponseSet {
    pub language: String,
    pub form_id: String,
    pub form_title: String,
    /// Column order is significant and preserved from the source.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResponseSet {
    pub fn response_count(&self) -> u64 {
        self.rows.len() as u64
    }
}

// ******** Output data structures *********

/// The union of all the contributing response sets, as one flat table.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct CombinedDataset {
    /// Union of the per-language columns, in first-seen order.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SourceForm {
    pub form_id: String,
    pub form_title: String,
    pub language: String,
    pub response_count: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AggregationMetadata {
    pub source_forms: Vec<SourceForm>,
    pub total_responses: u64,
    pub responses_by_language: BTreeMap<String, u64>,
    /// Creation time of the aggregation, formatted `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
}

/// The statistics branch for one analyzed column.
#[derive(PartialEq, Debug, Clone)]
pub enum QuestionStats {
    Categorical {
        /// Distinct answers with their counts, most frequent first
        /// (ties broken by answer).
        value_counts: Vec<(String, u64)>,
        /// Percentages of the non-missing responses, rounded to 1 decimal.
        value_percentages: Vec<(String, f64)>,
    },
    Numeric {
        mean: f64,
        median: f64,
        min: f64,
        max: f64,
        /// Sample standard deviation (divisor n-1). None with fewer than
        /// two values.
        std: Option<f64>,
    },
}

/// Computed statistics for one non-excluded column.
#[derive(PartialEq, Debug, Clone)]
pub struct QuestionAnalysis {
    pub question: String,
    /// Rows with a usable value for this column.
    pub response_count: u64,
    pub missing_count: u64,
    pub stats: QuestionStats,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TimestampAnalysis {
    /// Earliest response date, formatted `YYYY-MM-DD`.
    pub first_response: String,
    /// Latest response date, formatted `YYYY-MM-DD`.
    pub last_response: String,
    /// Count of responses per calendar day, ascending by date. Days with no
    /// responses are not listed.
    pub responses_by_day: Vec<(String, u64)>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AnalysisSummary {
    pub total_responses: u64,
    pub responses_by_language: BTreeMap<String, u64>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct AnalysisResult {
    pub summary: AnalysisSummary,
    /// Row counts per value of the language column. Empty when the combined
    /// table has no language column.
    pub language_distribution: Vec<(String, u64)>,
    /// Only present when a timestamp column exists and parses as a whole.
    pub timestamp_analysis: Option<TimestampAnalysis>,
    /// One entry per eligible column, in the original column order.
    pub questions: Vec<QuestionAnalysis>,
}

/// Errors that prevent the analysis from completing.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AnalysisErrors {
    /// No contributing response set, or all the sources were empty. Callers
    /// should render a "no data" state rather than charts.
    EmptyInput,
}

impl Error for AnalysisErrors {}

impl Display for AnalysisErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisErrors::EmptyInput => {
                write!(f, "no data available for analysis")
            }
        }
    }
}

// ********* Configuration **********

/// Schema configuration for the analyzer.
///
/// The defaults correspond to the column conventions of the form response
/// adapters: fixed control columns attached per row, a `Timestamp` column
/// written by the collection tool, and `_original` shadow columns written by
/// the translator.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AnalysisConfig {
    /// Fixed-name columns excluded from per-question analysis.
    pub control_columns: Vec<String>,
    /// Columns whose name ends with this suffix hold pre-translation text
    /// and are not independent questions.
    pub shadow_suffix: String,
    /// Column carrying the source language of each row.
    pub language_column: String,
    /// Column carrying the response timestamp, when the collection tool
    /// recorded one.
    pub timestamp_column: String,
}

impl Default for AnalysisConfig {
    fn default() -> AnalysisConfig {
        AnalysisConfig {
            control_columns: [
                "form_id",
                "language",
                "form_title",
                "Timestamp",
                "translated",
                "response_date",
                "translated_original",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            shadow_suffix: "_original".to_string(),
            language_column: "language".to_string(),
            timestamp_column: "Timestamp".to_string(),
        }
    }
}
