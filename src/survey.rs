use log::{debug, info, warn};

use survey_analysis::*;

use snafu::{prelude::*, Snafu};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::survey::config_reader::*;

pub mod io_common;
pub mod io_csv;
pub mod io_excel;

#[derive(Debug, Snafu)]
pub enum SurveyError {
    #[snafu(display("Error opening workbook {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No usable worksheet in workbook {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Unexpected cell content at line {lineno}: {content}"))]
    ExcelWrongCellType { lineno: u64, content: String },
    #[snafu(display("Error opening CSV file"))]
    CsvOpen { source: csv::Error },
    #[snafu(display("Error reading a CSV record"))]
    CsvLineParse { source: csv::Error },
    #[snafu(display("Error writing the combined table"))]
    CsvWrite { source: csv::Error },
    #[snafu(display(""))]
    OpeningJson { source: std::io::Error },
    #[snafu(display(""))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing output file"))]
    WritingOutput { source: std::io::Error },
    #[snafu(display(""))]
    MissingParentDir {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SurveyResult<T> = Result<T, SurveyError>;

pub mod config_reader {
    use crate::survey::*;

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct OutputSettings {
        #[serde(rename = "reportTitle")]
        pub report_title: String,
        #[serde(rename = "outputDirectory")]
        pub output_directory: Option<String>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct ResponseSource {
        /// One of `csv` or `excel`.
        pub provider: String,
        #[serde(rename = "filePath")]
        pub file_path: String,
        pub language: String,
        #[serde(rename = "formId")]
        pub form_id: String,
        #[serde(rename = "formTitle")]
        pub form_title: String,
        #[serde(rename = "worksheetName")]
        pub worksheet_name: Option<String>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct JobConfig {
        #[serde(rename = "outputSettings")]
        pub output_settings: OutputSettings,
        #[serde(rename = "responseSources")]
        pub response_sources: Vec<ResponseSource>,
    }

    pub fn parse_job_config(contents: &str) -> SurveyResult<JobConfig> {
        let config: JobConfig =
            serde_json::from_str(contents).context(ParsingJsonSnafu {})?;
        let mut seen: Vec<&String> = Vec::new();
        for source in config.response_sources.iter() {
            if seen.contains(&&source.language) {
                whatever!(
                    "Language {} appears more than once in responseSources",
                    source.language
                );
            }
            seen.push(&source.language);
        }
        Ok(config)
    }

    pub fn read_job_config(path: &str) -> SurveyResult<JobConfig> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu {})?;
        debug!("read_job_config: read content: {:?}", contents);
        parse_job_config(contents.as_str())
    }

    pub fn read_reference(path: &str) -> SurveyResult<JSValue> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu {})?;
        let js: JSValue =
            serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(js)
    }
}

fn counts_to_json(counts: &[(String, u64)]) -> JSValue {
    let mut m: JSMap<String, JSValue> = JSMap::new();
    for (value, count) in counts.iter() {
        m.insert(value.clone(), json!(count));
    }
    JSValue::Object(m)
}

fn language_counts_to_json(counts: &BTreeMap<String, u64>) -> JSValue {
    let mut m: JSMap<String, JSValue> = JSMap::new();
    for (language, count) in counts.iter() {
        m.insert(language.clone(), json!(count));
    }
    JSValue::Object(m)
}

pub fn metadata_to_json(metadata: &AggregationMetadata) -> JSValue {
    let source_forms: Vec<JSValue> = metadata
        .source_forms
        .iter()
        .map(|sf| {
            json!({
                "formId": sf.form_id,
                "formTitle": sf.form_title,
                "language": sf.language,
                "responseCount": sf.response_count
            })
        })
        .collect();
    json!({
        "sourceForms": source_forms,
        "totalResponses": metadata.total_responses,
        "responsesByLanguage": language_counts_to_json(&metadata.responses_by_language),
        "timestamp": metadata.timestamp
    })
}

pub fn analysis_to_json(analysis: &AnalysisResult) -> JSValue {
    let mut questions: Vec<JSValue> = Vec::new();
    for q in analysis.questions.iter() {
        let mut m: JSMap<String, JSValue> = JSMap::new();
        m.insert("question".to_string(), json!(q.question));
        m.insert("responseCount".to_string(), json!(q.response_count));
        m.insert("missingCount".to_string(), json!(q.missing_count));
        match &q.stats {
            QuestionStats::Categorical {
                value_counts,
                value_percentages,
            } => {
                m.insert("valueCounts".to_string(), counts_to_json(value_counts));
                let mut percentages: JSMap<String, JSValue> = JSMap::new();
                for (value, pct) in value_percentages.iter() {
                    percentages.insert(value.clone(), json!(pct));
                }
                m.insert(
                    "valuePercentages".to_string(),
                    JSValue::Object(percentages),
                );
            }
            QuestionStats::Numeric {
                mean,
                median,
                min,
                max,
                std,
            } => {
                m.insert("mean".to_string(), json!(mean));
                m.insert("median".to_string(), json!(median));
                m.insert("min".to_string(), json!(min));
                m.insert("max".to_string(), json!(max));
                // Undefined with fewer than two values.
                m.insert(
                    "std".to_string(),
                    match std {
                        Some(x) => json!(x),
                        None => JSValue::Null,
                    },
                );
            }
        }
        questions.push(JSValue::Object(m));
    }

    let mut js = json!({
        "summary": {
            "totalResponses": analysis.summary.total_responses,
            "responsesByLanguage":
                language_counts_to_json(&analysis.summary.responses_by_language)
        },
        "languageDistribution": counts_to_json(&analysis.language_distribution),
        "questions": questions
    });

    if let Some(ts) = &analysis.timestamp_analysis {
        js["timestampAnalysis"] = json!({
            "firstResponse": ts.first_response,
            "lastResponse": ts.last_response,
            "responsesByDay": counts_to_json(&ts.responses_by_day)
        });
    }
    js
}

/// Writes the combined table as a flat CSV file: the column union as header,
/// missing cells as empty fields.
pub fn write_combined_csv(combined: &CombinedDataset, path: &Path) -> SurveyResult<()> {
    let mut wtr = csv::Writer::from_path(path).context(CsvWriteSnafu {})?;
    wtr.write_record(&combined.columns).context(CsvWriteSnafu {})?;
    for row in combined.rows.iter() {
        let record: Vec<String> = row
            .iter()
            .map(|v| v.as_text().unwrap_or_default())
            .collect();
        wtr.write_record(&record).context(CsvWriteSnafu {})?;
    }
    wtr.flush().context(WritingOutputSnafu {})?;
    Ok(())
}

fn read_response_data(
    root_path: &Path,
    source: &ResponseSource,
) -> SurveyResult<ResponseSet> {
    let p: PathBuf = [root_path.to_path_buf(), PathBuf::from(&source.file_path)]
        .iter()
        .collect();
    let p2 = p.as_path().display().to_string();
    info!("Attempting to read response file {:?}", p2);
    match source.provider.as_str() {
        "csv" => io_csv::read_csv_responses(p2, source),
        "excel" => io_excel::read_excel_responses(p2, source),
        x => {
            whatever!("Provider not supported: {:?}", x)
        }
    }
}

/// A name usable in output file names, derived from the report title.
fn slugify(title: &str) -> String {
    let mut res = String::new();
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            res.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            res.push('-');
            last_dash = true;
        }
    }
    while res.ends_with('-') {
        res.pop();
    }
    if res.is_empty() {
        "analysis".to_string()
    } else {
        res
    }
}

pub fn run_analysis_job(
    config_path: String,
    out_dir: Option<String>,
    reference_path: Option<String>,
) -> SurveyResult<()> {
    let config_p = Path::new(config_path.as_str());
    let config = read_job_config(config_path.as_str())?;
    info!("config: {:?}", config);

    if config.response_sources.is_empty() {
        whatever!("No response sources listed in the configuration");
    }

    let root_p = config_p.parent().context(MissingParentDirSnafu {})?;

    // An unreadable source contributes nothing, like a source that failed
    // upstream. The job keeps going with the remaining languages.
    let mut sources: BTreeMap<String, Option<ResponseSet>> = BTreeMap::new();
    for source in config.response_sources.iter() {
        let rs = match read_response_data(root_p, source) {
            Ok(rs) => Some(rs),
            Err(e) => {
                warn!(
                    "Could not read responses for language {}: {}",
                    source.language, e
                );
                None
            }
        };
        sources.insert(source.language.clone(), rs);
    }

    let (combined, metadata) = combine_responses(&sources);
    info!(
        "Combined {} responses from {} languages",
        metadata.total_responses,
        metadata.responses_by_language.len()
    );

    let base = slugify(&config.output_settings.report_title);
    let out_p: PathBuf = match &out_dir {
        Some(d) => PathBuf::from(d),
        None => match &config.output_settings.output_directory {
            Some(d) => root_p.join(d),
            None => root_p.to_path_buf(),
        },
    };
    fs::create_dir_all(&out_p).context(WritingOutputSnafu {})?;

    write_combined_csv(&combined, &out_p.join(format!("{}_combined.csv", base)))?;
    let metadata_js =
        serde_json::to_string_pretty(&metadata_to_json(&metadata)).context(ParsingJsonSnafu {})?;
    fs::write(out_p.join(format!("{}_metadata.json", base)), metadata_js)
        .context(WritingOutputSnafu {})?;

    let analysis = match analyze_responses(&combined, &metadata, &AnalysisConfig::default()) {
        Ok(x) => x,
        Err(AnalysisErrors::EmptyInput) => {
            // Not a crash: the caller gets a clean "no data" outcome and the
            // combined table and metadata stay on disk for inspection.
            println!("No data available for analysis");
            return Ok(());
        }
    };

    let analysis_js = analysis_to_json(&analysis);
    let pretty_js_analysis =
        serde_json::to_string_pretty(&analysis_js).context(ParsingJsonSnafu {})?;
    fs::write(
        out_p.join(format!("{}_analysis.json", base)),
        &pretty_js_analysis,
    )
    .context(WritingOutputSnafu {})?;
    println!("analysis:{}", pretty_js_analysis);

    // The reference analysis, if provided for comparison
    if let Some(reference_p) = reference_path {
        let reference = read_reference(reference_p.as_str())?;
        info!("reference: {:?}", reference);
        let pretty_js_reference =
            serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
        if pretty_js_reference != pretty_js_analysis {
            warn!("Found differences with the reference analysis");
            print_diff(
                pretty_js_reference.as_str(),
                pretty_js_analysis.as_ref(),
                "\n",
            );
            whatever!("Difference detected between computed analysis and reference analysis")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::config_reader::parse_job_config;
    use super::*;
    use survey_analysis::builder::ResponseSetBuilder;

    const JOB: &str = r#"{
        "outputSettings": {"reportTitle": "Customer survey 2024"},
        "responseSources": [
            {"provider": "csv", "filePath": "en.csv", "language": "en",
             "formId": "f-en", "formTitle": "Survey (en)"},
            {"provider": "excel", "filePath": "es.xlsx", "language": "es",
             "formId": "f-es", "formTitle": "Survey (es)",
             "worksheetName": "Responses"}
        ]
    }"#;

    #[test]
    fn job_config_parses() {
        let config = parse_job_config(JOB).unwrap();
        assert_eq!(config.output_settings.report_title, "Customer survey 2024");
        assert_eq!(config.response_sources.len(), 2);
        assert_eq!(config.response_sources[1].provider, "excel");
        assert_eq!(
            config.response_sources[1].worksheet_name,
            Some("Responses".to_string())
        );
    }

    #[test]
    fn duplicate_languages_are_rejected() {
        let dup = JOB.replace("\"es\"", "\"en\"");
        assert!(parse_job_config(dup.as_str()).is_err());
    }

    #[test]
    fn slugify_makes_file_names() {
        assert_eq!(slugify("Customer survey 2024"), "customer-survey-2024");
        assert_eq!(slugify("  ¡Hola!  "), "hola");
        assert_eq!(slugify("***"), "analysis");
    }

    fn scenario_analysis() -> AnalysisResult {
        let mut en = ResponseSetBuilder::new("en", "f-en", "Survey (en)")
            .header(&["Timestamp".to_string(), "Q1".to_string()]);
        en.add_text_row(&["2024-01-01 10:00:00".to_string(), "yes".to_string()]);
        en.add_text_row(&["2024-01-02 09:00:00".to_string(), "no".to_string()]);
        let mut es = ResponseSetBuilder::new("es", "f-es", "Survey (es)")
            .header(&["Timestamp".to_string(), "Q1".to_string()]);
        es.add_text_row(&["2024-01-01 12:00:00".to_string(), "yes".to_string()]);

        let sources: BTreeMap<String, Option<ResponseSet>> = [
            ("en".to_string(), Some(en.build())),
            ("es".to_string(), Some(es.build())),
        ]
        .into_iter()
        .collect();
        let (combined, metadata) = combine_responses(&sources);
        analyze_responses(&combined, &metadata, &AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn analysis_json_uses_the_report_field_names() {
        let js = analysis_to_json(&scenario_analysis());

        assert_eq!(js["summary"]["totalResponses"], json!(3));
        assert_eq!(js["summary"]["responsesByLanguage"]["en"], json!(2));
        assert_eq!(js["languageDistribution"]["es"], json!(1));
        assert_eq!(js["timestampAnalysis"]["firstResponse"], json!("2024-01-01"));
        assert_eq!(js["timestampAnalysis"]["lastResponse"], json!("2024-01-02"));
        assert_eq!(
            js["timestampAnalysis"]["responsesByDay"]["2024-01-01"],
            json!(2)
        );

        let q1 = js["questions"]
            .as_array()
            .unwrap()
            .iter()
            .find(|q| q["question"] == json!("Q1"))
            .unwrap();
        assert_eq!(q1["responseCount"], json!(3));
        assert_eq!(q1["missingCount"], json!(0));
        assert_eq!(q1["valueCounts"]["yes"], json!(2));
        assert_eq!(q1["valuePercentages"]["no"], json!(33.3));
    }

    #[test]
    fn numeric_questions_serialize_std_null_when_undefined() {
        let mut en = ResponseSetBuilder::new("en", "f-en", "Survey (en)")
            .header(&["Score".to_string()]);
        en.add_text_row(&["4".to_string()]);
        let sources: BTreeMap<String, Option<ResponseSet>> =
            [("en".to_string(), Some(en.build()))].into_iter().collect();
        let (combined, metadata) = combine_responses(&sources);
        let analysis =
            analyze_responses(&combined, &metadata, &AnalysisConfig::default()).unwrap();
        let js = analysis_to_json(&analysis);

        let score = js["questions"]
            .as_array()
            .unwrap()
            .iter()
            .find(|q| q["question"] == json!("Score"))
            .unwrap();
        assert_eq!(score["mean"], json!(4.0));
        assert_eq!(score["std"], JSValue::Null);
    }
}
