use clap::Parser;

/// This is a survey response aggregation and analysis program.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON job configuration listing the per-language response files.
    /// For more information about the file format, read the documentation.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (file path) A reference file containing the expected analysis in JSON format. If provided,
    /// polyform will check that the computed analysis matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (directory path or empty) If specified, the combined table, metadata and analysis will be
    /// written under the given directory. Setting this option overrides the directory that may be
    /// specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
