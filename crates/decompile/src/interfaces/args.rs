use clap::Parser;
use derive_builder::Builder;
use eyre::Result;
use xian_common::utils::io::file::read_target;
use xian_config::DEFAULT_MAX_SOURCE_BYTES;

#[derive(Debug, Clone, Parser, Builder)]
#[clap(
    about = "Decompiles compiled Xian contract source back to its original form",
    after_help = "The target is read as a file if one exists at that path, otherwise as literal source.",
    override_usage = "xian decompile <TARGET> [OPTIONS]"
)]
/// Arguments for the decompile operation
pub struct DecompilerArgs {
    /// The target to decompile, either a file or literal contract source.
    #[clap(required = true)]
    pub target: String,

    /// Fail on source that cannot be parsed, instead of returning it as is.
    #[clap(long)]
    pub strict: bool,

    /// The largest source, in bytes, that will be decompiled. Defaults to 1 MiB.
    #[clap(long = "max-source-bytes")]
    pub max_source_bytes: Option<usize>,

    /// The output directory to write the output to or 'print' to print to the console
    #[clap(long = "output", short = 'o', default_value = "output", hide_default_value = true)]
    pub output: String,

    /// The name for the output file
    #[clap(long, short, default_value = "", hide_default_value = true)]
    pub name: String,
}

impl DecompilerArgs {
    /// Reads the contract source named by the target.
    pub fn get_source(&self) -> Result<String> {
        read_target(&self.target)
    }

    /// The size limit in effect: the one given, or [`DEFAULT_MAX_SOURCE_BYTES`].
    pub fn source_limit(&self) -> usize {
        self.max_source_bytes.unwrap_or(DEFAULT_MAX_SOURCE_BYTES)
    }
}

impl DecompilerArgsBuilder {
    /// Creates a new DecompilerArgsBuilder with default values
    pub fn new() -> Self {
        Self {
            target: Some(String::new()),
            strict: Some(false),
            max_source_bytes: Some(None),
            output: Some(String::new()),
            name: Some(String::new()),
        }
    }
}
