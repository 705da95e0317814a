use clap::Parser;
use derive_builder::Builder;
use eyre::Result;
use xian_common::utils::io::file::read_target;

use crate::core::TokenStandard;

#[derive(Debug, Clone, Parser, Builder)]
#[clap(
    about = "Checks a contract against a Xian token standard",
    after_help = "The target is read as a file if one exists at that path, otherwise as literal source.",
    override_usage = "xian standard <TARGET> [OPTIONS]"
)]
/// Arguments for the standard operation
pub struct StandardArgs {
    /// The target to check, either a file or literal contract source.
    #[clap(required = true)]
    pub target: String,

    /// The standard to check the contract against.
    #[clap(long, short, value_enum, default_value_t = TokenStandard::Xsc001)]
    pub standard: TokenStandard,
}

impl StandardArgs {
    /// Reads the contract source named by the target.
    pub fn get_source(&self) -> Result<String> {
        read_target(&self.target)
    }
}

impl StandardArgsBuilder {
    /// Creates a new StandardArgsBuilder with default values
    pub fn new() -> Self {
        Self { target: Some(String::new()), standard: Some(TokenStandard::Xsc001) }
    }
}
