use clap::{Parser, Subcommand};

use xian_config::ConfigArgs;
use xian_core::{xian_decompiler::DecompilerArgs, xian_standard::StandardArgs};

use crate::log_args::LogArgs;

#[derive(Debug, Parser)]
#[clap(name = "xian", version)]
pub(crate) struct Arguments {
    #[clap(subcommand)]
    pub(crate) sub: Subcommands,

    #[clap(flatten)]
    pub(crate) logs: LogArgs,
}

#[derive(Debug, Subcommand)]
#[clap(
    about = "A client toolkit for the Xian network: build and sign transactions, and decompile contracts."
)]
pub(crate) enum Subcommands {
    #[clap(name = "decompile", about = "Decompile compiled contract source")]
    Decompile(DecompilerArgs),

    #[clap(name = "encode", about = "Print the canonical signing bytes of a transaction payload")]
    Encode(EncodeArgs),

    #[clap(name = "sign", about = "Sign a transaction payload and print the transaction")]
    Sign(SignArgs),

    #[clap(name = "verify", about = "Verify the signature of a transaction")]
    Verify(VerifyArgs),

    #[clap(name = "standard", about = "Check a contract against a token standard")]
    Standard(StandardArgs),

    #[clap(name = "config", about = "Display and edit the current configuration")]
    Config(ConfigArgs),
}

/// Arguments for the encode command
#[derive(Debug, Clone, Parser)]
#[clap(
    after_help = "Missing `chain_id` and `stamps_supplied` fields are filled in from the configuration.",
    override_usage = "xian encode <TARGET> [--compact]"
)]
pub(crate) struct EncodeArgs {
    /// The payload, either a JSON file or literal JSON.
    #[clap(required = true)]
    pub(crate) target: String,

    /// Print the compact storage encoding instead of the bytes that get signed.
    #[clap(long)]
    pub(crate) compact: bool,
}

/// Arguments for the sign command
#[derive(Debug, Clone, Parser)]
#[clap(
    after_help = "Missing `chain_id` and `stamps_supplied` fields are filled in from the configuration.",
    override_usage = "xian sign <TARGET> --private-key <HEX>"
)]
pub(crate) struct SignArgs {
    /// The payload, either a JSON file or literal JSON.
    #[clap(required = true)]
    pub(crate) target: String,

    /// The signer's 32 byte private key, as 64 hex characters.
    #[clap(long = "private-key", short = 'k', required = true)]
    pub(crate) private_key: String,
}

/// Arguments for the verify command
#[derive(Debug, Clone, Parser)]
#[clap(override_usage = "xian verify <TARGET>")]
pub(crate) struct VerifyArgs {
    /// The transaction, either a JSON file or literal JSON.
    #[clap(required = true)]
    pub(crate) target: String,
}
