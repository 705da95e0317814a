pub(crate) mod args;
pub(crate) mod error;
pub(crate) mod log_args;
pub(crate) mod output;
pub(crate) mod payload;

use args::{Arguments, Subcommands};
use colored::Colorize;
use error::Error;
use output::{build_output_path, output_filename, print_with_less};
use payload::load_payload;
use tracing::{info, warn};

use clap::Parser;

use xian_common::utils::io::file::{read_target, write_file};
use xian_config::{config, Configuration};
use xian_core::{
    xian_decompiler::{decompile_target, DecompilerArgs},
    xian_standard::validate_target,
    xian_transaction::{
        create_transaction, encode, encode_compact, validate_payload, verify_transaction,
        Ed25519Verifier, Transaction, TransactionPayload, Wallet,
    },
};

fn main() -> Result<(), Error> {
    let args = Arguments::parse();

    // setup logging. the guard flushes the log file when dropped
    let _guard = args.logs.init_tracing();

    let configuration = Configuration::load()
        .map_err(|e| Error::Generic(format!("failed to load configuration: {}", e)))?;
    match args.sub {
        Subcommands::Decompile(mut cmd) => {
            apply_decompile_defaults(&mut cmd, &configuration);

            let filename = output_filename(&cmd.name, "decompiled.py");

            let result = decompile_target(cmd.clone())?;
            if result.fallback {
                warn!("source could not be parsed and was written out as is");
            }

            if cmd.output == "print" {
                print_with_less(&result.source).map_err(|e| {
                    Error::Generic(format!("failed to print decompiled source: {}", e))
                })?;
            } else {
                let output_path = build_output_path(&cmd.output, &filename)
                    .map_err(|e| Error::Generic(format!("failed to build output path: {}", e)))?;

                write_file(&output_path, &result.source)
                    .map_err(|e| Error::Generic(format!("failed to write source: {}", e)))?;
                info!("wrote decompiled source to '{}'", output_path);
            }
        }

        Subcommands::Encode(cmd) => {
            let payload = load_payload(&cmd.target, &configuration)?;
            validate_payload(&payload)?;

            let encoded = if cmd.compact { encode_compact(&payload)? } else { encode(&payload)? };
            println!("{}", encoded);
        }

        Subcommands::Sign(cmd) => {
            let wallet = Wallet::from_private_key(&cmd.private_key)?;
            let payload = TransactionPayload::try_from(&load_payload(&cmd.target, &configuration)?)?;

            let transaction = create_transaction(&payload, &wallet)?;
            println!("{}", transaction.to_json()?);
        }

        Subcommands::Verify(cmd) => {
            let contents = read_target(&cmd.target)
                .map_err(|e| Error::Generic(format!("failed to read transaction: {}", e)))?;
            let transaction = Transaction::from_json(&contents)?;

            if !verify_transaction(&transaction, &Ed25519Verifier)? {
                return Err(Error::Generic(format!(
                    "signature is not valid for sender '{}'",
                    transaction.payload.sender
                )));
            }
            println!("{} signature by '{}'", "valid".green(), transaction.payload.sender);
        }

        Subcommands::Standard(cmd) => {
            let standard = cmd.standard;
            let (valid, violations) = validate_target(cmd)
                .map_err(|e| Error::Generic(format!("failed to check contract: {}", e)))?;

            if !valid {
                for violation in &violations {
                    println!("{} {}", "✗".red(), violation);
                }
                return Err(Error::Generic(format!(
                    "contract does not conform to {} ({} violations)",
                    standard,
                    violations.len()
                )));
            }
            println!("{} contract conforms to {}", "✓".green(), standard);
        }

        Subcommands::Config(cmd) => {
            config(cmd).map_err(|e| Error::Generic(format!("failed to configure: {}", e)))?;
        }
    }

    Ok(())
}

/// Fills in the configured mode and size limit where the command line left them out.
fn apply_decompile_defaults(cmd: &mut DecompilerArgs, configuration: &Configuration) {
    if !cmd.strict {
        cmd.strict = configuration.strict_decompile;
    }
    if cmd.max_source_bytes.is_none() {
        cmd.max_source_bytes = Some(configuration.max_source_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xian_core::xian_decompiler::DecompilerArgsBuilder;

    fn configuration() -> Configuration {
        Configuration { max_source_bytes: 64, strict_decompile: true, ..Default::default() }
    }

    #[test]
    fn test_configuration_fills_missing_decompile_options() {
        let mut cmd = DecompilerArgsBuilder::new().build().expect("failed to build args");
        apply_decompile_defaults(&mut cmd, &configuration());

        assert!(cmd.strict);
        assert_eq!(cmd.max_source_bytes, Some(64));
    }

    #[test]
    fn test_explicit_default_limit_beats_configuration() {
        let mut cmd = DecompilerArgsBuilder::new()
            .max_source_bytes(Some(xian_config::DEFAULT_MAX_SOURCE_BYTES))
            .build()
            .expect("failed to build args");
        apply_decompile_defaults(&mut cmd, &configuration());

        assert_eq!(cmd.max_source_bytes, Some(xian_config::DEFAULT_MAX_SOURCE_BYTES));
    }
}
