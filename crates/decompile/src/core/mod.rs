pub(crate) mod postprocess;

use std::time::Instant;

use tracing::{debug, info, warn};
use xian_common::utils::strings::StringExt;

use crate::{core::postprocess::normalize, error::Error, interfaces::DecompilerArgs, ir};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of a decompile operation
pub struct DecompileResult {
    /// The decompiled source, normalized. On fallback, the normalized input.
    pub source: String,
    /// The names of the ORM variables (`Hash`, `Variable`, …) the contract declares, sorted.
    pub orm_variables: Vec<String>,
    /// Whether the input could not be parsed and was returned as is.
    pub fallback: bool,
}

/// Decompiles compiled contract source. Never fails: source that cannot be parsed is returned
/// normalized but otherwise unchanged, with [`DecompileResult::fallback`] set.
///
/// ```
/// use xian_decompiler::decompile;
///
/// let result = decompile("def ____():\n    __owner.set(ctx.caller)\n");
/// assert_eq!(result.source, "@construct\ndef seed():\n    owner.set(ctx.caller)\n");
/// assert!(!result.fallback);
/// ```
pub fn decompile(source: &str) -> DecompileResult {
    match decompile_strict(source) {
        Ok(result) => result,
        Err(e) => {
            warn!("returning source as is: {e}");
            DecompileResult { source: normalize(source), orm_variables: Vec::new(), fallback: true }
        }
    }
}

/// Decompiles compiled contract source, failing with [`Error::Parse`] if it cannot be parsed and
/// with [`Error::Unprintable`] if the result cannot be written in the runtime's grammar.
pub fn decompile_strict(source: &str) -> Result<DecompileResult, Error> {
    let start_time = Instant::now();

    let (printed, orm_variables) = ir::decompile_source(source)?;
    debug!("decompiling {} bytes took {:?}", source.len(), start_time.elapsed());

    Ok(DecompileResult {
        source: normalize(&printed),
        orm_variables: orm_variables.into_iter().collect(),
        fallback: false,
    })
}

/// Reads the target named by `args`, checks it against the size limit and decompiles it.
pub fn decompile_target(args: DecompilerArgs) -> Result<DecompileResult, Error> {
    let start_time = Instant::now();

    let source = args
        .get_source()
        .map_err(|e| Error::FetchError(format!("reading target failed: {e}")))?;
    let limit = args.source_limit();
    if source.len() > limit {
        return Err(Error::SourceTooLarge { size: source.len(), limit });
    }
    debug!("reading target took {:?}", start_time.elapsed());

    info!("decompiling '{}'", args.target.as_str().truncate(64));
    let result = if args.strict { decompile_strict(&source)? } else { decompile(&source) };
    info!(
        "decompiled {} ORM variables in {:?}",
        result.orm_variables.len(),
        start_time.elapsed()
    );

    Ok(result)
}

/// Where contract source comes from, e.g. a node's contract registry.
pub trait ContractSourceFetcher {
    /// Returns the stored (compiled) source of `contract_name`.
    fn fetch_contract_source(&self, contract_name: &str) -> eyre::Result<String>;
}

/// Fetches a deployed contract's source and decompiles it.
pub fn decompile_contract<F: ContractSourceFetcher + ?Sized>(
    fetcher: &F,
    contract_name: &str,
) -> Result<DecompileResult, Error> {
    let start_time = Instant::now();
    let source = fetcher
        .fetch_contract_source(contract_name)
        .map_err(|e| Error::FetchError(format!("fetching '{contract_name}' failed: {e}")))?;
    debug!("fetching '{}' took {:?}", contract_name, start_time.elapsed());

    Ok(decompile(&source))
}
