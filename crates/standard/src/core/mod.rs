mod xsc001;

use std::{fmt, time::Instant};

use tracing::{debug, info, warn};
use xian_decompiler::{parse_source, syntax::Module};

use crate::{error::Error, interfaces::StandardArgs};

/// The token standards a contract can be checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum TokenStandard {
    /// The fungible token standard.
    Xsc001,
}

impl fmt::Display for TokenStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenStandard::Xsc001 => write!(f, "XSC001"),
        }
    }
}

/// Checks a parsed contract against one standard.
trait StandardValidator {
    /// Returns every violation found, in a stable order.
    fn validate(&self, module: &Module) -> Vec<String>;
}

impl TokenStandard {
    fn validator(&self) -> Box<dyn StandardValidator> {
        match self {
            TokenStandard::Xsc001 => Box::new(xsc001::Xsc001Validator),
        }
    }
}

/// Checks `source` against `standard`. Returns whether it conforms, and every violation found.
/// Source that cannot be parsed yields a single `syntax error: …` violation.
///
/// ```
/// use xian_standard::{validate_token_standard, TokenStandard};
///
/// let (valid, violations) = validate_token_standard("def f(:", TokenStandard::Xsc001);
/// assert!(!valid);
/// assert!(violations[0].starts_with("syntax error: "));
/// ```
pub fn validate_token_standard(source: &str, standard: TokenStandard) -> (bool, Vec<String>) {
    let start_time = Instant::now();

    let module = match parse_source(source) {
        Ok(module) => module,
        Err(e) => {
            warn!("contract could not be parsed: {e}");
            return (false, vec![format!("syntax error: {e}")]);
        }
    };
    debug!("parsing source took {:?}", start_time.elapsed());

    let violations = standard.validator().validate(&module);
    debug!("checking {} took {:?}", standard, start_time.elapsed());

    (violations.is_empty(), violations)
}

/// Reads the target named by `args` and checks it against the requested standard.
pub fn validate_target(args: StandardArgs) -> Result<(bool, Vec<String>), Error> {
    let source = args.get_source()?;

    let (valid, violations) = validate_token_standard(&source, args.standard);
    info!(
        "contract {} {} ({} violations)",
        if valid { "conforms to" } else { "does not conform to" },
        args.standard,
        violations.len()
    );

    Ok((valid, violations))
}
