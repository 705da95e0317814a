#[cfg(test)]
mod integration_tests {
    use xian_core::{
        xian_decompiler::decompile,
        xian_standard::{
            validate_target, validate_token_standard, StandardArgsBuilder, TokenStandard,
        },
    };

    const TOKEN: &str = r#"balances = Hash(default_value=0)
metadata = Hash()

@construct
def seed():
    balances[ctx.caller] = 1_000_000
    metadata['token_name'] = "Test Token"
    metadata['token_symbol'] = "TST"
    metadata['token_logo_url'] = 'https://example.com/logo.png'
    metadata['token_website'] = 'https://example.com'
    metadata['operator'] = ctx.caller

@export
def change_metadata(key: str, value: Any):
    assert ctx.caller == metadata['operator'], 'Only operator can set metadata!'
    metadata[key] = value

@export
def transfer(amount: float, to: str):
    assert amount > 0, 'Cannot send negative balances!'
    assert balances[ctx.caller] >= amount, 'Not enough coins to send!'
    balances[ctx.caller] -= amount
    balances[to] += amount

@export
def approve(amount: float, to: str):
    assert amount > 0, 'Cannot send negative balances!'
    balances[ctx.caller, to] += amount

@export
def transfer_from(amount: float, to: str, main_account: str):
    assert amount > 0, 'Cannot send negative balances!'
    assert balances[main_account, ctx.caller] >= amount, f'Not enough coins approved to send! You have {balances[main_account, ctx.caller]} and are trying to spend {amount}'
    balances[main_account, ctx.caller] -= amount
    balances[main_account] -= amount
    balances[to] += amount

@export
def balance_of(address: str):
    return balances[address]
"#;

    #[test]
    fn test_conforming_token() {
        assert_eq!(validate_token_standard(TOKEN, TokenStandard::Xsc001), (true, vec![]));
    }

    #[test]
    fn test_compiled_token_conforms_once_decompiled() {
        let compiled = TOKEN
            .replace("@construct\ndef seed", "def ____")
            .replace("@export\n", "@__export('con_tst')\n");

        let (valid, violations) = validate_token_standard(&compiled, TokenStandard::Xsc001);
        assert!(!valid);
        assert!(violations.contains(&"Missing constructor (@construct decorator)".to_string()));

        let decompiled = decompile(&compiled);
        assert!(!decompiled.fallback);
        assert_eq!(
            validate_token_standard(&decompiled.source, TokenStandard::Xsc001),
            (true, vec![])
        );
    }

    #[test]
    fn test_missing_pieces_are_all_reported() {
        let broken = TOKEN
            .replace("metadata = Hash()", "metadata = Variable()")
            .replace("def balance_of(address: str)", "def balance(address: str)")
            .replace("    metadata['operator'] = ctx.caller\n", "");

        let (valid, violations) = validate_token_standard(&broken, TokenStandard::Xsc001);
        assert!(!valid);
        assert_eq!(
            violations,
            vec![
                "Variable metadata must be of type Hash",
                "Missing required function: balance_of",
                "Missing required metadata fields: {operator}",
            ]
        );
    }

    #[test]
    fn test_syntax_error() {
        let (valid, violations) = validate_token_standard("def seed(:\n", TokenStandard::Xsc001);
        assert!(!valid);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("syntax error: "));
    }

    #[test]
    fn test_validate_target() {
        let args = StandardArgsBuilder::new()
            .target(TOKEN.to_string())
            .build()
            .expect("failed to build args");

        let (valid, violations) = validate_target(args).expect("failed to read target");
        assert!(valid, "{violations:?}");
    }
}
