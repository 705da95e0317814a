#[cfg(test)]
mod integration_tests {
    use std::collections::HashMap;

    use xian_core::xian_decompiler::{
        decompile, decompile_contract, decompile_target, ContractSourceFetcher,
        DecompilerArgsBuilder, Error,
    };

    const COMPILED: &str = "__balances = Hash(default_value=0, contract='con_coin', name='balances')\n\n\n@__export('con_coin')\ndef transfer(amount: float, to: str):\n    __balances[to] += amount * decimal('1.5000000000')\n\n\ndef ____():\n    __balances[ctx.caller] = 100\n";

    const DECOMPILED: &str = "balances = Hash(default_value=0)\n\n@export\ndef transfer(amount: float, to: str):\n    balances[to] += amount * 1.5\n\n@construct\ndef seed():\n    balances[ctx.caller] = 100\n";

    struct Node {
        contracts: HashMap<&'static str, &'static str>,
    }

    impl ContractSourceFetcher for Node {
        fn fetch_contract_source(&self, contract_name: &str) -> eyre::Result<String> {
            self.contracts
                .get(contract_name)
                .map(|source| source.to_string())
                .ok_or_else(|| eyre::eyre!("contract '{contract_name}' does not exist"))
        }
    }

    #[test]
    fn test_decompile_compiled_contract() {
        let result = decompile(COMPILED);

        assert!(!result.fallback);
        assert_eq!(result.source, DECOMPILED);
        assert_eq!(result.orm_variables, vec!["balances"]);
    }

    #[test]
    fn test_decompile_target_literal_source() {
        let args = DecompilerArgsBuilder::new()
            .target(COMPILED.to_string())
            .build()
            .expect("failed to build args");

        let result = decompile_target(args).expect("failed to decompile");
        assert_eq!(result.source, DECOMPILED);
    }

    #[test]
    fn test_decompile_target_file() {
        let path = std::env::temp_dir().join(format!("xian_decompile_{}.py", std::process::id()));
        std::fs::write(&path, COMPILED).expect("failed to write contract");

        let args = DecompilerArgsBuilder::new()
            .target(path.to_string_lossy().to_string())
            .build()
            .expect("failed to build args");
        let result = decompile_target(args);
        std::fs::remove_file(&path).expect("failed to remove contract");

        assert_eq!(result.expect("failed to decompile").source, DECOMPILED);
    }

    #[test]
    fn test_decompile_target_enforces_size_limit() {
        let args = DecompilerArgsBuilder::new()
            .target(COMPILED.to_string())
            .max_source_bytes(Some(16))
            .build()
            .expect("failed to build args");

        match decompile_target(args) {
            Err(Error::SourceTooLarge { size, limit }) => {
                assert_eq!(size, COMPILED.len());
                assert_eq!(limit, 16);
            }
            other => panic!("expected the source to be rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_decompile_target_strict() {
        let lenient = DecompilerArgsBuilder::new()
            .target("def broken(:".to_string())
            .build()
            .expect("failed to build args");
        let result = decompile_target(lenient).expect("lenient mode never fails to parse");
        assert!(result.fallback);
        assert_eq!(result.source, "def broken(:\n");

        let strict = DecompilerArgsBuilder::new()
            .target("def broken(:".to_string())
            .strict(true)
            .build()
            .expect("failed to build args");
        assert!(matches!(decompile_target(strict), Err(Error::Parse(_))));
    }

    #[test]
    fn test_decompile_contract_from_fetcher() {
        let node = Node { contracts: HashMap::from([("con_coin", COMPILED)]) };

        let result = decompile_contract(&node, "con_coin").expect("failed to decompile");
        assert_eq!(result.source, DECOMPILED);

        assert!(matches!(decompile_contract(&node, "con_missing"), Err(Error::FetchError(_))));
    }
}
