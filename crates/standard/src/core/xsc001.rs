use std::collections::{BTreeMap, BTreeSet};

use xian_decompiler::syntax::{Constant, Expr, FunctionDef, Module, Stmt};

use super::StandardValidator;

const REQUIRED_VARIABLES: [&str; 2] = ["balances", "metadata"];

const REQUIRED_FUNCTIONS: [(&str, &[&str]); 5] = [
    ("change_metadata", &["key", "value"]),
    ("transfer", &["amount", "to"]),
    ("approve", &["amount", "to"]),
    ("transfer_from", &["amount", "main_account", "to"]),
    ("balance_of", &["address"]),
];

/// Keys the constructor must set on `metadata`.
const METADATA_FIELDS: [&str; 5] =
    ["operator", "token_logo_url", "token_name", "token_symbol", "token_website"];

/// The fungible token standard.
#[derive(Debug)]
pub(super) struct Xsc001Validator;

/// What a contract declares, anywhere in its body.
#[derive(Debug, Default)]
struct Declarations {
    variables: BTreeSet<String>,
    hashes: BTreeSet<String>,
    /// Positional parameter names per function. A later definition replaces an earlier one.
    functions: BTreeMap<String, BTreeSet<String>>,
    has_constructor: bool,
    metadata_fields: BTreeSet<String>,
}

impl Declarations {
    fn collect(&mut self, body: &[Stmt]) {
        for stmt in body {
            match stmt {
                Stmt::Assign { targets, value } => self.assignment(targets, value),
                Stmt::FunctionDef(def) => {
                    self.function(def);
                    self.collect(&def.body);
                }
                Stmt::If { body, orelse, .. } |
                Stmt::For { body, orelse, .. } |
                Stmt::While { body, orelse, .. } => {
                    self.collect(body);
                    self.collect(orelse);
                }
                _ => {}
            }
        }
    }

    fn assignment(&mut self, targets: &[Expr], value: &Expr) {
        let (Some(Expr::Name(name)), Expr::Call { func, .. }) = (targets.first(), value) else {
            return;
        };

        self.variables.insert(name.clone());
        if func.as_name() == Some("Hash") {
            self.hashes.insert(name.clone());
        }
    }

    fn function(&mut self, def: &FunctionDef) {
        let params = def.params.args.iter().map(|p| p.name.clone()).collect();
        self.functions.insert(def.name.clone(), params);

        if def.decorators.iter().any(|d| d.as_name() == Some("construct")) {
            self.has_constructor = true;
        }

        if def.name == "seed" {
            self.metadata_fields.extend(def.body.iter().filter_map(metadata_key));
        }
    }
}

/// The key of a `metadata["key"] = …` statement.
fn metadata_key(stmt: &Stmt) -> Option<String> {
    let Stmt::Assign { targets, .. } = stmt else { return None };
    let Some(Expr::Subscript { value, slice }) = targets.first() else { return None };

    match (value.as_ref(), slice.as_ref()) {
        (Expr::Name(name), Expr::Constant(Constant::Str(key))) if name == "metadata" => {
            Some(key.clone())
        }
        _ => None,
    }
}

fn names<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    format!("{{{}}}", names.into_iter().collect::<Vec<_>>().join(", "))
}

impl StandardValidator for Xsc001Validator {
    fn validate(&self, module: &Module) -> Vec<String> {
        let mut found = Declarations::default();
        found.collect(&module.body);

        let mut violations = Vec::new();

        let missing: Vec<&str> =
            REQUIRED_VARIABLES.into_iter().filter(|v| !found.variables.contains(*v)).collect();
        if !missing.is_empty() {
            violations.push(format!("Missing required variables: {}", names(missing)));
        }
        for variable in REQUIRED_VARIABLES {
            if found.variables.contains(variable) && !found.hashes.contains(variable) {
                violations.push(format!("Variable {variable} must be of type Hash"));
            }
        }

        for (function, expected) in REQUIRED_FUNCTIONS {
            match found.functions.get(function) {
                None => violations.push(format!("Missing required function: {function}")),
                Some(params) if !params.iter().map(String::as_str).eq(expected.iter().copied()) => {
                    violations.push(format!(
                        "Function {function} has incorrect arguments. Expected {}, got {}",
                        names(expected.iter().copied()),
                        names(params.iter().map(String::as_str))
                    ));
                }
                Some(_) => {}
            }
        }

        if !found.has_constructor {
            violations.push("Missing constructor (@construct decorator)".to_string());
        }

        let missing: Vec<&str> =
            METADATA_FIELDS.into_iter().filter(|f| !found.metadata_fields.contains(*f)).collect();
        if !missing.is_empty() {
            violations.push(format!("Missing required metadata fields: {}", names(missing)));
        }

        violations
    }
}
