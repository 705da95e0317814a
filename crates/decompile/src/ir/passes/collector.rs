use std::collections::BTreeSet;

use crate::ir::types::{Expr, Keyword, Module, Stmt};

/// Returns the `name` of every ORM declaration in the module, i.e. every assignment of a call
/// to a plain name carrying both a `contract` keyword and a string `name` keyword.
pub fn run(module: &Module) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    collect_body(&module.body, &mut names);
    names
}

fn collect_body(body: &[Stmt], names: &mut BTreeSet<String>) {
    for stmt in body {
        match stmt {
            Stmt::Assign { value, .. } => {
                if let Some(name) = orm_variable(value) {
                    names.insert(name.to_string());
                }
            }
            Stmt::FunctionDef(def) => collect_body(&def.body, names),
            Stmt::If { body, orelse, .. } |
            Stmt::For { body, orelse, .. } |
            Stmt::While { body, orelse, .. } => {
                collect_body(body, names);
                collect_body(orelse, names);
            }
            _ => {}
        }
    }
}

pub(crate) fn keyword<'a>(keywords: &'a [Keyword], name: &str) -> Option<&'a Keyword> {
    keywords.iter().find(|k| k.arg.as_deref() == Some(name))
}

/// The declared name of an ORM constructor call such as
/// `Hash(default_value=0, contract='con_token', name='balances')`.
fn orm_variable(value: &Expr) -> Option<&str> {
    let Expr::Call { func, keywords, .. } = value else { return None };
    func.as_name()?;
    keyword(keywords, "contract")?;
    keyword(keywords, "name")?.value.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::parser::Parser;

    fn collect(source: &str) -> Vec<String> {
        run(&Parser::parse(source).expect("should parse")).into_iter().collect()
    }

    #[test]
    fn test_collects_orm_names() {
        let source = "\
__balances = Hash(default_value=0, contract='con_token', name='balances')
__metadata = Hash(contract='con_token', name='metadata')
__owner = Variable(contract='con_token', name='owner')
";
        assert_eq!(collect(source), vec!["balances", "metadata", "owner"]);
    }

    #[test]
    fn test_collects_nested_assignments() {
        let source = "def ____():\n    if x:\n        __v = Variable(contract='c', name='inner')\n";
        assert_eq!(collect(source), vec!["inner"]);
    }

    #[test]
    fn test_skips_incomplete_declarations() {
        // no `name`, no `contract`, a non-string name, an attribute call
        let source = "\
a = Hash(contract='c')
b = Hash(name='b')
c = Hash(contract='c', name=1)
d = orm.Hash(contract='c', name='d')
";
        assert!(collect(source).is_empty());
    }
}
