use xian_common::constants::{CONSTRUCTOR_MARKER, MANGLE_PREFIX};

use crate::ir::{
    passes::collector::keyword,
    types::{Comprehension, Constant, Expr, FStringPart, FunctionDef, Int, Module, Parameters, Stmt},
};

/// Rewrites a compiled module back towards its source form, in a single traversal. Children
/// are rewritten before their parents.
pub fn run(module: &mut Module) {
    rewrite_body(&mut module.body);
}

/// Strips a leading `__`, unless that would leave nothing.
pub(crate) fn demangle(name: &str) -> Option<&str> {
    name.strip_prefix(MANGLE_PREFIX).filter(|rest| !rest.is_empty())
}

fn demangle_in_place(name: &mut String) {
    if let Some(stripped) = demangle(name) {
        *name = stripped.to_string();
    }
}

fn rewrite_body(body: &mut [Stmt]) {
    for stmt in body {
        rewrite_stmt(stmt);
    }
}

fn rewrite_stmt(stmt: &mut Stmt) {
    match stmt {
        Stmt::Expr(value) | Stmt::Return(Some(value)) => rewrite_expr(value),
        Stmt::Assign { targets, value } => {
            targets.iter_mut().for_each(rewrite_expr);
            rewrite_expr(value);
            prune_orm_keywords(value);
        }
        Stmt::AugAssign { target, value, .. } => {
            rewrite_expr(target);
            rewrite_expr(value);
        }
        Stmt::AnnAssign { target, annotation, value } => {
            rewrite_expr(target);
            rewrite_expr(annotation);
            value.iter_mut().for_each(rewrite_expr);
        }
        Stmt::FunctionDef(def) => rewrite_function(def),
        Stmt::If { test, body, orelse } | Stmt::While { test, body, orelse } => {
            rewrite_expr(test);
            rewrite_body(body);
            rewrite_body(orelse);
        }
        Stmt::For { target, iter, body, orelse } => {
            rewrite_expr(target);
            rewrite_expr(iter);
            rewrite_body(body);
            rewrite_body(orelse);
        }
        Stmt::Assert { test, msg } => {
            rewrite_expr(test);
            msg.iter_mut().for_each(rewrite_expr);
        }
        Stmt::Raise { exc, cause } => {
            exc.iter_mut().chain(cause.iter_mut()).for_each(rewrite_expr);
        }
        Stmt::Delete(targets) => targets.iter_mut().for_each(rewrite_expr),
        Stmt::Global(names) | Stmt::Nonlocal(names) => {
            names.iter_mut().for_each(demangle_in_place)
        }
        Stmt::Return(None) |
        Stmt::Import(_) |
        Stmt::ImportFrom { .. } |
        Stmt::Pass |
        Stmt::Break |
        Stmt::Continue => {}
    }
}

fn rewrite_function(def: &mut FunctionDef) {
    def.decorators.iter_mut().for_each(rewrite_expr);
    rewrite_parameters(&mut def.params);
    def.returns.iter_mut().for_each(rewrite_expr);
    rewrite_body(&mut def.body);

    if def.name == CONSTRUCTOR_MARKER {
        def.name = "seed".to_string();
        def.decorators = vec![Expr::Name("construct".to_string())];
        return;
    }

    // `@export('con_name')` goes back to a bare `@export`
    let export_call = matches!(
        def.decorators.first(),
        Some(Expr::Call { func, args, .. })
            if func.as_name() == Some("export") &&
                matches!(args.as_slice(), [Expr::Constant(_)])
    );
    if export_call {
        def.decorators = vec![Expr::Name("export".to_string())];
    } else if let Some(Expr::Name(id)) = def.decorators.first_mut() {
        demangle_in_place(id);
    }

    demangle_in_place(&mut def.name);
}

fn rewrite_parameters(params: &mut Parameters) {
    for param in params.iter_mut() {
        demangle_in_place(&mut param.name);
        param.annotation.iter_mut().for_each(rewrite_expr);
        param.default.iter_mut().for_each(rewrite_expr);
    }
}

fn rewrite_generators(generators: &mut [Comprehension]) {
    for generator in generators {
        rewrite_expr(&mut generator.target);
        rewrite_expr(&mut generator.iter);
        generator.ifs.iter_mut().for_each(rewrite_expr);
    }
}

fn rewrite_fstring(parts: &mut [FStringPart]) {
    for part in parts {
        if let FStringPart::Field { value, spec, .. } = part {
            rewrite_expr(value);
            if let Some(spec) = spec {
                rewrite_fstring(spec);
            }
        }
    }
}

fn rewrite_expr(expr: &mut Expr) {
    match expr {
        Expr::Name(id) => demangle_in_place(id),
        Expr::Constant(_) => {}
        Expr::FString(parts) => rewrite_fstring(parts),
        Expr::List(items) | Expr::Tuple(items) | Expr::Set(items) => {
            items.iter_mut().for_each(rewrite_expr)
        }
        Expr::Dict(entries) => {
            for (key, value) in entries {
                key.iter_mut().for_each(rewrite_expr);
                rewrite_expr(value);
            }
        }
        Expr::ListComp { elt, generators } |
        Expr::SetComp { elt, generators } |
        Expr::GeneratorExp { elt, generators } => {
            rewrite_expr(elt);
            rewrite_generators(generators);
        }
        Expr::DictComp { key, value, generators } => {
            rewrite_expr(key);
            rewrite_expr(value);
            rewrite_generators(generators);
        }
        Expr::Attribute { value, .. } | Expr::Starred(value) => rewrite_expr(value),
        Expr::Subscript { value, slice } => {
            rewrite_expr(value);
            rewrite_expr(slice);
        }
        Expr::Slice { lower, upper, step } => {
            for bound in [lower, upper, step].into_iter().flatten() {
                rewrite_expr(bound);
            }
        }
        Expr::Call { func, args, keywords } => {
            rewrite_expr(func);
            args.iter_mut().for_each(rewrite_expr);
            for keyword in keywords {
                rewrite_expr(&mut keyword.value);
            }
        }
        Expr::UnaryOp { operand, .. } => rewrite_expr(operand),
        Expr::BinOp { left, right, .. } => {
            rewrite_expr(left);
            rewrite_expr(right);
        }
        Expr::BoolOp { values, .. } => values.iter_mut().for_each(rewrite_expr),
        Expr::Compare { left, comparators, .. } => {
            rewrite_expr(left);
            comparators.iter_mut().for_each(rewrite_expr);
        }
        Expr::IfExp { test, body, orelse } => {
            rewrite_expr(test);
            rewrite_expr(body);
            rewrite_expr(orelse);
        }
        Expr::Lambda { params, body } => {
            rewrite_parameters(params);
            rewrite_expr(body);
        }
    }

    if let Some(value) = decimal_literal(expr) {
        *expr = Expr::Constant(Constant::Float(value));
    }
}

/// The value of a `decimal(<constant>)` call, if its argument reads as a finite float.
fn decimal_literal(expr: &Expr) -> Option<f64> {
    let Expr::Call { func, args, keywords } = expr else { return None };
    if func.as_name() != Some("decimal") || !keywords.is_empty() {
        return None;
    }

    let value = match args.as_slice() {
        [Expr::Constant(Constant::Str(text))] => parse_float(text)?,
        [Expr::Constant(Constant::Int(Int::Small(value)))] => *value as f64,
        [Expr::Constant(Constant::Float(value))] => *value,
        [Expr::Constant(Constant::Bool(value))] => f64::from(u8::from(*value)),
        _ => return None,
    };

    value.is_finite().then_some(value)
}

/// Reads a float the way the contract runtime does: surrounding whitespace is ignored and
/// underscores may only separate digits.
pub(crate) fn parse_float(text: &str) -> Option<f64> {
    let text = text.trim();
    let chars: Vec<char> = text.chars().collect();

    let misplaced_underscore = chars.iter().enumerate().any(|(i, c)| {
        *c == '_' &&
            !(i > 0 &&
                chars[i - 1].is_ascii_digit() &&
                chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()))
    });
    if misplaced_underscore {
        return None;
    }

    text.replace('_', "").parse::<f64>().ok()
}

/// ORM declarations keep only their `default_value`; `contract` and `name` are filled in by
/// the compiler.
fn prune_orm_keywords(value: &mut Expr) {
    if let Expr::Call { func, keywords, .. } = value {
        if func.as_name().is_some() && keyword(keywords, "contract").is_some() {
            keywords.retain(|k| k.arg.as_deref() == Some("default_value"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{emit::PythonEmitter, parser::Parser};

    fn rewrite(source: &str) -> String {
        let mut module = Parser::parse(source).expect("should parse");
        run(&mut module);
        PythonEmitter::new().emit(&module)
    }

    #[test]
    fn test_demangle() {
        assert_eq!(demangle("__x"), Some("x"));
        assert_eq!(demangle("____x"), Some("__x"));
        assert_eq!(demangle("__"), None);
        assert_eq!(demangle("x"), None);
    }

    #[test]
    fn test_constructor() {
        assert_eq!(
            rewrite("@__construct\ndef ____(a):\n    __v.set(a)\n"),
            "@construct\ndef seed(a):\n    v.set(a)\n\n"
        );
        assert_eq!(rewrite("def ____():\n    pass\n"), "@construct\ndef seed():\n    pass\n\n");
    }

    #[test]
    fn test_export_decorator() {
        assert_eq!(
            rewrite("@__export('con_token')\ndef transfer(amount):\n    pass\n"),
            "@export\ndef transfer(amount):\n    pass\n\n"
        );
        // not a single constant argument
        assert_eq!(
            rewrite("@__export(x)\ndef f():\n    pass\n"),
            "@export(x)\ndef f():\n    pass\n\n"
        );
    }

    #[test]
    fn test_private_names() {
        assert_eq!(
            rewrite("def __helper(__x):\n    return __balances[__x]\n"),
            "def helper(x):\n    return balances[x]\n\n"
        );
        // attributes and keywords keep their names
        assert_eq!(rewrite("a.__b(__c=1)\n"), "a.__b(__c=1)\n");
    }

    #[test]
    fn test_decimal_literals() {
        assert_eq!(rewrite("x = decimal('3.1400000000')\n"), "x = 3.14\n");
        assert_eq!(rewrite("x = decimal(' 1_000.5 ')\n"), "x = 1000.5\n");
        assert_eq!(rewrite("x = decimal(2)\n"), "x = 2\n");
        assert_eq!(rewrite("x = decimal('abc')\n"), "x = decimal(\"abc\")\n");
        assert_eq!(rewrite("x = decimal('inf')\n"), "x = decimal(\"inf\")\n");
        assert_eq!(rewrite("x = decimal('1__0')\n"), "x = decimal(\"1__0\")\n");
        assert_eq!(rewrite("x = decimal(a)\n"), "x = decimal(a)\n");
    }

    #[test]
    fn test_orm_keywords_are_pruned() {
        assert_eq!(
            rewrite("__balances = Hash(default_value=0, contract='con', name='balances')\n"),
            "balances = Hash(default_value=0)\n"
        );
        assert_eq!(
            rewrite("__owner = Variable(contract='con', name='owner')\n"),
            "owner = Variable()\n"
        );
        // calls without `contract` are left alone
        assert_eq!(rewrite("x = f(name='x')\n"), "x = f(name=\"x\")\n");
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("2.5"), Some(2.5));
        assert_eq!(parse_float("  -2e3\n"), Some(-2000.0));
        assert_eq!(parse_float("1_0.0_1"), Some(10.01));
        assert_eq!(parse_float("_1"), None);
        assert_eq!(parse_float("1_"), None);
        assert_eq!(parse_float(""), None);
    }
}
