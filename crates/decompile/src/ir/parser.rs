use crate::{
    error::ParseError,
    ir::{
        tokenizer::{Token, TokenKind, Tokenizer},
        types::{
            Alias, BinOp, BoolOp, CmpOp, Comprehension, Constant, Expr, FStringPart, FunctionDef,
            Keyword, Module, Param, Parameters, Stmt, UnaryOp,
        },
    },
};

/// How deeply blocks, brackets and operator chains may nest before parsing gives up.
pub const MAX_NESTING: usize = 100;

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import",
    "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while",
    "with", "yield",
];

type ParseResult<T> = Result<T, ParseError>;

/// A recursive descent parser over [`Tokenizer`] output.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    /// Parses a whole module.
    pub fn parse(source: &str) -> ParseResult<Module> {
        let mut parser = Parser::new(Tokenizer::tokenize(source)?);

        let mut body = Vec::new();
        while !matches!(parser.peek().kind, TokenKind::EndMarker) {
            if matches!(parser.peek().kind, TokenKind::Newline) {
                parser.bump();
                continue;
            }
            body.extend(parser.statement()?);
        }

        Ok(Module { body })
    }

    /// Parses a single expression, as found inside an f-string replacement field.
    fn parse_expression(source: &str, depth: usize) -> ParseResult<Expr> {
        let mut parser = Parser::new(Tokenizer::tokenize(source)?);
        parser.depth = depth;
        let expr = parser.test_list_star()?;
        parser.expect_kind(TokenKind::Newline, "end of expression")?;
        parser.expect_kind(TokenKind::EndMarker, "end of expression")?;
        Ok(expr)
    }

    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, position: 0, depth: 0 }
    }

    // ---- token helpers ----

    fn peek(&self) -> &Token {
        // the tokenizer always terminates the stream with an end marker
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn peek_nth(&self, n: usize) -> &Token {
        &self.tokens[(self.position + n).min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    fn at_op(&self, op: &str) -> bool {
        self.peek().is_op(op)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek().is_name(keyword)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.at_op(op) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let token = self.peek();
        ParseError::new(token.line, token.column, message)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let found = match &self.peek().kind {
            TokenKind::Name(name) => format!("'{name}'"),
            TokenKind::Int(_) | TokenKind::Float(_) => "number".to_string(),
            TokenKind::Str(_) | TokenKind::Bytes(_) | TokenKind::FString { .. } => {
                "string".to_string()
            }
            TokenKind::Op(op) => format!("'{op}'"),
            TokenKind::Newline => "newline".to_string(),
            TokenKind::Indent => "indent".to_string(),
            TokenKind::Dedent => "dedent".to_string(),
            TokenKind::EndMarker => "end of input".to_string(),
        };
        self.error_here(format!("expected {expected}, found {found}"))
    }

    fn expect_op(&mut self, op: &str) -> ParseResult<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{op}'")))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> ParseResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{keyword}'")))
        }
    }

    fn expect_kind(&mut self, kind: TokenKind, expected: &str) -> ParseResult<()> {
        if self.peek().kind == kind {
            self.bump();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn identifier(&mut self) -> ParseResult<String> {
        match &self.peek().kind {
            TokenKind::Name(name) if !KEYWORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.bump();
                Ok(name)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    /// Runs `f` one nesting level deeper, failing once [`MAX_NESTING`] is exceeded.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        self.enter()?;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn enter(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_NESTING {
            return Err(self.error_here("too many nested expressions or blocks"));
        }
        self.depth += 1;
        Ok(())
    }

    // ---- statements ----

    fn statement(&mut self) -> ParseResult<Vec<Stmt>> {
        let kind = self.peek().kind.clone();
        let stmt = match &kind {
            TokenKind::Op("@") => self.decorated()?,
            TokenKind::Name(name) => match name.as_str() {
                "def" => self.function_def(Vec::new())?,
                "if" => self.if_stmt()?,
                "for" => self.for_stmt()?,
                "while" => self.while_stmt()?,
                "class" | "try" | "with" | "async" | "match" if self.is_compound_start() => {
                    return Err(self.error_here(format!("'{name}' statements are not supported")));
                }
                _ => return self.simple_statements(),
            },
            TokenKind::Indent => return Err(self.error_here("unexpected indent")),
            _ => return self.simple_statements(),
        };

        Ok(vec![stmt])
    }

    fn is_compound_start(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Name(name) if name == "match" => {
                matches!(self.peek_nth(1).kind, TokenKind::Name(_))
            }
            _ => true,
        }
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect_op(":")?;

        if !matches!(self.peek().kind, TokenKind::Newline) {
            return self.simple_statements();
        }
        self.bump();
        self.expect_kind(TokenKind::Indent, "an indented block")?;

        self.nested(|parser| {
            let mut body = Vec::new();
            while !matches!(parser.peek().kind, TokenKind::Dedent | TokenKind::EndMarker) {
                body.extend(parser.statement()?);
            }
            parser.expect_kind(TokenKind::Dedent, "dedent")?;
            Ok(body)
        })
    }

    fn decorated(&mut self) -> ParseResult<Stmt> {
        let mut decorators = Vec::new();
        while self.eat_op("@") {
            decorators.push(self.test()?);
            self.expect_kind(TokenKind::Newline, "newline after decorator")?;
        }

        if !self.at_keyword("def") {
            return Err(self.unexpected("'def' after decorators"));
        }
        self.function_def(decorators)
    }

    fn function_def(&mut self, decorators: Vec<Expr>) -> ParseResult<Stmt> {
        self.expect_keyword("def")?;
        let name = self.identifier()?;

        self.expect_op("(")?;
        let params = self.parameters(")", true)?;
        self.expect_op(")")?;

        let returns = if self.eat_op("->") { Some(self.test()?) } else { None };
        let body = self.block()?;

        Ok(Stmt::FunctionDef(FunctionDef { name, params, body, decorators, returns }))
    }

    /// Parses a parameter list up to (not including) `close`. Lambdas take no annotations.
    fn parameters(&mut self, close: &str, annotated: bool) -> ParseResult<Parameters> {
        let mut params = Parameters::default();
        let mut seen_star = false;
        let mut seen_default = false;

        while !self.at_op(close) {
            if self.eat_op("**") {
                params.kwarg = Some(self.param(annotated, false)?);
                self.eat_op(",");
                if !self.at_op(close) {
                    return Err(self.error_here("parameter after **kwargs"));
                }
                break;
            } else if self.eat_op("*") {
                if seen_star {
                    return Err(self.error_here("* argument may appear only once"));
                }
                seen_star = true;
                if !self.at_op(",") && !self.at_op(close) {
                    params.vararg = Some(self.param(annotated, false)?);
                }
            } else {
                let param = self.param(annotated, true)?;
                if seen_star {
                    params.kwonly.push(param);
                } else {
                    if param.default.is_some() {
                        seen_default = true;
                    } else if seen_default {
                        return Err(
                            self.error_here("non-default argument follows default argument")
                        );
                    }
                    params.args.push(param);
                }
            }

            if !self.eat_op(",") {
                break;
            }
        }

        Ok(params)
    }

    fn param(&mut self, annotated: bool, with_default: bool) -> ParseResult<Param> {
        let name = self.identifier()?;
        let annotation = if annotated && self.eat_op(":") { Some(self.test()?) } else { None };
        let default = if with_default && self.eat_op("=") { Some(self.test()?) } else { None };
        Ok(Param { name, annotation, default })
    }

    fn if_stmt(&mut self) -> ParseResult<Stmt> {
        // consumes `if` or `elif`
        self.bump();
        let test = self.named_test()?;
        let body = self.block()?;

        let orelse = if self.at_keyword("elif") {
            self.nested(|parser| Ok(vec![parser.if_stmt()?]))?
        } else if self.eat_keyword("else") {
            self.block()?
        } else {
            Vec::new()
        };

        Ok(Stmt::If { test, body, orelse })
    }

    fn for_stmt(&mut self) -> ParseResult<Stmt> {
        self.expect_keyword("for")?;
        let target = self.target_list()?;
        self.expect_keyword("in")?;
        let iter = self.test_list_star()?;
        let body = self.block()?;
        let orelse = if self.eat_keyword("else") { self.block()? } else { Vec::new() };

        Ok(Stmt::For { target, iter, body, orelse })
    }

    fn while_stmt(&mut self) -> ParseResult<Stmt> {
        self.expect_keyword("while")?;
        let test = self.named_test()?;
        let body = self.block()?;
        let orelse = if self.eat_keyword("else") { self.block()? } else { Vec::new() };

        Ok(Stmt::While { test, body, orelse })
    }

    /// `small_stmt (';' small_stmt)* [';'] NEWLINE`
    fn simple_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut stmts = vec![self.small_statement()?];
        while self.eat_op(";") {
            if matches!(self.peek().kind, TokenKind::Newline) {
                break;
            }
            stmts.push(self.small_statement()?);
        }
        self.expect_kind(TokenKind::Newline, "newline")?;
        Ok(stmts)
    }

    fn small_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = match &self.peek().kind {
            TokenKind::Name(name) => name.clone(),
            _ => String::new(),
        };

        match keyword.as_str() {
            "pass" => {
                self.bump();
                Ok(Stmt::Pass)
            }
            "break" => {
                self.bump();
                Ok(Stmt::Break)
            }
            "continue" => {
                self.bump();
                Ok(Stmt::Continue)
            }
            "return" => {
                self.bump();
                let value =
                    if self.at_statement_end() { None } else { Some(self.test_list_star()?) };
                Ok(Stmt::Return(value))
            }
            "raise" => {
                self.bump();
                if self.at_statement_end() {
                    return Ok(Stmt::Raise { exc: None, cause: None });
                }
                let exc = self.test()?;
                let cause = if self.eat_keyword("from") { Some(self.test()?) } else { None };
                Ok(Stmt::Raise { exc: Some(exc), cause })
            }
            "assert" => {
                self.bump();
                let test = self.test()?;
                let msg = if self.eat_op(",") { Some(self.test()?) } else { None };
                Ok(Stmt::Assert { test, msg })
            }
            "del" => {
                self.bump();
                let mut targets = vec![self.expr()?];
                while self.eat_op(",") {
                    if self.at_statement_end() {
                        break;
                    }
                    targets.push(self.expr()?);
                }
                if let Some(bad) = targets.iter().find(|t| !t.is_target()) {
                    return Err(self.error_here(format!("cannot delete {}", describe(bad))));
                }
                Ok(Stmt::Delete(targets))
            }
            "global" | "nonlocal" => {
                self.bump();
                let mut names = vec![self.identifier()?];
                while self.eat_op(",") {
                    names.push(self.identifier()?);
                }
                Ok(if keyword == "global" { Stmt::Global(names) } else { Stmt::Nonlocal(names) })
            }
            "import" => {
                self.bump();
                let mut names = vec![self.import_alias(true)?];
                while self.eat_op(",") {
                    names.push(self.import_alias(true)?);
                }
                Ok(Stmt::Import(names))
            }
            "from" => self.import_from(),
            "yield" | "await" => Err(self.error_here(format!("'{keyword}' is not supported"))),
            _ => self.expression_statement(),
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Newline | TokenKind::EndMarker) || self.at_op(";")
    }

    fn dotted_name(&mut self) -> ParseResult<String> {
        let mut name = self.identifier()?;
        while self.eat_op(".") {
            name.push('.');
            name.push_str(&self.identifier()?);
        }
        Ok(name)
    }

    fn import_alias(&mut self, dotted: bool) -> ParseResult<Alias> {
        let name = if dotted { self.dotted_name()? } else { self.identifier()? };
        let asname = if self.eat_keyword("as") { Some(self.identifier()?) } else { None };
        Ok(Alias { name, asname })
    }

    fn import_from(&mut self) -> ParseResult<Stmt> {
        self.expect_keyword("from")?;

        let mut level = 0;
        loop {
            if self.eat_op(".") {
                level += 1;
            } else if self.eat_op("...") {
                level += 3;
            } else {
                break;
            }
        }
        let module = if self.at_keyword("import") { None } else { Some(self.dotted_name()?) };
        if module.is_none() && level == 0 {
            return Err(self.unexpected("a module name"));
        }
        self.expect_keyword("import")?;

        let names = if self.eat_op("*") {
            vec![Alias { name: "*".to_string(), asname: None }]
        } else {
            let parenthesized = self.eat_op("(");
            let mut names = vec![self.import_alias(false)?];
            while self.eat_op(",") {
                if parenthesized && self.at_op(")") {
                    break;
                }
                names.push(self.import_alias(false)?);
            }
            if parenthesized {
                self.expect_op(")")?;
            }
            names
        };

        Ok(Stmt::ImportFrom { module, names, level })
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let first = self.test_list_star()?;

        if let TokenKind::Op(op) = self.peek().kind {
            if let Some(bin_op) = BinOp::from_augmented(op) {
                if !matches!(first, Expr::Name(_) | Expr::Attribute { .. } | Expr::Subscript { .. })
                {
                    return Err(self.error_here(format!(
                        "'{}' is an illegal target for augmented assignment",
                        describe(&first)
                    )));
                }
                self.bump();
                let value = self.test_list_star()?;
                return Ok(Stmt::AugAssign { target: first, op: bin_op, value });
            }
        }

        if self.eat_op(":") {
            if !matches!(first, Expr::Name(_) | Expr::Attribute { .. } | Expr::Subscript { .. }) {
                return Err(self.error_here(format!(
                    "only single target (not {}) can be annotated",
                    describe(&first)
                )));
            }
            let annotation = self.test()?;
            let value = if self.eat_op("=") { Some(self.test_list_star()?) } else { None };
            return Ok(Stmt::AnnAssign { target: first, annotation, value });
        }

        if self.at_op("=") {
            let mut targets = vec![first];
            let mut value = None;
            while self.eat_op("=") {
                if let Some(previous) = value.take() {
                    targets.push(previous);
                }
                value = Some(self.test_list_star()?);
            }
            if let Some(bad) = targets.iter().find(|t| !t.is_target()) {
                return Err(self.error_here(format!("cannot assign to {}", describe(bad))));
            }
            let value = value.ok_or_else(|| self.unexpected("an expression"))?;
            return Ok(Stmt::Assign { targets, value });
        }

        Ok(Stmt::Expr(first))
    }

    // ---- expressions ----

    /// `(test | star_expr) (',' (test | star_expr))* [',']`, a bare tuple if there is a comma.
    fn test_list_star(&mut self) -> ParseResult<Expr> {
        let first = self.test_or_star()?;
        if !self.at_op(",") {
            return Ok(first);
        }

        let mut items = vec![first];
        while self.eat_op(",") {
            if !self.starts_expression() {
                break;
            }
            items.push(self.test_or_star()?);
        }
        Ok(Expr::Tuple(items))
    }

    /// Targets of a `for` clause: `expr (',' expr)* [',']`.
    fn target_list(&mut self) -> ParseResult<Expr> {
        let first = self.expr_or_star()?;
        let target = if self.at_op(",") {
            let mut items = vec![first];
            while self.eat_op(",") {
                if !self.starts_expression() {
                    break;
                }
                items.push(self.expr_or_star()?);
            }
            Expr::Tuple(items)
        } else {
            first
        };

        if !target.is_target() {
            return Err(self.error_here(format!("cannot assign to {}", describe(&target))));
        }
        Ok(target)
    }

    fn starts_expression(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Name(name) => {
                !KEYWORDS.contains(&name.as_str()) ||
                    matches!(name.as_str(), "None" | "True" | "False" | "not" | "lambda" | "await")
            }
            TokenKind::Int(_) |
            TokenKind::Float(_) |
            TokenKind::Str(_) |
            TokenKind::Bytes(_) |
            TokenKind::FString { .. } => true,
            TokenKind::Op(op) => {
                matches!(*op, "(" | "[" | "{" | "-" | "+" | "~" | "*" | "...")
            }
            _ => false,
        }
    }

    fn test_or_star(&mut self) -> ParseResult<Expr> {
        if self.eat_op("*") {
            return Ok(Expr::Starred(Box::new(self.expr()?)));
        }
        self.test()
    }

    fn expr_or_star(&mut self) -> ParseResult<Expr> {
        if self.eat_op("*") {
            return Ok(Expr::Starred(Box::new(self.expr()?)));
        }
        self.expr()
    }

    /// A `test` where a walrus would be allowed; walrus itself is not supported.
    fn named_test(&mut self) -> ParseResult<Expr> {
        let test = self.test()?;
        if self.at_op(":=") {
            return Err(self.error_here("assignment expressions are not supported"));
        }
        Ok(test)
    }

    fn test(&mut self) -> ParseResult<Expr> {
        self.nested(|parser| {
            if parser.at_keyword("lambda") {
                return parser.lambda();
            }

            let body = parser.or_test()?;
            if !parser.eat_keyword("if") {
                return Ok(body);
            }
            let test = parser.or_test()?;
            parser.expect_keyword("else")?;
            let orelse = parser.test()?;

            Ok(Expr::IfExp { test: Box::new(test), body: Box::new(body), orelse: Box::new(orelse) })
        })
    }

    /// A `test` that cannot be an unparenthesized conditional, as in comprehension conditions.
    fn test_no_cond(&mut self) -> ParseResult<Expr> {
        if self.at_keyword("lambda") {
            return self.nested(|parser| parser.lambda());
        }
        self.or_test()
    }

    fn lambda(&mut self) -> ParseResult<Expr> {
        self.expect_keyword("lambda")?;
        let params = self.parameters(":", false)?;
        self.expect_op(":")?;
        let body = self.test()?;
        Ok(Expr::Lambda { params: Box::new(params), body: Box::new(body) })
    }

    fn or_test(&mut self) -> ParseResult<Expr> {
        self.bool_chain(BoolOp::Or)
    }

    fn bool_chain(&mut self, op: BoolOp) -> ParseResult<Expr> {
        let (keyword, next): (&str, fn(&mut Self) -> ParseResult<Expr>) = match op {
            BoolOp::Or => ("or", |p| p.bool_chain(BoolOp::And)),
            BoolOp::And => ("and", Self::not_test),
        };

        let first = next(self)?;
        if !self.at_keyword(keyword) {
            return Ok(first);
        }

        let mut values = vec![first];
        while self.eat_keyword(keyword) {
            values.push(next(self)?);
        }
        Ok(Expr::BoolOp { op, values })
    }

    fn not_test(&mut self) -> ParseResult<Expr> {
        if self.eat_keyword("not") {
            let operand = self.nested(|parser| parser.not_test())?;
            return Ok(Expr::UnaryOp { op: UnaryOp::Not, operand: Box::new(operand) });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let left = self.expr()?;

        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = self.comparison_op() {
            ops.push(op);
            comparators.push(self.expr()?);
        }

        if ops.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare { left: Box::new(left), ops, comparators })
        }
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let kind = self.peek().kind.clone();
        let op = match &kind {
            TokenKind::Op("==") => CmpOp::Eq,
            TokenKind::Op("!=") => CmpOp::NotEq,
            TokenKind::Op("<") => CmpOp::Lt,
            TokenKind::Op("<=") => CmpOp::LtE,
            TokenKind::Op(">") => CmpOp::Gt,
            TokenKind::Op(">=") => CmpOp::GtE,
            TokenKind::Name(name) if name == "in" => CmpOp::In,
            TokenKind::Name(name) if name == "is" => {
                if self.peek_nth(1).is_name("not") {
                    self.bump();
                    CmpOp::IsNot
                } else {
                    CmpOp::Is
                }
            }
            TokenKind::Name(name) if name == "not" && self.peek_nth(1).is_name("in") => {
                self.bump();
                CmpOp::NotIn
            }
            _ => return None,
        };

        self.bump();
        Some(op)
    }

    /// Binary operators from `|` down to `*`, by precedence climbing. Every operator in a
    /// chain counts as one nesting level, since the tree grows one level deeper per operator.
    fn expr(&mut self) -> ParseResult<Expr> {
        self.binary(BinOp::BitOr.precedence())
    }

    fn binary(&mut self, min_precedence: u8) -> ParseResult<Expr> {
        let mut left = self.factor()?;
        let entry_depth = self.depth;

        let result = loop {
            let Some(op) = self.binary_op().filter(|op| op.precedence() >= min_precedence) else {
                break Ok(left);
            };
            if let Err(e) = self.enter() {
                break Err(e);
            }
            self.bump();

            let right = match self.binary(op.precedence() + 1) {
                Ok(right) => right,
                Err(e) => break Err(e),
            };
            left = Expr::BinOp { left: Box::new(left), op, right: Box::new(right) };
        };

        self.depth = entry_depth;
        result
    }

    fn binary_op(&self) -> Option<BinOp> {
        let TokenKind::Op(op) = self.peek().kind else { return None };
        Some(match op {
            "|" => BinOp::BitOr,
            "^" => BinOp::BitXor,
            "&" => BinOp::BitAnd,
            "<<" => BinOp::LShift,
            ">>" => BinOp::RShift,
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "@" => BinOp::MatMul,
            "/" => BinOp::Div,
            "//" => BinOp::FloorDiv,
            "%" => BinOp::Mod,
            _ => return None,
        })
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Op("-") => UnaryOp::Neg,
            TokenKind::Op("+") => UnaryOp::Pos,
            TokenKind::Op("~") => UnaryOp::Invert,
            _ => return self.power(),
        };
        self.bump();

        let operand = self.nested(|parser| parser.factor())?;
        Ok(Expr::UnaryOp { op, operand: Box::new(operand) })
    }

    fn power(&mut self) -> ParseResult<Expr> {
        let base = self.atom_expr()?;
        if !self.eat_op("**") {
            return Ok(base);
        }

        let exponent = self.nested(|parser| parser.factor())?;
        Ok(Expr::BinOp { left: Box::new(base), op: BinOp::Pow, right: Box::new(exponent) })
    }

    /// An atom followed by calls, subscripts and attribute accesses.
    fn atom_expr(&mut self) -> ParseResult<Expr> {
        let mut expr = self.atom()?;
        let entry_depth = self.depth;

        let result = loop {
            let trailer = if self.at_op("(") || self.at_op("[") || self.at_op(".") {
                self.enter().and_then(|_| self.trailer(expr))
            } else {
                break Ok(expr);
            };
            match trailer {
                Ok(next) => expr = next,
                Err(e) => break Err(e),
            }
        };

        self.depth = entry_depth;
        result
    }

    fn trailer(&mut self, value: Expr) -> ParseResult<Expr> {
        let token = self.bump();
        match token.kind {
            TokenKind::Op("(") => {
                let (args, keywords) = self.arguments()?;
                self.expect_op(")")?;
                Ok(Expr::Call { func: Box::new(value), args, keywords })
            }
            TokenKind::Op("[") => {
                let slice = self.subscript_list()?;
                self.expect_op("]")?;
                Ok(Expr::Subscript { value: Box::new(value), slice: Box::new(slice) })
            }
            _ => {
                let attr = self.identifier()?;
                Ok(Expr::Attribute { value: Box::new(value), attr })
            }
        }
    }

    fn arguments(&mut self) -> ParseResult<(Vec<Expr>, Vec<Keyword>)> {
        let mut args = Vec::new();
        let mut keywords: Vec<Keyword> = Vec::new();

        while !self.at_op(")") {
            if self.eat_op("**") {
                keywords.push(Keyword { arg: None, value: self.test()? });
            } else if self.eat_op("*") {
                args.push(Expr::Starred(Box::new(self.test()?)));
            } else if matches!(self.peek().kind, TokenKind::Name(_)) && self.peek_nth(1).is_op("=")
            {
                let arg = self.identifier()?;
                self.bump();
                keywords.push(Keyword { arg: Some(arg), value: self.test()? });
            } else {
                let value = self.test()?;
                if self.at_keyword("for") {
                    let generators = self.comprehension_clauses()?;
                    args.push(Expr::GeneratorExp { elt: Box::new(value), generators });
                } else {
                    if keywords.iter().any(|k| k.arg.is_some()) {
                        return Err(
                            self.error_here("positional argument follows keyword argument")
                        );
                    }
                    args.push(value);
                }
            }

            if !self.eat_op(",") {
                break;
            }
        }

        Ok((args, keywords))
    }

    fn subscript_list(&mut self) -> ParseResult<Expr> {
        let first = self.subscript()?;
        if !self.at_op(",") {
            return Ok(first);
        }

        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_op("]") {
                break;
            }
            items.push(self.subscript()?);
        }
        Ok(Expr::Tuple(items))
    }

    /// `test | [test] ':' [test] [':' [test]]`
    fn subscript(&mut self) -> ParseResult<Expr> {
        let lower = if self.at_op(":") { None } else { Some(self.test()?) };
        if !self.eat_op(":") {
            return lower.ok_or_else(|| self.unexpected("an expression"));
        }

        let bound = |parser: &mut Self| -> ParseResult<Option<Box<Expr>>> {
            if parser.at_op(":") || parser.at_op("]") || parser.at_op(",") {
                Ok(None)
            } else {
                Ok(Some(Box::new(parser.test()?)))
            }
        };

        let upper = bound(self)?;
        let step = if self.eat_op(":") { bound(self)? } else { None };
        Ok(Expr::Slice { lower: lower.map(Box::new), upper, step })
    }

    fn comprehension_clauses(&mut self) -> ParseResult<Vec<Comprehension>> {
        let mut generators = Vec::new();
        while self.eat_keyword("for") {
            let target = self.target_list()?;
            self.expect_keyword("in")?;
            let iter = self.or_test()?;

            let mut ifs = Vec::new();
            while self.eat_keyword("if") {
                ifs.push(self.test_no_cond()?);
            }
            generators.push(Comprehension { target, iter, ifs });
        }
        Ok(generators)
    }

    fn atom(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Op("(") => {
                self.bump();
                self.nested(|parser| parser.parenthesized())
            }
            TokenKind::Op("[") => {
                self.bump();
                self.nested(|parser| parser.list_display())
            }
            TokenKind::Op("{") => {
                self.bump();
                self.nested(|parser| parser.brace_display())
            }
            TokenKind::Op("...") => {
                self.bump();
                Ok(Expr::Constant(Constant::Ellipsis))
            }
            TokenKind::Int(value) => {
                self.bump();
                Ok(Expr::Constant(Constant::Int(value)))
            }
            TokenKind::Float(value) => {
                self.bump();
                Ok(Expr::Constant(Constant::Float(value)))
            }
            TokenKind::Str(_) | TokenKind::Bytes(_) | TokenKind::FString { .. } => self.strings(),
            TokenKind::Name(name) => match name.as_str() {
                "None" => {
                    self.bump();
                    Ok(Expr::Constant(Constant::None))
                }
                "True" | "False" => {
                    self.bump();
                    Ok(Expr::Constant(Constant::Bool(name == "True")))
                }
                _ => Ok(Expr::Name(self.identifier()?)),
            },
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parenthesized(&mut self) -> ParseResult<Expr> {
        if self.eat_op(")") {
            return Ok(Expr::Tuple(Vec::new()));
        }

        let first = self.test_or_star()?;
        if self.at_keyword("for") {
            let generators = self.comprehension_clauses()?;
            self.expect_op(")")?;
            return Ok(Expr::GeneratorExp { elt: Box::new(first), generators });
        }
        if self.eat_op(")") {
            if matches!(first, Expr::Starred(_)) {
                return Err(self.error_here("cannot use starred expression here"));
            }
            return Ok(first);
        }

        let items = self.remaining_items(first, ")")?;
        Ok(Expr::Tuple(items))
    }

    fn list_display(&mut self) -> ParseResult<Expr> {
        if self.eat_op("]") {
            return Ok(Expr::List(Vec::new()));
        }

        let first = self.test_or_star()?;
        if self.at_keyword("for") {
            let generators = self.comprehension_clauses()?;
            self.expect_op("]")?;
            return Ok(Expr::ListComp { elt: Box::new(first), generators });
        }

        let items = self.remaining_items(first, "]")?;
        Ok(Expr::List(items))
    }

    /// Parses `(',' item)* [','] close` after a first item.
    fn remaining_items(&mut self, first: Expr, close: &str) -> ParseResult<Vec<Expr>> {
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_op(close) {
                break;
            }
            items.push(self.test_or_star()?);
        }
        self.expect_op(close)?;
        Ok(items)
    }

    fn brace_display(&mut self) -> ParseResult<Expr> {
        if self.eat_op("}") {
            return Ok(Expr::Dict(Vec::new()));
        }

        // `**mapping` or `key: value` makes it a dict
        let first_entry = if self.eat_op("**") {
            Some((None, self.expr()?))
        } else {
            let first = self.test_or_star()?;
            if !self.eat_op(":") {
                return self.set_display(first);
            }
            let value = self.test()?;
            if self.at_keyword("for") {
                let generators = self.comprehension_clauses()?;
                self.expect_op("}")?;
                return Ok(Expr::DictComp {
                    key: Box::new(first),
                    value: Box::new(value),
                    generators,
                });
            }
            Some((Some(first), value))
        };

        let mut entries: Vec<(Option<Expr>, Expr)> = first_entry.into_iter().collect();
        while self.eat_op(",") {
            if self.at_op("}") {
                break;
            }
            if self.eat_op("**") {
                entries.push((None, self.expr()?));
            } else {
                let key = self.test()?;
                self.expect_op(":")?;
                entries.push((Some(key), self.test()?));
            }
        }
        self.expect_op("}")?;

        Ok(Expr::Dict(entries))
    }

    fn set_display(&mut self, first: Expr) -> ParseResult<Expr> {
        if self.at_keyword("for") {
            let generators = self.comprehension_clauses()?;
            self.expect_op("}")?;
            return Ok(Expr::SetComp { elt: Box::new(first), generators });
        }

        Ok(Expr::Set(self.remaining_items(first, "}")?))
    }

    /// Adjacent string literals concatenate. Mixing bytes with text is an error.
    fn strings(&mut self) -> ParseResult<Expr> {
        let start = self.peek().clone();

        let mut bytes: Option<Vec<u8>> = None;
        let mut parts: Vec<FStringPart> = Vec::new();
        let mut has_text = false;
        let mut is_fstring = false;

        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::Bytes(value) => {
                    if has_text {
                        return Err(self.error_here("cannot mix bytes and nonbytes literals"));
                    }
                    bytes.get_or_insert_with(Vec::new).extend(value);
                }
                TokenKind::Str(value) => {
                    if bytes.is_some() {
                        return Err(self.error_here("cannot mix bytes and nonbytes literals"));
                    }
                    has_text = true;
                    push_literal(&mut parts, value);
                }
                TokenKind::FString { body, raw } => {
                    if bytes.is_some() {
                        return Err(self.error_here("cannot mix bytes and nonbytes literals"));
                    }
                    has_text = true;
                    is_fstring = true;
                    let fstring = FStringScanner::new(&body, raw, token.line, token.column)
                        .parts(self.depth)?;
                    for part in fstring {
                        match part {
                            FStringPart::Literal(text) => push_literal(&mut parts, text),
                            field => parts.push(field),
                        }
                    }
                }
                _ => break,
            }
            self.bump();
        }

        if let Some(bytes) = bytes {
            return Ok(Expr::Constant(Constant::Bytes(bytes)));
        }
        if is_fstring {
            return Ok(Expr::FString(parts));
        }

        match parts.pop() {
            None => Ok(Expr::Constant(Constant::Str(String::new()))),
            Some(FStringPart::Literal(text)) => Ok(Expr::Constant(Constant::Str(text))),
            Some(_) => Err(ParseError::new(start.line, start.column, "malformed string")),
        }
    }
}

fn push_literal(parts: &mut Vec<FStringPart>, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(FStringPart::Literal(last)) = parts.last_mut() {
        last.push_str(&text);
    } else {
        parts.push(FStringPart::Literal(text));
    }
}

/// A short description of an expression, for error messages.
fn describe(expr: &Expr) -> &'static str {
    match expr {
        Expr::Constant(_) | Expr::FString(_) => "literal",
        Expr::Call { .. } => "function call",
        Expr::Lambda { .. } => "lambda",
        Expr::Compare { .. } => "comparison",
        Expr::BoolOp { .. } | Expr::BinOp { .. } | Expr::UnaryOp { .. } => "expression",
        Expr::IfExp { .. } => "conditional expression",
        Expr::ListComp { .. } |
        Expr::SetComp { .. } |
        Expr::DictComp { .. } |
        Expr::GeneratorExp { .. } => "comprehension",
        Expr::Dict(_) => "dict literal",
        Expr::Set(_) => "set display",
        _ => "expression",
    }
}

/// Splits the body of an f-string into literal text and replacement fields.
struct FStringScanner {
    chars: Vec<char>,
    pos: usize,
    raw: bool,
    line: usize,
    column: usize,
}

impl FStringScanner {
    fn new(body: &str, raw: bool, line: usize, column: usize) -> Self {
        FStringScanner { chars: body.chars().collect(), pos: 0, raw, line, column }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.line, self.column, format!("f-string: {}", message.into()))
    }

    fn parts(mut self, depth: usize) -> ParseResult<Vec<FStringPart>> {
        let parts = self.parts_until(None, depth)?;
        Ok(parts)
    }

    /// Scans parts until the end of the body, or until an unmatched `}` when scanning a
    /// format spec.
    fn parts_until(&mut self, close: Option<char>, depth: usize) -> ParseResult<Vec<FStringPart>> {
        if depth >= MAX_NESTING {
            return Err(self.error("too many nested replacement fields"));
        }

        let mut parts = Vec::new();
        let mut literal = String::new();

        while let Some(c) = self.chars.get(self.pos).copied() {
            let next = self.chars.get(self.pos + 1).copied();
            match c {
                '{' if next == Some('{') && close.is_none() => {
                    literal.push('{');
                    self.pos += 2;
                }
                '}' if next == Some('}') && close.is_none() => {
                    literal.push('}');
                    self.pos += 2;
                }
                '{' => {
                    self.flush(&mut literal, &mut parts)?;
                    self.pos += 1;
                    parts.push(self.field(depth + 1)?);
                }
                '}' if close == Some('}') => break,
                '}' => return Err(self.error("single '}' is not allowed")),
                '\\' if !self.raw => {
                    literal.push('\\');
                    self.pos += 1;
                    if next == Some('\\') {
                        literal.push('\\');
                        self.pos += 1;
                    }
                }
                _ => {
                    literal.push(c);
                    self.pos += 1;
                }
            }
        }

        self.flush(&mut literal, &mut parts)?;
        Ok(parts)
    }

    fn flush(&self, literal: &mut String, parts: &mut Vec<FStringPart>) -> ParseResult<()> {
        if literal.is_empty() {
            return Ok(());
        }
        let text = if self.raw {
            std::mem::take(literal)
        } else {
            let decoded =
                crate::ir::tokenizer::unescape_str(literal, false).map_err(|e| self.error(e))?;
            literal.clear();
            decoded
        };
        push_literal(parts, text);
        Ok(())
    }

    /// Scans one replacement field; the opening `{` is already consumed.
    fn field(&mut self, depth: usize) -> ParseResult<FStringPart> {
        let start = self.pos;
        let mut brackets = 0usize;
        let mut quote: Option<char> = None;

        while let Some(c) = self.chars.get(self.pos).copied() {
            if let Some(q) = quote {
                if c == '\\' {
                    self.pos += 1;
                } else if c == q {
                    quote = None;
                }
                self.pos += 1;
                continue;
            }

            match c {
                '\'' | '"' => quote = Some(c),
                '(' | '[' | '{' => brackets += 1,
                ')' | ']' | '}' if brackets > 0 => brackets -= 1,
                '}' | ':' if brackets == 0 => break,
                '!' if brackets == 0 && self.chars.get(self.pos + 1) != Some(&'=') => break,
                _ => {}
            }
            self.pos += 1;
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        if text.trim().is_empty() {
            return Err(self.error("empty expression not allowed"));
        }
        let value = Parser::parse_expression(&format!("({text})"), depth)
            .map_err(|e| self.error(e.message))?;

        let conversion = if self.chars.get(self.pos) == Some(&'!') {
            let conversion = self.chars.get(self.pos + 1).copied();
            if !matches!(conversion, Some('s' | 'r' | 'a')) {
                return Err(self.error("invalid conversion character"));
            }
            self.pos += 2;
            conversion
        } else {
            None
        };

        let spec = if self.chars.get(self.pos) == Some(&':') {
            self.pos += 1;
            Some(self.parts_until(Some('}'), depth)?)
        } else {
            None
        };

        if self.chars.get(self.pos) != Some(&'}') {
            return Err(self.error("expecting '}'"));
        }
        self.pos += 1;

        Ok(FStringPart::Field { value: Box::new(value), conversion, spec })
    }
}
