use crate::{error::ParseError, ir::types::Int};

/// Operators and delimiters, longest first so that matching is greedy.
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "->", "**", "//", "<<", ">>", "<=", ">=", "==", "!=", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=", ":=", "+", "-", "*", "/", "%", "@", "&", "|",
    "^", "~", "<", ">", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";", "=",
];

const TAB_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    Int(Int),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// The undecoded body of an f-string; replacement fields are parsed later.
    FString { body: String, raw: bool },
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    EndMarker,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn is_op(&self, op: &str) -> bool {
        matches!(self.kind, TokenKind::Op(o) if o == op)
    }

    pub fn is_name(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Name(n) if n == name)
    }
}

/// Splits contract source into tokens, producing `Indent`/`Dedent` tokens from leading
/// whitespace and dropping comments. Newlines inside brackets are ignored.
pub struct Tokenizer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    indents: Vec<usize>,
    brackets: Vec<char>,
    at_line_start: bool,
}

impl Tokenizer {
    pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
        let mut tokenizer = Tokenizer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            indents: vec![0],
            brackets: Vec::new(),
            at_line_start: true,
        };

        tokenizer.run()?;
        Ok(tokenizer.tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.line, self.column, message)
    }

    fn push(&mut self, kind: TokenKind, line: usize, column: usize) {
        self.tokens.push(Token { kind, line, column });
    }

    /// Whether the current logical line already produced a token.
    fn line_has_tokens(&self) -> bool {
        matches!(
            self.tokens.last().map(|t| &t.kind),
            Some(kind) if !matches!(kind, TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent)
        )
    }

    fn run(&mut self) -> Result<(), ParseError> {
        loop {
            if self.at_line_start && self.brackets.is_empty() {
                if !self.indentation()? {
                    break;
                }
                continue;
            }

            let Some(c) = self.peek() else { break };
            let (line, column) = (self.line, self.column);

            match c {
                ' ' | '\t' | '\x0c' => {
                    self.advance();
                }
                '\r' | '\n' => {
                    self.newline();
                    if self.brackets.is_empty() {
                        if self.line_has_tokens() {
                            self.push(TokenKind::Newline, line, column);
                        }
                        self.at_line_start = true;
                    }
                }
                '#' => self.skip_comment(),
                '\\' => {
                    self.advance();
                    if !matches!(self.peek(), Some('\n' | '\r')) {
                        return Err(self.error("unexpected character after line continuation"));
                    }
                    self.newline();
                }
                '"' | '\'' => self.string(String::new(), line, column)?,
                c if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) => {
                    self.number(line, column)?
                }
                c if c == '_' || c.is_alphabetic() => {
                    let name = self.identifier();
                    if is_string_prefix(&name) && matches!(self.peek(), Some('"' | '\'')) {
                        self.string(name.to_ascii_lowercase(), line, column)?;
                    } else {
                        self.push(TokenKind::Name(name), line, column);
                    }
                }
                _ => self.operator(line, column)?,
            }
        }

        if let Some(open) = self.brackets.last() {
            return Err(self.error(format!("'{open}' was never closed")));
        }
        if self.line_has_tokens() {
            self.push(TokenKind::Newline, self.line, self.column);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, self.line, self.column);
        }
        self.push(TokenKind::EndMarker, self.line, self.column);

        Ok(())
    }

    /// Consumes a `\n`, `\r\n` or `\r` line ending.
    fn newline(&mut self) {
        if self.peek() == Some('\r') {
            self.pos += 1;
            if self.peek() == Some('\n') {
                self.pos += 1;
            }
            self.line += 1;
            self.column = 1;
        } else {
            self.advance();
        }
    }

    fn skip_comment(&mut self) {
        while !matches!(self.peek(), None | Some('\n' | '\r')) {
            self.advance();
        }
    }

    /// Measures the indentation of a new line and emits `Indent`/`Dedent` tokens. Blank and
    /// comment-only lines are skipped. Returns `false` at end of input.
    fn indentation(&mut self) -> Result<bool, ParseError> {
        let mut width = 0;
        loop {
            match self.peek() {
                Some(' ') => width += 1,
                Some('\t') => width = (width / TAB_SIZE + 1) * TAB_SIZE,
                Some('\x0c') => width = 0,
                _ => break,
            }
            self.advance();
        }

        match self.peek() {
            None => return Ok(false),
            Some('\n' | '\r') => {
                self.newline();
                return Ok(true);
            }
            Some('#') => {
                self.skip_comment();
                return Ok(true);
            }
            _ => {}
        }

        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent, self.line, 1);
        } else if width < current {
            while self.indents.last().is_some_and(|&level| level > width) {
                self.indents.pop();
                self.push(TokenKind::Dedent, self.line, 1);
            }
            if self.indents.last() != Some(&width) {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }

        self.at_line_start = false;
        Ok(true)
    }

    fn identifier(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        name
    }

    fn operator(&mut self, line: usize, column: usize) -> Result<(), ParseError> {
        let op = OPERATORS
            .iter()
            .find(|op| op.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c)))
            .copied()
            .ok_or_else(|| {
                self.error(format!("unexpected character '{}'", self.peek().unwrap_or(' ').escape_default()))
            })?;

        for _ in 0..op.chars().count() {
            self.advance();
        }

        match op {
            "(" | "[" | "{" => self.brackets.push(op.chars().next().unwrap_or('(')),
            ")" | "]" | "}" => {
                let expected = match op {
                    ")" => '(',
                    "]" => '[',
                    _ => '{',
                };
                if self.brackets.pop() != Some(expected) {
                    return Err(ParseError::new(line, column, format!("unmatched '{op}'")));
                }
            }
            _ => {}
        }

        self.push(TokenKind::Op(op), line, column);
        Ok(())
    }

    fn number(&mut self, line: usize, column: usize) -> Result<(), ParseError> {
        let mut text = String::new();

        let radix = match (self.peek(), self.peek_at(1)) {
            (Some('0'), Some('x' | 'X')) => Some(16),
            (Some('0'), Some('o' | 'O')) => Some(8),
            (Some('0'), Some('b' | 'B')) => Some(2),
            _ => None,
        };

        let kind = if let Some(radix) = radix {
            self.advance();
            self.advance();
            while let Some(c) = self.peek().filter(|c| c.is_ascii_alphanumeric() || *c == '_') {
                text.push(c);
                self.advance();
            }

            let digits = check_underscores(&text, true)
                .filter(|digits| digits.chars().all(|c| c.is_digit(radix)))
                .ok_or_else(|| ParseError::new(line, column, "invalid number literal"))?;
            TokenKind::Int(match u128::from_str_radix(&digits, radix) {
                Ok(value) => Int::Small(value),
                Err(_) => Int::Big(self.chars[self.pos - text.len() - 2..self.pos].iter().collect()),
            })
        } else {
            let mut is_float = false;
            self.digits(&mut text);
            if self.peek() == Some('.') {
                is_float = true;
                text.push('.');
                self.advance();
                self.digits(&mut text);
            }
            if matches!(self.peek(), Some('e' | 'E')) &&
                (self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) ||
                    (matches!(self.peek_at(1), Some('+' | '-')) &&
                        self.peek_at(2).is_some_and(|c| c.is_ascii_digit())))
            {
                is_float = true;
                text.push('e');
                self.advance();
                if let Some(sign @ ('+' | '-')) = self.peek() {
                    text.push(sign);
                    self.advance();
                }
                self.digits(&mut text);
            }

            if matches!(self.peek(), Some('j' | 'J')) {
                return Err(ParseError::new(line, column, "complex literals are not supported"));
            }

            let cleaned = check_underscores(&text, false)
                .ok_or_else(|| ParseError::new(line, column, "invalid decimal literal"))?;

            if is_float {
                TokenKind::Float(
                    cleaned
                        .parse::<f64>()
                        .map_err(|_| ParseError::new(line, column, "invalid decimal literal"))?,
                )
            } else {
                if cleaned.len() > 1 && cleaned.starts_with('0') && cleaned.chars().any(|c| c != '0')
                {
                    return Err(ParseError::new(
                        line,
                        column,
                        "leading zeros in decimal integer literals are not permitted",
                    ));
                }
                TokenKind::Int(match cleaned.parse::<u128>() {
                    Ok(value) => Int::Small(value),
                    Err(_) => Int::Big(cleaned),
                })
            }
        };

        if self.peek().is_some_and(|c| c == '_' || c.is_alphanumeric()) {
            return Err(ParseError::new(line, column, "invalid decimal literal"));
        }

        self.push(kind, line, column);
        Ok(())
    }

    fn digits(&mut self, text: &mut String) {
        while let Some(c) = self.peek().filter(|c| c.is_ascii_digit() || *c == '_') {
            text.push(c);
            self.advance();
        }
    }

    fn string(&mut self, prefix: String, line: usize, column: usize) -> Result<(), ParseError> {
        let quote = self.advance().unwrap_or('"');
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.advance();
            self.advance();
        }

        let mut body = String::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::new(line, column, "unterminated string literal")),
                Some('\\') => {
                    body.push('\\');
                    self.advance();
                    if let Some(next) = self.peek() {
                        body.push(next);
                        self.advance();
                    }
                }
                Some('\n' | '\r') if !triple => {
                    return Err(ParseError::new(line, column, "unterminated string literal"))
                }
                Some(c) if c == quote => {
                    if !triple {
                        self.advance();
                        break;
                    }
                    if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                        self.advance();
                        self.advance();
                        self.advance();
                        break;
                    }
                    body.push(c);
                    self.advance();
                }
                Some(c) => {
                    body.push(c);
                    self.advance();
                }
            }
        }

        let raw = prefix.contains('r');
        let kind = if prefix.contains('f') {
            TokenKind::FString { body, raw }
        } else if prefix.contains('b') {
            TokenKind::Bytes(
                unescape_bytes(&body, raw).map_err(|e| ParseError::new(line, column, e))?,
            )
        } else {
            TokenKind::Str(unescape_str(&body, raw).map_err(|e| ParseError::new(line, column, e))?)
        };

        self.push(kind, line, column);
        Ok(())
    }
}

fn is_string_prefix(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf"
    )
}

/// Strips underscores that sit between two digits. Returns `None` if an underscore sits
/// anywhere else.
fn check_underscores(text: &str, allow_leading: bool) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if *c != '_' {
            continue;
        }
        let before = if i == 0 { allow_leading } else { chars[i - 1].is_ascii_alphanumeric() };
        let after = chars.get(i + 1).is_some_and(|c| c.is_ascii_alphanumeric());
        if !before || !after {
            return None;
        }
    }

    let cleaned: String = chars.into_iter().filter(|c| *c != '_').collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn hex_escape(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, len: usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..len {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    Some(value)
}

fn octal_escape(first: char, chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u32 {
    let mut value = first.to_digit(8).unwrap_or(0);
    for _ in 0..2 {
        match chars.peek().and_then(|c| c.to_digit(8)) {
            Some(digit) => {
                value = value * 8 + digit;
                chars.next();
            }
            None => break,
        }
    }
    value
}

/// Decodes the escape sequences of a string literal body.
pub(crate) fn unescape_str(body: &str, raw: bool) -> Result<String, String> {
    if raw {
        return Ok(body.to_string());
    }

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let Some(escape) = chars.next() else {
            out.push('\\');
            break;
        };
        match escape {
            '\n' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let value = octal_escape(escape, &mut chars);
                out.push(char::from_u32(value).ok_or("invalid octal escape")?);
            }
            'x' | 'u' | 'U' => {
                let len = match escape {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let value = hex_escape(&mut chars, len)
                    .ok_or_else(|| format!("truncated \\{escape} escape"))?;
                out.push(
                    char::from_u32(value)
                        .ok_or_else(|| format!("\\{escape} escape is not a valid character"))?,
                );
            }
            'N' => return Err("named unicode escapes are not supported".to_string()),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    Ok(out)
}

/// Decodes the escape sequences of a bytes literal body.
pub(crate) fn unescape_bytes(body: &str, raw: bool) -> Result<Vec<u8>, String> {
    if !body.is_ascii() {
        return Err("bytes can only contain ASCII literal characters".to_string());
    }
    if raw {
        return Ok(body.as_bytes().to_vec());
    }

    let mut out = Vec::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c as u8);
            continue;
        }

        let Some(escape) = chars.next() else {
            out.push(b'\\');
            break;
        };
        match escape {
            '\n' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\\' => out.push(b'\\'),
            '\'' => out.push(b'\''),
            '"' => out.push(b'"'),
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0b),
            '0'..='7' => out.push((octal_escape(escape, &mut chars) & 0xff) as u8),
            'x' => out.push(hex_escape(&mut chars, 2).ok_or("truncated \\x escape")? as u8),
            other => {
                out.push(b'\\');
                out.push(other as u8);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Tokenizer::tokenize(source).expect("should tokenize").into_iter().map(|t| t.kind).collect()
    }

    fn name(s: &str) -> TokenKind {
        TokenKind::Name(s.to_string())
    }

    #[test]
    fn test_simple_statement() {
        assert_eq!(
            kinds("x = 1\n"),
            vec![
                name("x"),
                TokenKind::Op("="),
                TokenKind::Int(Int::Small(1)),
                TokenKind::Newline,
                TokenKind::EndMarker
            ]
        );
    }

    #[test]
    fn test_indent_and_dedent() {
        let kinds = kinds("def f():\n    return 1\n\n# done\nx\n");
        assert!(kinds.contains(&TokenKind::Indent));
        assert_eq!(kinds.iter().filter(|k| **k == TokenKind::Dedent).count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == TokenKind::Newline).count(), 3);
    }

    #[test]
    fn test_missing_trailing_newline_closes_blocks() {
        let kinds = kinds("if x:\n    y");
        assert_eq!(
            &kinds[kinds.len() - 3..],
            &[TokenKind::Newline, TokenKind::Dedent, TokenKind::EndMarker]
        );
    }

    #[test]
    fn test_bad_dedent() {
        let error = Tokenizer::tokenize("if x:\n        y\n    z\n").expect_err("should fail");
        assert_eq!(error.line, 3);
    }

    #[test]
    fn test_newlines_inside_brackets_are_ignored() {
        let kinds = kinds("f(1,\n  2)\n");
        assert_eq!(kinds.iter().filter(|k| **k == TokenKind::Newline).count(), 1);
        assert!(!kinds.contains(&TokenKind::Indent));
    }

    #[test]
    fn test_unbalanced_brackets() {
        assert!(Tokenizer::tokenize("{{{").is_err());
        assert!(Tokenizer::tokenize("x)").is_err());
        assert!(Tokenizer::tokenize("(]").is_err());
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("0x_ff")[0], TokenKind::Int(Int::Small(255)));
        assert_eq!(kinds("1_000")[0], TokenKind::Int(Int::Small(1000)));
        assert_eq!(kinds("0b101")[0], TokenKind::Int(Int::Small(5)));
        assert_eq!(kinds("1.5e3")[0], TokenKind::Float(1500.0));
        assert_eq!(kinds(".25")[0], TokenKind::Float(0.25));
        assert_eq!(kinds("2.")[0], TokenKind::Float(2.0));
        assert_eq!(
            kinds("340282366920938463463374607431768211456")[0],
            TokenKind::Int(Int::Big("340282366920938463463374607431768211456".to_string()))
        );

        assert!(Tokenizer::tokenize("1__0").is_err());
        assert!(Tokenizer::tokenize("007").is_err());
        assert!(Tokenizer::tokenize("1abc").is_err());
        assert!(Tokenizer::tokenize("3j").is_err());
    }

    #[test]
    fn test_strings() {
        assert_eq!(kinds(r#""a\tb""#)[0], TokenKind::Str("a\tb".to_string()));
        assert_eq!(kinds(r#"r"a\tb""#)[0], TokenKind::Str("a\\tb".to_string()));
        assert_eq!(kinds(r#"'it\'s'"#)[0], TokenKind::Str("it's".to_string()));
        assert_eq!(kinds("\"\"\"two\nlines\"\"\"")[0], TokenKind::Str("two\nlines".to_string()));
        assert_eq!(kinds(r#""\u00e9\x41""#)[0], TokenKind::Str("éA".to_string()));
        assert_eq!(kinds(r#"b"\x00a""#)[0], TokenKind::Bytes(vec![0, b'a']));
        assert_eq!(
            kinds(r#"f"{x!r:>4}""#)[0],
            TokenKind::FString { body: "{x!r:>4}".to_string(), raw: false }
        );

        assert!(Tokenizer::tokenize("\"open\n\"").is_err());
        assert!(Tokenizer::tokenize("'''never closed").is_err());
        assert!(Tokenizer::tokenize(r#""\N{DASH}""#).is_err());
    }

    #[test]
    fn test_comments_and_continuations() {
        assert_eq!(
            kinds("x = 1 + \\\n    2  # trailing\n"),
            vec![
                name("x"),
                TokenKind::Op("="),
                TokenKind::Int(Int::Small(1)),
                TokenKind::Op("+"),
                TokenKind::Int(Int::Small(2)),
                TokenKind::Newline,
                TokenKind::EndMarker
            ]
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Tokenizer::tokenize("x = $").is_err());
        assert!(Tokenizer::tokenize("\u{fffd}\u{0}").is_err());
        assert!(Tokenizer::tokenize("a ? b").is_err());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(kinds(""), vec![TokenKind::EndMarker]);
        assert_eq!(kinds("\n\n   \n# only a comment"), vec![TokenKind::EndMarker]);
    }
}
