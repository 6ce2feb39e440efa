use anyhow::{anyhow, Result};
use std::fmt;

/// Position of a token in the source (1-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: usize,
    pub column: usize,
    /// Char offset from the start of the source
    pub offset: usize,
}

impl Span {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Span {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// One piece of a template literal
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateChunk {
    /// Literal text between substitutions
    Text(String),
    /// Raw source of a `${ ... }` substitution
    Code(String),
}

/// Represents different types of tokens in the Sparklet script language
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    StringLiteral(String),
    Template(Vec<TemplateChunk>),
    Identifier(String),

    // Keywords
    Let,
    Const,
    Var,
    If,
    Else,
    For,
    While,
    Of,
    In,
    Return,
    Break,
    Continue,
    Function,
    True,
    False,
    Null,
    Undefined,
    Typeof,

    // Delimiters
    LeftParen,    // (
    RightParen,   // )
    LeftBrace,    // {
    RightBrace,   // }
    LeftBracket,  // [
    RightBracket, // ]
    Comma,        // ,
    Dot,          // .
    QuestionDot,  // ?.
    Ellipsis,     // ...
    Semicolon,    // ;
    Colon,        // :
    Question,     // ?
    Arrow,        // =>

    // Operators
    Plus,             // +
    Minus,            // -
    Star,             // *
    StarStar,         // **
    Slash,            // /
    Percent,          // %
    PlusPlus,         // ++
    MinusMinus,       // --
    Bang,             // !
    Equals,           // =
    EqEq,             // ==
    EqEqEq,           // ===
    NotEq,            // !=
    NotEqEq,          // !==
    Less,             // <
    LessEq,           // <=
    Greater,          // >
    GreaterEq,        // >=
    AndAnd,           // &&
    OrOr,             // ||
    QuestionQuestion, // ??
    PlusEq,           // +=
    MinusEq,          // -=
    StarEq,           // *=
    SlashEq,          // /=
    PercentEq,        // %=
    AndAndEq,         // &&=
    OrOrEq,           // ||=
    QuestionQuestionEq, // ??=

    // End of input
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Number(n) => return write!(f, "{}", n),
            Token::StringLiteral(s) => return write!(f, "'{}'", s),
            Token::Template(_) => "template literal",
            Token::Identifier(name) => return write!(f, "{}", name),
            Token::Let => "let",
            Token::Const => "const",
            Token::Var => "var",
            Token::If => "if",
            Token::Else => "else",
            Token::For => "for",
            Token::While => "while",
            Token::Of => "of",
            Token::In => "in",
            Token::Return => "return",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Function => "function",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::Undefined => "undefined",
            Token::Typeof => "typeof",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::QuestionDot => "?.",
            Token::Ellipsis => "...",
            Token::Semicolon => ";",
            Token::Colon => ":",
            Token::Question => "?",
            Token::Arrow => "=>",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::StarStar => "**",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::PlusPlus => "++",
            Token::MinusMinus => "--",
            Token::Bang => "!",
            Token::Equals => "=",
            Token::EqEq => "==",
            Token::EqEqEq => "===",
            Token::NotEq => "!=",
            Token::NotEqEq => "!==",
            Token::Less => "<",
            Token::LessEq => "<=",
            Token::Greater => ">",
            Token::GreaterEq => ">=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::QuestionQuestion => "??",
            Token::PlusEq => "+=",
            Token::MinusEq => "-=",
            Token::StarEq => "*=",
            Token::SlashEq => "/=",
            Token::PercentEq => "%=",
            Token::AndAndEq => "&&=",
            Token::OrOrEq => "||=",
            Token::QuestionQuestionEq => "??=",
            Token::Eof => "end of input",
        };
        write!(f, "{}", text)
    }
}

/// A token together with where it started and whether a line break preceded it
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
    /// Used for automatic semicolon insertion
    pub newline_before: bool,
}

/// Tokenizes script source into tokens
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    current_char: Option<char>,
    line: usize,
    column: usize,
    saw_newline: bool,
}

impl Lexer {
    /// Create a new lexer for the given input
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Lexer {
            input: chars,
            position: 0,
            current_char,
            line: 1,
            column: 1,
            saw_newline: false,
        }
    }

    /// Advance to the next character
    fn advance(&mut self) {
        if self.current_char == Some('\n') {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    /// Peek at the next character without advancing
    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.input.get(self.position + ahead).copied()
    }

    fn span(&self) -> Span {
        Span::new(self.line, self.column, self.position)
    }

    /// Skip whitespace and comments, remembering line breaks
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.current_char {
                Some('\n') => {
                    self.saw_newline = true;
                    self.advance();
                }
                Some(ch) if ch.is_whitespace() => self.advance(),
                Some('/') if self.peek() == Some('/') => {
                    while let Some(ch) = self.current_char {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek() == Some('*') => {
                    let start = self.span();
                    self.advance();
                    self.advance();
                    loop {
                        match self.current_char {
                            None => return Err(anyhow!("at {}: Unterminated comment", start)),
                            Some('*') if self.peek() == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some('\n') => {
                                self.saw_newline = true;
                                self.advance();
                            }
                            Some(_) => self.advance(),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Read a decimal number literal (integer, fraction, exponent)
    fn read_number(&mut self) -> Result<f64> {
        let start = self.span();
        let mut result = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() || ch == '_' {
                if ch != '_' {
                    result.push(ch);
                }
                self.advance();
            } else {
                break;
            }
        }

        if self.current_char == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            result.push('.');
            self.advance();
            while let Some(ch) = self.current_char {
                if ch.is_ascii_digit() {
                    result.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if matches!(self.current_char, Some('e') | Some('E')) {
            let sign = self.peek();
            let digit_at = if matches!(sign, Some('+') | Some('-')) { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                result.push('e');
                self.advance();
                if digit_at == 2 {
                    if let Some(sign) = self.current_char {
                        result.push(sign);
                    }
                    self.advance();
                }
                while let Some(ch) = self.current_char {
                    if ch.is_ascii_digit() {
                        result.push(ch);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        result
            .parse::<f64>()
            .map_err(|_| anyhow!("at {}: Invalid number '{}'", start, result))
    }

    /// Read a number that starts with '.' (e.g. `.5`)
    fn read_fraction(&mut self) -> Result<f64> {
        let start = self.span();
        let mut result = String::from("0.");
        self.advance(); // consume '.'
        while let Some(ch) = self.current_char {
            if ch.is_ascii_digit() {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
            .parse::<f64>()
            .map_err(|_| anyhow!("at {}: Invalid number '{}'", start, result))
    }

    /// Read an escape sequence after a backslash
    fn read_escape(&mut self) -> Result<char> {
        let span = self.span();
        let ch = self
            .current_char
            .ok_or_else(|| anyhow!("at {}: Unterminated escape sequence", span))?;
        self.advance();
        let escaped = match ch {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            'u' => {
                let mut hex = String::new();
                for _ in 0..4 {
                    match self.current_char {
                        Some(c) if c.is_ascii_hexdigit() => {
                            hex.push(c);
                            self.advance();
                        }
                        _ => return Err(anyhow!("at {}: Invalid unicode escape", span)),
                    }
                }
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| anyhow!("at {}: Invalid unicode escape", span))?;
                char::from_u32(code).unwrap_or('\u{fffd}')
            }
            other => other,
        };
        Ok(escaped)
    }

    /// Read a quoted string literal ('...' or "...")
    fn read_string(&mut self, quote: char) -> Result<String> {
        let start = self.span();
        self.advance(); // consume opening quote
        let mut result = String::new();

        loop {
            match self.current_char {
                None | Some('\n') => {
                    return Err(anyhow!("at {}: Unterminated string literal", start))
                }
                Some(ch) if ch == quote => {
                    self.advance();
                    return Ok(result);
                }
                Some('\\') => {
                    self.advance();
                    result.push(self.read_escape()?);
                }
                Some(ch) => {
                    result.push(ch);
                    self.advance();
                }
            }
        }
    }

    /// Read a template literal, keeping `${ ... }` substitutions as raw source
    fn read_template(&mut self) -> Result<Vec<TemplateChunk>> {
        let start = self.span();
        self.advance(); // consume opening backtick
        let mut chunks = Vec::new();
        let mut text = String::new();

        loop {
            match self.current_char {
                None => return Err(anyhow!("at {}: Unterminated template literal", start)),
                Some('`') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    text.push(self.read_escape()?);
                }
                Some('$') if self.peek() == Some('{') => {
                    self.advance();
                    self.advance();
                    if !text.is_empty() {
                        chunks.push(TemplateChunk::Text(std::mem::take(&mut text)));
                    }
                    chunks.push(TemplateChunk::Code(self.read_substitution(start)?));
                }
                Some(ch) => {
                    text.push(ch);
                    self.advance();
                }
            }
        }

        if !text.is_empty() || chunks.is_empty() {
            chunks.push(TemplateChunk::Text(text));
        }
        Ok(chunks)
    }

    /// Collect the source of a `${ ... }` substitution up to its matching brace
    fn read_substitution(&mut self, start: Span) -> Result<String> {
        let mut depth = 0usize;
        let mut source = String::new();

        loop {
            match self.current_char {
                None => return Err(anyhow!("at {}: Unterminated template substitution", start)),
                Some('}') if depth == 0 => {
                    self.advance();
                    return Ok(source);
                }
                Some(ch @ ('\'' | '"' | '`')) => {
                    // Copy nested literals verbatim so their braces don't count
                    source.push(ch);
                    self.advance();
                    while let Some(inner) = self.current_char {
                        source.push(inner);
                        self.advance();
                        if inner == '\\' {
                            if let Some(escaped) = self.current_char {
                                source.push(escaped);
                                self.advance();
                            }
                        } else if inner == ch {
                            break;
                        }
                    }
                }
                Some(ch) => {
                    if ch == '{' {
                        depth += 1;
                    } else if ch == '}' {
                        depth -= 1;
                    }
                    source.push(ch);
                    self.advance();
                }
            }
        }
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> String {
        let mut result = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        result
    }

    fn keyword(word: &str) -> Option<Token> {
        let token = match word {
            "let" => Token::Let,
            "const" => Token::Const,
            "var" => Token::Var,
            "if" => Token::If,
            "else" => Token::Else,
            "for" => Token::For,
            "while" => Token::While,
            "of" => Token::Of,
            "in" => Token::In,
            "return" => Token::Return,
            "break" => Token::Break,
            "continue" => Token::Continue,
            "function" => Token::Function,
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "undefined" => Token::Undefined,
            "typeof" => Token::Typeof,
            _ => return None,
        };
        Some(token)
    }

    /// Consume `len` characters and return `token`
    fn punct(&mut self, len: usize, token: Token) -> Result<Token> {
        for _ in 0..len {
            self.advance();
        }
        Ok(token)
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia()?;

        let next = self.peek();
        let after = self.peek_at(2);

        match self.current_char {
            None => Ok(Token::Eof),

            Some(ch) if ch.is_ascii_digit() => Ok(Token::Number(self.read_number()?)),
            Some('.') if next.is_some_and(|c| c.is_ascii_digit()) => {
                Ok(Token::Number(self.read_fraction()?))
            }
            Some(quote @ ('\'' | '"')) => Ok(Token::StringLiteral(self.read_string(quote)?)),
            Some('`') => Ok(Token::Template(self.read_template()?)),
            Some(ch) if ch.is_alphabetic() || ch == '_' || ch == '$' => {
                let word = self.read_identifier();
                Ok(Self::keyword(&word).unwrap_or(Token::Identifier(word)))
            }

            Some('(') => self.punct(1, Token::LeftParen),
            Some(')') => self.punct(1, Token::RightParen),
            Some('{') => self.punct(1, Token::LeftBrace),
            Some('}') => self.punct(1, Token::RightBrace),
            Some('[') => self.punct(1, Token::LeftBracket),
            Some(']') => self.punct(1, Token::RightBracket),
            Some(',') => self.punct(1, Token::Comma),
            Some(';') => self.punct(1, Token::Semicolon),
            Some(':') => self.punct(1, Token::Colon),

            Some('.') => {
                if next == Some('.') && after == Some('.') {
                    self.punct(3, Token::Ellipsis)
                } else {
                    self.punct(1, Token::Dot)
                }
            }

            Some('?') => match (next, after) {
                (Some('?'), Some('=')) => self.punct(3, Token::QuestionQuestionEq),
                (Some('?'), _) => self.punct(2, Token::QuestionQuestion),
                // `a?.5:1` is a conditional, not optional chaining
                (Some('.'), Some(c)) if !c.is_ascii_digit() => self.punct(2, Token::QuestionDot),
                _ => self.punct(1, Token::Question),
            },

            Some('+') => match next {
                Some('+') => self.punct(2, Token::PlusPlus),
                Some('=') => self.punct(2, Token::PlusEq),
                _ => self.punct(1, Token::Plus),
            },

            Some('-') => match next {
                Some('-') => self.punct(2, Token::MinusMinus),
                Some('=') => self.punct(2, Token::MinusEq),
                _ => self.punct(1, Token::Minus),
            },

            Some('*') => match (next, after) {
                (Some('*'), _) => self.punct(2, Token::StarStar),
                (Some('='), _) => self.punct(2, Token::StarEq),
                _ => self.punct(1, Token::Star),
            },

            Some('/') => match next {
                Some('=') => self.punct(2, Token::SlashEq),
                _ => self.punct(1, Token::Slash),
            },

            Some('%') => match next {
                Some('=') => self.punct(2, Token::PercentEq),
                _ => self.punct(1, Token::Percent),
            },

            Some('!') => match (next, after) {
                (Some('='), Some('=')) => self.punct(3, Token::NotEqEq),
                (Some('='), _) => self.punct(2, Token::NotEq),
                _ => self.punct(1, Token::Bang),
            },

            Some('=') => match (next, after) {
                (Some('='), Some('=')) => self.punct(3, Token::EqEqEq),
                (Some('='), _) => self.punct(2, Token::EqEq),
                (Some('>'), _) => self.punct(2, Token::Arrow),
                _ => self.punct(1, Token::Equals),
            },

            Some('<') => match next {
                Some('=') => self.punct(2, Token::LessEq),
                _ => self.punct(1, Token::Less),
            },

            Some('>') => match next {
                Some('=') => self.punct(2, Token::GreaterEq),
                _ => self.punct(1, Token::Greater),
            },

            Some('&') => match (next, after) {
                (Some('&'), Some('=')) => self.punct(3, Token::AndAndEq),
                (Some('&'), _) => self.punct(2, Token::AndAnd),
                _ => Err(anyhow!("at {}: Bitwise '&' is not supported", self.span())),
            },

            Some('|') => match (next, after) {
                (Some('|'), Some('=')) => self.punct(3, Token::OrOrEq),
                (Some('|'), _) => self.punct(2, Token::OrOr),
                _ => Err(anyhow!("at {}: Bitwise '|' is not supported", self.span())),
            },

            Some(ch) => Err(anyhow!("at {}: Unexpected character: '{}'", self.span(), ch)),
        }
    }

    /// Tokenize the entire input into a vector of tokens
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        Ok(self
            .tokenize_spanned()?
            .into_iter()
            .map(|spanned| spanned.token)
            .collect())
    }

    /// Tokenize the entire input, keeping positions and line-break markers
    pub fn tokenize_spanned(&mut self) -> Result<Vec<SpannedToken>> {
        let mut tokens = Vec::new();

        loop {
            self.saw_newline = false;
            self.skip_trivia()?;
            let newline_before = self.saw_newline;
            let span = self.span();
            let token = self.next_token()?;
            let is_eof = matches!(token, Token::Eof);
            tokens.push(SpannedToken {
                token,
                span,
                newline_before,
            });

            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_tokens() {
        let mut lexer = Lexer::new("( ) { } [ ] , . ?. ... ; : ? =>");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::LeftParen,
                Token::RightParen,
                Token::LeftBrace,
                Token::RightBrace,
                Token::LeftBracket,
                Token::RightBracket,
                Token::Comma,
                Token::Dot,
                Token::QuestionDot,
                Token::Ellipsis,
                Token::Semicolon,
                Token::Colon,
                Token::Question,
                Token::Arrow,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_longest_operator_wins() {
        let mut lexer = Lexer::new("=== !== == != ** ++ -- ??= && ||= <= >=");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::EqEqEq,
                Token::NotEqEq,
                Token::EqEq,
                Token::NotEq,
                Token::StarStar,
                Token::PlusPlus,
                Token::MinusMinus,
                Token::QuestionQuestionEq,
                Token::AndAnd,
                Token::OrOrEq,
                Token::LessEq,
                Token::GreaterEq,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let mut lexer = Lexer::new("2 3.25 .5 1e3 2E-2");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::Number(2.0),
                Token::Number(3.25),
                Token::Number(0.5),
                Token::Number(1000.0),
                Token::Number(0.02),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        let mut lexer = Lexer::new(r#"'it\'s' "a\nb" "A""#);
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::StringLiteral("it's".to_string()),
                Token::StringLiteral("a\nb".to_string()),
                Token::StringLiteral("A".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let mut lexer = Lexer::new("const board = state.board");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::Const,
                Token::Identifier("board".to_string()),
                Token::Equals,
                Token::Identifier("state".to_string()),
                Token::Dot,
                Token::Identifier("board".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_template_literal_chunks() {
        let mut lexer = Lexer::new("`Next player: ${isXNext ? 'X' : 'O'}!`");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens[0],
            Token::Template(vec![
                TemplateChunk::Text("Next player: ".to_string()),
                TemplateChunk::Code("isXNext ? 'X' : 'O'".to_string()),
                TemplateChunk::Text("!".to_string()),
            ])
        );
    }

    #[test]
    fn test_template_with_nested_braces() {
        let mut lexer = Lexer::new("`${ {a: 1}.a }`");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens[0],
            Token::Template(vec![TemplateChunk::Code(" {a: 1}.a ".to_string())])
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let mut lexer = Lexer::new("a // line\n/* block */ b");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::Identifier("a".to_string()),
                Token::Identifier("b".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_spans_and_newlines() {
        let mut lexer = Lexer::new("a\n  b");
        let tokens = lexer.tokenize_spanned().unwrap();

        assert_eq!(tokens[0].span, Span::new(1, 1, 0));
        assert!(!tokens[0].newline_before);
        assert_eq!(tokens[1].span, Span::new(2, 3, 4));
        assert!(tokens[1].newline_before);
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let mut lexer = Lexer::new("'abc");
        assert!(lexer.tokenize().is_err());
    }

    #[test]
    fn test_conditional_with_decimal_is_not_optional_chain() {
        let mut lexer = Lexer::new("a?.5:1");
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::Identifier("a".to_string()),
                Token::Question,
                Token::Number(0.5),
                Token::Colon,
                Token::Number(1.0),
                Token::Eof,
            ]
        );
    }
}
