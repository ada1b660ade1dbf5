// ── Routing-function recognizer ──
//
// Auto-discovery scripts are JavaScript, but the ones found on real
// networks are almost always a flat list of `if (predicate) return "...";`
// rules ending in a catch-all return. This module recognizes that shape
// and nothing more: there is no expression evaluator, no loops, no DNS.
//
// A rule whose condition cannot be decided here (isInNet, myIpAddress,
// string slicing, ...) is skipped with a warning and the scan continues.
// The answer is the first directive string reached by a decidable path.

use std::collections::HashMap;
use std::fmt::Write as _;

use tracing::warn;
use url::Url;

const ENTRY_POINT: &str = "FindProxyForURL";

const PUNCTUATION: &[&str] = &[
    "===", "!==", "&&", "||", "==", "!=", "<=", ">=", "(", ")", "{", "}", "[", "]", ";", ",",
    "!", "=", "+", "-", "*", "<", ">", ".", ":", "?", "%",
];

// ── Tokens ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Number(String),
    Punct(&'static str),
    Other(char),
}

impl Token {
    fn is_punct(&self, p: &str) -> bool {
        matches!(self, Self::Punct(q) if *q == p)
    }

    fn is_ident(&self, name: &str) -> bool {
        matches!(self, Self::Ident(n) if n == name)
    }
}

fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = match token {
            Token::Ident(s) | Token::Number(s) => write!(out, "{s}"),
            Token::Str(s) => write!(out, "\"{s}\""),
            Token::Punct(p) => write!(out, "{p}"),
            Token::Other(c) => write!(out, "{c}"),
        };
    }
    out
}

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while let Some(&c) = chars.get(i) {
        let next = chars.get(i + 1).copied();

        if c.is_whitespace() {
            i += 1;
        } else if c == '/' && next == Some('/') {
            while chars.get(i).is_some_and(|c| *c != '\n') {
                i += 1;
            }
        } else if c == '/' && next == Some('*') {
            i += 2;
            loop {
                match chars.get(i) {
                    None => return Err("unterminated comment".into()),
                    Some('*') if chars.get(i + 1) == Some(&'/') => {
                        i += 2;
                        break;
                    }
                    Some(_) => i += 1,
                }
            }
        } else if c == '"' || c == '\'' {
            let (value, end) = read_string(&chars, i)?;
            tokens.push(Token::Str(value));
            i = end;
        } else if c.is_ascii_digit() {
            let start = i;
            while chars.get(i).is_some_and(|c| c.is_ascii_alphanumeric() || *c == '.') {
                i += 1;
            }
            tokens.push(Token::Number(chars[start..i].iter().collect()));
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while chars
                .get(i)
                .is_some_and(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
            {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            let ahead: String = chars[i..chars.len().min(i + 3)].iter().collect();
            if let Some(p) = PUNCTUATION.iter().find(|p| ahead.starts_with(**p)) {
                tokens.push(Token::Punct(*p));
                i += p.len();
            } else {
                tokens.push(Token::Other(c));
                i += 1;
            }
        }
    }

    Ok(tokens)
}

/// Read a quoted literal starting at `start`; returns the value and the
/// index just past the closing quote.
fn read_string(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut value = String::new();
    let mut i = start + 1;

    loop {
        match chars.get(i) {
            None | Some('\n') => return Err("unterminated string literal".into()),
            Some(&c) if c == quote => return Ok((value, i + 1)),
            Some('\\') => {
                let escaped = chars.get(i + 1).ok_or("unterminated escape")?;
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => *other,
                });
                i += 2;
            }
            Some(&c) => {
                value.push(c);
                i += 1;
            }
        }
    }
}

/// Index of the token closing the bracket opened at `open`.
fn find_closing(tokens: &[Token], open: usize) -> Option<usize> {
    let (opener, closer) = match tokens.get(open)? {
        Token::Punct("(") => ("(", ")"),
        Token::Punct("{") => ("{", "}"),
        Token::Punct("[") => ("[", "]"),
        _ => return None,
    };
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        if token.is_punct(opener) {
            depth += 1;
        } else if token.is_punct(closer) {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

// ── Statements ───────────────────────────────────────────────────────

#[derive(Debug)]
enum Returned {
    Literal(String),
    Variable(String),
    Expression(String),
}

#[derive(Debug)]
enum Stmt {
    Return(Returned),
    Assign {
        name: String,
        value: Option<String>,
    },
    If {
        cond: Cond,
        text: String,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    Block(Vec<Stmt>),
    Opaque,
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn parse_block(&mut self, braced: bool) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while let Some(token) = self.peek() {
            if braced && token.is_punct("}") {
                break;
            }
            let before = self.pos;
            stmts.push(self.parse_statement());
            if self.pos == before {
                // Stray closer at the top level; step over it.
                self.pos += 1;
            }
        }
        stmts
    }

    fn parse_statement(&mut self) -> Stmt {
        let Some(token) = self.peek() else {
            return Stmt::Opaque;
        };

        match token {
            Token::Punct(";") => {
                self.pos += 1;
                Stmt::Opaque
            }
            Token::Punct("{") => {
                self.pos += 1;
                let body = self.parse_block(true);
                if self.peek().is_some_and(|t| t.is_punct("}")) {
                    self.pos += 1;
                }
                Stmt::Block(body)
            }
            Token::Ident(word) if word == "if" => self.parse_if(),
            Token::Ident(word) if word == "return" => {
                self.pos += 1;
                let expr = self.take_expression();
                Stmt::Return(match expr {
                    [Token::Str(s)] => Returned::Literal(s.clone()),
                    [Token::Ident(name)] => Returned::Variable(name.clone()),
                    other => Returned::Expression(render(other)),
                })
            }
            Token::Ident(word) if matches!(word.as_str(), "var" | "let" | "const") => {
                self.pos += 1;
                self.parse_assignment()
            }
            Token::Ident(_) if self.tokens.get(self.pos + 1).is_some_and(|t| t.is_punct("=")) => {
                self.parse_assignment()
            }
            _ => {
                self.skip_statement();
                Stmt::Opaque
            }
        }
    }

    fn parse_if(&mut self) -> Stmt {
        self.pos += 1;
        let open = self.pos;
        let Some(close) = find_closing(self.tokens, open) else {
            self.pos = self.tokens.len();
            return Stmt::Opaque;
        };

        let cond_tokens = &self.tokens[open + 1..close];
        let text = render(cond_tokens);
        let cond = CondParser::parse(cond_tokens).unwrap_or_else(|| Cond::Unknown(text.clone()));
        self.pos = close + 1;

        let then = self.parse_branch();
        let otherwise = if self.peek().is_some_and(|t| t.is_ident("else")) {
            self.pos += 1;
            self.parse_branch()
        } else {
            Vec::new()
        };

        Stmt::If {
            cond,
            text,
            then,
            otherwise,
        }
    }

    fn parse_branch(&mut self) -> Vec<Stmt> {
        match self.parse_statement() {
            Stmt::Block(body) => body,
            stmt => vec![stmt],
        }
    }

    fn parse_assignment(&mut self) -> Stmt {
        let Some(Token::Ident(name)) = self.peek() else {
            self.skip_statement();
            return Stmt::Opaque;
        };
        self.pos += 1;
        if !self.peek().is_some_and(|t| t.is_punct("=")) {
            self.skip_statement();
            return Stmt::Opaque;
        }
        self.pos += 1;

        let value = match self.take_expression() {
            [Token::Str(s)] => Some(s.clone()),
            _ => None,
        };
        Stmt::Assign {
            name: name.clone(),
            value,
        }
    }

    /// Tokens up to the next `;` (consumed) or unbalanced `}` (left).
    fn take_expression(&mut self) -> &'t [Token] {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token {
                Token::Punct("(" | "[" | "{") => depth += 1,
                Token::Punct(")" | "]") => depth = depth.saturating_sub(1),
                Token::Punct("}") if depth == 0 => break,
                Token::Punct("}") => depth -= 1,
                Token::Punct(";") if depth == 0 => {
                    self.pos += 1;
                    return &self.tokens[start..self.pos - 1];
                }
                _ => {}
            }
            self.pos += 1;
        }
        &self.tokens[start..self.pos]
    }

    /// Step over a statement this recognizer does not model.
    fn skip_statement(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token {
                Token::Punct("(" | "[" | "{") => depth += 1,
                Token::Punct(")" | "]") => depth = depth.saturating_sub(1),
                Token::Punct("}") if depth == 0 => return,
                Token::Punct("}") => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return;
                    }
                }
                Token::Punct(";") if depth == 0 => {
                    self.pos += 1;
                    return;
                }
                _ => {}
            }
            self.pos += 1;
        }
    }
}

// ── Conditions ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Arg {
    Name(String),
    Literal(String),
    Other,
}

#[derive(Debug, Clone)]
enum Cond {
    Const(bool),
    Not(Box<Cond>),
    And(Box<Cond>, Box<Cond>),
    Or(Box<Cond>, Box<Cond>),
    Call { name: String, args: Vec<Arg> },
    Compare { subject: Arg, value: Arg, equal: bool },
    Unknown(String),
}

struct CondParser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> CondParser<'t> {
    fn parse(tokens: &'t [Token]) -> Option<Cond> {
        let mut parser = Self { tokens, pos: 0 };
        let cond = parser.or()?;
        (parser.pos == tokens.len()).then_some(cond)
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, p: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_punct(p)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Option<Cond> {
        let mut lhs = self.and()?;
        while self.eat("||") {
            let rhs = self.and()?;
            lhs = Cond::Or(Box::new(lhs), Box::new(rhs));
        }
        Some(lhs)
    }

    fn and(&mut self) -> Option<Cond> {
        let mut lhs = self.unary()?;
        while self.eat("&&") {
            let rhs = self.unary()?;
            lhs = Cond::And(Box::new(lhs), Box::new(rhs));
        }
        Some(lhs)
    }

    fn unary(&mut self) -> Option<Cond> {
        if self.eat("!") {
            return Some(Cond::Not(Box::new(self.unary()?)));
        }
        if self.eat("(") {
            let inner = self.or()?;
            return self.eat(")").then_some(inner);
        }
        self.primary()
    }

    fn primary(&mut self) -> Option<Cond> {
        let token = self.peek()?;
        self.pos += 1;

        let lhs = match token {
            Token::Ident(word) if word == "true" => return Some(Cond::Const(true)),
            Token::Ident(word) if word == "false" => return Some(Cond::Const(false)),
            Token::Ident(name) if self.peek().is_some_and(|t| t.is_punct("(")) => {
                let open = self.pos;
                let close = find_closing(self.tokens, open)?;
                let args = self.tokens[open + 1..close]
                    .split(|t| t.is_punct(","))
                    .filter(|arg| !arg.is_empty())
                    .map(|arg| match arg {
                        [Token::Ident(n)] => Arg::Name(n.clone()),
                        [Token::Str(s)] => Arg::Literal(s.clone()),
                        _ => Arg::Other,
                    })
                    .collect();
                self.pos = close + 1;
                let call = Cond::Call {
                    name: name.clone(),
                    args,
                };
                // A call compared against something is not a predicate we know.
                if self.peek().is_some_and(|t| matches!(t, Token::Punct(p) if p.contains('='))) {
                    return None;
                }
                return Some(call);
            }
            Token::Ident(name) => Arg::Name(name.clone()),
            Token::Str(s) => Arg::Literal(s.clone()),
            _ => return None,
        };

        let equal = match self.peek()? {
            Token::Punct("==" | "===") => true,
            Token::Punct("!=" | "!==") => false,
            _ => return None,
        };
        self.pos += 1;

        let rhs = match self.peek()? {
            Token::Ident(name) => Arg::Name(name.clone()),
            Token::Str(s) => Arg::Literal(s.clone()),
            _ => return None,
        };
        self.pos += 1;

        Some(Cond::Compare {
            subject: lhs,
            value: rhs,
            equal,
        })
    }
}

// ── Evaluation ───────────────────────────────────────────────────────

struct Evaluator<'a> {
    url: &'a str,
    host: &'a str,
    url_param: String,
    host_param: String,
    vars: HashMap<String, String>,
}

impl Evaluator<'_> {
    fn run(&mut self, stmts: &[Stmt]) -> Option<String> {
        for stmt in stmts {
            match stmt {
                Stmt::Return(Returned::Literal(value)) => return Some(value.clone()),
                Stmt::Return(Returned::Variable(name)) => match self.vars.get(name) {
                    Some(value) => return Some(value.clone()),
                    None => warn!(variable = %name, "skipping return of unknown PAC variable"),
                },
                Stmt::Return(Returned::Expression(text)) => {
                    warn!(expression = %text, "skipping computed PAC return");
                }
                Stmt::Assign { name, value } => match value {
                    Some(value) => {
                        self.vars.insert(name.clone(), value.clone());
                    }
                    None => {
                        self.vars.remove(name);
                    }
                },
                Stmt::If {
                    cond,
                    text,
                    then,
                    otherwise,
                } => match self.eval(cond) {
                    Some(true) => {
                        if let Some(answer) = self.run(then) {
                            return Some(answer);
                        }
                    }
                    Some(false) => {
                        if let Some(answer) = self.run(otherwise) {
                            return Some(answer);
                        }
                    }
                    None => warn!(condition = %text, "skipping undecidable PAC rule"),
                },
                Stmt::Block(body) => {
                    if let Some(answer) = self.run(body) {
                        return Some(answer);
                    }
                }
                Stmt::Opaque => {}
            }
        }
        None
    }

    fn value(&self, arg: &Arg) -> Option<String> {
        match arg {
            Arg::Literal(s) => Some(s.clone()),
            Arg::Name(name) if *name == self.host_param => Some(self.host.to_owned()),
            Arg::Name(name) if *name == self.url_param => Some(self.url.to_owned()),
            Arg::Name(name) => self.vars.get(name).cloned(),
            Arg::Other => None,
        }
    }

    fn eval(&self, cond: &Cond) -> Option<bool> {
        match cond {
            Cond::Const(b) => Some(*b),
            Cond::Not(inner) => self.eval(inner).map(|b| !b),
            Cond::And(a, b) => match (self.eval(a), self.eval(b)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Cond::Or(a, b) => match (self.eval(a), self.eval(b)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Cond::Compare {
                subject,
                value,
                equal,
            } => {
                let lhs = self.value(subject)?;
                let rhs = self.value(value)?;
                Some(lhs.eq_ignore_ascii_case(&rhs) == *equal)
            }
            Cond::Call { name, args } => self.call(name, args),
            Cond::Unknown(_) => None,
        }
    }

    fn call(&self, name: &str, args: &[Arg]) -> Option<bool> {
        let values: Option<Vec<String>> = args.iter().map(|a| self.value(a)).collect();
        let values = values?;

        match (name, values.as_slice()) {
            ("shExpMatch", [subject, pattern]) => Some(glob_match(pattern, subject)),
            ("dnsDomainIs", [host, domain]) => Some(
                host.to_ascii_lowercase()
                    .ends_with(&domain.to_ascii_lowercase()),
            ),
            ("localHostOrDomainIs", [host, fqdn]) => {
                let host = host.to_ascii_lowercase();
                let fqdn = fqdn.to_ascii_lowercase();
                Some(host == fqdn || (!host.contains('.') && fqdn.starts_with(&format!("{host}."))))
            }
            ("isPlainHostName", [host]) => Some(!host.contains('.')),
            _ => None,
        }
    }
}

/// `shExpMatch` semantics: `*` matches any run, `?` a single character.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        match p.get(pi) {
            Some('*') => {
                backtrack = Some((pi, ti));
                pi += 1;
            }
            Some(&c) if c == '?' || c == t[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match backtrack {
                Some((star, mark)) => {
                    pi = star + 1;
                    ti = mark + 1;
                    backtrack = Some((star, mark + 1));
                }
                None => return false,
            },
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}

// ── Entry point ──────────────────────────────────────────────────────

/// Locate `function FindProxyForURL(url, host) { ... }` and return the
/// parameter names and the body tokens.
fn entry_point(tokens: &[Token]) -> Option<(Vec<String>, &[Token])> {
    let start = tokens.windows(3).position(|w| {
        w[0].is_ident("function") && w[1].is_ident(ENTRY_POINT) && w[2].is_punct("(")
    })?;

    let open_params = start + 2;
    let close_params = find_closing(tokens, open_params)?;
    let params = tokens[open_params + 1..close_params]
        .iter()
        .filter_map(|t| match t {
            Token::Ident(name) => Some(name.clone()),
            _ => None,
        })
        .collect();

    let open_body = close_params + 1;
    if !tokens.get(open_body)?.is_punct("{") {
        return None;
    }
    let close_body = find_closing(tokens, open_body)?;
    Some((params, &tokens[open_body + 1..close_body]))
}

/// Answer `FindProxyForURL(target, host)` for `script`, returning the raw
/// directive string.
pub(crate) fn find_proxy_for_url(script: &str, target: &Url) -> Result<String, String> {
    let tokens = tokenize(script)?;
    let (params, body) =
        entry_point(&tokens).ok_or_else(|| format!("script does not define {ENTRY_POINT}"))?;

    let stmts = Parser::new(body).parse_block(false);
    let host = target
        .host_str()
        .unwrap_or_default()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_ascii_lowercase();

    let mut evaluator = Evaluator {
        url: target.as_str(),
        host: &host,
        url_param: params.first().cloned().unwrap_or_else(|| "url".into()),
        host_param: params.get(1).cloned().unwrap_or_else(|| "host".into()),
        vars: HashMap::new(),
    };

    evaluator
        .run(&stmts)
        .ok_or_else(|| "no rule produced a directive".into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CORPORATE: &str = r#"
        // Corporate routing
        function FindProxyForURL(url, host) {
            var proxy = "PROXY p1.corp.example.com:8080; PROXY p2.corp.example.com:8080; DIRECT";

            /* internal names go direct */
            if (isPlainHostName(host) || dnsDomainIs(host, ".corp.example.com"))
                return "DIRECT";

            if (shExpMatch(host, "*.lab.example.com")) {
                return 'SOCKS socks.corp.example.com:1080';
            } else if (host == "intranet") {
                return "DIRECT";
            }

            if (isInNet(dnsResolve(host), "10.0.0.0", "255.0.0.0"))
                return "DIRECT";

            return proxy;
        }
    "#;

    fn target(u: &str) -> Url {
        Url::parse(u).unwrap()
    }

    #[test]
    fn catch_all_through_variable() {
        let answer = find_proxy_for_url(CORPORATE, &target("http://example.com/")).unwrap();
        assert_eq!(
            answer,
            "PROXY p1.corp.example.com:8080; PROXY p2.corp.example.com:8080; DIRECT"
        );
    }

    #[test]
    fn host_rules() {
        assert_eq!(
            find_proxy_for_url(CORPORATE, &target("https://wiki.corp.example.com/x")).unwrap(),
            "DIRECT"
        );
        assert_eq!(
            find_proxy_for_url(CORPORATE, &target("http://build.lab.example.com/")).unwrap(),
            "SOCKS socks.corp.example.com:1080"
        );
        assert_eq!(find_proxy_for_url(CORPORATE, &target("http://printer/")).unwrap(), "DIRECT");
    }

    #[test]
    fn minimal_script() {
        let script = r#"function FindProxyForURL(u, h) { return "PROXY p1:8080; DIRECT"; }"#;
        assert_eq!(
            find_proxy_for_url(script, &target("http://example.com/")).unwrap(),
            "PROXY p1:8080; DIRECT"
        );
    }

    #[test]
    fn renamed_parameters_are_honored() {
        let script = r#"
            function FindProxyForURL(u, h) {
                if (h == "example.com") return "DIRECT";
                return "PROXY p1:8080";
            }
        "#;
        assert_eq!(find_proxy_for_url(script, &target("http://example.com/")).unwrap(), "DIRECT");
        assert_eq!(
            find_proxy_for_url(script, &target("http://other.test/")).unwrap(),
            "PROXY p1:8080"
        );
    }

    #[test]
    fn undecidable_rules_only_is_an_error() {
        let script = r#"
            function FindProxyForURL(url, host) {
                if (isInNet(myIpAddress(), "10.0.0.0", "255.0.0.0")) return "PROXY p1:8080";
            }
        "#;
        assert!(find_proxy_for_url(script, &target("http://example.com/")).is_err());
    }

    #[test]
    fn missing_entry_point_is_an_error() {
        let err = find_proxy_for_url("var x = 1;", &target("http://example.com/")).unwrap_err();
        assert!(err.contains(ENTRY_POINT));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let script = "function FindProxyForURL(url, host) { return \"PROXY p1:8080; }";
        assert!(find_proxy_for_url(script, &target("http://example.com/")).is_err());
    }

    #[test]
    fn glob_semantics() {
        assert!(glob_match("*.example.com", "a.b.example.com"));
        assert!(glob_match("h?st", "host"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("*.example.com", "example.com"));
        assert!(glob_match("*a*b", "xxaybzb"));
        assert!(!glob_match("a*c", "abcd"));
    }
}
