// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Rule-document parser
//!
//! Parses the compiled policy dialect: `;`-separated permit/forbid rules,
//! `@name("value")` annotations attaching to the following rule, and `when`
//! predicates over `context.*` / `resource.*` fields with comparison, boolean
//! and set operators.

use std::collections::BTreeMap;

use crate::domain::decision::{GatewayError, Obligation};

use super::eval::{EvalRecord, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Permit,
    Forbid,
}

/// One parsed rule.
#[derive(Debug, Clone)]
pub struct Rule {
    /// "policy0", "policy1", ... in document order.
    pub id: String,
    pub effect: Effect,
    /// From an `action == Action::"x"` header constraint, when present.
    pub action: Option<String>,
    pub annotations: BTreeMap<String, String>,
    pub when: Option<Expr>,
}

impl Rule {
    pub fn applies_to_action(&self, action: &str) -> bool {
        match &self.action {
            Some(constrained) => constrained == action,
            None => true,
        }
    }

    /// A rule with no predicate is always satisfied; one whose predicate
    /// errors (missing field, type mismatch) is not.
    pub fn is_satisfied(&self, record: &EvalRecord) -> bool {
        match &self.when {
            Some(expr) => matches!(expr.eval(record), Some(Value::Bool(true))),
            None => true,
        }
    }

    /// The obligation carried by this rule's annotations, if any.
    pub fn obligation(&self) -> Option<Obligation> {
        let kind = self.annotations.get("obligation")?;
        let fields = self
            .annotations
            .get("fields")
            .map(|f| {
                f.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Some(Obligation {
            kind: kind.clone(),
            fields,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Cmp(Operand, CmpOp, Operand),
    /// Set operation on a field: contains / containsAny / isEmpty.
    SetOp {
        field: String,
        method: SetMethod,
        args: Vec<Literal>,
    },
    Operand(Operand),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(String),
    Lit(Literal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Long(i64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Lt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMethod {
    Contains,
    ContainsAny,
    IsEmpty,
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Dot,
    At,
    Bang,
    EqEq,
    NotEq,
    Gt,
    Lt,
    AndAnd,
    OrOr,
    ColonColon,
}

fn tokenize(text: &str) -> Result<Vec<Token>, GatewayError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '/' => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    // Line comment
                    for c in chars.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                } else {
                    return Err(GatewayError::PolicyParse(
                        "unexpected '/' outside comment".to_string(),
                    ));
                }
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            '{' => {
                chars.next();
                tokens.push(Token::LBrace);
            }
            '}' => {
                chars.next();
                tokens.push(Token::RBrace);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            ';' => {
                chars.next();
                tokens.push(Token::Semi);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '@' => {
                chars.next();
                tokens.push(Token::At);
            }
            '>' => {
                chars.next();
                tokens.push(Token::Gt);
            }
            '<' => {
                chars.next();
                tokens.push(Token::Lt);
            }
            '=' => {
                chars.next();
                if chars.next() == Some('=') {
                    tokens.push(Token::EqEq);
                } else {
                    return Err(GatewayError::PolicyParse("expected '=='".to_string()));
                }
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::NotEq);
                } else {
                    tokens.push(Token::Bang);
                }
            }
            '&' => {
                chars.next();
                if chars.next() == Some('&') {
                    tokens.push(Token::AndAnd);
                } else {
                    return Err(GatewayError::PolicyParse("expected '&&'".to_string()));
                }
            }
            '|' => {
                chars.next();
                if chars.next() == Some('|') {
                    tokens.push(Token::OrOr);
                } else {
                    return Err(GatewayError::PolicyParse("expected '||'".to_string()));
                }
            }
            ':' => {
                chars.next();
                if chars.next() == Some(':') {
                    tokens.push(Token::ColonColon);
                } else {
                    return Err(GatewayError::PolicyParse("expected '::'".to_string()));
                }
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => {
                            if let Some(escaped) = chars.next() {
                                s.push(escaped);
                            }
                        }
                        Some(c) => s.push(c),
                        None => {
                            return Err(GatewayError::PolicyParse(
                                "unterminated string literal".to_string(),
                            ))
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() => {
                let mut n = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        n.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = n
                    .parse::<i64>()
                    .map_err(|e| GatewayError::PolicyParse(format!("bad integer {n}: {e}")))?;
                tokens.push(Token::Int(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(GatewayError::PolicyParse(format!(
                    "unexpected character '{other}'"
                )))
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), GatewayError> {
        match self.next() {
            Some(ref t) if t == expected => Ok(()),
            other => Err(GatewayError::PolicyParse(format!(
                "expected {expected:?}, found {other:?}"
            ))),
        }
    }

    fn expect_ident(&mut self) -> Result<String, GatewayError> {
        match self.next() {
            Some(Token::Ident(s)) => Ok(s),
            other => Err(GatewayError::PolicyParse(format!(
                "expected identifier, found {other:?}"
            ))),
        }
    }

    fn expect_str(&mut self) -> Result<String, GatewayError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(s),
            other => Err(GatewayError::PolicyParse(format!(
                "expected string literal, found {other:?}"
            ))),
        }
    }

    /// `@name("value")`
    fn parse_annotation(&mut self) -> Result<(String, String), GatewayError> {
        self.expect(&Token::At)?;
        let name = self.expect_ident()?;
        self.expect(&Token::LParen)?;
        let value = self.expect_str()?;
        self.expect(&Token::RParen)?;
        Ok((name, value))
    }

    /// Header: `(principal, action == Action::"chat", resource)` with the
    /// action clause optional and the others treated as scope placeholders.
    fn parse_header(&mut self) -> Result<Option<String>, GatewayError> {
        self.expect(&Token::LParen)?;
        let mut action = None;
        let mut depth = 0usize;

        loop {
            match self.next() {
                Some(Token::LParen) => depth += 1,
                Some(Token::RParen) => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                Some(Token::Ident(ref name)) if name == "action" && depth == 0 => {
                    if self.peek() == Some(&Token::EqEq) {
                        self.next();
                        let entity = self.expect_ident()?;
                        if entity != "Action" {
                            return Err(GatewayError::PolicyParse(format!(
                                "expected Action entity, found {entity}"
                            )));
                        }
                        self.expect(&Token::ColonColon)?;
                        action = Some(self.expect_str()?);
                    }
                }
                Some(_) => {}
                None => {
                    return Err(GatewayError::PolicyParse(
                        "unterminated rule header".to_string(),
                    ))
                }
            }
        }

        Ok(action)
    }

    fn parse_rule(&mut self, index: usize) -> Result<Rule, GatewayError> {
        let mut annotations = BTreeMap::new();
        while self.peek() == Some(&Token::At) {
            let (name, value) = self.parse_annotation()?;
            annotations.insert(name, value);
        }

        let effect = match self.expect_ident()?.as_str() {
            "permit" => Effect::Permit,
            "forbid" => Effect::Forbid,
            other => {
                return Err(GatewayError::PolicyParse(format!(
                    "expected permit or forbid, found {other}"
                )))
            }
        };

        let action = self.parse_header()?;

        let when = if matches!(self.peek(), Some(Token::Ident(w)) if w == "when") {
            self.next();
            self.expect(&Token::LBrace)?;
            let expr = self.parse_or()?;
            self.expect(&Token::RBrace)?;
            Some(expr)
        } else {
            None
        };

        self.expect(&Token::Semi)?;

        Ok(Rule {
            id: format!("policy{index}"),
            effect,
            action,
            annotations,
            when,
        })
    }

    fn parse_or(&mut self) -> Result<Expr, GatewayError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.next();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, GatewayError> {
        let mut left = self.parse_rel()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.next();
            let right = self.parse_rel()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_rel(&mut self) -> Result<Expr, GatewayError> {
        let left = self.parse_unary()?;

        let op = match self.peek() {
            Some(Token::EqEq) => Some(CmpOp::Eq),
            Some(Token::NotEq) => Some(CmpOp::Ne),
            Some(Token::Gt) => Some(CmpOp::Gt),
            Some(Token::Lt) => Some(CmpOp::Lt),
            _ => None,
        };

        if let Some(op) = op {
            self.next();
            let right = self.parse_unary()?;
            let lhs = expr_to_operand(left)?;
            let rhs = expr_to_operand(right)?;
            return Ok(Expr::Cmp(lhs, op, rhs));
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, GatewayError> {
        if self.peek() == Some(&Token::Bang) {
            self.next();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, GatewayError> {
        match self.next() {
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Str(s)) => Ok(Expr::Operand(Operand::Lit(Literal::Str(s)))),
            Some(Token::Int(n)) => Ok(Expr::Operand(Operand::Lit(Literal::Long(n)))),
            Some(Token::Ident(first)) => {
                match first.as_str() {
                    "true" => return Ok(Expr::Operand(Operand::Lit(Literal::Bool(true)))),
                    "false" => return Ok(Expr::Operand(Operand::Lit(Literal::Bool(false)))),
                    _ => {}
                }

                // Dotted field path, possibly ending in a set method call.
                let mut segments = vec![first];
                while self.peek() == Some(&Token::Dot) {
                    self.next();
                    let segment = self.expect_ident()?;
                    let is_call = self.peek() == Some(&Token::LParen);
                    let method = match segment.as_str() {
                        "contains" if is_call => Some(SetMethod::Contains),
                        "containsAny" if is_call => Some(SetMethod::ContainsAny),
                        "isEmpty" if is_call => Some(SetMethod::IsEmpty),
                        _ => None,
                    };

                    if let Some(method) = method {
                        let args = self.parse_call_args(method)?;
                        return Ok(Expr::SetOp {
                            field: segments.join("."),
                            method,
                            args,
                        });
                    }
                    segments.push(segment);
                }

                Ok(Expr::Operand(Operand::Field(segments.join("."))))
            }
            other => Err(GatewayError::PolicyParse(format!(
                "unexpected token in expression: {other:?}"
            ))),
        }
    }

    fn parse_call_args(&mut self, method: SetMethod) -> Result<Vec<Literal>, GatewayError> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();

        match method {
            SetMethod::IsEmpty => {}
            SetMethod::Contains => {
                args.push(self.parse_literal()?);
            }
            SetMethod::ContainsAny => {
                self.expect(&Token::LBracket)?;
                loop {
                    if self.peek() == Some(&Token::RBracket) {
                        self.next();
                        break;
                    }
                    args.push(self.parse_literal()?);
                    if self.peek() == Some(&Token::Comma) {
                        self.next();
                    }
                }
            }
        }

        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn parse_literal(&mut self) -> Result<Literal, GatewayError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Literal::Str(s)),
            Some(Token::Int(n)) => Ok(Literal::Long(n)),
            Some(Token::Ident(ref b)) if b == "true" => Ok(Literal::Bool(true)),
            Some(Token::Ident(ref b)) if b == "false" => Ok(Literal::Bool(false)),
            other => Err(GatewayError::PolicyParse(format!(
                "expected literal, found {other:?}"
            ))),
        }
    }
}

fn expr_to_operand(expr: Expr) -> Result<Operand, GatewayError> {
    match expr {
        Expr::Operand(op) => Ok(op),
        other => Err(GatewayError::PolicyParse(format!(
            "expected a field or literal beside a comparison, found {other:?}"
        ))),
    }
}

/// Parse a complete rule document.
pub fn parse_document(text: &str) -> Result<Vec<Rule>, GatewayError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut rules = Vec::new();

    while parser.peek().is_some() {
        let rule = parser.parse_rule(rules.len())?;
        rules.push(rule);
    }

    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_permit() {
        let rules = parse_document("permit(principal, action, resource);").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].effect, Effect::Permit);
        assert!(rules[0].action.is_none());
        assert!(rules[0].when.is_none());
        assert_eq!(rules[0].id, "policy0");
    }

    #[test]
    fn test_parse_action_constraint() {
        let rules = parse_document(
            "forbid(principal, action == Action::\"chat\", resource);",
        )
        .unwrap();
        assert_eq!(rules[0].action.as_deref(), Some("chat"));
        assert!(rules[0].applies_to_action("chat"));
        assert!(!rules[0].applies_to_action("invoke_tool"));
    }

    #[test]
    fn test_parse_annotations_attach_to_following_rule() {
        let text = r#"
@obligation("REDACT")
@fields("email, phone")
permit(principal, action == Action::"chat", resource)
when { context.pii.containsAny(["email", "phone"]) };

forbid(principal, action == Action::"chat", resource)
when { context.prompt_injection == true };
"#;
        let rules = parse_document(text).unwrap();
        assert_eq!(rules.len(), 2);
        let obligation = rules[0].obligation().unwrap();
        assert_eq!(obligation.kind, "REDACT");
        assert_eq!(obligation.fields, vec!["email", "phone"]);
        assert!(rules[1].obligation().is_none());
        assert!(rules[1].annotations.is_empty());
    }

    #[test]
    fn test_parse_nested_boolean_expression() {
        let text = r#"
forbid(principal, action == Action::"chat", resource)
when {
    (context.intent == "code.exploit" || context.user_intent == "code.exploit") &&
    context.confidence > 40 &&
    !(context.topic == "security-research")
};
"#;
        let rules = parse_document(text).unwrap();
        let when = rules[0].when.as_ref().unwrap();
        // Top level must be an And chain.
        assert!(matches!(when, Expr::And(_, _)));
    }

    #[test]
    fn test_parse_set_operations() {
        let text = r#"
permit(principal, action, resource)
when { context.pii.isEmpty() };
permit(principal, action, resource)
when { context.pii.contains("ssn") };
permit(principal, action, resource)
when { context.pii.containsAny(["email", "phone"]) };
"#;
        let rules = parse_document(text).unwrap();
        assert_eq!(rules.len(), 3);
        match &rules[2].when {
            Some(Expr::SetOp { field, method, args }) => {
                assert_eq!(field, "context.pii");
                assert_eq!(*method, SetMethod::ContainsAny);
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected expr: {other:?}"),
        }
    }

    #[test]
    fn test_parse_nested_record_path() {
        let text = r#"
forbid(principal, action, resource)
when {
    context.agent_state.max_steps > 0 &&
    context.agent_state.current_step > context.agent_state.max_steps
};
"#;
        let rules = parse_document(text).unwrap();
        assert!(rules[0].when.is_some());
    }

    #[test]
    fn test_comments_are_skipped() {
        let text = "// leading comment\npermit(principal, action, resource); // trailing\n";
        let rules = parse_document(text).unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_malformed_document_errors() {
        assert!(parse_document("permit( this is not valid").is_err());
        assert!(parse_document("grant(principal, action, resource);").is_err());
        assert!(parse_document("permit(principal, action, resource)").is_err());
    }

    #[test]
    fn test_rule_ids_follow_document_order() {
        let text = "permit(principal, action, resource);\nforbid(principal, action, resource);";
        let rules = parse_document(text).unwrap();
        assert_eq!(rules[0].id, "policy0");
        assert_eq!(rules[1].id, "policy1");
    }
}
