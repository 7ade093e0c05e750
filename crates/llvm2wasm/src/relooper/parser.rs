//! Recursive-descent parser over the token stream.

use super::lexer::{Keyword, Spanned, Token};
use super::{CaseValue, Condition, Shape, SwitchArm};
use crate::error::TranslateError;

type ParseResult<T> = Result<T, TranslateError>;

pub(super) struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    /// `tokens` must end with [`Token::Eof`], as produced by the lexer.
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Token {
        self.tokens.get(self.pos).map_or(Token::Eof, |t| t.token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or(self.tokens.last())
            .map_or(0, |t| t.pos)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, reason: impl Into<String>) -> TranslateError {
        TranslateError::grammar(self.offset(), reason)
    }

    fn unexpected(&self, expected: &str) -> TranslateError {
        self.error(format!("expected {}, found {}", expected, self.peek()))
    }

    fn expect(&mut self, token: Token) -> ParseResult<()> {
        if self.peek() != token {
            return Err(self.unexpected(&token.to_string()));
        }
        self.advance();
        Ok(())
    }

    pub fn parse_program(&mut self) -> ParseResult<Vec<Shape>> {
        let mut shapes = Vec::new();
        loop {
            match self.peek() {
                Token::Eof => return Ok(shapes),
                Token::RBrace => return Err(self.error("unexpected '}'")),
                _ => shapes.push(self.parse_shape()?),
            }
        }
    }

    /// `{ shape* }`
    fn parse_block(&mut self) -> ParseResult<Vec<Shape>> {
        self.expect(Token::LBrace)?;
        let mut shapes = Vec::new();
        loop {
            match self.peek() {
                Token::RBrace => {
                    self.advance();
                    return Ok(shapes);
                }
                Token::Eof => return Err(self.error("unexpected end of input")),
                _ => shapes.push(self.parse_shape()?),
            }
        }
    }

    fn parse_shape(&mut self) -> ParseResult<Shape> {
        match self.peek() {
            Token::LBrace => Ok(Shape::Block(self.parse_block()?)),
            Token::LoopLabel(label) => {
                self.advance();
                self.expect(Token::Colon)?;
                let shape = Box::new(self.parse_shape()?);
                Ok(Shape::Labeled { label, shape })
            }
            Token::Expr(block) => {
                self.advance();
                self.expect(Token::Semi)?;
                Ok(Shape::Leaf(block))
            }
            Token::Keyword(Keyword::Label) => self.parse_set_label(),
            Token::Keyword(Keyword::If) => self.parse_if(),
            Token::Keyword(Keyword::While) => self.parse_while(),
            Token::Keyword(Keyword::Do) => self.parse_do_while(),
            Token::Keyword(Keyword::Switch) => self.parse_switch(),
            Token::Keyword(Keyword::Break) | Token::Keyword(Keyword::Continue) => {
                self.parse_break()
            }
            _ => Err(self.unexpected("a statement")),
        }
    }

    fn parse_set_label(&mut self) -> ParseResult<Shape> {
        self.advance();
        self.expect(Token::Assign)?;
        let Token::Number(n) = self.peek() else {
            return Err(self.unexpected("label number"));
        };
        self.advance();
        self.expect(Token::Semi)?;
        Ok(Shape::SetLabel(n))
    }

    fn parse_if(&mut self) -> ParseResult<Shape> {
        self.advance();
        let cond = self.parse_guard()?;
        let then = self.parse_block()?;
        let otherwise = if self.peek() == Token::Keyword(Keyword::Else) {
            self.advance();
            if self.peek() == Token::Keyword(Keyword::If) {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Shape::If {
            cond,
            then,
            otherwise,
        })
    }

    fn parse_while(&mut self) -> ParseResult<Shape> {
        self.advance();
        let at = self.offset();
        if self.parse_guard()? != Condition::Const(1) {
            return Err(TranslateError::grammar(at, "expected while(1)"));
        }
        Ok(Shape::Loop(self.parse_block()?))
    }

    fn parse_do_while(&mut self) -> ParseResult<Shape> {
        self.advance();
        let body = self.parse_block()?;
        self.expect(Token::Keyword(Keyword::While))?;
        let at = self.offset();
        if self.parse_guard()? != Condition::Const(0) {
            return Err(TranslateError::grammar(at, "expected while(0)"));
        }
        self.expect(Token::Semi)?;
        Ok(Shape::Block(body))
    }

    fn parse_switch(&mut self) -> ParseResult<Shape> {
        self.advance();
        let selector = self.parse_guard()?;
        self.expect(Token::LBrace)?;
        let mut arms = Vec::new();
        loop {
            let value = match self.advance() {
                Token::RBrace => return Ok(Shape::Switch { selector, arms }),
                Token::Keyword(Keyword::Case) => match self.advance() {
                    Token::Number(n) => Some(CaseValue::Number(n)),
                    Token::Expr(n) => Some(CaseValue::Expr(n)),
                    other => {
                        return Err(self.error(format!("expected case value, found {}", other)))
                    }
                },
                Token::Keyword(Keyword::Default) => None,
                other => {
                    return Err(self.error(format!("expected case or default, found {}", other)))
                }
            };
            self.expect(Token::Colon)?;
            let body = self.parse_block()?;
            arms.push(SwitchArm { value, body });
        }
    }

    fn parse_break(&mut self) -> ParseResult<Shape> {
        let is_continue = self.advance() == Token::Keyword(Keyword::Continue);
        let label = match self.peek() {
            Token::LoopLabel(n) => {
                self.advance();
                Some(n)
            }
            _ => None,
        };
        self.expect(Token::Semi)?;
        Ok(if is_continue {
            Shape::Continue(label)
        } else {
            Shape::Break(label)
        })
    }

    /// `( condition )`
    fn parse_guard(&mut self) -> ParseResult<Condition> {
        self.expect(Token::LParen)?;
        let cond = self.parse_and()?;
        self.expect(Token::RParen)?;
        Ok(cond)
    }

    fn parse_and(&mut self) -> ParseResult<Condition> {
        let mut lhs = self.parse_eq()?;
        while self.peek() == Token::AndAnd {
            self.advance();
            let rhs = self.parse_eq()?;
            lhs = Condition::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_eq(&mut self) -> ParseResult<Condition> {
        let lhs = self.parse_unary()?;
        if self.peek() != Token::EqEq {
            return Ok(lhs);
        }
        self.advance();
        let rhs = self.parse_unary()?;
        Ok(Condition::Eq(Box::new(lhs), Box::new(rhs)))
    }

    fn parse_unary(&mut self) -> ParseResult<Condition> {
        if self.peek() == Token::Bang {
            self.advance();
            return Ok(Condition::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Condition> {
        let cond = match self.peek() {
            Token::LParen => self.parse_guard()?,
            Token::Number(n) => {
                self.advance();
                Condition::Const(n)
            }
            Token::Expr(n) => {
                self.advance();
                Condition::Expr(n)
            }
            Token::Keyword(Keyword::Label) => {
                self.advance();
                Condition::Label
            }
            _ => return Err(self.unexpected("an expression")),
        };
        while self.peek() == Token::OrZero {
            self.advance();
        }
        Ok(cond)
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse_shapes;
    use super::*;
    use crate::error::{root_translate_error, ErrorKind};

    fn grammar_error(text: &str) -> String {
        let err = parse_shapes(text).unwrap_err();
        let root = root_translate_error(&err).expect("typed error");
        assert_eq!(root.kind(), ErrorKind::Grammar);
        root.to_string()
    }

    fn expr(n: u32) -> Box<Condition> {
        Box::new(Condition::Expr(n))
    }

    #[test]
    fn empty_text_has_no_shapes() {
        assert_eq!(parse_shapes("").unwrap(), Vec::new());
        assert_eq!(parse_shapes("  // nothing\n").unwrap(), Vec::new());
    }

    #[test]
    fn parses_leaf_sequence() {
        assert_eq!(
            parse_shapes("// Block 0\n\"0\";\n\"2\";").unwrap(),
            vec![Shape::Leaf(0), Shape::Leaf(2)]
        );
    }

    #[test]
    fn parses_if_else_if_chain() {
        let shapes = parse_shapes(r#""0"; if ("3") { "1"; } else if (!("4")) { "2"; } else { }"#)
            .unwrap();
        assert_eq!(
            shapes,
            vec![
                Shape::Leaf(0),
                Shape::If {
                    cond: Condition::Expr(3),
                    then: vec![Shape::Leaf(1)],
                    otherwise: Some(vec![Shape::If {
                        cond: Condition::Not(expr(4)),
                        then: vec![Shape::Leaf(2)],
                        otherwise: Some(Vec::new()),
                    }]),
                },
            ]
        );
    }

    #[test]
    fn parses_labeled_dispatch_loop() {
        let text = r#"
            label = 0;
            L1: while(1) {
              switch (label|0) {
                case 0: {
                  "0";
                  if ("2") { label = 1; continue L1; }
                  label = 0; continue L1;
                }
                case 1: { "1"; break L1; }
                default: { }
              }
            }"#;
        let shapes = parse_shapes(text).unwrap();
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0], Shape::SetLabel(0));
        let Shape::Labeled { label: 1, shape } = &shapes[1] else {
            panic!("expected labeled loop, got {:?}", shapes[1]);
        };
        let Shape::Loop(body) = shape.as_ref() else {
            panic!("expected loop, got {:?}", shape);
        };
        let Shape::Switch { selector, arms } = &body[0] else {
            panic!("expected switch, got {:?}", body[0]);
        };
        assert_eq!(*selector, Condition::Label);
        assert_eq!(arms.len(), 3);
        assert_eq!(arms[0].value, Some(CaseValue::Number(0)));
        assert_eq!(
            arms[0].body,
            vec![
                Shape::Leaf(0),
                Shape::If {
                    cond: Condition::Expr(2),
                    then: vec![Shape::SetLabel(1), Shape::Continue(Some(1))],
                    otherwise: None,
                },
                Shape::SetLabel(0),
                Shape::Continue(Some(1)),
            ]
        );
        assert_eq!(arms[1].body, vec![Shape::Leaf(1), Shape::Break(Some(1))]);
        assert_eq!(arms[2].value, None);
        assert!(crate::relooper::uses_label(&shapes));
    }

    #[test]
    fn conjunction_binds_looser_than_equality() {
        let shapes = parse_shapes(r#"if ((label|0) == 2 && "5") { break; }"#).unwrap();
        assert_eq!(
            shapes,
            vec![Shape::If {
                cond: Condition::And(
                    Box::new(Condition::Eq(
                        Box::new(Condition::Label),
                        Box::new(Condition::Const(2))
                    )),
                    expr(5),
                ),
                then: vec![Shape::Break(None)],
                otherwise: None,
            }]
        );
    }

    #[test]
    fn do_while_zero_is_a_block() {
        let shapes = parse_shapes(r#"L3: do { "1"; break L3; } while(0);"#).unwrap();
        assert_eq!(
            shapes,
            vec![Shape::Labeled {
                label: 3,
                shape: Box::new(Shape::Block(vec![Shape::Leaf(1), Shape::Break(Some(3))])),
            }]
        );
        assert!(!crate::relooper::uses_label(&shapes));
    }

    #[test]
    fn switch_accepts_placeholder_cases() {
        let shapes = parse_shapes(r#"switch ("4") { case "9": { } }"#).unwrap();
        assert_eq!(
            shapes,
            vec![Shape::Switch {
                selector: Condition::Expr(4),
                arms: vec![SwitchArm {
                    value: Some(CaseValue::Expr(9)),
                    body: Vec::new(),
                }],
            }]
        );
    }

    #[test]
    fn rejects_other_loop_guards() {
        assert!(grammar_error(r#"while(2) { "0"; }"#).contains("expected while(1)"));
        assert!(grammar_error(r#"while(label) { "0"; }"#).contains("expected while(1)"));
        assert!(grammar_error(r#"do { "0"; } while(1);"#).contains("expected while(0)"));
    }

    #[test]
    fn rejects_malformed_text() {
        grammar_error("}");
        grammar_error(r#"{ "0";"#);
        grammar_error(r#""0""#);
        grammar_error("label 3;");
        grammar_error(r#"switch (label) { "0"; }"#);
        grammar_error("break 3;");
    }
}
