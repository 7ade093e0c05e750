//! Structured control flow text and its shape tree.
//!
//! A structurer describes one function as C-like text in which every basic
//! block appears as a quoted numbered statement (`"3";`) and every branch
//! condition as a quoted placeholder (`if ("7") { ... }`). The parser turns that
//! text into a [`Shape`] tree:
//!
//! ```text
//! L1: while(1) {                 Labeled { 1, Loop [
//!   switch (label|0) {             Switch { label, [
//!     case 0: {                      case 0 => [
//!       "0";                           Leaf(0),
//!       label = 1; continue L1;        SetLabel(1), Continue(L1) ],
//!     }                              ...
//!   }                              ] }
//! }                              ] }
//! ```
//!
//! Only `while(1)` and `do { } while(0)` loop forms are accepted.

mod lexer;
mod parser;

pub use lexer::{Keyword, Lexer, Spanned, Token};

use anyhow::Result;

/// One node of the structured control flow tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// `{ ... }` or `do { ... } while(0);`
    Block(Vec<Shape>),
    /// `while(1) { ... }`
    Loop(Vec<Shape>),
    If {
        cond: Condition,
        then: Vec<Shape>,
        otherwise: Option<Vec<Shape>>,
    },
    Switch {
        selector: Condition,
        arms: Vec<SwitchArm>,
    },
    Break(Option<u32>),
    Continue(Option<u32>),
    /// `L<n>: <shape>`
    Labeled { label: u32, shape: Box<Shape> },
    /// `label = <n>;`
    SetLabel(u32),
    /// `"<n>";` names basic block `n`.
    Leaf(u32),
}

/// Boolean or selector expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Const(u32),
    /// The `label` pseudo-variable.
    Label,
    /// `"<n>"`: placeholder for a registered branch condition.
    Expr(u32),
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Eq(Box<Condition>, Box<Condition>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchArm {
    /// `None` for `default:`.
    pub value: Option<CaseValue>,
    pub body: Vec<Shape>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseValue {
    Number(u32),
    Expr(u32),
}

impl Condition {
    pub fn uses_label(&self) -> bool {
        match self {
            Condition::Label => true,
            Condition::Const(_) | Condition::Expr(_) => false,
            Condition::Not(c) => c.uses_label(),
            Condition::And(a, b) | Condition::Eq(a, b) => a.uses_label() || b.uses_label(),
        }
    }
}

impl Shape {
    /// Whether this shape reads or writes the `label` pseudo-variable.
    pub fn uses_label(&self) -> bool {
        match self {
            Shape::SetLabel(_) => true,
            Shape::Block(body) | Shape::Loop(body) => uses_label(body),
            Shape::If {
                cond,
                then,
                otherwise,
            } => {
                cond.uses_label()
                    || uses_label(then)
                    || otherwise.as_deref().is_some_and(uses_label)
            }
            Shape::Switch { selector, arms } => {
                selector.uses_label() || arms.iter().any(|arm| uses_label(&arm.body))
            }
            Shape::Labeled { shape, .. } => shape.uses_label(),
            Shape::Break(_) | Shape::Continue(_) | Shape::Leaf(_) => false,
        }
    }
}

pub fn uses_label(shapes: &[Shape]) -> bool {
    shapes.iter().any(Shape::uses_label)
}

/// Parse structured control flow text into a sequence of shapes.
pub fn parse_shapes(text: &str) -> Result<Vec<Shape>> {
    let tokens = Lexer::new(text).tokenize()?;
    Ok(parser::Parser::new(tokens).parse_program()?)
}
