//! S-expression tree and its printer.
//!
//! Lowering builds expressions with [`SExpr::Hole`] placeholders for operands
//! whose expression is not known yet; [`SExpr::fill_holes`] replaces them once
//! the whole function is lowered.

use std::collections::HashMap;
use std::fmt;

/// Placeholder id, unique within one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HoleId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub enum SExpr {
    Atom(String),
    List(Vec<SExpr>),
    Hole(HoleId),
}

impl SExpr {
    pub fn atom(text: impl Into<String>) -> Self {
        SExpr::Atom(text.into())
    }

    /// `(head args...)`
    pub fn op(head: impl Into<String>, args: impl IntoIterator<Item = SExpr>) -> Self {
        let mut items = vec![SExpr::atom(head)];
        items.extend(args);
        SExpr::List(items)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, SExpr::List(_))
    }

    /// Replace every hole by its fill, recursing into the fills themselves.
    ///
    /// Fails with the offending hole when a fill is missing or a fill
    /// (transitively) contains its own hole.
    pub fn fill_holes(&mut self, fills: &HashMap<HoleId, SExpr>) -> Result<(), HoleId> {
        let mut expanding = Vec::new();
        self.fill_with(fills, &mut expanding)
    }

    fn fill_with(
        &mut self,
        fills: &HashMap<HoleId, SExpr>,
        expanding: &mut Vec<HoleId>,
    ) -> Result<(), HoleId> {
        match self {
            SExpr::Atom(_) => Ok(()),
            SExpr::List(items) => items
                .iter_mut()
                .try_for_each(|item| item.fill_with(fills, expanding)),
            SExpr::Hole(hole) => {
                let hole = *hole;
                if expanding.contains(&hole) {
                    return Err(hole);
                }
                let mut fill = fills.get(&hole).cloned().ok_or(hole)?;
                expanding.push(hole);
                fill.fill_with(fills, expanding)?;
                expanding.pop();
                *self = fill;
                Ok(())
            }
        }
    }

    /// Multi-line rendering with two-space indentation.
    ///
    /// Leading atoms stay on the opening line. Once a nested list appears,
    /// every remaining item goes on its own line and the closing paren gets a
    /// line of its own. Lists made only of atoms print on one line.
    pub fn pretty(&self) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, "");
        out
    }

    fn write_pretty(&self, out: &mut String, indent: &str) {
        let SExpr::List(items) = self else {
            out.push_str(indent);
            out.push_str(&self.to_string());
            out.push('\n');
            return;
        };
        let split = items.iter().position(SExpr::is_list).unwrap_or(items.len());
        out.push_str(indent);
        out.push('(');
        let head: Vec<String> = items[..split].iter().map(ToString::to_string).collect();
        out.push_str(&head.join(" "));
        if split == items.len() {
            out.push_str(")\n");
            return;
        }
        out.push('\n');
        let inner = format!("{}  ", indent);
        for item in &items[split..] {
            item.write_pretty(out, &inner);
        }
        out.push_str(indent);
        out.push_str(")\n");
    }
}

/// Single-line rendering.
impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExpr::Atom(text) => f.write_str(text),
            SExpr::Hole(hole) => write!(f, "?{}", hole.0),
            SExpr::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_local(i: u32) -> SExpr {
        SExpr::op("get_local", [SExpr::atom(i.to_string())])
    }

    #[test]
    fn atom_only_lists_print_on_one_line() {
        let e = SExpr::op("param", [SExpr::atom("i32")]);
        assert_eq!(e.pretty(), "(param i32)\n");
        assert_eq!(SExpr::List(Vec::new()).pretty(), "()\n");
    }

    #[test]
    fn nested_lists_break_lines() {
        let e = SExpr::op(
            "func",
            [
                SExpr::op("param", [SExpr::atom("i32")]),
                SExpr::op(
                    "return",
                    [SExpr::op("i32.add", [get_local(0), get_local(1)])],
                ),
            ],
        );
        let expected = "\
(func
  (param i32)
  (return
    (i32.add
      (get_local 0)
      (get_local 1)
    )
  )
)
";
        assert_eq!(e.pretty(), expected);
    }

    #[test]
    fn atoms_after_a_list_get_their_own_line() {
        let e = SExpr::op(
            "if",
            [get_local(2), SExpr::atom("1"), SExpr::atom("0")],
        );
        assert_eq!(e.pretty(), "(if\n  (get_local 2)\n  1\n  0\n)\n");
        assert_eq!(e.to_string(), "(if (get_local 2) 1 0)");
    }

    #[test]
    fn fills_nested_holes() {
        let mut root = SExpr::op("return", [SExpr::Hole(HoleId(0))]);
        let mut fills = HashMap::new();
        fills.insert(
            HoleId(0),
            SExpr::op("i32.mul", [SExpr::Hole(HoleId(1)), get_local(0)]),
        );
        fills.insert(HoleId(1), get_local(1));
        root.fill_holes(&fills).unwrap();
        assert_eq!(
            root.to_string(),
            "(return (i32.mul (get_local 1) (get_local 0)))"
        );
    }

    #[test]
    fn missing_or_cyclic_fill_is_reported() {
        let mut root = SExpr::Hole(HoleId(3));
        assert_eq!(root.fill_holes(&HashMap::new()), Err(HoleId(3)));

        let mut fills = HashMap::new();
        fills.insert(HoleId(3), SExpr::op("i32.eqz", [SExpr::Hole(HoleId(3))]));
        assert_eq!(root.fill_holes(&fills), Err(HoleId(3)));
    }
}
