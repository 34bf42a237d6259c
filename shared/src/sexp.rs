//! S-expression parser for the monitor protocol
//!
//! Every monitor message is one or more parenthesised lists of
//! whitespace-separated atoms and nested lists:
//!
//! ```text
//! (time (month 12) (day 25) (hour 9))
//! ```
//!
//! is a single expression with the atom `time` and three children that each
//! carry two atoms. Parsing is a single left-to-right scan with no
//! backtracking.

use std::fmt;

const EXPRESSION_START: char = '(';
const EXPRESSION_CLOSE: char = ')';

/// Parse errors for malformed expressions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SExpError {
    /// A `)` was found while no expression was open
    #[error("unexpected ')' at position {position}: no expression has been started")]
    UnexpectedClose { position: usize },

    /// The text ended while an expression was still open
    #[error("expression not closed at position {position}: expecting ')'")]
    Unclosed { position: usize },
}

/// A parsed list node: its atoms plus its nested lists.
///
/// Children are owned exclusively by their parent. Atoms keep the order in
/// which they appeared, children likewise; the relative interleaving of the
/// two is not preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expression {
    atoms: Vec<String>,
    children: Vec<Expression>,
}

impl Expression {
    /// Build an expression from atoms and children directly.
    pub fn new(atoms: Vec<String>, children: Vec<Expression>) -> Self {
        Self { atoms, children }
    }

    /// Whitespace-separated atoms of this list, in order.
    pub fn atoms(&self) -> &[String] {
        &self.atoms
    }

    /// Nested lists, in order.
    pub fn children(&self) -> &[Expression] {
        &self.children
    }

    /// The first atom, which names the expression in the monitor protocol.
    pub fn name(&self) -> Option<&str> {
        self.atoms.first().map(String::as_str)
    }

    /// The atom at `index`, if present.
    pub fn atom(&self, index: usize) -> Option<&str> {
        self.atoms.get(index).map(String::as_str)
    }

    /// The first child whose name matches.
    pub fn child_named(&self, name: &str) -> Option<&Expression> {
        self.children.iter().find(|c| c.name() == Some(name))
    }

    /// Render the expression as an indented tree.
    ///
    /// Each line holds one list with comma separated atoms; nesting is shown
    /// with `--` per level:
    ///
    /// ```text
    /// [time]
    /// --[month,12]
    /// --[day,25]
    /// ```
    pub fn to_tree_string(&self) -> String {
        let mut out = String::new();
        self.write_tree(0, &mut out);
        out
    }

    fn write_tree(&self, depth: usize, out: &mut String) {
        for _ in 0..depth {
            out.push_str("--");
        }
        out.push('[');
        out.push_str(&self.atoms.join(","));
        out.push_str("]\n");
        for child in &self.children {
            child.write_tree(depth + 1, out);
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", EXPRESSION_START)?;
        let mut first = true;
        for atom in &self.atoms {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", atom)?;
            first = false;
        }
        for child in &self.children {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", child)?;
            first = false;
        }
        write!(f, "{}", EXPRESSION_CLOSE)
    }
}

/// An expression that is still being read.
struct OpenExpression {
    pending: String,
    children: Vec<Expression>,
}

impl OpenExpression {
    fn new() -> Self {
        Self {
            pending: String::new(),
            children: Vec::new(),
        }
    }

    fn close(self) -> Expression {
        Expression {
            atoms: self.pending.split_whitespace().map(str::to_owned).collect(),
            children: self.children,
        }
    }
}

/// Parse all top-level expressions contained in `text`.
///
/// Returns `Ok(None)` when the text contains no expression at all, which is
/// distinct from a parse failure. Characters outside of any expression are
/// ignored.
///
/// # Errors
///
/// Fails on a `)` with nothing open, or when the text ends with an
/// expression still open. No partial tree is ever returned.
pub fn parse(text: &str) -> Result<Option<Vec<Expression>>, SExpError> {
    let mut roots = Vec::new();
    let mut stack: Vec<OpenExpression> = Vec::new();

    for (position, c) in text.char_indices() {
        match c {
            EXPRESSION_START => stack.push(OpenExpression::new()),
            EXPRESSION_CLOSE => {
                let current = stack.pop().ok_or(SExpError::UnexpectedClose { position })?;
                let expr = current.close();
                match stack.last_mut() {
                    Some(parent) => parent.children.push(expr),
                    None => roots.push(expr),
                }
            }
            _ => {
                if let Some(current) = stack.last_mut() {
                    current.pending.push(c);
                }
            }
        }
    }

    if !stack.is_empty() {
        return Err(SExpError::Unclosed {
            position: text.len(),
        });
    }

    Ok(if roots.is_empty() { None } else { Some(roots) })
}
