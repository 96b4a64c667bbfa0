//! Boolean variables, literals, and three-valued truth.

use std::fmt;
use std::ops::Not;

use serde::{Deserialize, Serialize};

/// A Boolean variable owned by the solver's SAT core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Var(pub u32);

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// A literal: a variable together with a polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Lit {
    var: Var,
    positive: bool,
}

impl Lit {
    pub fn new(var: Var, positive: bool) -> Self {
        Lit { var, positive }
    }

    pub fn positive(var: Var) -> Self {
        Lit {
            var,
            positive: true,
        }
    }

    pub fn negative(var: Var) -> Self {
        Lit {
            var,
            positive: false,
        }
    }

    pub fn var(&self) -> Var {
        self.var
    }

    pub fn is_positive(&self) -> bool {
        self.positive
    }
}

impl Not for Lit {
    type Output = Lit;

    fn not(self) -> Lit {
        Lit {
            var: self.var,
            positive: !self.positive,
        }
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.positive {
            write!(f, "{}", self.var)
        } else {
            write!(f, "!{}", self.var)
        }
    }
}

/// Three-valued truth assignment of a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lbool {
    True,
    False,
    #[default]
    Undef,
}

impl Lbool {
    /// Truth value as seen through a literal of the given polarity.
    pub fn through(self, positive: bool) -> Lbool {
        if positive {
            self
        } else {
            !self
        }
    }
}

impl From<bool> for Lbool {
    fn from(value: bool) -> Self {
        if value {
            Lbool::True
        } else {
            Lbool::False
        }
    }
}

impl Not for Lbool {
    type Output = Lbool;

    fn not(self) -> Lbool {
        match self {
            Lbool::True => Lbool::False,
            Lbool::False => Lbool::True,
            Lbool::Undef => Lbool::Undef,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_negation() {
        let p = Lit::positive(Var(3));
        assert_eq!(!p, Lit::negative(Var(3)));
        assert_eq!(!!p, p);
        assert!(p.is_positive());
        assert_eq!(p.var(), Var(3));
    }

    #[test]
    fn test_lbool_through_polarity() {
        assert_eq!(Lbool::True.through(false), Lbool::False);
        assert_eq!(Lbool::False.through(false), Lbool::True);
        assert_eq!(Lbool::Undef.through(false), Lbool::Undef);
        assert_eq!(Lbool::True.through(true), Lbool::True);
    }
}
