//! Linear expressions over arithmetic-theory variables.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rational::Rational;

/// A variable of the solver's linear-arithmetic theory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArithVar(pub u32);

impl fmt::Display for ArithVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// A linear expression `known + Σ coeff·var`. An expression with no
/// variables is a constant and carries nothing to propagate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinExpr {
    pub vars: BTreeMap<ArithVar, Rational>,
    pub known: Rational,
}

impl LinExpr {
    pub fn constant(known: Rational) -> Self {
        LinExpr {
            vars: BTreeMap::new(),
            known,
        }
    }

    pub fn variable(var: ArithVar) -> Self {
        let mut vars = BTreeMap::new();
        vars.insert(var, Rational::ONE);
        LinExpr {
            vars,
            known: Rational::ZERO,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.vars.is_empty()
    }

    /// The single variable of a `known + 1·var` expression, if that is
    /// the expression's exact shape.
    pub fn as_single_var(&self) -> Option<ArithVar> {
        if self.vars.len() != 1 {
            return None;
        }
        let (&var, &coeff) = self.vars.iter().next()?;
        (coeff == Rational::ONE).then_some(var)
    }
}

impl fmt::Display for LinExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.known)?;
        for (var, coeff) in &self.vars {
            write!(f, " + {}·{}", coeff, var)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_detection() {
        assert!(LinExpr::constant(Rational::from(5)).is_constant());
        assert!(!LinExpr::variable(ArithVar(0)).is_constant());
    }

    #[test]
    fn test_single_var_shape() {
        let single = LinExpr::variable(ArithVar(2));
        assert_eq!(single.as_single_var(), Some(ArithVar(2)));

        let mut scaled = LinExpr::variable(ArithVar(2));
        scaled.vars.insert(ArithVar(2), Rational::from(2));
        assert_eq!(scaled.as_single_var(), None);
    }
}
