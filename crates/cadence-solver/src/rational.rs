//! Rational and inf-rational arithmetic.
//!
//! Plan time is measured in exact rational units; execution bounds use
//! rationals extended with an infinitesimal component so that strict
//! inequalities can be expressed as inclusive bounds. A zero denominator
//! encodes signed infinity.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// An exact rational number with `i64` components.
///
/// The representation is always normalized: the denominator is
/// non-negative, the sign lives in the numerator, and `den == 0` encodes
/// positive or negative infinity depending on the numerator's sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i64,
    den: i64,
}

impl Rational {
    pub const ZERO: Rational = Rational { num: 0, den: 1 };
    pub const ONE: Rational = Rational { num: 1, den: 1 };
    pub const POSITIVE_INFINITY: Rational = Rational { num: 1, den: 0 };
    pub const NEGATIVE_INFINITY: Rational = Rational { num: -1, den: 0 };

    /// Create a normalized rational from a numerator and denominator.
    pub fn new(num: i64, den: i64) -> Self {
        if den == 0 {
            return Rational {
                num: num.signum().max(-1),
                den: 0,
            };
        }
        let sign = if (num < 0) != (den < 0) { -1 } else { 1 };
        let (num, den) = (num.unsigned_abs(), den.unsigned_abs());
        let g = gcd(num, den).max(1);
        Rational {
            num: sign * (num / g) as i64,
            den: (den / g) as i64,
        }
    }

    pub fn numerator(&self) -> i64 {
        self.num
    }

    pub fn denominator(&self) -> i64 {
        self.den
    }

    pub fn is_infinite(&self) -> bool {
        self.den == 0
    }

    pub fn is_negative(&self) -> bool {
        self.num < 0
    }

    pub fn is_positive(&self) -> bool {
        self.num > 0
    }
}

impl Default for Rational {
    fn default() -> Self {
        Rational::ZERO
    }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        Rational { num: value, den: 1 }
    }
}

impl Neg for Rational {
    type Output = Rational;

    fn neg(self) -> Rational {
        Rational {
            num: -self.num,
            den: self.den,
        }
    }
}

impl Add for Rational {
    type Output = Rational;

    fn add(self, rhs: Rational) -> Rational {
        if self.is_infinite() || rhs.is_infinite() {
            debug_assert!(
                !(self.is_infinite() && rhs.is_infinite() && self.num != rhs.num),
                "adding infinities of opposite sign"
            );
            return if self.is_infinite() { self } else { rhs };
        }
        Rational::new(
            self.num
                .saturating_mul(rhs.den)
                .saturating_add(rhs.num.saturating_mul(self.den)),
            self.den.saturating_mul(rhs.den),
        )
    }
}

impl Sub for Rational {
    type Output = Rational;

    fn sub(self, rhs: Rational) -> Rational {
        self + (-rhs)
    }
}

impl Mul for Rational {
    type Output = Rational;

    fn mul(self, rhs: Rational) -> Rational {
        if self.is_infinite() || rhs.is_infinite() {
            debug_assert!(self.num != 0 && rhs.num != 0, "multiplying zero by infinity");
            return Rational {
                num: self.num.signum() * rhs.num.signum(),
                den: 0,
            };
        }
        Rational::new(
            self.num.saturating_mul(rhs.num),
            self.den.saturating_mul(rhs.den),
        )
    }
}

impl AddAssign for Rational {
    fn add_assign(&mut self, rhs: Rational) {
        *self = *self + rhs;
    }
}

impl SubAssign for Rational {
    fn sub_assign(&mut self, rhs: Rational) {
        *self = *self - rhs;
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Rational) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Rational) -> Ordering {
        match (self.is_infinite(), other.is_infinite()) {
            (true, true) => self.num.cmp(&other.num),
            (true, false) => {
                if self.num > 0 {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (false, true) => {
                if other.num > 0 {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (false, false) => {
                let lhs = self.num as i128 * other.den as i128;
                let rhs = other.num as i128 * self.den as i128;
                lhs.cmp(&rhs)
            }
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            return write!(f, "{}inf", if self.num < 0 { "-" } else { "+" });
        }
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

// The wire format carries rationals as `(numerator, denominator)` pairs.
impl Serialize for Rational {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.num, self.den).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Rational {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (num, den) = <(i64, i64)>::deserialize(deserializer)?;
        if num == 0 && den == 0 {
            return Err(D::Error::custom("0/0 is not a rational"));
        }
        Ok(Rational::new(num, den))
    }
}

/// A rational extended with an infinitesimal component, ordered
/// lexicographically: `a + b·ε < c + d·ε` iff `a < c`, or `a = c` and
/// `b < d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct InfRational {
    pub rat: Rational,
    pub inf: Rational,
}

impl InfRational {
    pub const ZERO: InfRational = InfRational {
        rat: Rational::ZERO,
        inf: Rational::ZERO,
    };

    pub fn new(rat: Rational) -> Self {
        InfRational {
            rat,
            inf: Rational::ZERO,
        }
    }

    pub fn with_infinitesimal(rat: Rational, inf: Rational) -> Self {
        InfRational { rat, inf }
    }

    pub fn positive_infinity() -> Self {
        InfRational::new(Rational::POSITIVE_INFINITY)
    }

    pub fn negative_infinity() -> Self {
        InfRational::new(Rational::NEGATIVE_INFINITY)
    }

    pub fn is_infinite(&self) -> bool {
        self.rat.is_infinite()
    }
}

impl From<Rational> for InfRational {
    fn from(rat: Rational) -> Self {
        InfRational::new(rat)
    }
}

impl From<i64> for InfRational {
    fn from(value: i64) -> Self {
        InfRational::new(Rational::from(value))
    }
}

impl Neg for InfRational {
    type Output = InfRational;

    fn neg(self) -> InfRational {
        InfRational {
            rat: -self.rat,
            inf: -self.inf,
        }
    }
}

impl Add for InfRational {
    type Output = InfRational;

    fn add(self, rhs: InfRational) -> InfRational {
        InfRational {
            rat: self.rat + rhs.rat,
            inf: self.inf + rhs.inf,
        }
    }
}

impl Sub for InfRational {
    type Output = InfRational;

    fn sub(self, rhs: InfRational) -> InfRational {
        self + (-rhs)
    }
}

impl Add<Rational> for InfRational {
    type Output = InfRational;

    fn add(self, rhs: Rational) -> InfRational {
        InfRational {
            rat: self.rat + rhs,
            inf: self.inf,
        }
    }
}

impl Mul<Rational> for InfRational {
    type Output = InfRational;

    fn mul(self, rhs: Rational) -> InfRational {
        InfRational {
            rat: self.rat * rhs,
            inf: self.inf * rhs,
        }
    }
}

impl AddAssign for InfRational {
    fn add_assign(&mut self, rhs: InfRational) {
        *self = *self + rhs;
    }
}

impl PartialOrd for InfRational {
    fn partial_cmp(&self, other: &InfRational) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InfRational {
    fn cmp(&self, other: &InfRational) -> Ordering {
        self.rat
            .cmp(&other.rat)
            .then_with(|| self.inf.cmp(&other.inf))
    }
}

impl PartialEq<Rational> for InfRational {
    fn eq(&self, other: &Rational) -> bool {
        self.rat == *other && self.inf == Rational::ZERO
    }
}

impl PartialOrd<Rational> for InfRational {
    fn partial_cmp(&self, other: &Rational) -> Option<Ordering> {
        Some(self.cmp(&InfRational::new(*other)))
    }
}

impl fmt::Display for InfRational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inf == Rational::ZERO {
            write!(f, "{}", self.rat)
        } else {
            write!(f, "{} + {}e", self.rat, self.inf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(Rational::new(2, 4), Rational::new(1, 2));
        assert_eq!(Rational::new(-2, -4), Rational::new(1, 2));
        assert_eq!(Rational::new(2, -4), Rational::new(-1, 2));
        assert_eq!(Rational::new(0, 7), Rational::ZERO);
    }

    #[test]
    fn test_arithmetic() {
        let half = Rational::new(1, 2);
        let third = Rational::new(1, 3);
        assert_eq!(half + third, Rational::new(5, 6));
        assert_eq!(half - third, Rational::new(1, 6));
        assert_eq!(half * third, Rational::new(1, 6));
        let mut t = Rational::ZERO;
        t += Rational::ONE;
        t += Rational::ONE;
        assert_eq!(t, Rational::from(2));
    }

    #[test]
    fn test_ordering_with_infinities() {
        assert!(Rational::NEGATIVE_INFINITY < Rational::from(-1_000_000));
        assert!(Rational::from(1_000_000) < Rational::POSITIVE_INFINITY);
        assert!(Rational::new(1, 3) < Rational::new(1, 2));
        assert_eq!(
            Rational::POSITIVE_INFINITY.cmp(&Rational::POSITIVE_INFINITY),
            Ordering::Equal
        );
    }

    #[test]
    fn test_infinity_absorbs_addition() {
        assert_eq!(
            Rational::POSITIVE_INFINITY + Rational::from(5),
            Rational::POSITIVE_INFINITY
        );
        assert_eq!(
            Rational::from(5) + Rational::NEGATIVE_INFINITY,
            Rational::NEGATIVE_INFINITY
        );
    }

    #[test]
    fn test_infinitesimal_ordering() {
        let one = InfRational::from(1);
        let one_plus = InfRational::with_infinitesimal(Rational::ONE, Rational::ONE);
        let one_minus = InfRational::with_infinitesimal(Rational::ONE, -Rational::ONE);
        assert!(one_minus < one);
        assert!(one < one_plus);
        assert!(one_plus < InfRational::from(2));
    }

    #[test]
    fn test_serde_pair_shape() {
        let r = Rational::new(3, 4);
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "[3,4]");
        let back: Rational = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
        let inf: Rational = serde_json::from_str("[1,0]").unwrap();
        assert_eq!(inf, Rational::POSITIVE_INFINITY);
    }
}
