//! Signed arbitrary-precision amounts.
//!
//! Individual balances fit in 64 bits, but sums over a delegate and all of its
//! delegators (and intermediate replay totals) are not guaranteed to, so every
//! balance in the workspace is a [`Mutez`] backed by a `BigInt`.
//!
//! Amounts serialize as decimal strings. That is the encoding the chain RPC
//! uses, and it keeps the JSON and bincode forms in agreement.

use num::{BigInt, Signed, ToPrimitive, Zero};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use crate::TypesError;

/// An amount in mutez (one millionth of a tez), signed.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mutez(BigInt);

impl Mutez {
    pub fn zero() -> Self {
        Self(BigInt::zero())
    }

    pub fn new(raw: BigInt) -> Self {
        Self(raw)
    }

    pub fn as_bigint(&self) -> &BigInt {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    /// Narrow to `i64`, if the value fits.
    pub fn to_i64(&self) -> Option<i64> {
        self.0.to_i64()
    }

    /// `self * numerator / denominator`, truncating toward zero.
    ///
    /// Returns zero when `denominator` is zero.
    pub fn mul_div(&self, numerator: &BigInt, denominator: &BigInt) -> Self {
        if denominator.is_zero() {
            return Self::zero();
        }
        Self(&self.0 * numerator / denominator)
    }

    /// `max(self, 0)`.
    pub fn clamp_non_negative(self) -> Self {
        if self.0.is_negative() {
            Self::zero()
        } else {
            self
        }
    }
}

impl From<i64> for Mutez {
    fn from(v: i64) -> Self {
        Self(BigInt::from(v))
    }
}

impl From<BigInt> for Mutez {
    fn from(v: BigInt) -> Self {
        Self(v)
    }
}

impl FromStr for Mutez {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigInt::from_str(s.trim())
            .map(Self)
            .map_err(|_| TypesError::InvalidAmount(s.to_string()))
    }
}

impl Add for Mutez {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a Mutez> for Mutez {
    type Output = Self;
    fn add(self, rhs: &'a Mutez) -> Self {
        Self(self.0 + &rhs.0)
    }
}

impl Sub for Mutez {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl<'a> Sub<&'a Mutez> for Mutez {
    type Output = Self;
    fn sub(self, rhs: &'a Mutez) -> Self {
        Self(self.0 - &rhs.0)
    }
}

impl AddAssign<&Mutez> for Mutez {
    fn add_assign(&mut self, rhs: &Mutez) {
        self.0 += &rhs.0;
    }
}

impl SubAssign<&Mutez> for Mutez {
    fn sub_assign(&mut self, rhs: &Mutez) {
        self.0 -= &rhs.0;
    }
}

impl Neg for Mutez {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Sum for Mutez {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, v| acc + v)
    }
}

impl<'a> Sum<&'a Mutez> for Mutez {
    fn sum<I: Iterator<Item = &'a Mutez>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, v| acc + v)
    }
}

impl fmt::Display for Mutez {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Mutez {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

struct MutezVisitor;

impl Visitor<'_> for MutezVisitor {
    type Value = Mutez;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal integer string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Mutez::from_str(v).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Mutez {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(MutezVisitor)
    }
}
