use anyhow::{bail, Context};
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use std::{
    fmt::{self, Debug, Display},
    str::FromStr,
    sync::LazyLock,
};

static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\$?\s*([0-9]{1,3}(?:,[0-9]{3})+|[0-9]+)(?:\.([0-9]*))?\s*$")
        .expect("valid amount regex")
});

/// Represents an amount of money.
///
/// The amount is stored internally as an integer number of cents, so sums of
/// exact decimal prices stay exact. The [`Display`] implementation formats it
/// to 2 decimal places.
///
/// Serialization writes a plain number in currency units while the amount is
/// within [`Money::MAX_EXACT_F64`] cents of zero, where the number is known to
/// read back to the same cent. Larger amounts are written as decimal strings,
/// which deserialize exactly.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Money(i64);

impl Money {
    /// The largest magnitude, in cents, that survives a round trip through
    /// `f64` currency units.
    pub const MAX_EXACT_F64: u64 = 1 << 50;

    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Converts a floating-point amount in currency units, rounding to the
    /// nearest cent. Returns `None` for NaN, infinities, and amounts too large
    /// to hold.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_f64(amount: f64) -> Option<Self> {
        let cents = (amount * 100.0).round();
        if !cents.is_finite() || cents.abs() >= 9.0e15 {
            return None;
        }
        Some(Self(cents as i64))
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Returns the price of `qty` units, or `None` on overflow.
    #[must_use]
    pub fn checked_mul(self, qty: u32) -> Option<Self> {
        self.0.checked_mul(i64::from(qty)).map(Self)
    }

    /// Returns `self + rhs`, or `None` on overflow.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Returns the mean amount over `count` items, in currency units.
    ///
    /// An empty set averages to zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average(self, count: u64) -> f64 {
        if count == 0 {
            return 0.0;
        }
        self.0 as f64 / count as f64 / 100.0
    }
}

impl Debug for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        let amount = format!("{sign}{}.{:02}", cents / 100, cents % 100);
        f.pad(&amount)
    }
}

impl FromStr for Money {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let Some(caps) = AMOUNT.captures(s) else {
            bail!("not a monetary amount: {s:?}");
        };
        let units: i64 = caps[1]
            .replace(',', "")
            .parse()
            .with_context(|| format!("amount out of range: {s:?}"))?;
        let frac = caps.get(2).map_or("", |m| m.as_str()).as_bytes();
        let digit = |i: usize| frac.get(i).map_or(0, |d| i64::from(d - b'0'));
        let mut cents = digit(0) * 10 + digit(1);
        if digit(2) >= 5 {
            cents += 1;
        }
        let Some(total) = units.checked_mul(100).and_then(|u| u.checked_add(cents)) else {
            bail!("amount out of range: {s:?}");
        };
        Ok(Self(total))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.0.unsigned_abs() <= Self::MAX_EXACT_F64 {
            serializer.serialize_f64(self.as_f64())
        } else {
            serializer.collect_str(self)
        }
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct AmountVisitor;

        impl de::Visitor<'_> for AmountVisitor {
            type Value = Money;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a monetary amount")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Money, E> {
                Money::from_f64(v).ok_or_else(|| E::custom(format!("amount out of range: {v}")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Money, E> {
                v.checked_mul(100)
                    .map(Money)
                    .ok_or_else(|| E::custom(format!("amount out of range: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Money, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Money, E> {
                i64::try_from(v)
                    .map_err(E::custom)
                    .and_then(|v| self.visit_i64(v))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
