//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Splitting $10.00 three ways:                                           │
//! │    $3.33 × 3 = $9.99  → Lost $0.01!                                    │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units + explicit allocation                │
//! │    1000 cents / 3 = [334, 333, 333]  (see allocation.rs)               │
//! │    Every cent is accounted for                                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Currency Safety
//! A `Money` value always carries its currency. Combining two values with
//! different currencies is an error, never a silent conversion:
//!
//! ```rust
//! use meridian_core::money::{Currency, Money};
//!
//! let a = Money::new(500, Currency::Usd);
//! let b = Money::new(650, Currency::Usd);
//! assert_eq!(a.checked_add(b).unwrap().amount(), 1150);
//!
//! let eur = Money::new(100, Currency::Eur);
//! assert!(a.checked_add(eur).is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Mul;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};

// =============================================================================
// Currency
// =============================================================================

/// ISO-4217 currency codes accepted by the back office.
///
/// Conversion between currencies is out of scope; the code only guards
/// arithmetic and tells the display layer how many minor units to expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
    Mxn,
    Jpy,
}

impl Currency {
    /// Returns the three-letter ISO code.
    pub const fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
            Currency::Mxn => "MXN",
            Currency::Jpy => "JPY",
        }
    }

    /// Number of minor units per major unit, as a power of ten.
    pub const fn minor_digits(&self) -> u32 {
        match self {
            Currency::Jpy => 0,
            _ => 2,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "CAD" => Ok(Currency::Cad),
            "AUD" => Ok(Currency::Aud),
            "MXN" => Ok(Currency::Mxn),
            "JPY" => Ok(Currency::Jpy),
            other => Err(ValidationError::InvalidFormat {
                field: "currency".to_string(),
                reason: format!("unsupported currency code '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents for USD).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for refunds and drawer payouts
/// - **Currency travels with the amount**: mixing currencies is a typed error
/// - **No `Add`/`Sub` operators**: they cannot report a currency mismatch, so
///   arithmetic goes through `checked_add` / `checked_sub`
///
/// ## Where Money is Used
/// ```text
/// ItemVariation.price ──► OrderItem.base_price ──► OrderItem.gross_sales
///                                                        │
///            discount / tax allocation (calculator.rs) ◄─┘
///                                                        │
///                              Order.total_amount ◄──────┘ ──► Payment
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money {
    amount: i64,
    currency: Currency,
}

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ```rust
    /// use meridian_core::money::{Currency, Money};
    ///
    /// let price = Money::new(1099, Currency::Usd); // $10.99
    /// assert_eq!(price.amount(), 1099);
    /// ```
    #[inline]
    pub const fn new(amount: i64, currency: Currency) -> Self {
        Money { amount, currency }
    }

    /// Zero in the given currency.
    #[inline]
    pub const fn zero(currency: Currency) -> Self {
        Money::new(0, currency)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn amount(&self) -> i64 {
        self.amount
    }

    /// Returns the currency.
    #[inline]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.amount == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.amount > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.amount < 0
    }

    /// Fails with `CurrencyMismatch` unless `other` has the same currency.
    pub fn ensure_same_currency(&self, other: &Money) -> CoreResult<()> {
        if self.currency != other.currency {
            return Err(CoreError::CurrencyMismatch {
                expected: self.currency,
                found: other.currency,
            });
        }
        Ok(())
    }

    /// Adds two values of the same currency.
    pub fn checked_add(self, other: Money) -> CoreResult<Money> {
        self.ensure_same_currency(&other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(CoreError::AmountOverflow)?;
        Ok(Money::new(amount, self.currency))
    }

    /// Subtracts `other` from `self` (same currency).
    pub fn checked_sub(self, other: Money) -> CoreResult<Money> {
        self.ensure_same_currency(&other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or(CoreError::AmountOverflow)?;
        Ok(Money::new(amount, self.currency))
    }

    /// Multiplies the amount by a quantity.
    ///
    /// ```rust
    /// use meridian_core::money::{Currency, Money};
    ///
    /// let unit_price = Money::new(299, Currency::Usd);
    /// assert_eq!(unit_price.multiply_quantity(3).unwrap().amount(), 897);
    /// ```
    pub fn multiply_quantity(self, qty: i64) -> CoreResult<Money> {
        let amount = self
            .amount
            .checked_mul(qty)
            .ok_or(CoreError::AmountOverflow)?;
        Ok(Money::new(amount, self.currency))
    }

    /// Applies a percentage and rounds half away from zero.
    ///
    /// ## Implementation
    /// Integer math on basis points: `(amount * bps ± 5000) / 10000`, in
    /// i128 so large orders cannot overflow mid-calculation.
    ///
    /// ```rust
    /// use meridian_core::money::{Currency, Money, Percentage};
    ///
    /// let subtotal = Money::new(300, Currency::Usd);
    /// let discount = subtotal.percentage_of(Percentage::from_bps(3300)); // 33%
    /// assert_eq!(discount.amount(), 99);
    /// ```
    pub fn percentage_of(&self, pct: Percentage) -> Money {
        Money::new(round_bps(self.amount as i128 * pct.bps() as i128), self.currency)
    }

    /// Sums an iterator of values that must all be in `currency`.
    pub fn sum<I>(currency: Currency, values: I) -> CoreResult<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        values
            .into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
    }
}

/// Divides a value scaled by basis points back to minor units, rounding half
/// away from zero.
fn round_bps(scaled: i128) -> i64 {
    let rounded = if scaled >= 0 {
        (scaled + 5000) / 10000
    } else {
        (scaled - 5000) / 10000
    };
    rounded as i64
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.amount < 0 { "-" } else { "" };
        let digits = self.currency.minor_digits();
        if digits == 0 {
            return write!(f, "{}{} {}", sign, self.amount.abs(), self.currency);
        }
        let scale = 10_i64.pow(digits);
        write!(
            f,
            "{}{}.{:0width$} {}",
            sign,
            (self.amount / scale).abs(),
            (self.amount % scale).abs(),
            self.currency,
            width = digits as usize
        )
    }
}

/// Multiplication by a quantity for call sites that already proved the
/// product fits (tests, seeding). Prefer `multiply_quantity` elsewhere.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money::new(self.amount * qty, self.currency)
    }
}

// =============================================================================
// Percentage
// =============================================================================

/// A rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000. `825` bps = 8.25%. Storing the rate as an
/// integer keeps tax and discount math exact until the single rounding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Percentage(u32);

impl Percentage {
    /// Largest accepted rate (100%).
    pub const MAX_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percentage(bps)
    }

    /// Parses a decimal percentage string such as `"8.25"` or `"10"`.
    ///
    /// Catalog percentages arrive as strings from the HTTP layer; parsing them
    /// here avoids a round trip through `f64`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidFormat {
            field: "percentage".to_string(),
            reason: format!("'{}' is not a percentage with at most two decimals", s),
        };
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() || frac.len() > 2 {
            return Err(invalid());
        }
        let whole: u32 = whole.parse().map_err(|_| invalid())?;
        let frac: u32 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<2}", frac);
            padded.parse().map_err(|_| invalid())?
        };
        let bps = whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(invalid)?;
        if bps > Self::MAX_BPS {
            return Err(ValidationError::OutOfRange {
                field: "percentage".to_string(),
                min: 0,
                max: 100,
            });
        }
        Ok(Percentage(bps))
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
