//! Money primitives
//!
//! Amounts are `i64` minor units (kuruş, cents) paired with an ISO-4217
//! code. Commission rates are exact decimals; no float ever touches money.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::shared::errors::DomainError;

/// Validate and normalise an ISO-4217 currency code ("try" → "TRY").
pub fn normalize_currency(code: &str) -> Result<String, DomainError> {
    let code = code.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(DomainError::Validation(format!(
            "currency must be a 3-letter ISO-4217 code, got '{}'",
            code
        )))
    }
}

/// Tenant commission as a percentage in `[0, 100]`, e.g. `5.0` for 5%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct CommissionRate(Decimal);

impl CommissionRate {
    pub fn new(percent: Decimal) -> Result<Self, DomainError> {
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(DomainError::Validation(format!(
                "commission rate must be within [0, 100], got {}",
                percent
            )));
        }
        Ok(Self(percent.normalize()))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn percent(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for CommissionRate {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CommissionRate> for Decimal {
    fn from(rate: CommissionRate) -> Self {
        rate.0
    }
}

impl std::str::FromStr for CommissionRate {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<Decimal>()
            .map_err(|e| DomainError::Validation(format!("invalid commission rate '{}': {}", s, e)))?;
        Self::new(value)
    }
}

impl std::fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of splitting a captured total between tenant and platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
    pub total_amount_minor: i64,
    pub kyradi_commission_minor: i64,
    pub tenant_settlement_minor: i64,
}

/// Split `total_amount_minor` at `rate`.
///
/// Commission is floored to the minor unit and the remainder goes to the
/// tenant, so `tenant + commission == total` holds exactly.
pub fn split_commission(
    total_amount_minor: i64,
    rate: CommissionRate,
) -> Result<CommissionSplit, DomainError> {
    if total_amount_minor < 0 {
        return Err(DomainError::Validation(format!(
            "cannot settle a negative total ({})",
            total_amount_minor
        )));
    }

    let commission = (Decimal::from(total_amount_minor) * rate.percent() / Decimal::ONE_HUNDRED)
        .floor()
        .to_i64()
        .ok_or_else(|| {
            DomainError::Validation(format!(
                "commission on {} at {}% is out of range",
                total_amount_minor, rate
            ))
        })?;

    Ok(CommissionSplit {
        total_amount_minor,
        kyradi_commission_minor: commission,
        tenant_settlement_minor: total_amount_minor - commission,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn rate(s: &str) -> CommissionRate {
        s.parse().unwrap()
    }

    #[test]
    fn five_percent_of_five_thousand_try() {
        let split = split_commission(500_000, rate("5.0")).unwrap();
        assert_eq!(split.kyradi_commission_minor, 25_000);
        assert_eq!(split.tenant_settlement_minor, 475_000);
    }

    #[test]
    fn fractional_commission_is_floored_remainder_to_tenant() {
        // 7.5% of 999 = 74.925
        let split = split_commission(999, rate("7.5")).unwrap();
        assert_eq!(split.kyradi_commission_minor, 74);
        assert_eq!(split.tenant_settlement_minor, 925);
    }

    #[test]
    fn zero_and_full_rates() {
        let none = split_commission(12_345, CommissionRate::zero()).unwrap();
        assert_eq!(none.kyradi_commission_minor, 0);
        assert_eq!(none.tenant_settlement_minor, 12_345);

        let all = split_commission(12_345, rate("100")).unwrap();
        assert_eq!(all.kyradi_commission_minor, 12_345);
        assert_eq!(all.tenant_settlement_minor, 0);
    }

    #[test]
    fn rate_outside_range_is_rejected() {
        assert!(matches!("100.01".parse::<CommissionRate>(), Err(DomainError::Validation(_))));
        assert!(matches!("-1".parse::<CommissionRate>(), Err(DomainError::Validation(_))));
        assert!(matches!("abc".parse::<CommissionRate>(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn negative_total_is_rejected() {
        assert!(split_commission(-1, rate("5")).is_err());
    }

    #[test]
    fn currency_codes_are_normalised() {
        assert_eq!(normalize_currency(" try ").unwrap(), "TRY");
        assert!(normalize_currency("TL").is_err());
        assert!(normalize_currency("EU1").is_err());
    }

    #[test]
    fn rate_serializes_as_decimal_string() {
        let json = serde_json::to_string(&rate("5.25")).unwrap();
        assert_eq!(json, "\"5.25\"");
        let back: CommissionRate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rate("5.25"));
        assert!(serde_json::from_str::<CommissionRate>("\"150\"").is_err());
    }

    proptest! {
        #[test]
        fn split_always_sums_to_total(
            total in 0i64..=1_000_000_000_000i64,
            basis_points in 0i64..=10_000i64,
        ) {
            let rate = CommissionRate::new(Decimal::new(basis_points, 2)).unwrap();
            let split = split_commission(total, rate).unwrap();
            prop_assert_eq!(split.tenant_settlement_minor + split.kyradi_commission_minor, total);
            prop_assert!(split.kyradi_commission_minor >= 0);
            prop_assert!(split.tenant_settlement_minor >= 0);
            prop_assert!(split.kyradi_commission_minor <= total);
        }
    }
}
