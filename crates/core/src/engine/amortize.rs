use crate::engine::allocate::CURRENCY_DP;
use crate::engine::error::EngineError;
use crate::time::period::Period;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmortizationMethod {
    StraightLine,
    PercentComplete,
    CustomCurve,
}

impl AmortizationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StraightLine => "straight_line",
            Self::PercentComplete => "percent_complete",
            Self::CustomCurve => "custom_curve",
        }
    }
}

/// One month of the cost rollforward. `opening` and `closing` track the
/// unamortized balance; the final row closes at exactly 0.00.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationRow {
    pub period: u32,
    pub date: Period,
    pub opening: Decimal,
    pub amortization: Decimal,
    pub closing: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationResult {
    pub method: AmortizationMethod,
    pub rows: Vec<AmortizationRow>,
    pub total_amortization: Decimal,
}

/// Weighted cost amortization with a running-balance view. Weights are
/// normalized by their sum, so a curve does not need to add up to 1; the
/// rounding drift folds into the last row.
pub fn amortize_cost(
    total: Decimal,
    months: u32,
    start: Period,
    method: AmortizationMethod,
    curve: Option<&[f64]>,
) -> Result<AmortizationResult, EngineError> {
    if months == 0 {
        return Err(EngineError::validation("months must be > 0"));
    }
    if total < Decimal::ZERO {
        return Err(EngineError::validation(format!(
            "total must be non-negative (got {total})"
        )));
    }

    let weights: Vec<f64> = match method {
        AmortizationMethod::StraightLine => vec![1.0; months as usize],
        AmortizationMethod::PercentComplete | AmortizationMethod::CustomCurve => {
            let curve = curve.ok_or_else(|| {
                EngineError::validation(format!(
                    "{} method requires a weight curve",
                    method.as_str()
                ))
            })?;
            if curve.len() != months as usize {
                return Err(EngineError::validation(format!(
                    "weight curve length {} does not match months {months}",
                    curve.len()
                )));
            }
            if let Some(w) = curve.iter().find(|w| !w.is_finite() || **w < 0.0) {
                return Err(EngineError::validation(format!(
                    "weight curve contains an invalid entry: {w}"
                )));
            }
            curve.to_vec()
        }
    };

    let weight_sum: f64 = weights.iter().sum();
    if weight_sum <= 0.0 {
        return Err(EngineError::validation(format!(
            "weights must sum to a positive value (got {weight_sum})"
        )));
    }

    let mut amounts = Vec::with_capacity(weights.len());
    for w in &weights {
        let share = Decimal::from_f64(w / weight_sum).ok_or_else(|| {
            EngineError::validation(format!("weight {w} is not representable"))
        })?;
        amounts.push((total * share).round_dp(CURRENCY_DP));
    }
    let drift = total - amounts.iter().copied().sum::<Decimal>();
    if !drift.is_zero() {
        if let Some(last) = amounts.last_mut() {
            *last += drift;
        }
    }
    // A sub-cent-per-month total can round every row up, leaving the drift
    // fold with a negative last amount. Push the deficit backward so every
    // row stays non-negative and the rollforward still closes at zero.
    let mut i = amounts.len() - 1;
    while amounts[i] < Decimal::ZERO && i > 0 {
        let deficit = amounts[i];
        amounts[i] = Decimal::ZERO;
        amounts[i - 1] += deficit;
        i -= 1;
    }

    let mut rows = Vec::with_capacity(amounts.len());
    let mut remaining = total;
    for (i, (date, amount)) in start.iter_months(amounts.len()).zip(amounts).enumerate() {
        let opening = remaining;
        let amortization = amount.min(opening);
        remaining = opening - amortization;
        rows.push(AmortizationRow {
            period: i as u32 + 1,
            date,
            opening,
            amortization,
            closing: remaining,
        });
    }

    if !remaining.is_zero() {
        return Err(EngineError::ArithmeticConsistency(format!(
            "rollforward left a residual balance of {remaining}"
        )));
    }

    let total_amortization = rows.iter().map(|r| r.amortization).sum();
    Ok(AmortizationResult {
        method,
        rows,
        total_amortization,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(year: i32, month: u32) -> Period {
        Period::new(year, month).unwrap()
    }

    #[test]
    fn straight_line_rollforward_closes_at_zero() {
        let res = amortize_cost(
            Decimal::from(2400),
            24,
            p(2025, 1),
            AmortizationMethod::StraightLine,
            None,
        )
        .unwrap();
        assert_eq!(res.rows.len(), 24);
        assert_eq!(res.rows[0].opening, Decimal::from(2400));
        assert_eq!(res.rows[0].amortization, Decimal::from(100));
        assert_eq!(res.rows[23].closing, Decimal::ZERO);
        assert_eq!(res.total_amortization, Decimal::from(2400));
    }

    #[test]
    fn drift_folds_into_last_row() {
        let res = amortize_cost(
            Decimal::from(1000),
            12,
            p(2025, 1),
            AmortizationMethod::StraightLine,
            None,
        )
        .unwrap();
        assert_eq!(res.rows[0].amortization, Decimal::new(8333, 2));
        assert_eq!(res.rows[11].amortization, Decimal::new(8337, 2));
        assert_eq!(res.rows[11].closing, Decimal::ZERO);
    }

    #[test]
    fn rows_carry_consecutive_months() {
        let res = amortize_cost(
            Decimal::from(300),
            3,
            p(2025, 11),
            AmortizationMethod::StraightLine,
            None,
        )
        .unwrap();
        let dates: Vec<_> = res.rows.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, vec!["2025-11", "2025-12", "2026-01"]);
        assert_eq!(res.rows[1].period, 2);
    }

    #[test]
    fn custom_curve_weights_are_normalized() {
        let res = amortize_cost(
            Decimal::from(1000),
            4,
            p(2025, 1),
            AmortizationMethod::CustomCurve,
            Some(&[1.0, 1.0, 1.0, 1.0]),
        )
        .unwrap();
        assert!(res.rows.iter().all(|r| r.amortization == Decimal::from(250)));
    }

    #[test]
    fn percent_complete_requires_matching_length() {
        let err = amortize_cost(
            Decimal::from(1000),
            3,
            p(2025, 1),
            AmortizationMethod::PercentComplete,
            Some(&[0.5, 0.5]),
        )
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn curve_methods_require_a_curve() {
        let err = amortize_cost(
            Decimal::from(1000),
            3,
            p(2025, 1),
            AmortizationMethod::CustomCurve,
            None,
        )
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn rejects_zero_months_and_negative_total() {
        assert!(amortize_cost(
            Decimal::from(100),
            0,
            p(2025, 1),
            AmortizationMethod::StraightLine,
            None,
        )
        .is_err());
        assert!(amortize_cost(
            Decimal::from(-1),
            3,
            p(2025, 1),
            AmortizationMethod::StraightLine,
            None,
        )
        .is_err());
    }

    #[test]
    fn rejects_all_zero_weights() {
        let err = amortize_cost(
            Decimal::from(100),
            2,
            p(2025, 1),
            AmortizationMethod::CustomCurve,
            Some(&[0.0, 0.0]),
        )
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn sub_cent_per_month_total_still_closes_at_zero() {
        // 0.10 over 12 months rounds every row up to 0.01; the overshoot
        // must be pushed back into earlier rows, not stranded at the end.
        let res = amortize_cost(
            Decimal::new(10, 2),
            12,
            p(2025, 1),
            AmortizationMethod::StraightLine,
            None,
        )
        .unwrap();
        assert_eq!(res.rows.len(), 12);
        assert!(res.rows.iter().all(|r| r.amortization >= Decimal::ZERO));
        assert_eq!(res.total_amortization, Decimal::new(10, 2));
        assert_eq!(res.rows[11].closing, Decimal::ZERO);
    }

    #[test]
    fn near_zero_trailing_weight_still_closes_at_zero() {
        // Eleven rows round up to 0.01 and the trailing weight rounds to
        // 0.00, so the drift fold alone would drive the last amount negative.
        let mut curve = vec![1.0; 11];
        curve.push(0.000001);
        let res = amortize_cost(
            Decimal::new(10, 2),
            12,
            p(2025, 1),
            AmortizationMethod::CustomCurve,
            Some(&curve),
        )
        .unwrap();
        assert!(res.rows.iter().all(|r| r.amortization >= Decimal::ZERO));
        assert_eq!(res.rows[11].closing, Decimal::ZERO);
        assert_eq!(res.total_amortization, Decimal::new(10, 2));
    }

    #[test]
    fn zero_total_amortizes_to_zero_rows() {
        let res = amortize_cost(
            Decimal::ZERO,
            2,
            p(2025, 1),
            AmortizationMethod::StraightLine,
            None,
        )
        .unwrap();
        assert!(res.rows.iter().all(|r| r.amortization.is_zero()));
        assert_eq!(res.total_amortization, Decimal::ZERO);
    }
}
