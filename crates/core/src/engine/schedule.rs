use crate::domain::allocation::Schedule;
use crate::domain::contract::{Milestone, Recognition};
use crate::engine::allocate::CURRENCY_DP;
use crate::engine::error::EngineError;
use crate::time::period::Period;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Tolerance for weight curves and milestone percentages that must sum to 1.
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Produces the period-keyed recognition schedule for one allocated amount.
/// Whatever the method, the schedule's values sum exactly to
/// `allocated_price`; the last bucket in method order absorbs rounding.
pub fn generate_schedule(
    allocated_price: Decimal,
    recognition: &Recognition,
) -> Result<Schedule, EngineError> {
    let schedule = match recognition {
        Recognition::PointInTime { at } => point_in_time(allocated_price, *at),
        Recognition::StraightLine { start, end } => straight_line(allocated_price, *start, *end)?,
        Recognition::Milestone { milestones } => milestone(allocated_price, milestones)?,
        Recognition::PercentComplete { start, weights }
        | Recognition::Usage { start, weights } => weighted(allocated_price, *start, weights)?,
    };

    let total: Decimal = schedule.values().copied().sum();
    if total != allocated_price {
        return Err(EngineError::ArithmeticConsistency(format!(
            "schedule sums to {total}, expected {allocated_price}"
        )));
    }
    Ok(schedule)
}

fn point_in_time(price: Decimal, at: Period) -> Schedule {
    BTreeMap::from([(at, price)])
}

pub(crate) fn straight_line(
    price: Decimal,
    start: Period,
    end: Period,
) -> Result<Schedule, EngineError> {
    if end < start {
        return Err(EngineError::validation(format!(
            "straight_line end period {end} precedes start {start}"
        )));
    }
    let n = start.months_through(end);
    let per = (price / Decimal::from(n)).round_dp(CURRENCY_DP);

    let mut out = BTreeMap::new();
    let mut run = Decimal::ZERO;
    for (i, period) in start.iter_months(n as usize).enumerate() {
        let amount = if (i as i64) + 1 == n { price - run } else { per };
        run += amount;
        out.insert(period, amount);
    }
    Ok(out)
}

fn milestone(price: Decimal, milestones: &[Milestone]) -> Result<Schedule, EngineError> {
    if milestones.is_empty() {
        return Err(EngineError::validation("milestone list is empty"));
    }
    let total_pct: f64 = milestones.iter().map(|m| m.percent_of_price).sum();
    if (total_pct - 1.0).abs() > WEIGHT_EPSILON {
        return Err(EngineError::validation(format!(
            "milestone percentages must sum to 1.0 (got {total_pct})"
        )));
    }

    let mut out: Schedule = BTreeMap::new();
    let mut run = Decimal::ZERO;
    for (i, m) in milestones.iter().enumerate() {
        let amount = if i + 1 == milestones.len() {
            price - run
        } else {
            (price * decimal_weight(m.percent_of_price)?).round_dp(CURRENCY_DP)
        };
        run += amount;
        // Milestones met in the same month share one bucket.
        *out.entry(m.met).or_insert(Decimal::ZERO) += amount;
    }
    Ok(out)
}

fn weighted(price: Decimal, start: Period, weights: &[f64]) -> Result<Schedule, EngineError> {
    if weights.is_empty() {
        return Err(EngineError::validation("weight curve is empty"));
    }
    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(EngineError::validation(format!(
            "weight curve contains an invalid entry: {w}"
        )));
    }
    let total: f64 = weights.iter().sum();
    if (total - 1.0).abs() > WEIGHT_EPSILON {
        return Err(EngineError::validation(format!(
            "weight curve must sum to 1.0 (got {total})"
        )));
    }

    let mut out = BTreeMap::new();
    let mut run = Decimal::ZERO;
    let n = weights.len();
    for (i, (period, w)) in start.iter_months(n).zip(weights).enumerate() {
        let amount = if i + 1 == n {
            price - run
        } else {
            (price * decimal_weight(*w)?).round_dp(CURRENCY_DP)
        };
        run += amount;
        out.insert(period, amount);
    }
    Ok(out)
}

fn decimal_weight(w: f64) -> Result<Decimal, EngineError> {
    Decimal::from_f64(w)
        .ok_or_else(|| EngineError::validation(format!("weight {w} is not representable")))
}
