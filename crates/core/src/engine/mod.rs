pub mod allocate;
pub mod amortize;
pub mod error;
pub mod schedule;

use crate::domain::allocation::{AllocationOutcome, Schedule};
use crate::domain::contract::{CommissionPlan, Contract, PerformanceObligation};
use crate::engine::error::EngineError;
use std::collections::BTreeMap;

/// Runs the full pipeline for one contract: relative-SSP allocation, then a
/// recognition schedule per obligation, then commission amortization when a
/// plan is present. Fails as a whole; a partial schedule set would break the
/// invariant that all schedules together sum to the transaction price.
pub fn allocate_and_schedule(contract: &Contract) -> Result<AllocationOutcome, EngineError> {
    tracing::debug!(
        contract_id = %contract.contract_id,
        transaction_price = %contract.transaction_price,
        pos = contract.pos.len(),
        "allocation run"
    );
    let allocated = allocate::allocate_relative_ssp(contract.transaction_price, &contract.pos)?;

    let mut schedules = BTreeMap::new();
    for (po, alloc) in contract.pos.iter().zip(&allocated) {
        let schedule = schedule::generate_schedule(alloc.allocated_price, &po.recognition)?;
        schedules.insert(po.po_id.clone(), schedule);
    }

    let commission_schedule = match &contract.commission {
        Some(plan) => Some(commission_schedule(plan, &contract.pos)?),
        None => None,
    };

    Ok(AllocationOutcome {
        allocated,
        schedules,
        commission_schedule,
    })
}

/// ASC 340-40 commission treatment: expensed in the first recognition month
/// under the one-year practical expedient, otherwise amortized straight-line
/// over the benefit period.
fn commission_schedule(
    plan: &CommissionPlan,
    pos: &[PerformanceObligation],
) -> Result<Schedule, EngineError> {
    let start = pos
        .iter()
        .find_map(|po| po.recognition.start_period())
        .ok_or_else(|| {
            EngineError::validation(
                "commission amortization requires at least one dated performance obligation",
            )
        })?;

    if plan.benefit_months <= 12 && plan.practical_expedient_1yr {
        return Ok(BTreeMap::from([(start, plan.total_commission)]));
    }

    let mut end = start;
    for _ in 1..plan.benefit_months {
        end = end.succ();
    }
    schedule::straight_line(plan.total_commission, start, end)
}
