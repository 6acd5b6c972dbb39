use crate::domain::allocation::Allocation;
use crate::domain::contract::PerformanceObligation;
use crate::engine::error::EngineError;
use rust_decimal::Decimal;

/// Decimal places of the currency's minimum unit.
pub const CURRENCY_DP: u32 = 2;

/// Relative-SSP allocation: each obligation gets its proportional share of
/// the transaction price, rounded to the currency unit, with the last-listed
/// obligation absorbing the rounding residual so the total ties out exactly.
pub fn allocate_relative_ssp(
    transaction_price: Decimal,
    pos: &[PerformanceObligation],
) -> Result<Vec<Allocation>, EngineError> {
    if transaction_price <= Decimal::ZERO {
        return Err(EngineError::validation(format!(
            "transaction_price must be positive (got {transaction_price})"
        )));
    }
    if pos.is_empty() {
        return Err(EngineError::validation(
            "cannot allocate a contract with no performance obligations",
        ));
    }
    if let Some(po) = pos.iter().find(|po| po.ssp < Decimal::ZERO) {
        return Err(EngineError::validation(format!(
            "ssp must be non-negative for {} (got {})",
            po.po_id, po.ssp
        )));
    }

    let total_ssp: Decimal = pos.iter().map(|po| po.ssp).sum();
    if total_ssp.is_zero() && pos.len() > 1 {
        return Err(EngineError::validation(
            "all SSPs are zero; relative allocation has no base",
        ));
    }

    let mut out = Vec::with_capacity(pos.len());
    let mut run = Decimal::ZERO;
    for (i, po) in pos.iter().enumerate() {
        // A sole obligation takes the full price, zero SSP included.
        let allocated_price = if i + 1 == pos.len() {
            transaction_price - run
        } else {
            (transaction_price * po.ssp / total_ssp).round_dp(CURRENCY_DP)
        };
        run += allocated_price;
        out.push(Allocation {
            po_id: po.po_id.clone(),
            ssp: po.ssp,
            allocated_price,
        });
    }

    let total: Decimal = out.iter().map(|a| a.allocated_price).sum();
    if total != transaction_price {
        return Err(EngineError::ArithmeticConsistency(format!(
            "allocated amounts sum to {total}, expected {transaction_price}"
        )));
    }
    Ok(out)
}
