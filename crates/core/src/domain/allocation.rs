use crate::time::period::Period;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Period-keyed recognized amounts for one performance obligation. Values
/// sum exactly to the obligation's allocated price.
pub type Schedule = BTreeMap<Period, Decimal>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub po_id: String,
    pub ssp: Decimal,
    pub allocated_price: Decimal,
}

/// Combined result of one allocation run: per-PO allocated prices plus the
/// recognition schedule for each, and the commission amortization schedule
/// when the contract carries a commission plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub allocated: Vec<Allocation>,
    pub schedules: BTreeMap<String, Schedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_schedule: Option<Schedule>,
}
