use crate::engine::error::EngineError;
use crate::time::period::Period;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Wire-level contract payload, shaped exactly like the body the UI posts to
/// `/contracts/allocate`. Untrusted until `validate_and_into_contract` runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractIn {
    pub contract_id: String,
    pub customer: String,
    pub transaction_price: Decimal,
    pub pos: Vec<PerformanceObligationIn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission: Option<CommissionPlanIn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceObligationIn {
    pub po_id: String,
    #[serde(default)]
    pub description: String,
    pub ssp: Decimal,
    pub method: RecognitionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub params: PoParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionMethod {
    PointInTime,
    StraightLine,
    Milestone,
    PercentComplete,
    Usage,
}

impl RecognitionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PointInTime => "point_in_time",
            Self::StraightLine => "straight_line",
            Self::Milestone => "milestone",
            Self::PercentComplete => "percent_complete",
            Self::Usage => "usage",
        }
    }
}

/// Method-specific parameters. The UI posts the weight curve under `curve`,
/// `percent_complete`, or `usage` depending on the page; all land here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoParams {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub milestones: Vec<MilestoneIn>,
    #[serde(
        default,
        alias = "percent_complete",
        alias = "usage",
        skip_serializing_if = "Option::is_none"
    )]
    pub curve: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneIn {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub percent_of_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub met_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionPlanIn {
    pub total_commission: Decimal,
    #[serde(default = "default_benefit_months")]
    pub benefit_months: u32,
    #[serde(default)]
    pub practical_expedient_1yr: bool,
}

fn default_benefit_months() -> u32 {
    12
}

/// Validated contract ready for the engine. `transaction_price` is treated
/// as immutable from here on; a changed price means a fresh allocation run.
#[derive(Debug, Clone)]
pub struct Contract {
    pub contract_id: String,
    pub customer: String,
    pub transaction_price: Decimal,
    pub pos: Vec<PerformanceObligation>,
    pub commission: Option<CommissionPlan>,
}

#[derive(Debug, Clone)]
pub struct PerformanceObligation {
    pub po_id: String,
    pub description: String,
    pub ssp: Decimal,
    pub recognition: Recognition,
}

/// Closed set of recognition methods, each carrying only the parameters it
/// actually needs. Building this at the boundary removes the missing-field
/// checks the methods would otherwise repeat.
#[derive(Debug, Clone)]
pub enum Recognition {
    PointInTime { at: Period },
    StraightLine { start: Period, end: Period },
    Milestone { milestones: Vec<Milestone> },
    PercentComplete { start: Period, weights: Vec<f64> },
    Usage { start: Period, weights: Vec<f64> },
}

impl Recognition {
    /// First period this obligation recognizes into, when one is knowable
    /// up front. Used to anchor commission amortization.
    pub fn start_period(&self) -> Option<Period> {
        match self {
            Self::PointInTime { at } => Some(*at),
            Self::StraightLine { start, .. } => Some(*start),
            Self::PercentComplete { start, .. } | Self::Usage { start, .. } => Some(*start),
            Self::Milestone { milestones } => milestones.iter().map(|m| m.met).min(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Milestone {
    pub id: String,
    pub percent_of_price: f64,
    pub met: Period,
}

#[derive(Debug, Clone)]
pub struct CommissionPlan {
    pub total_commission: Decimal,
    pub benefit_months: u32,
    pub practical_expedient_1yr: bool,
}

impl ContractIn {
    pub fn validate_and_into_contract(self) -> Result<Contract, EngineError> {
        let contract_id = self.contract_id.trim().to_string();
        if contract_id.is_empty() {
            return Err(EngineError::validation("contract_id must be non-empty"));
        }

        if self.transaction_price <= Decimal::ZERO {
            return Err(EngineError::validation(format!(
                "transaction_price must be positive (got {})",
                self.transaction_price
            )));
        }

        if self.pos.is_empty() {
            return Err(EngineError::validation(
                "contract must have at least one performance obligation",
            ));
        }

        let mut seen_ids = BTreeSet::<String>::new();
        let mut pos = Vec::with_capacity(self.pos.len());
        for po in self.pos {
            pos.push(po.validate_and_into_obligation(&mut seen_ids)?);
        }

        let commission = match self.commission {
            Some(plan) => Some(plan.validate_and_into_plan()?),
            None => None,
        };

        Ok(Contract {
            contract_id,
            customer: self.customer.trim().to_string(),
            transaction_price: self.transaction_price,
            pos,
            commission,
        })
    }
}

impl PerformanceObligationIn {
    fn validate_and_into_obligation(
        self,
        seen_ids: &mut BTreeSet<String>,
    ) -> Result<PerformanceObligation, EngineError> {
        let po_id = self.po_id.trim().to_string();
        if po_id.is_empty() {
            return Err(EngineError::validation("po_id must be non-empty"));
        }
        if !seen_ids.insert(po_id.clone()) {
            return Err(EngineError::validation(format!("duplicate po_id: {po_id}")));
        }

        if self.ssp < Decimal::ZERO {
            return Err(EngineError::validation(format!(
                "ssp must be non-negative for {po_id} (got {})",
                self.ssp
            )));
        }

        let recognition = match self.method {
            RecognitionMethod::PointInTime => {
                let at = require_date(&po_id, "start_date", self.start_date)?;
                Recognition::PointInTime {
                    at: Period::from_date(at),
                }
            }
            RecognitionMethod::StraightLine => {
                let start = require_date(&po_id, "start_date", self.start_date)?;
                let end = require_date(&po_id, "end_date", self.end_date)?;
                let (start, end) = (Period::from_date(start), Period::from_date(end));
                if end < start {
                    return Err(EngineError::validation(format!(
                        "end_date precedes start_date for {po_id} ({end} < {start})"
                    )));
                }
                Recognition::StraightLine { start, end }
            }
            RecognitionMethod::Milestone => {
                if self.params.milestones.is_empty() {
                    return Err(EngineError::validation(format!(
                        "milestone method requires params.milestones for {po_id}"
                    )));
                }
                let mut milestones = Vec::with_capacity(self.params.milestones.len());
                for m in self.params.milestones {
                    milestones.push(m.validate_and_into_milestone(&po_id)?);
                }
                Recognition::Milestone { milestones }
            }
            RecognitionMethod::PercentComplete | RecognitionMethod::Usage => {
                let start = require_date(&po_id, "start_date", self.start_date)?;
                let weights = self.params.curve.ok_or_else(|| {
                    EngineError::validation(format!(
                        "{} method requires a weight curve for {po_id}",
                        self.method.as_str()
                    ))
                })?;
                if weights.is_empty() {
                    return Err(EngineError::validation(format!(
                        "weight curve must be non-empty for {po_id}"
                    )));
                }
                let start = Period::from_date(start);
                match self.method {
                    RecognitionMethod::PercentComplete => {
                        Recognition::PercentComplete { start, weights }
                    }
                    _ => Recognition::Usage { start, weights },
                }
            }
        };

        Ok(PerformanceObligation {
            po_id,
            description: self.description.trim().to_string(),
            ssp: self.ssp,
            recognition,
        })
    }
}

impl MilestoneIn {
    fn validate_and_into_milestone(self, po_id: &str) -> Result<Milestone, EngineError> {
        let id = self.id.trim().to_string();
        if id.is_empty() {
            return Err(EngineError::validation(format!(
                "milestone id must be non-empty for {po_id}"
            )));
        }
        if !(0.0..=1.0).contains(&self.percent_of_price) {
            return Err(EngineError::validation(format!(
                "percent_of_price must be between 0 and 1 for milestone {id} (got {})",
                self.percent_of_price
            )));
        }
        let met = self.met_date.ok_or_else(|| {
            EngineError::validation(format!("milestone {id} is missing met_date"))
        })?;
        Ok(Milestone {
            id,
            percent_of_price: self.percent_of_price,
            met: Period::from_date(met),
        })
    }
}

impl CommissionPlanIn {
    fn validate_and_into_plan(self) -> Result<CommissionPlan, EngineError> {
        if self.total_commission < Decimal::ZERO {
            return Err(EngineError::validation(format!(
                "total_commission must be non-negative (got {})",
                self.total_commission
            )));
        }
        if self.benefit_months == 0 {
            return Err(EngineError::validation("benefit_months must be > 0"));
        }
        Ok(CommissionPlan {
            total_commission: self.total_commission,
            benefit_months: self.benefit_months,
            practical_expedient_1yr: self.practical_expedient_1yr,
        })
    }
}

fn require_date(
    po_id: &str,
    field: &str,
    value: Option<NaiveDate>,
) -> Result<NaiveDate, EngineError> {
    value.ok_or_else(|| EngineError::validation(format!("{field} is required for {po_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn straight_line_po() -> serde_json::Value {
        json!({
            "po_id": "PO-1",
            "description": "SaaS 12m",
            "ssp": 20000,
            "method": "straight_line",
            "start_date": "2025-01-01",
            "end_date": "2025-12-01",
        })
    }

    #[test]
    fn accepts_the_ui_payload_shape() {
        let body = json!({
            "contract_id": "C-EX-001",
            "customer": "SampleCo",
            "transaction_price": 50000,
            "pos": [
                straight_line_po(),
                {
                    "po_id": "PO-2",
                    "description": "Implementation",
                    "ssp": 30000,
                    "method": "milestone",
                    "params": { "milestones": [
                        { "id": "M1", "percent_of_price": 0.5, "met_date": "2025-03-01" },
                        { "id": "M2", "percent_of_price": 0.5, "met_date": "2025-06-01" },
                    ]},
                },
            ],
        });
        let parsed: ContractIn = serde_json::from_value(body).unwrap();
        let contract = parsed.validate_and_into_contract().unwrap();
        assert_eq!(contract.pos.len(), 2);
        assert!(matches!(
            contract.pos[1].recognition,
            Recognition::Milestone { .. }
        ));
    }

    #[test]
    fn curve_accepts_percent_complete_alias() {
        let body = json!({
            "po_id": "PO-1",
            "description": "",
            "ssp": 100,
            "method": "percent_complete",
            "start_date": "2025-01-01",
            "params": { "percent_complete": [0.3, 0.5, 0.2] },
        });
        let parsed: PerformanceObligationIn = serde_json::from_value(body).unwrap();
        let po = parsed
            .validate_and_into_obligation(&mut BTreeSet::new())
            .unwrap();
        match po.recognition {
            Recognition::PercentComplete { weights, .. } => assert_eq!(weights.len(), 3),
            other => panic!("unexpected recognition: {other:?}"),
        }
    }

    #[test]
    fn rejects_non_positive_transaction_price() {
        let body = json!({
            "contract_id": "C-1",
            "customer": "X",
            "transaction_price": 0,
            "pos": [straight_line_po()],
        });
        let parsed: ContractIn = serde_json::from_value(body).unwrap();
        let err = parsed.validate_and_into_contract().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn rejects_empty_pos() {
        let body = json!({
            "contract_id": "C-1",
            "customer": "X",
            "transaction_price": 100,
            "pos": [],
        });
        let parsed: ContractIn = serde_json::from_value(body).unwrap();
        assert!(parsed.validate_and_into_contract().is_err());
    }

    #[test]
    fn rejects_duplicate_po_ids() {
        let body = json!({
            "contract_id": "C-1",
            "customer": "X",
            "transaction_price": 100,
            "pos": [straight_line_po(), straight_line_po()],
        });
        let parsed: ContractIn = serde_json::from_value(body).unwrap();
        let err = parsed.validate_and_into_contract().unwrap_err();
        assert_eq!(
            err,
            EngineError::Validation("duplicate po_id: PO-1".to_string())
        );
    }

    #[test]
    fn rejects_straight_line_without_dates() {
        let body = json!({
            "po_id": "PO-1",
            "description": "",
            "ssp": 100,
            "method": "straight_line",
            "start_date": "2025-01-01",
        });
        let parsed: PerformanceObligationIn = serde_json::from_value(body).unwrap();
        let err = parsed
            .validate_and_into_obligation(&mut BTreeSet::new())
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn rejects_end_before_start() {
        let body = json!({
            "po_id": "PO-1",
            "description": "",
            "ssp": 100,
            "method": "straight_line",
            "start_date": "2025-06-01",
            "end_date": "2025-01-01",
        });
        let parsed: PerformanceObligationIn = serde_json::from_value(body).unwrap();
        assert!(parsed
            .validate_and_into_obligation(&mut BTreeSet::new())
            .is_err());
    }

    #[test]
    fn rejects_milestone_without_met_date() {
        let body = json!({
            "po_id": "PO-1",
            "description": "",
            "ssp": 100,
            "method": "milestone",
            "params": { "milestones": [
                { "id": "M1", "percent_of_price": 1.0 },
            ]},
        });
        let parsed: PerformanceObligationIn = serde_json::from_value(body).unwrap();
        assert!(parsed
            .validate_and_into_obligation(&mut BTreeSet::new())
            .is_err());
    }

    #[test]
    fn milestone_start_period_is_earliest_met_date() {
        let recognition = Recognition::Milestone {
            milestones: vec![
                Milestone {
                    id: "M2".into(),
                    percent_of_price: 0.5,
                    met: Period::new(2025, 6).unwrap(),
                },
                Milestone {
                    id: "M1".into(),
                    percent_of_price: 0.5,
                    met: Period::new(2025, 3).unwrap(),
                },
            ],
        };
        assert_eq!(recognition.start_period(), Period::new(2025, 3));
    }
}
