use chrono::NaiveDate;
use serde_json::json;

use crate::directory::{json_date, EntityKey, UpsertRequest};
use crate::domain::{EffectiveStatus, PositionCode};

pub const REASSIGNMENT_COMMENT: &str = "Manager changed due to deactivation of the previous manager";

pub fn revert_comment(deactivated: &PositionCode) -> String {
    format!("Manager reverted after failed deactivation of {deactivated}")
}

/// Points `reportee` at `manager` from `effective_date` on.
pub fn parent_change(
    reportee: &PositionCode,
    manager: &PositionCode,
    effective_date: NaiveDate,
    comment: &str,
) -> UpsertRequest {
    UpsertRequest::new(
        EntityKey::position(reportee.clone(), effective_date),
        json!({
            "comment": comment,
            "parentPosition": {
                "results": [
                    {
                        "code": manager.as_str(),
                        "effectiveStartDate": json_date(effective_date),
                    }
                ]
            }
        }),
    )
}

pub fn deactivation(position: &PositionCode, effective_date: NaiveDate) -> UpsertRequest {
    UpsertRequest::new(
        EntityKey::position(position.clone(), effective_date),
        json!({ "effectiveStatus": EffectiveStatus::Inactive.code() }),
    )
}
