use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a position in the organizational directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionCode(pub String);

impl PositionCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PositionCode {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PositionCode {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectiveStatus {
    #[serde(rename = "A")]
    Active,
    #[serde(rename = "I")]
    Inactive,
}

impl EffectiveStatus {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Active => "A",
            Self::Inactive => "I",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(Self::Active),
            "I" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// Effective-dated snapshot of a position as returned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub code: PositionCode,
    pub effective_start_date: NaiveDate,
    #[serde(default, with = "parent_ref")]
    pub parent_position: Option<PositionCode>,
    pub effective_status: EffectiveStatus,
    #[serde(
        default,
        rename = "cust_EmployeeGroup",
        skip_serializing_if = "Option::is_none"
    )]
    pub employee_group: Option<String>,
    #[serde(
        default,
        rename = "externalName_defaultValue",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
}

impl Position {
    pub fn is_active(&self) -> bool {
        self.effective_status == EffectiveStatus::Active
    }
}

/// The directory exposes the parent as an expanded navigation (`parentPosition/code`).
mod parent_ref {
    use super::PositionCode;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct ParentOut<'a> {
        code: &'a PositionCode,
    }

    #[derive(Deserialize)]
    struct ParentIn {
        #[serde(default)]
        code: Option<PositionCode>,
    }

    pub fn serialize<S>(value: &Option<PositionCode>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value
            .as_ref()
            .map(|code| ParentOut { code })
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<PositionCode>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let parent = Option::<ParentIn>::deserialize(deserializer)?;
        Ok(parent.and_then(|parent| parent.code))
    }
}

/// Employment statuses that mean a position is still held by someone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OccupancyStatus {
    #[serde(rename = "6021")]
    ActiveIncumbent,
    #[serde(rename = "6025")]
    OnLeave,
}

impl OccupancyStatus {
    pub const fn code(self) -> &'static str {
        match self {
            Self::ActiveIncumbent => "6021",
            Self::OnLeave => "6025",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "6021" => Some(Self::ActiveIncumbent),
            "6025" => Some(Self::OnLeave),
            _ => None,
        }
    }
}

/// Raw employee status code carried on an employment record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeStatus(pub String);

impl EmployeeStatus {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn occupancy(&self) -> Option<OccupancyStatus> {
        OccupancyStatus::from_code(&self.0)
    }

    pub fn occupies_position(&self) -> bool {
        self.occupancy().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmploymentRecord {
    pub position: PositionCode,
    #[serde(rename = "emplStatus")]
    pub employee_status: EmployeeStatus,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessUnit {
    #[serde(rename = "externalCode")]
    pub code: String,
    #[serde(rename = "description_defaultValue", default)]
    pub description: String,
    pub status: EffectiveStatus,
}
