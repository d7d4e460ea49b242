use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Record identifier as returned by the manager API. Some endpoints hand out
/// numeric keys, others string codes such as `U001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusFlag {
    Active,
    Inactive,
    #[default]
    Unknown,
}

impl StatusFlag {
    /// Accepts the loose encodings the backend uses: `"active"`, `"ACTIVE"`,
    /// `1`, `"1"`, `true` and their negative counterparts.
    pub fn from_value(value: &Value) -> Self {
        let normalized = match value {
            Value::Null => return Self::Unknown,
            Value::String(text) => text.trim().to_ascii_lowercase(),
            Value::Number(number) => number
                .as_i64()
                .map(|value| value.to_string())
                .unwrap_or_else(|| number.to_string()),
            other => other.to_string(),
        };

        match normalized.as_str() {
            "active" | "enabled" | "1" | "true" | "y" | "yes" => Self::Active,
            "inactive" | "disabled" | "0" | "false" | "n" | "no" => Self::Inactive,
            _ => Self::Unknown,
        }
    }

    pub fn is_active(self) -> bool {
        self == Self::Active
    }

    pub fn is_inactive(self) -> bool {
        self == Self::Inactive
    }
}

impl<'de> Deserialize<'de> for StatusFlag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// Collapses an `isOpen` value to `1` (open) or `0` (closed). Only values that
/// read as the number one count as open.
pub fn normalize_is_open(value: &Value) -> u8 {
    let open = match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64() == Some(1.0),
        Value::String(text) => text.trim().parse::<f64>().ok() == Some(1.0),
        _ => false,
    };
    u8::from(open)
}

fn deserialize_is_open<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_is_open(&value))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegularUser {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub status: StatusFlag,
    #[serde(default)]
    pub joined_at: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operator {
    pub id: RecordId,
    #[serde(default)]
    pub operator_no: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub login_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role_id: Option<RecordId>,
    #[serde(default, deserialize_with = "deserialize_is_open")]
    pub is_open: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_is_open")]
    pub is_open: u8,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// One row of the trade search. Only the identifying columns are typed; the
/// search service returns more fields than the console shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TradeRecord {
    pub id: Option<RecordId>,
    pub trade_id: Option<RecordId>,
    pub user_id: Option<RecordId>,
    pub executed_at: Option<String>,
    pub created_at: Option<String>,
    pub notes: Option<String>,
}

impl TradeRecord {
    /// `tradeId`, falling back to the storage `id`.
    pub fn display_id(&self) -> Option<&RecordId> {
        self.trade_id.as_ref().or(self.id.as_ref())
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.executed_at
            .as_deref()
            .or(self.created_at.as_deref())
    }
}
