use serde::{Deserialize, Serialize};

use crate::domain::{RecordId, StatusFlag};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    pub status: StatusFlag,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorDraft {
    pub operator_no: String,
    pub name: String,
    pub login_name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role_id: RecordId,
    pub is_open: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDraft {
    pub name: String,
    pub code: String,
    pub description: String,
    pub is_open: u8,
}

/// Body shape for endpoints that take the record id next to its fields.
#[derive(Debug, Clone, Serialize)]
pub struct WithId<'a, T> {
    pub id: &'a RecordId,
    #[serde(flatten)]
    pub data: &'a T,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdOnly<'a> {
    pub id: &'a RecordId,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IsOpenQuery {
    pub is_open: u8,
}

/// Optional search filters for the trade query. Blank values are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeFilters {
    pub notes_keyword: Option<String>,
    pub trade_id: Option<String>,
    pub user_id: Option<String>,
}

/// Query string for `GET {trade}/es/trades`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeQuery {
    pub page: u32,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes_keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl TradeQuery {
    pub fn new(page: u32, size: u32, filters: &TradeFilters) -> Self {
        Self {
            page,
            size,
            notes_keyword: non_blank(&filters.notes_keyword),
            trade_id: non_blank(&filters.trade_id),
            user_id: non_blank(&filters.user_id),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn list_query_uses_camel_case_page_size() {
        let query = ListQuery {
            page: 2,
            page_size: 10,
        };
        assert_eq!(
            serde_json::to_value(query).expect("encode"),
            json!({ "page": 2, "pageSize": 10 })
        );
    }

    #[test]
    fn with_id_flattens_record_fields() {
        let id = RecordId::from("U003");
        let draft = UserDraft {
            name: "Wang".into(),
            email: "user003@example.com".into(),
            status: StatusFlag::Active,
        };
        let body = serde_json::to_value(WithId {
            id: &id,
            data: &draft,
        })
        .expect("encode");
        assert_eq!(
            body,
            json!({
                "id": "U003",
                "name": "Wang",
                "email": "user003@example.com",
                "status": "active"
            })
        );
    }

    #[test]
    fn trade_query_drops_blank_filters() {
        let filters = TradeFilters {
            notes_keyword: Some(" ai ".into()),
            trade_id: Some("   ".into()),
            user_id: None,
        };
        let query = TradeQuery::new(3, 5, &filters);
        assert_eq!(
            serde_json::to_value(&query).expect("encode"),
            json!({ "page": 3, "size": 5, "notesKeyword": "ai" })
        );
    }
}
