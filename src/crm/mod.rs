//! CRM proxy operations.
//!
//! Thin reshaping over the CRM's v2 REST API. Inputs are validated here,
//! before any upstream call; responses are unwrapped to the gateway's
//! `{success, data, ...}` shape by the HTTP handlers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::CrmConfig;
use crate::error::GatewayError;
use crate::upstream::{UpstreamRequest, Upstreams};

/// Opportunity statuses counted by [`CrmService::stats`].
pub const OPPORTUNITY_STATUSES: [&str; 4] = ["open", "won", "lost", "abandoned"];

/// `GET /contacts` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactListQuery {
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpportunityQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub contact_id: Option<String>,
    /// `completed`, `pending` or `all` (default).
    pub status: Option<String>,
}

/// Body of `POST /contacts`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A CRM record id as a single path segment. Anything beyond ASCII
/// alphanumerics, `-` and `_` is rejected so ids cannot escape the path.
fn record_id<'a>(field: &str, id: &'a str) -> Result<&'a str, GatewayError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(GatewayError::validation(format!("{} is required", field)));
    }
    if !id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
        return Err(GatewayError::validation(format!("{} is not a valid id", field)));
    }
    Ok(id)
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).map_or(false, |v| !v.is_empty())
}

impl CreateContactRequest {
    /// Reject requests the CRM would refuse anyway.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if !present(&self.email) && !present(&self.phone) {
            return Err(GatewayError::validation("email or phone is required"));
        }
        if let Some(email) = self.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            let valid = email
                .split_once('@')
                .map_or(false, |(local, domain)| !local.is_empty() && domain.contains('.'));
            if !valid {
                return Err(GatewayError::validation("email is not a valid address"));
            }
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(GatewayError::validation("tags must not be blank"));
        }
        Ok(())
    }
}

/// One page of contacts.
#[derive(Debug, Clone, Serialize)]
pub struct ContactPage {
    pub data: Value,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct CrmService {
    upstreams: Upstreams,
    config: CrmConfig,
}

fn take(mut value: Value, field: &str) -> Value {
    value
        .as_object_mut()
        .and_then(|map| map.remove(field))
        .unwrap_or(Value::Null)
}

fn total_of(value: &Value, items: &Value) -> u64 {
    value
        .get("total")
        .or_else(|| value.pointer("/meta/total"))
        .and_then(Value::as_u64)
        .unwrap_or_else(|| items.as_array().map_or(0, |a| a.len() as u64))
}

impl CrmService {
    pub fn new(upstreams: Upstreams, config: CrmConfig) -> Self {
        Self { upstreams, config }
    }

    /// Path segment and upstream name.
    pub fn name(&self) -> &str {
        &self.config.upstream
    }

    fn location_id(&self) -> Result<String, GatewayError> {
        let spec = self.upstreams.spec(&self.config.upstream)?;
        Ok(spec.param("location_id")?.to_string())
    }

    fn limit(&self, requested: Option<u32>) -> u32 {
        requested
            .filter(|l| *l > 0)
            .unwrap_or(self.config.default_limit)
            .min(self.config.max_limit)
    }

    async fn call(&self, request: UpstreamRequest) -> Result<Value, GatewayError> {
        Ok(self.upstreams.call(&self.config.upstream, request).await?)
    }

    /// Search contacts. `offset` is rounded down to a page boundary.
    pub async fn list_contacts(&self, query: &ContactListQuery) -> Result<ContactPage, GatewayError> {
        let limit = self.limit(query.limit);
        let offset = query.offset.unwrap_or(0);
        let page = offset / limit + 1;

        let mut body = json!({
            "locationId": self.location_id()?,
            "pageLimit": limit,
            "page": page,
        });
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            body["query"] = Value::String(search.to_string());
        }

        let response = self.call(UpstreamRequest::post("/contacts/search", body)).await?;
        let total = total_of(&response, response.get("contacts").unwrap_or(&Value::Null));
        Ok(ContactPage {
            data: take(response, "contacts"),
            total,
            limit,
            offset: (page - 1) * limit,
        })
    }

    pub async fn get_contact(&self, contact_id: &str) -> Result<Value, GatewayError> {
        let contact_id = record_id("contactId", contact_id)?;
        let response = self
            .call(UpstreamRequest::get(format!("/contacts/{}", contact_id)))
            .await?;
        Ok(take(response, "contact"))
    }

    /// Create a contact. Validation happens before any upstream call.
    pub async fn create_contact(&self, request: &CreateContactRequest) -> Result<Value, GatewayError> {
        request.validate()?;
        let location_id = self.location_id()?;

        let mut body = serde_json::to_value(request)
            .map_err(|e| GatewayError::internal(format!("serialize contact: {}", e)))?;
        body["locationId"] = Value::String(location_id);

        let response = self.call(UpstreamRequest::post("/contacts/", body)).await?;
        Ok(take(response, "contact"))
    }

    pub async fn list_opportunities(&self, query: &OpportunityQuery) -> Result<Value, GatewayError> {
        let status = query.status.as_deref().map(str::trim).filter(|s| !s.is_empty());
        if let Some(status) = status {
            if status != "all" && !OPPORTUNITY_STATUSES.contains(&status) {
                return Err(GatewayError::validation(format!(
                    "status must be one of: all, {}",
                    OPPORTUNITY_STATUSES.join(", ")
                )));
            }
        }

        let request = UpstreamRequest::get("/opportunities/search")
            .query("location_id", self.location_id()?)
            .query("limit", self.limit(query.limit))
            .query_opt("status", status);
        let response = self.call(request).await?;
        let total = total_of(&response, response.get("opportunities").unwrap_or(&Value::Null));
        Ok(json!({
            "data": take(response, "opportunities"),
            "total": total,
        }))
    }

    /// Tasks of one contact, optionally filtered by completion.
    pub async fn list_tasks(&self, query: &TaskQuery) -> Result<Value, GatewayError> {
        let contact_id = record_id("contactId", query.contact_id.as_deref().unwrap_or(""))?;

        let want_completed = match query.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some("completed") => Some(true),
            Some("pending") => Some(false),
            Some(other) => {
                return Err(GatewayError::validation(format!(
                    "status '{}' must be one of: all, completed, pending",
                    other
                )))
            }
        };

        let response = self
            .call(UpstreamRequest::get(format!("/contacts/{}/tasks", contact_id)))
            .await?;
        let tasks = match take(response, "tasks") {
            Value::Array(tasks) => tasks,
            _ => Vec::new(),
        };
        let tasks: Vec<Value> = tasks
            .into_iter()
            .filter(|task| match want_completed {
                None => true,
                Some(want) => task.get("completed").and_then(Value::as_bool).unwrap_or(false) == want,
            })
            .collect();
        Ok(Value::Array(tasks))
    }

    /// Contact total and opportunity counts by status, fetched concurrently.
    pub async fn stats(&self) -> Result<Value, GatewayError> {
        let contacts_query = ContactListQuery {
            limit: Some(1),
            ..ContactListQuery::default()
        };
        let opportunities_query = OpportunityQuery {
            status: None,
            limit: Some(self.config.max_limit),
        };
        let (contacts, opportunities) = tokio::join!(
            self.list_contacts(&contacts_query),
            self.list_opportunities(&opportunities_query)
        );
        let (contacts, opportunities) = (contacts?, opportunities?);

        let mut by_status: BTreeMap<String, u64> = OPPORTUNITY_STATUSES
            .iter()
            .map(|s| (s.to_string(), 0))
            .collect();
        if let Some(items) = opportunities["data"].as_array() {
            for item in items {
                let status = item
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_ascii_lowercase();
                *by_status.entry(status).or_insert(0) += 1;
            }
        }

        Ok(json!({
            "contacts": { "total": contacts.total },
            "opportunities": {
                "total": opportunities["total"],
                "byStatus": Value::Object(by_status.into_iter().map(|(k, v)| (k, json!(v))).collect::<Map<_, _>>()),
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(email: Option<&str>, phone: Option<&str>) -> CreateContactRequest {
        CreateContactRequest {
            first_name: Some("Ada".into()),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
            ..CreateContactRequest::default()
        }
    }

    #[test]
    fn test_contact_requires_email_or_phone() {
        let err = CreateContactRequest::default().validate().unwrap_err();
        assert_eq!(err.message, "email or phone is required");
        assert!(contact(Some(" "), None).validate().is_err());
        assert!(contact(Some("ada@example.com"), None).validate().is_ok());
        assert!(contact(None, Some("+15550100")).validate().is_ok());
    }

    #[test]
    fn test_contact_email_shape() {
        assert!(contact(Some("ada"), None).validate().is_err());
        assert!(contact(Some("@example.com"), None).validate().is_err());
    }

    #[test]
    fn test_create_request_wire_format() {
        let body: CreateContactRequest =
            serde_json::from_str(r#"{"firstName":"Ada","lastName":"L","email":"a@b.io","tags":["vip"]}"#)
                .unwrap();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["firstName"], "Ada");
        assert_eq!(json["tags"][0], "vip");
        assert!(json.get("phone").is_none());
    }

    #[test]
    fn test_record_id_is_one_segment() {
        assert_eq!(record_id("contactId", " abc_12-Z ").unwrap(), "abc_12-Z");
        assert_eq!(record_id("contactId", "").unwrap_err().message, "contactId is required");
        for id in ["../locations/x", "a/b", "%2e%2e", "a?b=1", "a#b", ".."] {
            let err = record_id("contactId", id).unwrap_err();
            assert_eq!(err.message, "contactId is not a valid id", "{}", id);
        }
    }

    #[test]
    fn test_total_extraction() {
        let items = json!([1, 2, 3]);
        assert_eq!(total_of(&json!({"total": 40}), &items), 40);
        assert_eq!(total_of(&json!({"meta": {"total": 12}}), &items), 12);
        assert_eq!(total_of(&json!({}), &items), 3);
    }
}
