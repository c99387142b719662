use std::collections::HashMap;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::TokenProvider;

use super::{Broker, FetchRequest, Task, Variables};

/// A broker client speaking the external-task REST protocol.
///
/// Three endpoints: `fetchAndLock` (long poll), `complete`, `failure`.
/// Every request carries a bearer token from the [`TokenProvider`].
pub struct CamundaBroker {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenProvider,
}

impl CamundaBroker {
    pub fn new(base_url: impl Into<String>, tokens: TokenProvider) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            tokens,
        }
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> Result<reqwest::Response> {
        let bearer = self.tokens.bearer().await?;
        let url = format!("{}{}", self.base_url, path);

        let resp = self
            .http
            .post(&url)
            .header("authorization", format!("Bearer {}", bearer))
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("POST {} failed ({}): {}", path, status, text);
        }

        Ok(resp)
    }
}

#[async_trait]
impl Broker for CamundaBroker {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Task>> {
        let body = FetchAndLockRequest {
            worker_id: &request.worker_id,
            max_tasks: request.max_tasks,
            async_response_timeout: request.poll_timeout_ms,
            topics: request
                .topics
                .iter()
                .map(|name| TopicRequest {
                    topic_name: name,
                    lock_duration: request.lock_duration_ms,
                })
                .collect(),
        };

        let resp = self.post("/external-task/fetchAndLock", &body).await?;
        let fetched: Vec<FetchedTask> = resp.json().await?;

        Ok(fetched
            .into_iter()
            .map(|task| Task {
                id: task.id,
                topic: task.topic_name,
                variables: decode_variables(task.variables),
                retries: task.retries,
            })
            .collect())
    }

    async fn complete(&self, task_id: &str, worker_id: &str, variables: &Variables) -> Result<()> {
        let body = CompleteRequest {
            worker_id,
            variables: encode_variables(variables),
        };
        self.post(&format!("/external-task/{}/complete", task_id), &body)
            .await?;
        Ok(())
    }

    async fn fail(
        &self,
        task_id: &str,
        worker_id: &str,
        message: &str,
        retries: u32,
        retry_timeout_ms: u64,
    ) -> Result<()> {
        let body = FailureRequest {
            worker_id,
            error_message: message,
            retries,
            retry_timeout: retry_timeout_ms,
        };
        self.post(&format!("/external-task/{}/failure", task_id), &body)
            .await?;
        Ok(())
    }
}

/// Encode a plain variable map into the engine's typed wire format.
fn encode_variables(variables: &Variables) -> HashMap<String, VariableDto> {
    variables
        .iter()
        .map(|(name, value)| (name.clone(), VariableDto::from_value(value)))
        .collect()
}

/// Decode the engine's typed wire format back into a plain variable map.
fn decode_variables(wire: HashMap<String, VariableDto>) -> Variables {
    wire.into_iter()
        .map(|(name, dto)| (name, dto.into_value()))
        .collect()
}

// --- API types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchAndLockRequest<'a> {
    worker_id: &'a str,
    max_tasks: usize,
    async_response_timeout: u64,
    topics: Vec<TopicRequest<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TopicRequest<'a> {
    topic_name: &'a str,
    lock_duration: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchedTask {
    id: String,
    topic_name: String,
    #[serde(default)]
    variables: HashMap<String, VariableDto>,
    retries: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteRequest<'a> {
    worker_id: &'a str,
    variables: HashMap<String, VariableDto>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureRequest<'a> {
    worker_id: &'a str,
    error_message: &'a str,
    retries: u32,
    retry_timeout: u64,
}

/// One variable on the wire: a value plus the engine's type tag. Arrays and
/// objects travel as `Json` — a JSON document serialized into a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VariableDto {
    value: Value,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    type_tag: Option<String>,
}

impl VariableDto {
    fn from_value(value: &Value) -> Self {
        let (value, tag) = match value {
            Value::Null => (Value::Null, "Null"),
            Value::Bool(b) => (Value::Bool(*b), "Boolean"),
            Value::Number(n) if n.is_f64() => (value.clone(), "Double"),
            Value::Number(_) => (value.clone(), "Integer"),
            Value::String(s) => (Value::String(s.clone()), "String"),
            // Structured values are nested JSON in a string on the wire
            Value::Array(_) | Value::Object(_) => (Value::String(value.to_string()), "Json"),
        };
        Self {
            value,
            type_tag: Some(tag.to_string()),
        }
    }

    fn into_value(self) -> Value {
        match self.type_tag.as_deref() {
            Some("Json") => match &self.value {
                Value::String(raw) => serde_json::from_str(raw).unwrap_or(self.value),
                _ => self.value,
            },
            _ => self.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_variables_keep_their_values() {
        let mut variables = Variables::new();
        variables.insert("name".to_string(), json!("Jane Doe"));
        variables.insert("score".to_string(), json!(85));
        variables.insert("ratio".to_string(), json!(0.5));
        variables.insert("valid".to_string(), json!(true));

        let wire = encode_variables(&variables);
        assert_eq!(wire["name"].type_tag.as_deref(), Some("String"));
        assert_eq!(wire["score"].type_tag.as_deref(), Some("Integer"));
        assert_eq!(wire["ratio"].type_tag.as_deref(), Some("Double"));
        assert_eq!(wire["valid"].type_tag.as_deref(), Some("Boolean"));

        let back = decode_variables(wire);
        assert_eq!(back, variables);
    }

    #[test]
    fn objects_travel_as_json_strings() {
        let mut variables = Variables::new();
        variables.insert("enrichedData".to_string(), json!({"score": 85}));

        let wire = encode_variables(&variables);
        assert_eq!(wire["enrichedData"].type_tag.as_deref(), Some("Json"));
        assert!(wire["enrichedData"].value.is_string());

        let back = decode_variables(wire);
        assert_eq!(back["enrichedData"], json!({"score": 85}));
    }

    #[test]
    fn null_variable_round_trips() {
        let mut variables = Variables::new();
        variables.insert("email".to_string(), Value::Null);

        let back = decode_variables(encode_variables(&variables));
        assert_eq!(back["email"], Value::Null);
    }

    #[test]
    fn untagged_wire_value_passes_through() {
        let dto = VariableDto {
            value: json!(42),
            type_tag: None,
        };
        assert_eq!(dto.into_value(), json!(42));
    }

    #[test]
    fn malformed_json_variable_falls_back_to_raw_string() {
        let dto = VariableDto {
            value: json!("{not json"),
            type_tag: Some("Json".to_string()),
        };
        assert_eq!(dto.into_value(), json!("{not json"));
    }

    #[test]
    fn fetch_request_body_shape() {
        let body = FetchAndLockRequest {
            worker_id: "courier",
            max_tasks: 5,
            async_response_timeout: 20_000,
            topics: vec![TopicRequest {
                topic_name: "validate-lead",
                lock_duration: 60_000,
            }],
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["workerId"], "courier");
        assert_eq!(json["maxTasks"], 5);
        assert_eq!(json["asyncResponseTimeout"], 20_000);
        assert_eq!(json["topics"][0]["topicName"], "validate-lead");
        assert_eq!(json["topics"][0]["lockDuration"], 60_000);
    }

    #[test]
    fn failure_body_shape() {
        let body = FailureRequest {
            worker_id: "courier",
            error_message: "boom",
            retries: 2,
            retry_timeout: 10_000,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["workerId"], "courier");
        assert_eq!(json["errorMessage"], "boom");
        assert_eq!(json["retries"], 2);
        assert_eq!(json["retryTimeout"], 10_000);
    }

    #[test]
    fn fetched_task_parses_with_missing_variables() {
        let raw = r#"{"id": "task-1", "topicName": "store-lead", "retries": null}"#;
        let task: FetchedTask = serde_json::from_str(raw).unwrap();
        assert_eq!(task.id, "task-1");
        assert!(task.variables.is_empty());
        assert!(task.retries.is_none());
    }
}
