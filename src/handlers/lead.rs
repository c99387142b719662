//! Lead-enrichment handlers, one per external-task topic in the process
//! definition.

use std::sync::{Arc, LazyLock};

use anyhow::{Result, bail};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use tracing::info;

use super::{Handler, Registry};
use crate::broker::{Task, Variables};

pub const VALIDATE_TOPIC: &str = "validate-lead";
pub const ENRICH_TOPIC: &str = "lead-enrichment";
pub const STORE_TOPIC: &str = "store-lead";
pub const NOTIFY_TOPIC: &str = "notify-success";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern is valid")
});

/// Subscribe every lead handler to its topic.
pub async fn subscribe_all(registry: &Registry) -> Result<()> {
    registry.subscribe(VALIDATE_TOPIC, Arc::new(ValidateLead)).await?;
    registry.subscribe(ENRICH_TOPIC, Arc::new(EnrichLead)).await?;
    registry.subscribe(STORE_TOPIC, Arc::new(StoreLead)).await?;
    registry.subscribe(NOTIFY_TOPIC, Arc::new(NotifySuccess)).await?;
    Ok(())
}

fn str_var<'a>(task: &'a Task, name: &str) -> &'a str {
    task.variables.get(name).and_then(Value::as_str).unwrap_or("")
}

/// Checks the required lead fields and the email format.
///
/// A bad lead is a *completion* carrying `leadValid: false` — the process
/// decides what to do with it. Only infrastructure problems are failures.
pub struct ValidateLead;

#[async_trait]
impl Handler for ValidateLead {
    async fn handle(&self, task: &Task) -> Result<Variables> {
        let lead_name = str_var(task, "leadName");
        let email = str_var(task, "email");
        let company = str_var(task, "company");

        info!(lead = lead_name, email, company, "validating lead");

        if lead_name.is_empty() {
            return Ok(verdict(false, "Lead name is required"));
        }
        // Email is optional; only a present-but-malformed one is rejected
        if !email.is_empty() && !EMAIL_RE.is_match(email) {
            return Ok(verdict(false, "Invalid email format"));
        }

        Ok(verdict(true, "Lead data is valid"))
    }
}

fn verdict(valid: bool, message: &str) -> Variables {
    let mut variables = Variables::new();
    variables.insert("leadValid".to_string(), json!(valid));
    variables.insert("validationMessage".to_string(), json!(message));
    variables
}

/// Simulated enrichment: insights, a LinkedIn profile guess, company data.
pub struct EnrichLead;

#[async_trait]
impl Handler for EnrichLead {
    async fn handle(&self, task: &Task) -> Result<Variables> {
        let lead_name = str_var(task, "leadName");
        let company = str_var(task, "company");

        if lead_name.is_empty() {
            bail!("cannot enrich a lead without a leadName");
        }

        info!(lead = lead_name, company, "enriching lead");

        let mut variables = Variables::new();
        variables.insert(
            "enrichedData".to_string(),
            json!({
                "insights": format!("Lead {} shows high potential in {}", lead_name, company),
                "score": 85,
            }),
        );
        variables.insert(
            "linkedinData".to_string(),
            json!({
                "profile": format!("linkedin.com/in/{}", profile_slug(lead_name)),
                "connections": 500,
            }),
        );
        variables.insert(
            "companyData".to_string(),
            json!({
                "name": company,
                "industry": "Technology",
                "size": "50-200 employees",
            }),
        );
        Ok(variables)
    }
}

/// Lowercased, space-to-dash slug for the LinkedIn profile guess.
fn profile_slug(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

/// Accepts the enriched payload for storage.
pub struct StoreLead;

#[async_trait]
impl Handler for StoreLead {
    async fn handle(&self, task: &Task) -> Result<Variables> {
        info!(task = %task.id, "storing enriched lead data");

        let mut variables = Variables::new();
        variables.insert("storageSuccess".to_string(), json!(true));
        Ok(variables)
    }
}

/// Signals that the enrichment run finished for a lead.
pub struct NotifySuccess;

#[async_trait]
impl Handler for NotifySuccess {
    async fn handle(&self, task: &Task) -> Result<Variables> {
        let lead_name = str_var(task, "leadName");

        info!(lead = lead_name, "lead enrichment completed");

        let mut variables = Variables::new();
        variables.insert("notificationSent".to_string(), json!(true));
        Ok(variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_slug_lowercases_and_dashes() {
        assert_eq!(profile_slug("Jane Doe"), "jane-doe");
        assert_eq!(profile_slug("Ada"), "ada");
    }

    #[test]
    fn email_pattern_accepts_plain_addresses() {
        assert!(EMAIL_RE.is_match("jane@example.com"));
        assert!(EMAIL_RE.is_match("j.doe+leads@sub.example.io"));
    }

    #[test]
    fn email_pattern_rejects_garbage() {
        assert!(!EMAIL_RE.is_match("not-an-email"));
        assert!(!EMAIL_RE.is_match("jane@"));
        assert!(!EMAIL_RE.is_match("@example.com"));
        assert!(!EMAIL_RE.is_match("jane@example"));
    }
}
