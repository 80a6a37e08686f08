//! Microsoft Planner queries used by the project assistant.
//!
//! Every query returns a JSON object with a `success` flag; failures other
//! than authentication become `{"success": false, "error": ...}` so the model
//! can reason about them.

use std::sync::Arc;

use {
    assistant_common::AssistantError,
    serde_json::{Value, json},
    tracing::debug,
};

use crate::client::{GraphClient, collection};

const GROUP_TYPE: &str = "#microsoft.graph.group";

pub struct Planner {
    graph: Arc<GraphClient>,
}

/// Turn a non-authentication failure into a `success: false` payload.
pub(crate) fn reported(result: anyhow::Result<Value>) -> anyhow::Result<Value> {
    match result {
        Err(e) if !AssistantError::is_auth(&e) => Ok(json!({"success": false, "error": e.to_string()})),
        other => other,
    }
}

impl Planner {
    pub fn new(graph: Arc<GraphClient>) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &Arc<GraphClient> {
        &self.graph
    }

    pub async fn user_groups(&self, user_id: &str) -> anyhow::Result<Value> {
        reported(self.fetch_groups(user_id).await)
    }

    async fn fetch_groups(&self, user_id: &str) -> anyhow::Result<Value> {
        let resp = self.graph.get(user_id, "/me/memberOf").await?;
        let groups: Vec<Value> = collection(&resp)
            .iter()
            .filter(|g| g["@odata.type"] == GROUP_TYPE)
            .map(|g| {
                json!({
                    "id": g["id"],
                    "displayName": g["displayName"],
                    "description": g["description"],
                    "mail": g["mail"],
                })
            })
            .collect();
        Ok(json!({"success": true, "total_groups": groups.len(), "groups": groups}))
    }

    pub async fn plans_from_group(&self, user_id: &str, group_id: &str) -> anyhow::Result<Value> {
        reported(self.fetch_plans(user_id, group_id).await)
    }

    async fn fetch_plans(&self, user_id: &str, group_id: &str) -> anyhow::Result<Value> {
        let resp = self
            .graph
            .get(user_id, &format!("/groups/{group_id}/planner/plans"))
            .await?;
        let plans: Vec<Value> = collection(&resp)
            .iter()
            .map(|p| {
                json!({
                    "id": p["id"],
                    "title": p["title"],
                    "createdDateTime": p["createdDateTime"],
                    "owner": p["owner"],
                })
            })
            .collect();
        Ok(json!({
            "success": true,
            "group_id": group_id,
            "total_plans": plans.len(),
            "plans": plans,
        }))
    }

    /// Plans of every group the user belongs to, tagged with `groupName` and
    /// `groupId`. Groups whose plans cannot be read are skipped.
    pub async fn all_plans(&self, user_id: &str) -> anyhow::Result<Value> {
        let groups = self.user_groups(user_id).await?;
        if groups["success"] != true {
            return Ok(json!({"success": false, "error": "Failed to get groups"}));
        }

        let groups = groups["groups"].as_array().cloned().unwrap_or_default();
        let mut all = Vec::new();
        for group in &groups {
            let group_id = group["id"].as_str().unwrap_or_default();
            let plans = self.plans_from_group(user_id, group_id).await?;
            if plans["success"] != true {
                debug!(group_id, "skipping group whose plans could not be read");
                continue;
            }
            for mut plan in plans["plans"].as_array().cloned().unwrap_or_default() {
                plan["groupName"] = group["displayName"].clone();
                plan["groupId"] = group["id"].clone();
                all.push(plan);
            }
        }
        Ok(json!({
            "success": true,
            "total_plans": all.len(),
            "total_groups": groups.len(),
            "plans": all,
        }))
    }

    pub async fn plan_tasks(&self, user_id: &str, plan_id: &str) -> anyhow::Result<Value> {
        reported(self.fetch_tasks(user_id, plan_id).await)
    }

    async fn fetch_tasks(&self, user_id: &str, plan_id: &str) -> anyhow::Result<Value> {
        let resp = self
            .graph
            .get(user_id, &format!("/planner/plans/{plan_id}/tasks"))
            .await?;
        let tasks = collection(&resp);
        let enriched: Vec<Value> = tasks
            .iter()
            .map(|t| {
                json!({
                    "id": t["id"],
                    "title": t["title"],
                    "percentComplete": t.get("percentComplete").cloned().unwrap_or(json!(0)),
                    "priority": t.get("priority").cloned().unwrap_or(json!(5)),
                    "dueDateTime": t["dueDateTime"],
                    "createdDateTime": t["createdDateTime"],
                    "bucketId": t["bucketId"],
                    "assignedTo": t["assignments"].as_object().map_or(0, |a| a.len()),
                    "hasDescription": t["hasDescription"].as_bool().unwrap_or(false),
                    "checklistItemCount": t.get("checklistItemCount").cloned().unwrap_or(json!(0)),
                    "completedChecklistItemCount": t.get("completedChecklistItemCount").cloned().unwrap_or(json!(0)),
                })
            })
            .collect();
        Ok(json!({
            "success": true,
            "plan_id": plan_id,
            "total_tasks": tasks.len(),
            "tasks": enriched,
        }))
    }

    pub async fn plan_buckets(&self, user_id: &str, plan_id: &str) -> anyhow::Result<Value> {
        reported(self.fetch_buckets(user_id, plan_id).await)
    }

    async fn fetch_buckets(&self, user_id: &str, plan_id: &str) -> anyhow::Result<Value> {
        let resp = self
            .graph
            .get(user_id, &format!("/planner/plans/{plan_id}/buckets"))
            .await?;
        let buckets: Vec<Value> = collection(&resp)
            .iter()
            .map(|b| json!({"id": b["id"], "name": b["name"], "orderHint": b["orderHint"]}))
            .collect();
        Ok(json!({
            "success": true,
            "plan_id": plan_id,
            "total_buckets": buckets.len(),
            "buckets": buckets,
        }))
    }

    pub async fn task_details(&self, user_id: &str, task_id: &str) -> anyhow::Result<Value> {
        reported(self.fetch_task(user_id, task_id).await)
    }

    async fn fetch_task(&self, user_id: &str, task_id: &str) -> anyhow::Result<Value> {
        let task = self.graph.get(user_id, &format!("/planner/tasks/{task_id}")).await?;
        let description = match self
            .graph
            .get(user_id, &format!("/planner/tasks/{task_id}/details"))
            .await
        {
            Ok(details) => details["description"].as_str().unwrap_or_default().to_string(),
            Err(e) => {
                debug!(task_id, error = %e, "task details unavailable");
                String::new()
            },
        };
        let or = |key: &str, default: Value| task.get(key).cloned().unwrap_or(default);
        Ok(json!({
            "success": true,
            "task": {
                "id": task["id"],
                "title": task["title"],
                "percentComplete": or("percentComplete", json!(0)),
                "priority": or("priority", json!(5)),
                "dueDateTime": task["dueDateTime"],
                "startDateTime": task["startDateTime"],
                "completedDateTime": task["completedDateTime"],
                "bucketId": task["bucketId"],
                "planId": task["planId"],
                "description": description,
                "assignments": or("assignments", json!({})),
                "checklistItemCount": or("checklistItemCount", json!(0)),
                "completedChecklistItemCount": or("completedChecklistItemCount", json!(0)),
            }
        }))
    }

    /// One-line login status for the status endpoint.
    pub async fn login_status(&self, user_id: &str) -> String {
        if !self.graph.session().is_authenticated(user_id).await {
            return "❌ Not logged in. Please click 'Login untuk Project Management' button.".into();
        }
        match self.graph.get(user_id, "/me").await {
            Ok(me) => {
                let name = me["displayName"].as_str().unwrap_or("Unknown");
                let email = me["mail"]
                    .as_str()
                    .or_else(|| me["userPrincipalName"].as_str())
                    .unwrap_or("No email");
                format!("✅ Logged in as: {name} ({email})")
            },
            Err(e) => format!("❌ Authentication error: {e}"),
        }
    }
}
