//! Microsoft To-Do operations used by the to-do assistant.
//!
//! Outputs are plain text meant to be read by the model and shown to users.
//! Graph failures are folded into the text, except authentication failures
//! which are returned as errors so the caller can ask the user to log in.

use std::sync::Arc;

use {
    assistant_common::AssistantError,
    chrono::{DateTime, Local, NaiveDate, NaiveDateTime},
    serde_json::{Map, Value, json},
};

use crate::client::{GraphClient, collection};

const IMPORTANCE: [&str; 3] = ["low", "normal", "high"];
const STATUSES: [&str; 3] = ["notStarted", "inProgress", "completed"];

/// Fields of a task to create.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub list_id: String,
    pub title: String,
    pub body: Option<String>,
    pub due_date: Option<String>,
    pub importance: Option<String>,
}

/// Fields to change on an existing task; blank values are ignored.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub list_id: String,
    pub task_id: String,
    pub title: Option<String>,
    pub body: Option<String>,
    pub due_date: Option<String>,
    pub importance: Option<String>,
    pub status: Option<String>,
}

fn described(result: anyhow::Result<String>, action: &str) -> anyhow::Result<String> {
    match result {
        Err(e) if !AssistantError::is_auth(&e) => Ok(format!("Error {action}: {e}")),
        other => other,
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a user-supplied due date (`YYYY-MM-DD` or an ISO date-time) into
/// the naive ISO form Graph expects alongside `timeZone: UTC`.
pub fn parse_due_date(input: &str) -> Option<String> {
    let input = input.trim();
    let datetime = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    Some(datetime.format("%Y-%m-%dT%H:%M:%S").to_string())
}

fn due_json(date_time: String) -> Value {
    json!({"dateTime": date_time, "timeZone": "UTC"})
}

/// Calendar date of a Graph `dueDateTime.dateTime` value.
fn due_day(raw: &str) -> Option<NaiveDate> {
    raw.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

/// Human-readable due status relative to `today`.
pub fn due_status(due: NaiveDate, today: NaiveDate) -> String {
    let days = (due - today).num_days();
    match days {
        d if d < 0 => format!("OVERDUE ({} days)", d.abs()),
        0 => "DUE TODAY".into(),
        1 => "DUE TOMORROW".into(),
        d => format!("Due in {d} days"),
    }
}

fn status_icon(status: &str) -> &'static str {
    if status == "completed" { "✅" } else { "⏳" }
}

fn priority_icon(importance: &str) -> &'static str {
    if importance == "high" { "🔴" } else { "" }
}

pub struct TodoClient {
    graph: Arc<GraphClient>,
}

impl TodoClient {
    pub fn new(graph: Arc<GraphClient>) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &Arc<GraphClient> {
        &self.graph
    }

    async fn lists_raw(&self, user_id: &str) -> anyhow::Result<Vec<Value>> {
        Ok(collection(&self.graph.get(user_id, "/me/todo/lists").await?).to_vec())
    }

    async fn tasks_raw(&self, user_id: &str, list_id: &str) -> anyhow::Result<Vec<Value>> {
        let resp = self
            .graph
            .get(user_id, &format!("/me/todo/lists/{list_id}/tasks"))
            .await?;
        Ok(collection(&resp).to_vec())
    }

    pub async fn lists(&self, user_id: &str) -> anyhow::Result<String> {
        let result = async {
            let lists = self.lists_raw(user_id).await?;
            if lists.is_empty() {
                return Ok("No To-Do lists found.".to_string());
            }
            let mut out = vec!["Available To-Do Lists:".to_string()];
            for list in &lists {
                let default = if list["isOwner"].as_bool().unwrap_or(false) { "[DEFAULT]" } else { "" };
                out.push(format!(
                    "- {} (ID: {}) {default}",
                    list["displayName"].as_str().unwrap_or("Unnamed"),
                    list["id"].as_str().unwrap_or_default(),
                ));
            }
            Ok(out.join("\n"))
        };
        described(result.await, "getting lists")
    }

    pub async fn tasks_in_list(&self, user_id: &str, list_id: &str) -> anyhow::Result<String> {
        if list_id.trim().is_empty() {
            return Ok("Error: list_id is required".into());
        }
        let result = async {
            let tasks = self.tasks_raw(user_id, list_id).await?;
            if tasks.is_empty() {
                return Ok(format!("No tasks found in list {list_id}"));
            }
            let mut out = vec![format!("Tasks in list {list_id}:")];
            for task in &tasks {
                let status = task["status"].as_str().unwrap_or("notStarted");
                out.push(format!(
                    "- {} {} {} (ID: {}, Status: {status}, Due: {})",
                    status_icon(status),
                    priority_icon(task["importance"].as_str().unwrap_or("normal")),
                    task["title"].as_str().unwrap_or("Untitled"),
                    task["id"].as_str().unwrap_or_default(),
                    task["dueDateTime"]["dateTime"].as_str().unwrap_or("No deadline"),
                ));
            }
            Ok(out.join("\n"))
        };
        described(result.await, "getting tasks")
    }

    /// Every task of every list, grouped by list name, with due status
    /// relative to `today`.
    pub async fn all_tasks(&self, user_id: &str, today: NaiveDate) -> anyhow::Result<String> {
        let result = async {
            let lists = self.lists_raw(user_id).await?;
            if lists.is_empty() {
                return Ok("No To-Do lists found.".to_string());
            }

            let mut rows: Vec<(String, String)> = Vec::new();
            for list in &lists {
                let list_name = list["displayName"].as_str().unwrap_or("Unnamed");
                let list_id = list["id"].as_str().unwrap_or_default();
                for task in self.tasks_raw(user_id, list_id).await? {
                    let due = match task["dueDateTime"]["dateTime"].as_str() {
                        Some(raw) => match due_day(raw) {
                            Some(day) => format!(" | {}", due_status(day, today)),
                            None => " | Unknown".into(),
                        },
                        None if task["dueDateTime"].is_object() => " | Unknown".into(),
                        None => String::new(),
                    };
                    let line = format!(
                        "  {} {} {}{due}",
                        status_icon(task["status"].as_str().unwrap_or("notStarted")),
                        priority_icon(task["importance"].as_str().unwrap_or("normal")),
                        task["title"].as_str().unwrap_or("Untitled"),
                    );
                    rows.push((list_name.to_string(), line));
                }
            }
            if rows.is_empty() {
                return Ok("No tasks found across all lists.".to_string());
            }

            rows.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = vec![format!("Total tasks found: {}\n", rows.len())];
            let mut i = 0;
            while i < rows.len() {
                let name = &rows[i].0;
                let group: Vec<&str> = rows[i..]
                    .iter()
                    .take_while(|(n, _)| n == name)
                    .map(|(_, l)| l.as_str())
                    .collect();
                out.push(format!("\n📋 {name} ({} tasks):", group.len()));
                out.extend(group.iter().map(|l| l.to_string()));
                i += group.len();
            }
            Ok(out.join("\n"))
        };
        described(result.await, "getting all tasks")
    }

    pub async fn task_details(&self, user_id: &str, list_id: &str, task_id: &str) -> anyhow::Result<String> {
        if list_id.is_empty() || task_id.is_empty() {
            return Ok("Error: Both list_id and task_id are required".into());
        }
        let result = async {
            let task = self
                .graph
                .get(user_id, &format!("/me/todo/lists/{list_id}/tasks/{task_id}"))
                .await?;
            let field = |key: &str, default: &'static str| task[key].as_str().unwrap_or(default).to_string();
            let mut out = vec![
                "Task Details:".to_string(),
                format!("Title: {}", field("title", "Untitled")),
                format!("Status: {}", field("status", "notStarted")),
                format!("Importance: {}", field("importance", "normal")),
            ];
            if let Some(body) = task["body"]["content"].as_str().filter(|b| !b.is_empty()) {
                out.push(format!("Description: {body}"));
            }
            if let Some(due) = task["dueDateTime"]["dateTime"].as_str().filter(|d| !d.is_empty()) {
                out.push(format!("Due Date: {due}"));
            }
            out.push(format!("Created: {}", field("createdDateTime", "Unknown")));
            out.push(format!("Last Modified: {}", field("lastModifiedDateTime", "Unknown")));
            if task["hasAttachments"].as_bool().unwrap_or(false) {
                out.push("Has attachments: Yes".into());
            }
            Ok(out.join("\n"))
        };
        described(result.await, "getting task details")
    }

    pub async fn create_task(&self, user_id: &str, task: &NewTask) -> anyhow::Result<String> {
        if task.list_id.is_empty() || task.title.is_empty() {
            return Ok("Error: list_id and title are required".into());
        }
        let importance = task
            .importance
            .as_deref()
            .filter(|i| IMPORTANCE.contains(i))
            .unwrap_or("normal");
        let mut body = json!({"title": task.title.trim(), "importance": importance});
        if let Some(content) = non_blank(&task.body) {
            body["body"] = json!({"content": content, "contentType": "text"});
        }
        if let Some(due) = non_blank(&task.due_date) {
            let Some(parsed) = parse_due_date(due) else {
                return Ok(format!(
                    "Error: Invalid due_date format. Use YYYY-MM-DD or ISO format. Got: {}",
                    task.due_date.as_deref().unwrap_or_default()
                ));
            };
            body["dueDateTime"] = due_json(parsed);
        }

        let result = async {
            let created = self
                .graph
                .post(user_id, &format!("/me/todo/lists/{}/tasks", task.list_id), &body)
                .await?;
            Ok(format!(
                "✅ Task created successfully!\nTask ID: {}\nTitle: {}",
                created["id"].as_str().unwrap_or_default(),
                created["title"].as_str().unwrap_or_default()
            ))
        };
        described(result.await, "creating task")
    }

    pub async fn update_task(&self, user_id: &str, update: &TaskUpdate) -> anyhow::Result<String> {
        if update.list_id.is_empty() || update.task_id.is_empty() {
            return Ok("Error: list_id and task_id are required".into());
        }
        let mut fields = Map::new();
        if let Some(title) = non_blank(&update.title) {
            fields.insert("title".into(), json!(title));
        }
        if let Some(content) = non_blank(&update.body) {
            fields.insert("body".into(), json!({"content": content, "contentType": "text"}));
        }
        if let Some(due) = non_blank(&update.due_date) {
            let Some(parsed) = parse_due_date(due) else {
                return Ok(format!(
                    "Error: Invalid due_date format: {}",
                    update.due_date.as_deref().unwrap_or_default()
                ));
            };
            fields.insert("dueDateTime".into(), due_json(parsed));
        }
        if let Some(importance) = update.importance.as_deref().filter(|i| IMPORTANCE.contains(i)) {
            fields.insert("importance".into(), json!(importance));
        }
        if let Some(status) = update.status.as_deref().filter(|s| STATUSES.contains(s)) {
            fields.insert("status".into(), json!(status));
        }
        if fields.is_empty() {
            return Ok("Error: No update fields provided".into());
        }

        let result = async {
            let updated = self
                .graph
                .patch(user_id, &task_path(&update.list_id, &update.task_id), &Value::Object(fields))
                .await?;
            Ok(format!(
                "✅ Task updated successfully!\nTask: {}",
                updated["title"].as_str().unwrap_or_default()
            ))
        };
        described(result.await, "updating task")
    }

    pub async fn complete_task(&self, user_id: &str, list_id: &str, task_id: &str) -> anyhow::Result<String> {
        if list_id.is_empty() || task_id.is_empty() {
            return Ok("Error: list_id and task_id are required".into());
        }
        let result = async {
            let updated = self
                .graph
                .patch(user_id, &task_path(list_id, task_id), &json!({"status": "completed"}))
                .await?;
            Ok(format!(
                "✅ Task completed!\nTask: {}",
                updated["title"].as_str().unwrap_or_default()
            ))
        };
        described(result.await, "completing task")
    }

    pub async fn delete_task(&self, user_id: &str, list_id: &str, task_id: &str) -> anyhow::Result<String> {
        if list_id.is_empty() || task_id.is_empty() {
            return Ok("Error: list_id and task_id are required".into());
        }
        let result = async {
            self.graph.delete(user_id, &task_path(list_id, task_id)).await?;
            Ok(format!("✅ Task deleted successfully (List: {list_id}, Task: {task_id})"))
        };
        described(result.await, "deleting task")
    }

    /// Case-insensitive title search across all lists.
    pub async fn search_tasks(&self, user_id: &str, query: &str) -> anyhow::Result<String> {
        if query.trim().is_empty() {
            return Ok("Error: Search query is required".into());
        }
        let needle = query.trim().to_lowercase();
        let result = async {
            let lists = self.lists_raw(user_id).await?;
            if lists.is_empty() {
                return Ok("No lists found.".to_string());
            }
            let mut matches = Vec::new();
            for list in &lists {
                let list_id = list["id"].as_str().unwrap_or_default();
                let list_name = list["displayName"].as_str().unwrap_or("Unnamed");
                for task in self.tasks_raw(user_id, list_id).await? {
                    let title = task["title"].as_str().unwrap_or_default();
                    if title.to_lowercase().contains(&needle) {
                        matches.push(format!(
                            "{} {title}\n   List: {list_name}\n   IDs: list_id={list_id}, task_id={}\n",
                            status_icon(task["status"].as_str().unwrap_or("notStarted")),
                            task["id"].as_str().unwrap_or_default(),
                        ));
                    }
                }
            }
            if matches.is_empty() {
                return Ok(format!("No tasks found matching '{query}'"));
            }
            let mut out = vec![format!("Found {} task(s) matching '{query}':\n", matches.len())];
            out.extend(matches);
            Ok(out.join("\n"))
        };
        described(result.await, "searching tasks")
    }

    /// Short advice from the open tasks: overdue, due today and backlog size.
    pub async fn smart_suggestions(&self, user_id: &str, today: NaiveDate) -> String {
        if !self.graph.session().is_authenticated(user_id).await {
            return "Please login first to get suggestions".into();
        }
        let counts = async {
            let (mut total, mut overdue, mut due_today) = (0, 0, 0);
            for list in self.lists_raw(user_id).await? {
                let list_id = list["id"].as_str().unwrap_or_default();
                for task in self.tasks_raw(user_id, list_id).await? {
                    if task["status"] == "completed" {
                        continue;
                    }
                    total += 1;
                    match task["dueDateTime"]["dateTime"].as_str().and_then(due_day) {
                        Some(day) if day < today => overdue += 1,
                        Some(day) if day == today => due_today += 1,
                        _ => {},
                    }
                }
            }
            anyhow::Ok((total, overdue, due_today))
        };
        let (total, overdue, due_today) = match counts.await {
            Ok(c) => c,
            Err(e) => return format!("Error generating suggestions: {e}"),
        };

        let mut suggestions = Vec::new();
        if overdue > 0 {
            suggestions.push(format!("⚠️ You have {overdue} overdue task(s) - prioritize these!"));
        }
        if due_today > 0 {
            suggestions.push(format!("📅 {due_today} task(s) due today - don't forget!"));
        }
        if total == 0 {
            suggestions.push("✨ No pending tasks - great job!".into());
        } else if total > 10 {
            suggestions.push(format!("📊 You have {total} pending tasks - consider prioritizing"));
        }
        if suggestions.is_empty() {
            suggestions.push("🎯 Keep up the good work managing your tasks!".into());
        }
        suggestions.join("\n")
    }

    /// Login status with the local expiry time of the access token.
    pub async fn login_status(&self, user_id: &str) -> String {
        let session = self.graph.session();
        if !session.is_authenticated(user_id).await {
            return "❌ Not logged in or token expired.".into();
        }
        match session
            .expires_at(user_id)
            .and_then(|exp| DateTime::from_timestamp(exp as i64, 0))
        {
            Some(exp) => format!(
                "✅ Login active. Token valid until: {}",
                exp.with_timezone(&Local).format("%H:%M:%S")
            ),
            None => "✅ Login active.".into(),
        }
    }
}

fn task_path(list_id: &str, task_id: &str) -> String {
    format!("/me/todo/lists/{list_id}/tasks/{task_id}")
}
