//! Agent tools over Planner and To-Do, bound to one signed-in user.

use std::sync::Arc;

use {
    assistant_agents::{AgentTool, ToolRegistry},
    async_trait::async_trait,
    chrono::Local,
    serde_json::{Value, json},
};

use crate::{
    planner::Planner,
    todo::{NewTask, TaskUpdate, TodoClient},
};

fn required<'a>(params: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing '{key}' parameter"))
}

fn text(params: &Value, key: &str) -> String {
    params
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn optional(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn schema(props: &[(&str, &str)], required: &[&str]) -> Value {
    let properties: serde_json::Map<String, Value> = props
        .iter()
        .map(|(name, description)| {
            (name.to_string(), json!({"type": "string", "description": description}))
        })
        .collect();
    json!({"type": "object", "properties": properties, "required": required})
}

#[derive(Debug, Clone, Copy)]
enum PlannerOp {
    AllPlans,
    UserGroups,
    PlansFromGroup,
    PlanTasks,
    PlanBuckets,
    TaskDetails,
}

impl PlannerOp {
    const ALL: [PlannerOp; 6] = [
        Self::AllPlans,
        Self::UserGroups,
        Self::PlansFromGroup,
        Self::PlanTasks,
        Self::PlanBuckets,
        Self::TaskDetails,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::AllPlans => "graph_get_all_plans",
            Self::UserGroups => "graph_get_user_groups",
            Self::PlansFromGroup => "graph_get_plans_from_group",
            Self::PlanTasks => "graph_get_plan_tasks",
            Self::PlanBuckets => "graph_get_plan_buckets",
            Self::TaskDetails => "graph_get_task_details",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::AllPlans => {
                "Get ALL Planner plans from all groups the user is a member of. Use this to discover available projects."
            },
            Self::UserGroups => "Get all Microsoft 365 groups the user is a member of.",
            Self::PlansFromGroup => "Get all Planner plans from a specific group. Requires group_id.",
            Self::PlanTasks => {
                "Get all tasks from a specific plan. Requires plan_id. Returns task list with completion percentages, due dates, priorities."
            },
            Self::PlanBuckets => "Get all buckets (task categories/phases) from a plan. Requires plan_id.",
            Self::TaskDetails => {
                "Get detailed information about a specific task including description. Requires task_id."
            },
        }
    }

    fn param(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::AllPlans | Self::UserGroups => None,
            Self::PlansFromGroup => Some(("group_id", "The ID of the group")),
            Self::PlanTasks | Self::PlanBuckets => Some(("plan_id", "The ID of the plan")),
            Self::TaskDetails => Some(("task_id", "The ID of the task")),
        }
    }
}

/// One Planner query exposed to the project agent.
pub struct PlannerTool {
    op: PlannerOp,
    planner: Arc<Planner>,
    user_id: String,
}

#[async_trait]
impl AgentTool for PlannerTool {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    fn parameters_schema(&self) -> Value {
        match self.op.param() {
            Some((name, description)) => schema(&[(name, description)], &[name]),
            None => schema(&[], &[]),
        }
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let user = self.user_id.as_str();
        let arg = match self.op.param() {
            Some((name, _)) => required(&params, name)?,
            None => "",
        };
        match self.op {
            PlannerOp::AllPlans => self.planner.all_plans(user).await,
            PlannerOp::UserGroups => self.planner.user_groups(user).await,
            PlannerOp::PlansFromGroup => self.planner.plans_from_group(user, arg).await,
            PlannerOp::PlanTasks => self.planner.plan_tasks(user, arg).await,
            PlannerOp::PlanBuckets => self.planner.plan_buckets(user, arg).await,
            PlannerOp::TaskDetails => self.planner.task_details(user, arg).await,
        }
    }
}

/// The six Planner tools for `user_id`.
pub fn planner_tools(planner: Arc<Planner>, user_id: &str) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for op in PlannerOp::ALL {
        registry.register(Box::new(PlannerTool {
            op,
            planner: Arc::clone(&planner),
            user_id: user_id.to_string(),
        }));
    }
    registry
}

#[derive(Debug, Clone, Copy)]
enum TodoOp {
    AllLists,
    TasksFromList,
    AllTasks,
    TaskDetails,
    CreateTask,
    UpdateTask,
    CompleteTask,
    DeleteTask,
    SearchTasks,
}

const LIST_ID: (&str, &str) = ("list_id", "ID of the To-Do list");
const TASK_ID: (&str, &str) = ("task_id", "ID of the task");
const TITLE: (&str, &str) = ("title", "Task title");
const BODY: (&str, &str) = ("body", "Task description");
const DUE_DATE: (&str, &str) = ("due_date", "Due date as YYYY-MM-DD or ISO date-time");
const IMPORTANCE: (&str, &str) = ("importance", "low, normal or high");

impl TodoOp {
    const ALL: [TodoOp; 9] = [
        Self::AllLists,
        Self::TasksFromList,
        Self::AllTasks,
        Self::TaskDetails,
        Self::CreateTask,
        Self::UpdateTask,
        Self::CompleteTask,
        Self::DeleteTask,
        Self::SearchTasks,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::AllLists => "get_all_lists",
            Self::TasksFromList => "get_tasks_from_list",
            Self::AllTasks => "get_all_tasks",
            Self::TaskDetails => "get_task_details",
            Self::CreateTask => "create_task",
            Self::UpdateTask => "update_task",
            Self::CompleteTask => "complete_task",
            Self::DeleteTask => "delete_task",
            Self::SearchTasks => "search_tasks",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::AllLists => "Get all To-Do lists. Use this first to see available lists and their IDs.",
            Self::TasksFromList => "Get all tasks from a specific list.",
            Self::AllTasks => {
                "Get ALL tasks from ALL lists with comprehensive details including due dates, status, priority. Best for overview and analysis."
            },
            Self::TaskDetails => "Get detailed info about a specific task.",
            Self::CreateTask => "Create new task. body, due_date and importance are optional.",
            Self::UpdateTask => "Update task. All fields except the IDs are optional.",
            Self::CompleteTask => "Mark task as completed.",
            Self::DeleteTask => "Delete task permanently.",
            Self::SearchTasks => "Search tasks by title across all lists.",
        }
    }

    fn parameters_schema(self) -> Value {
        match self {
            Self::AllLists | Self::AllTasks => schema(&[], &[]),
            Self::TasksFromList => schema(&[LIST_ID], &["list_id"]),
            Self::TaskDetails | Self::CompleteTask | Self::DeleteTask => {
                schema(&[LIST_ID, TASK_ID], &["list_id", "task_id"])
            },
            Self::CreateTask => schema(&[LIST_ID, TITLE, BODY, DUE_DATE, IMPORTANCE], &["list_id", "title"]),
            Self::UpdateTask => schema(
                &[
                    LIST_ID,
                    TASK_ID,
                    TITLE,
                    BODY,
                    DUE_DATE,
                    IMPORTANCE,
                    ("status", "notStarted, inProgress or completed"),
                ],
                &["list_id", "task_id"],
            ),
            Self::SearchTasks => schema(&[("query", "Text to look for in task titles")], &["query"]),
        }
    }
}

/// One To-Do operation exposed to the to-do agent. Results are text.
pub struct TodoTool {
    op: TodoOp,
    todo: Arc<TodoClient>,
    user_id: String,
}

#[async_trait]
impl AgentTool for TodoTool {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    fn parameters_schema(&self) -> Value {
        self.op.parameters_schema()
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let user = self.user_id.as_str();
        let list_id = text(&params, "list_id");
        let task_id = text(&params, "task_id");
        let out = match self.op {
            TodoOp::AllLists => self.todo.lists(user).await?,
            TodoOp::TasksFromList => self.todo.tasks_in_list(user, &list_id).await?,
            TodoOp::AllTasks => self.todo.all_tasks(user, Local::now().date_naive()).await?,
            TodoOp::TaskDetails => self.todo.task_details(user, &list_id, &task_id).await?,
            TodoOp::CreateTask => {
                let task = NewTask {
                    list_id,
                    title: text(&params, "title"),
                    body: optional(&params, "body"),
                    due_date: optional(&params, "due_date"),
                    importance: optional(&params, "importance"),
                };
                self.todo.create_task(user, &task).await?
            },
            TodoOp::UpdateTask => {
                let update = TaskUpdate {
                    list_id,
                    task_id,
                    title: optional(&params, "title"),
                    body: optional(&params, "body"),
                    due_date: optional(&params, "due_date"),
                    importance: optional(&params, "importance"),
                    status: optional(&params, "status"),
                };
                self.todo.update_task(user, &update).await?
            },
            TodoOp::CompleteTask => self.todo.complete_task(user, &list_id, &task_id).await?,
            TodoOp::DeleteTask => self.todo.delete_task(user, &list_id, &task_id).await?,
            TodoOp::SearchTasks => self.todo.search_tasks(user, &text(&params, "query")).await?,
        };
        Ok(Value::String(out))
    }
}

/// The nine To-Do tools for `user_id`.
pub fn todo_tools(todo: Arc<TodoClient>, user_id: &str) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for op in TodoOp::ALL {
        registry.register(Box::new(TodoTool {
            op,
            todo: Arc::clone(&todo),
            user_id: user_id.to_string(),
        }));
    }
    registry
}
