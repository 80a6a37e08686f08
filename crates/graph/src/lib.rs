//! Microsoft Graph on behalf of a signed-in user: Planner projects, To-Do
//! tasks, and the agents that answer questions about them.

pub mod client;
pub mod planner;
pub mod project;
pub mod todo;
pub mod todo_agent;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use {
    client::{GRAPH_BASE_URL, GraphClient},
    planner::Planner,
    project::ProjectAssistant,
    todo::{NewTask, TaskUpdate, TodoClient},
    todo_agent::TodoAssistant,
    tools::{planner_tools, todo_tools},
};
