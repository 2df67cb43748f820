use std::collections::{HashMap, HashSet};

use serde::Serialize;

use odoo_rpc::Value;

use crate::api::ApiError;
use crate::session::Session;

pub const TASK_FIELDS: &[&str] = &[
    "name",
    "description",
    "project_id",
    "tag_ids",
    "date_deadline",
    "user_ids",
    "planned_hours",
    "create_date",
    "priority",
    "stage_id",
    "remaining_hours",
    "kanban_state",
];

// res_id is the join key for the batched fetch.
const ACTIVITY_FIELDS: &[&str] = &[
    "id",
    "res_id",
    "summary",
    "activity_type_id",
    "date_deadline",
    "user_id",
    "note",
];

const STAGE_FIELDS: &[&str] = &["id", "name"];

// task_id is the join key for the batched fetch.
const TIMESHEET_FIELDS: &[&str] =
    &["name", "unit_amount", "date", "account_id", "employee_id", "task_id"];

/// Tasks assigned to the session user, each augmented in place with its
/// activities, the stage names of its project and its resolved tag names.
/// Task order is whatever the primary query returned.
pub async fn assigned_tasks(session: &Session) -> Result<Vec<Value>, ApiError> {
    let domain = Value::Array(vec![Value::clause(
        "user_ids",
        "in",
        Value::Array(vec![Value::Int(session.uid)]),
    )]);
    let mut tasks = session
        .search_read("project.task", domain, TASK_FIELDS)
        .await?;

    if tasks.is_empty() {
        return Err(ApiError::NotFound(
            "No tasks found for the authenticated user".to_string(),
        ));
    }

    attach_activities(session, &mut tasks).await?;
    attach_stages(session, &mut tasks).await?;
    attach_tag_names(session, &mut tasks).await?;

    Ok(tasks)
}

/// One batched activity query for the whole task set, joined locally by
/// `res_id`. Tasks without activities get an empty list.
async fn attach_activities(session: &Session, tasks: &mut [Value]) -> Result<(), ApiError> {
    let task_ids: Vec<Value> = tasks
        .iter()
        .filter_map(|task| task.get("id").and_then(Value::as_i64))
        .map(Value::Int)
        .collect();
    let domain = Value::Array(vec![
        Value::clause("res_model", "=", "project.task".into()),
        Value::clause("res_id", "in", Value::Array(task_ids)),
    ]);
    let activities = session
        .search_read("mail.activity", domain, ACTIVITY_FIELDS)
        .await?;

    let mut by_task: HashMap<i64, Vec<Value>> = HashMap::new();
    for activity in activities {
        if let Some(res_id) = activity.get("res_id").and_then(Value::as_i64) {
            by_task.entry(res_id).or_default().push(activity);
        }
    }

    for task in tasks.iter_mut() {
        let id = task.get("id").and_then(Value::as_i64);
        let activities = id.and_then(|id| by_task.remove(&id)).unwrap_or_default();
        if let Some(map) = task.as_struct_mut() {
            map.insert("activities".to_string(), Value::Array(activities));
        }
    }
    Ok(())
}

/// One stage query per distinct project id. Tasks sharing a project share
/// the resulting stage-name sequence; tasks without a project get none.
async fn attach_stages(session: &Session, tasks: &mut [Value]) -> Result<(), ApiError> {
    let mut seen = HashSet::new();
    let mut project_ids = Vec::new();
    for task in tasks.iter() {
        if let Some(project_id) = related_id(task, "project_id") {
            if seen.insert(project_id) {
                project_ids.push(project_id);
            }
        }
    }

    let mut stages_by_project: HashMap<i64, Vec<Value>> = HashMap::new();
    for project_id in project_ids {
        let domain = Value::Array(vec![Value::clause(
            "project_ids",
            "in",
            Value::Array(vec![Value::Int(project_id)]),
        )]);
        let stages = session
            .search_read("project.task.type", domain, STAGE_FIELDS)
            .await?;
        let names = stages
            .iter()
            .filter_map(|stage| stage.get("name").and_then(Value::as_str))
            .map(Value::from)
            .collect();
        stages_by_project.insert(project_id, names);
    }

    for task in tasks.iter_mut() {
        let Some(project_id) = related_id(task, "project_id") else {
            continue;
        };
        let Some(names) = stages_by_project.get(&project_id) else {
            continue;
        };
        if let Some(map) = task.as_struct_mut() {
            map.insert("stages".to_string(), Value::Array(names.clone()));
        }
    }
    Ok(())
}

/// One tag read over the union of referenced tag ids. `tag_names` keeps the
/// order of each task's `tag_ids`; a referenced id the read did not return
/// fails the whole request.
async fn attach_tag_names(session: &Session, tasks: &mut [Value]) -> Result<(), ApiError> {
    let mut seen = HashSet::new();
    let mut tag_ids = Vec::new();
    for task in tasks.iter() {
        for tag_id in task_tag_ids(task) {
            if seen.insert(tag_id) {
                tag_ids.push(tag_id);
            }
        }
    }

    let mut tag_map: HashMap<i64, String> = HashMap::new();
    if !tag_ids.is_empty() {
        let tags = session.read("project.tags", &tag_ids, &["name"]).await?;
        for tag in &tags {
            let id = tag.get("id").and_then(Value::as_i64);
            let name = tag.get("name").and_then(Value::as_str);
            if let (Some(id), Some(name)) = (id, name) {
                tag_map.insert(id, name.to_owned());
            }
        }
    }

    for task in tasks.iter_mut() {
        let ids = task_tag_ids(task);
        let mut names = Vec::with_capacity(ids.len());
        for id in ids {
            let name = tag_map.get(&id).ok_or(ApiError::MissingTag(id))?;
            names.push(Value::from(name.as_str()));
        }
        if let Some(map) = task.as_struct_mut() {
            map.insert("tag_names".to_string(), Value::Array(names));
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ProjectOverview {
    #[serde(rename = "Project")]
    pub project: String,
    #[serde(rename = "Tasks")]
    pub tasks: Vec<String>,
    #[serde(rename = "Stages")]
    pub stages: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UserName {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ProjectSnapshot {
    pub projects: Vec<ProjectOverview>,
    pub users: Vec<UserName>,
}

/// The task-creation form data: the caller's projects with their task and
/// stage names, plus every active user.
pub async fn project_snapshot(session: &Session) -> Result<ProjectSnapshot, ApiError> {
    let domain = Value::Array(vec![Value::clause("user_id", "=", Value::Int(session.uid))]);
    let projects = session
        .search_read("project.project", domain, &["name"])
        .await?;

    let mut overview = Vec::with_capacity(projects.len());
    for project in &projects {
        let Some(project_id) = project.get("id").and_then(Value::as_i64) else {
            continue;
        };
        let name = project
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let task_domain = Value::Array(vec![Value::clause(
            "project_id",
            "=",
            Value::Int(project_id),
        )]);
        let tasks = session
            .search_read("project.task", task_domain, &["name"])
            .await?;

        let stage_domain = Value::Array(vec![Value::clause(
            "project_ids",
            "in",
            Value::Int(project_id),
        )]);
        let stages = session
            .search_read("project.task.type", stage_domain, &["name"])
            .await?;

        overview.push(ProjectOverview {
            project: name,
            tasks: names_of(&tasks),
            stages: names_of(&stages),
        });
    }

    let user_domain = Value::Array(vec![Value::clause("active", "=", Value::Bool(true))]);
    let users = session
        .search_read("res.users", user_domain, &["name"])
        .await?;
    let users = names_of(&users)
        .into_iter()
        .map(|name| UserName { name })
        .collect();

    Ok(ProjectSnapshot {
        projects: overview,
        users,
    })
}

/// The session user's tasks with their timesheet lines nested under each
/// task. One batched line query, joined locally by the `task_id` relation.
pub async fn tasks_with_timesheets(session: &Session) -> Result<Vec<Value>, ApiError> {
    let domain = Value::Array(vec![Value::clause(
        "user_ids",
        "in",
        Value::Array(vec![Value::Int(session.uid)]),
    )]);
    let mut tasks = session
        .search_read("project.task", domain, &["id", "name"])
        .await?;

    let task_ids: Vec<Value> = tasks
        .iter()
        .filter_map(|task| task.get("id").and_then(Value::as_i64))
        .map(Value::Int)
        .collect();

    let mut by_task: HashMap<i64, Vec<Value>> = HashMap::new();
    if !task_ids.is_empty() {
        let line_domain = Value::Array(vec![Value::clause(
            "task_id",
            "in",
            Value::Array(task_ids),
        )]);
        let lines = session
            .search_read("account.analytic.line", line_domain, TIMESHEET_FIELDS)
            .await?;
        for line in lines {
            if let Some(task_id) = related_id(&line, "task_id") {
                by_task.entry(task_id).or_default().push(line);
            }
        }
    }

    for task in tasks.iter_mut() {
        let id = task.get("id").and_then(Value::as_i64);
        let lines = id.and_then(|id| by_task.remove(&id)).unwrap_or_default();
        if let Some(map) = task.as_struct_mut() {
            map.insert("timesheet_lines".to_string(), Value::Array(lines));
        }
    }

    Ok(tasks)
}

/// Relation fields arrive as `[id, display_name]` pairs, or `false` when
/// unset; pull out the id when there is one.
fn related_id(record: &Value, field: &str) -> Option<i64> {
    record.get(field)?.as_array()?.first()?.as_i64()
}

fn task_tag_ids(task: &Value) -> Vec<i64> {
    task.get("tag_ids")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

fn names_of(records: &[Value]) -> Vec<String> {
    records
        .iter()
        .filter_map(|record| record.get("name").and_then(Value::as_str))
        .map(str::to_owned)
        .collect()
}
