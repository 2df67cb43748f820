use std::collections::BTreeMap;

use serde::Deserialize;

use odoo_rpc::Value;

use crate::api::ApiError;
use crate::session::Session;

#[derive(Debug, Deserialize)]
pub struct NewTask {
    pub task_name: String,
    pub project_name: String,
    pub stage_name: String,
    pub user_name: String,
    pub priority: String,
    #[serde(default)]
    pub deadline: Option<String>,
}

impl NewTask {
    /// Priority is the remote's starred flag and must be exactly the
    /// literal "0" or "1"; it is submitted as an integer.
    pub fn priority_flag(&self) -> Result<i64, ApiError> {
        match self.priority.as_str() {
            "0" => Ok(0),
            "1" => Ok(1),
            _ => Err(ApiError::InvalidInput("Invalid priority value".to_string())),
        }
    }
}

/// Resolve the human-readable project, stage and user names to remote ids,
/// then create the task. Any name that resolves to nothing aborts the
/// workflow before the create call goes out.
pub async fn create_task(session: &Session, task: &NewTask) -> Result<i64, ApiError> {
    let priority = task.priority_flag()?;

    let project_ids = session
        .search("project.project", name_domain(&task.project_name))
        .await?;
    let Some(&project_id) = project_ids.first() else {
        return Err(ApiError::NotFound(format!(
            "Project '{}' not found",
            task.project_name
        )));
    };

    let stage_domain = Value::Array(vec![
        Value::clause("name", "=", task.stage_name.as_str().into()),
        Value::clause("project_ids", "in", Value::Int(project_id)),
    ]);
    let stage_ids = session.search("project.task.type", stage_domain).await?;
    let Some(&stage_id) = stage_ids.first() else {
        return Err(ApiError::NotFound(format!(
            "Stage '{}' not found in project '{}'",
            task.stage_name, task.project_name
        )));
    };

    let users = session
        .search_read("res.users", name_domain(&task.user_name), &["id"])
        .await?;
    let Some(user_id) = users.first().and_then(|user| user.get("id").and_then(Value::as_i64))
    else {
        return Err(ApiError::NotFound(format!(
            "User '{}' not found",
            task.user_name
        )));
    };

    let values = Value::Struct(BTreeMap::from([
        ("name".to_string(), task.task_name.as_str().into()),
        ("project_id".to_string(), Value::Int(project_id)),
        ("stage_id".to_string(), Value::Int(stage_id)),
        // (6, 0, ids) replaces the assignee set wholesale.
        (
            "user_ids".to_string(),
            Value::Array(vec![Value::Array(vec![
                Value::Int(6),
                Value::Int(0),
                Value::Array(vec![Value::Int(user_id)]),
            ])]),
        ),
        ("priority".to_string(), Value::Int(priority)),
        (
            "date_deadline".to_string(),
            task.deadline
                .as_deref()
                .map(Value::from)
                .unwrap_or(Value::Bool(false)),
        ),
    ]));

    session.create("project.task", values).await
}

/// Resolve the stage name (unscoped, unlike creation) and move the task.
/// A `false` acknowledgement from the remote is a rejected write.
pub async fn update_stage(
    session: &Session,
    task_id: i64,
    stage_name: &str,
) -> Result<(), ApiError> {
    let stage_ids = session
        .search("project.task.type", name_domain(stage_name))
        .await?;
    let Some(&stage_id) = stage_ids.first() else {
        return Err(ApiError::NotFound("Stage not found".to_string()));
    };

    let values = Value::Struct(BTreeMap::from([(
        "stage_id".to_string(),
        Value::Int(stage_id),
    )]));
    let acknowledged = session.write("project.task", &[task_id], values).await?;
    if acknowledged {
        Ok(())
    } else {
        Err(ApiError::WriteRejected)
    }
}

#[derive(Debug, Deserialize)]
pub struct NewTimesheetLine {
    pub task_id: i64,
    pub unit_amount: f64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

pub async fn add_timesheet_line(
    session: &Session,
    line: &NewTimesheetLine,
) -> Result<i64, ApiError> {
    let values = Value::Struct(BTreeMap::from([
        ("task_id".to_string(), Value::Int(line.task_id)),
        ("unit_amount".to_string(), Value::Double(line.unit_amount)),
        (
            "name".to_string(),
            line.name
                .as_deref()
                .map(Value::from)
                .unwrap_or(Value::Bool(false)),
        ),
        (
            "date".to_string(),
            line.date
                .as_deref()
                .map(Value::from)
                .unwrap_or(Value::Bool(false)),
        ),
    ]));
    session.create("account.analytic.line", values).await
}

fn name_domain(name: &str) -> Value {
    Value::Array(vec![Value::clause("name", "=", name.into())])
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use odoo_rpc::mock::{MockConnector, MockRpc};
    use odoo_rpc::Value;

    use super::{add_timesheet_line, create_task, update_stage, NewTask, NewTimesheetLine};
    use crate::api::ApiError;
    use crate::connection::ConnectionContext;
    use crate::session::Session;

    fn new_task() -> NewTask {
        NewTask {
            task_name: "Ship it".to_string(),
            project_name: "Website".to_string(),
            stage_name: "Todo".to_string(),
            user_name: "Alice".to_string(),
            priority: "1".to_string(),
            deadline: Some("2024-07-01".to_string()),
        }
    }

    async fn session(rpc: &MockRpc) -> Session {
        let connector = MockConnector::new(rpc.clone());
        let context = ConnectionContext {
            url: "http://odoo.example.com:8069".to_string(),
            db: "master".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
        };
        Session::open(&connector, &context).await.unwrap()
    }

    #[tokio::test]
    async fn create_task_resolves_names_then_creates() {
        let rpc = MockRpc::new()
            .with_uid(7)
            .respond(
                "project.project",
                "search",
                Value::Array(vec![Value::Int(10)]),
            )
            .respond(
                "project.task.type",
                "search",
                Value::Array(vec![Value::Int(4)]),
            )
            .respond(
                "res.users",
                "search_read",
                Value::Array(vec![Value::Struct(BTreeMap::from([(
                    "id".to_string(),
                    Value::Int(8),
                )]))]),
            )
            .respond("project.task", "create", Value::Int(99));
        let session = session(&rpc).await;

        let task_id = create_task(&session, &new_task()).await.unwrap();

        assert_eq!(task_id, 99);
        assert_eq!(rpc.count("project.task", "create"), 1);
    }

    #[tokio::test]
    async fn unresolved_stage_aborts_before_create() {
        let rpc = MockRpc::new()
            .with_uid(7)
            .respond(
                "project.project",
                "search",
                Value::Array(vec![Value::Int(10)]),
            )
            .respond("project.task.type", "search", Value::Array(vec![]));
        let session = session(&rpc).await;

        match create_task(&session, &new_task()).await {
            Err(ApiError::NotFound(message)) => {
                assert_eq!(message, "Stage 'Todo' not found in project 'Website'");
            }
            other => panic!("expected not-found, got {:?}", other.err()),
        }

        assert_eq!(rpc.count("project.task", "create"), 0);
        assert_eq!(rpc.count("res.users", "search_read"), 0);
    }

    #[tokio::test]
    async fn unresolved_project_aborts_before_anything_else() {
        let rpc = MockRpc::new()
            .with_uid(7)
            .respond("project.project", "search", Value::Array(vec![]));
        let session = session(&rpc).await;

        match create_task(&session, &new_task()).await {
            Err(ApiError::NotFound(message)) => {
                assert_eq!(message, "Project 'Website' not found");
            }
            other => panic!("expected not-found, got {:?}", other.err()),
        }

        assert_eq!(rpc.count("project.task.type", "search"), 0);
        assert_eq!(rpc.count("project.task", "create"), 0);
    }

    #[tokio::test]
    async fn priority_must_be_the_zero_or_one_literal() {
        let mut task = new_task();
        task.priority = "2".to_string();

        let rpc = MockRpc::new().with_uid(7);
        let session = session(&rpc).await;

        match create_task(&session, &task).await {
            Err(ApiError::InvalidInput(message)) => {
                assert_eq!(message, "Invalid priority value");
            }
            other => panic!("expected invalid input, got {:?}", other.err()),
        }

        // Rejected before any resolution query went out.
        assert_eq!(rpc.count("project.project", "search"), 0);
    }

    #[tokio::test]
    async fn update_stage_reports_rejected_writes() {
        let rpc = MockRpc::new()
            .with_uid(7)
            .respond(
                "project.task.type",
                "search",
                Value::Array(vec![Value::Int(4)]),
            )
            .respond("project.task", "write", Value::Bool(false));
        let session = session(&rpc).await;

        assert!(matches!(
            update_stage(&session, 3, "Done").await,
            Err(ApiError::WriteRejected)
        ));
    }

    #[tokio::test]
    async fn update_stage_with_unknown_name_is_not_found() {
        let rpc = MockRpc::new()
            .with_uid(7)
            .respond("project.task.type", "search", Value::Array(vec![]));
        let session = session(&rpc).await;

        match update_stage(&session, 3, "Nowhere").await {
            Err(ApiError::NotFound(message)) => assert_eq!(message, "Stage not found"),
            other => panic!("expected not-found, got {other:?}"),
        }
        assert_eq!(rpc.count("project.task", "write"), 0);
    }

    #[tokio::test]
    async fn timesheet_line_creation_returns_the_new_id() {
        let rpc = MockRpc::new()
            .with_uid(7)
            .respond("account.analytic.line", "create", Value::Int(41));
        let session = session(&rpc).await;

        let line = NewTimesheetLine {
            task_id: 3,
            unit_amount: 1.5,
            name: Some("debugging".to_string()),
            date: Some("2024-07-01".to_string()),
        };

        assert_eq!(add_timesheet_line(&session, &line).await.unwrap(), 41);
    }
}
