use std::collections::HashSet;

use odoo_rpc::Value;

use crate::api::ApiError;
use crate::session::Session;

/// Exact, case-sensitive match against the remote's group naming. Fragile
/// by design: the original resolves the administrator group by its display
/// name, and renaming the group on the remote changes the answer.
const ADMIN_GROUP_NAME: &str = "Administrator";

/// Whether the session user belongs to any group named `Administrator`.
/// The absence of such a group means "not an admin", never an error.
pub async fn is_admin(session: &Session) -> Result<bool, ApiError> {
    let users = session
        .read("res.users", &[session.uid], &["id", "groups_id"])
        .await?;
    let Some(user) = users.first() else {
        return Err(ApiError::NotFound("User not found".to_string()));
    };

    let group_ids: HashSet<i64> = user
        .get("groups_id")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default();

    let groups = session
        .search_read("res.groups", Value::Array(vec![]), &["name"])
        .await?;
    let is_admin = groups
        .iter()
        .filter(|group| group.get("name").and_then(Value::as_str) == Some(ADMIN_GROUP_NAME))
        .filter_map(|group| group.get("id").and_then(Value::as_i64))
        .any(|admin_id| group_ids.contains(&admin_id));

    Ok(is_admin)
}

/// Names of the modules installed on the remote.
pub async fn installed_modules(session: &Session) -> Result<Vec<String>, ApiError> {
    let domain = Value::Array(vec![Value::clause("state", "=", "installed".into())]);
    let modules = session
        .search_read("ir.module.module", domain, &["name"])
        .await?;
    Ok(modules
        .iter()
        .filter_map(|module| module.get("name").and_then(Value::as_str))
        .map(str::to_owned)
        .collect())
}
