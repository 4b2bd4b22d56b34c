//! aws_ssm_maintenance_window table
//!
//! Systems Manager maintenance windows. The list call returns summary
//! identities; schedule details, registered targets, registered tasks, and
//! tags each come from their own follow-up call.

use crate::error::{Error, Result};
use crate::table::{
    stream_item, transform, Column, ColumnType, GetConfig, HydrateMap, Hydrator, ItemSender,
    QueryContext, Table, Transform,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const SERVICE: &str = "ssm";
const TARGET_DESCRIBE_WINDOWS: &str = "AmazonSSM.DescribeMaintenanceWindows";
const TARGET_GET_WINDOW: &str = "AmazonSSM.GetMaintenanceWindow";
const TARGET_LIST_TAGS: &str = "AmazonSSM.ListTagsForResource";
const TARGET_DESCRIBE_TARGETS: &str = "AmazonSSM.DescribeMaintenanceWindowTargets";
const TARGET_DESCRIBE_TASKS: &str = "AmazonSSM.DescribeMaintenanceWindowTasks";

/// One maintenance window identity as returned by DescribeMaintenanceWindows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MaintenanceWindow {
    pub window_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub cutoff: Option<i64>,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub schedule_timezone: Option<String>,
    #[serde(default)]
    pub schedule_offset: Option<i64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub next_execution_time: Option<String>,
}

pub fn table() -> Table<MaintenanceWindow> {
    Table::new(
        "aws_ssm_maintenance_window",
        "AWS SSM Maintenance Window",
        list_windows,
    )
    .get_config(GetConfig::new("window_id", get_window).ignore_codes(&["DoesNotExistException"]))
    .hydrator(Hydrator::new("window_detail", window_detail))
    .hydrator(Hydrator::new("window_tags", window_tags))
    .hydrator(Hydrator::new("window_targets", window_targets))
    .hydrator(Hydrator::new("window_tasks", window_tasks))
    .columns(vec![
        Column::new("name", "The name of the maintenance window", ColumnType::String),
        Column::new(
            "window_id",
            "The ID of the maintenance window",
            ColumnType::String,
        ),
        Column::new(
            "enabled",
            "Indicates whether the maintenance window is enabled",
            ColumnType::Bool,
        ),
        Column::new(
            "description",
            "A description of the maintenance window",
            ColumnType::String,
        ),
        Column::new(
            "allow_unassociated_targets",
            "Indicates whether targets must be registered with the maintenance window before tasks can be defined for those targets",
            ColumnType::Bool,
        )
        .hydrate("window_detail"),
        Column::new(
            "duration",
            "The duration of the maintenance window in hours",
            ColumnType::Int,
        ),
        Column::new(
            "cutoff",
            "The number of hours before the end of the maintenance window that the system stops scheduling new tasks for execution",
            ColumnType::Int,
        ),
        Column::new("schedule", "The schedule of the maintenance window in the form of a cron or rate expression", ColumnType::String),
        Column::new(
            "schedule_offset",
            "The number of days to wait to run a maintenance window after the scheduled cron expression date and time",
            ColumnType::Int,
        ),
        Column::new(
            "schedule_timezone",
            "The time zone that the scheduled maintenance window executions are based on, in Internet Assigned Numbers Authority (IANA) format",
            ColumnType::String,
        ),
        Column::new(
            "start_date",
            "The date and time, in ISO-8601 Extended format, for when the maintenance window is scheduled to become active",
            ColumnType::Timestamp,
        ),
        Column::new(
            "end_date",
            "The date and time, in ISO-8601 Extended format, for when the maintenance window is scheduled to become inactive",
            ColumnType::Timestamp,
        ),
        Column::new(
            "next_execution_time",
            "The next time the maintenance window will actually run, taking into account any specified times for the maintenance window to become active or inactive",
            ColumnType::Timestamp,
        ),
        Column::new(
            "created_date",
            "The date the maintenance window was created",
            ColumnType::Timestamp,
        )
        .hydrate("window_detail"),
        Column::new(
            "modified_date",
            "The date the maintenance window was last modified",
            ColumnType::Timestamp,
        )
        .hydrate("window_detail"),
        Column::new(
            "targets",
            "The targets registered with the maintenance window",
            ColumnType::Json,
        )
        .hydrate("window_targets")
        .transform(Transform::from_field("Targets")),
        Column::new(
            "tasks",
            "The tasks registered with the maintenance window",
            ColumnType::Json,
        )
        .hydrate("window_tasks")
        .transform(Transform::from_field("Tasks")),
        Column::new(
            "tags_src",
            "A list of tags attached to the maintenance window",
            ColumnType::Json,
        )
        .hydrate("window_tags")
        .transform(Transform::from_field("TagList")),
        Column::new("tags", "A map of tags for the resource", ColumnType::Json)
            .hydrate("window_tags")
            .transform(Transform::from_field("TagList").map(transform::tag_list_to_map)),
        Column::new("title", "Title of the resource", ColumnType::String)
            .transform(Transform::from_field("Name")),
    ])
}

//// LIST FUNCTION

fn list_windows(
    ctx: QueryContext,
    mut tx: ItemSender<MaintenanceWindow>,
) -> BoxFuture<'static, Result<()>> {
    async move {
        let mut next_token: Option<String> = None;

        loop {
            let mut body = json!({ "MaxResults": 50 });
            if let Some(token) = &next_token {
                body["NextToken"] = json!(token);
            }

            let response = ctx
                .client()
                .call(SERVICE, TARGET_DESCRIBE_WINDOWS, &body)
                .await?;

            let identities = response
                .get("WindowIdentities")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for identity in identities {
                let window: MaintenanceWindow = serde_json::from_value(identity)
                    .map_err(|e| Error::decode("maintenance window", e))?;
                if !stream_item(&mut tx, window).await {
                    return Ok(());
                }
            }

            next_token = response
                .get("NextToken")
                .and_then(Value::as_str)
                .map(str::to_string);
            if next_token.is_none() {
                return Ok(());
            }
        }
    }
    .boxed()
}

//// GET FUNCTION

fn get_window(ctx: QueryContext) -> BoxFuture<'static, Result<MaintenanceWindow>> {
    async move {
        let window_id = ctx.require_qual("window_id")?.to_string();
        let response = ctx
            .client()
            .call(SERVICE, TARGET_GET_WINDOW, &json!({ "WindowId": window_id }))
            .await?;
        serde_json::from_value(response).map_err(|e| Error::decode("maintenance window", e))
    }
    .boxed()
}

//// HYDRATE FUNCTIONS

/// GetMaintenanceWindow returns fields the list identity omits
/// (AllowUnassociatedTargets, CreatedDate, ModifiedDate).
fn window_detail<'a>(
    ctx: &'a QueryContext,
    window: &'a MaintenanceWindow,
    _deps: &'a HydrateMap,
) -> BoxFuture<'a, Result<Value>> {
    async move {
        tracing::trace!("window_detail: {}", window.window_id);
        ctx.client()
            .call(
                SERVICE,
                TARGET_GET_WINDOW,
                &json!({ "WindowId": window.window_id }),
            )
            .await
    }
    .boxed()
}

fn window_tags<'a>(
    ctx: &'a QueryContext,
    window: &'a MaintenanceWindow,
    _deps: &'a HydrateMap,
) -> BoxFuture<'a, Result<Value>> {
    async move {
        tracing::trace!("window_tags: {}", window.window_id);
        ctx.client()
            .call(
                SERVICE,
                TARGET_LIST_TAGS,
                &json!({
                    "ResourceType": "MaintenanceWindow",
                    "ResourceId": window.window_id,
                }),
            )
            .await
    }
    .boxed()
}

fn window_targets<'a>(
    ctx: &'a QueryContext,
    window: &'a MaintenanceWindow,
    _deps: &'a HydrateMap,
) -> BoxFuture<'a, Result<Value>> {
    async move {
        tracing::trace!("window_targets: {}", window.window_id);
        ctx.client()
            .call(
                SERVICE,
                TARGET_DESCRIBE_TARGETS,
                &json!({ "WindowId": window.window_id }),
            )
            .await
    }
    .boxed()
}

fn window_tasks<'a>(
    ctx: &'a QueryContext,
    window: &'a MaintenanceWindow,
    _deps: &'a HydrateMap,
) -> BoxFuture<'a, Result<Value>> {
    async move {
        tracing::trace!("window_tasks: {}", window.window_id);
        ctx.client()
            .call(
                SERVICE,
                TARGET_DESCRIBE_TASKS,
                &json!({ "WindowId": window.window_id }),
            )
            .await
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableSpec;

    #[test]
    fn table_shape_matches_declaration() {
        let table = table();
        let spec: &dyn TableSpec = &table;
        assert_eq!(spec.name(), "aws_ssm_maintenance_window");
        assert_eq!(spec.key_column(), Some("window_id"));
        assert!(spec.columns().iter().any(|c| c.name == "next_execution_time"));
    }

    #[test]
    fn window_deserializes_from_wire_shape() {
        let window: MaintenanceWindow = serde_json::from_value(json!({
            "WindowId": "mw-0123456789abcdef0",
            "Name": "patch-tuesday",
            "Enabled": true,
            "Duration": 4,
            "Cutoff": 1,
            "Schedule": "cron(0 4 ? * TUE *)"
        }))
        .unwrap();
        assert_eq!(window.window_id, "mw-0123456789abcdef0");
        assert_eq!(window.enabled, Some(true));
        assert_eq!(window.schedule_offset, None);
    }
}
