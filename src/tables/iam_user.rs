//! aws_iam_user table
//!
//! IAM users with their groups, attached managed policies, and inline
//! policy documents. Inline policy documents require one `GetUserPolicy`
//! call per policy name; those calls fan out concurrently per user.

use crate::error::{Error, Result};
use crate::table::{
    fanout, stream_item, transform, Column, ColumnType, GetConfig, HydrateMap, Hydrator,
    ItemSender, QueryContext, Table, Transform,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const SERVICE: &str = "iam";
const TARGET_LIST_USERS: &str = "AmazonIdentityManagement.ListUsers";
const TARGET_GET_USER: &str = "AmazonIdentityManagement.GetUser";
const TARGET_LIST_GROUPS_FOR_USER: &str = "AmazonIdentityManagement.ListGroupsForUser";
const TARGET_LIST_ATTACHED_USER_POLICIES: &str =
    "AmazonIdentityManagement.ListAttachedUserPolicies";
const TARGET_LIST_USER_POLICIES: &str = "AmazonIdentityManagement.ListUserPolicies";
const TARGET_GET_USER_POLICY: &str = "AmazonIdentityManagement.GetUserPolicy";

/// One IAM user as returned by ListUsers/GetUser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IamUser {
    pub user_name: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub arn: Option<String>,
    #[serde(default)]
    pub create_date: Option<String>,
    #[serde(default)]
    pub password_last_used: Option<String>,
}

pub fn table() -> Table<IamUser> {
    Table::new("aws_iam_user", "AWS IAM User", list_users)
        .get_config(GetConfig::new("name", get_user))
        .hydrator(Hydrator::new("user_detail", user_detail))
        .hydrator(Hydrator::new("user_groups", user_groups))
        .hydrator(Hydrator::new("attached_policies", attached_policies))
        .hydrator(Hydrator::new("inline_policy_names", inline_policy_names))
        .hydrator(
            Hydrator::new("inline_policies", inline_policies).depends(&["inline_policy_names"]),
        )
        .columns(vec![
            Column::new(
                "name",
                "The friendly name identifying the user",
                ColumnType::String,
            )
            .transform(Transform::from_field("UserName")),
            Column::new(
                "user_id",
                "The stable and unique string identifying the user",
                ColumnType::String,
            ),
            Column::new("path", "The path to the user", ColumnType::String),
            Column::new(
                "arn",
                "The Amazon Resource Name (ARN) that identifies the user",
                ColumnType::String,
            ),
            Column::new(
                "create_date",
                "The date and time, when the user was created",
                ColumnType::Timestamp,
            ),
            Column::new(
                "password_last_used",
                "The date and time, when the user's password was last used to sign in to an AWS website",
                ColumnType::Timestamp,
            ),
            Column::new(
                "permissions_boundary_arn",
                "The ARN of the policy used to set the permissions boundary for the user",
                ColumnType::String,
            )
            .hydrate("user_detail"),
            Column::new(
                "permissions_boundary_type",
                "The permissions boundary usage type that indicates what type of IAM resource is used as the permissions boundary for an entity",
                ColumnType::String,
            )
            .hydrate("user_detail"),
            Column::new(
                "groups",
                "A list of groups attached to the user",
                ColumnType::Json,
            )
            .hydrate("user_groups")
            .transform(Transform::from_field("Groups")),
            Column::new(
                "inline_policies",
                "A list of policy documents that are embedded as inline policies for the user",
                ColumnType::Json,
            )
            .hydrate("inline_policies")
            .transform(Transform::from_value()),
            Column::new(
                "attached_policy_arns",
                "A list of managed policies attached to the user",
                ColumnType::Json,
            )
            .hydrate("attached_policies")
            .transform(Transform::from_value()),
            Column::new(
                "tags_src",
                "A list of tags that are attached to the user",
                ColumnType::Json,
            )
            .hydrate("user_detail")
            .transform(Transform::from_field("TagsRaw")),
            Column::new("tags", "A map of tags for the resource", ColumnType::Json)
                .hydrate("user_detail")
                .transform(Transform::from_field("Tags")),
            Column::new("title", "Title of the resource", ColumnType::String)
                .transform(Transform::from_field("UserName")),
            Column::new("akas", "Array of globally unique identifier strings (also known as) for the resource", ColumnType::Json)
                .transform(Transform::from_field("Arn").map(transform::arn_to_akas)),
        ])
}

//// LIST FUNCTION

fn list_users(ctx: QueryContext, mut tx: ItemSender<IamUser>) -> BoxFuture<'static, Result<()>> {
    async move {
        let mut marker: Option<String> = None;

        loop {
            let mut body = json!({});
            if let Some(marker) = &marker {
                body["Marker"] = json!(marker);
            }

            let response = ctx.client().call(SERVICE, TARGET_LIST_USERS, &body).await?;

            let users = response
                .get("Users")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for user in users {
                let user: IamUser = serde_json::from_value(user)
                    .map_err(|e| Error::decode("IAM user", e))?;
                if !stream_item(&mut tx, user).await {
                    return Ok(());
                }
            }

            let truncated = response
                .get("IsTruncated")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            marker = response
                .get("Marker")
                .and_then(Value::as_str)
                .map(str::to_string);
            if !truncated || marker.is_none() {
                return Ok(());
            }
        }
    }
    .boxed()
}

//// GET FUNCTION

fn get_user(ctx: QueryContext) -> BoxFuture<'static, Result<IamUser>> {
    async move {
        let name = ctx.require_qual("name")?.to_string();
        let response = ctx
            .client()
            .call(SERVICE, TARGET_GET_USER, &json!({ "UserName": name }))
            .await?;
        let user = response
            .get("User")
            .cloned()
            .ok_or_else(|| Error::decode("GetUser response", "missing User field"))?;
        serde_json::from_value(user).map_err(|e| Error::decode("IAM user", e))
    }
    .boxed()
}

//// HYDRATE FUNCTIONS

/// GetUser carries fields ListUsers omits: tags and the permissions
/// boundary. Exposed as a flat map for the dependent columns.
fn user_detail<'a>(
    ctx: &'a QueryContext,
    user: &'a IamUser,
    _deps: &'a HydrateMap,
) -> BoxFuture<'a, Result<Value>> {
    async move {
        tracing::trace!("user_detail: {}", user.user_name);
        let response = ctx
            .client()
            .call(
                SERVICE,
                TARGET_GET_USER,
                &json!({ "UserName": user.user_name }),
            )
            .await?;
        let detail = response.get("User").cloned().unwrap_or(Value::Null);

        let tags_raw = detail.get("Tags").cloned().unwrap_or(Value::Null);
        let tags = transform::tag_list_to_map(&tags_raw)?;

        let boundary_arn = detail
            .pointer("/PermissionsBoundary/PermissionsBoundaryArn")
            .cloned()
            .unwrap_or_else(|| json!(""));
        let boundary_type = detail
            .pointer("/PermissionsBoundary/PermissionsBoundaryType")
            .cloned()
            .unwrap_or_else(|| json!(""));

        Ok(json!({
            "TagsRaw": tags_raw,
            "Tags": tags,
            "PermissionsBoundaryArn": boundary_arn,
            "PermissionsBoundaryType": boundary_type,
        }))
    }
    .boxed()
}

fn user_groups<'a>(
    ctx: &'a QueryContext,
    user: &'a IamUser,
    _deps: &'a HydrateMap,
) -> BoxFuture<'a, Result<Value>> {
    async move {
        tracing::trace!("user_groups: {}", user.user_name);
        ctx.client()
            .call(
                SERVICE,
                TARGET_LIST_GROUPS_FOR_USER,
                &json!({ "UserName": user.user_name }),
            )
            .await
    }
    .boxed()
}

fn attached_policies<'a>(
    ctx: &'a QueryContext,
    user: &'a IamUser,
    _deps: &'a HydrateMap,
) -> BoxFuture<'a, Result<Value>> {
    async move {
        tracing::trace!("attached_policies: {}", user.user_name);
        let response = ctx
            .client()
            .call(
                SERVICE,
                TARGET_LIST_ATTACHED_USER_POLICIES,
                &json!({ "UserName": user.user_name }),
            )
            .await?;

        let arns: Vec<Value> = response
            .get("AttachedPolicies")
            .and_then(Value::as_array)
            .map(|policies| {
                policies
                    .iter()
                    .filter_map(|p| p.get("PolicyArn").cloned())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Value::Array(arns))
    }
    .boxed()
}

fn inline_policy_names<'a>(
    ctx: &'a QueryContext,
    user: &'a IamUser,
    _deps: &'a HydrateMap,
) -> BoxFuture<'a, Result<Value>> {
    async move {
        tracing::trace!("inline_policy_names: {}", user.user_name);
        ctx.client()
            .call(
                SERVICE,
                TARGET_LIST_USER_POLICIES,
                &json!({ "UserName": user.user_name }),
            )
            .await
    }
    .boxed()
}

/// One GetUserPolicy call per inline policy name, issued concurrently.
/// All successes are aggregated; any failure fails the whole hydrate.
fn inline_policies<'a>(
    ctx: &'a QueryContext,
    user: &'a IamUser,
    deps: &'a HydrateMap,
) -> BoxFuture<'a, Result<Value>> {
    async move {
        let names = deps
            .get("inline_policy_names")
            .ok_or_else(|| Error::MissingDependency {
                hydrator: "inline_policies".to_string(),
                dependency: "inline_policy_names".to_string(),
            })?
            .get("PolicyNames")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let calls = names
            .into_iter()
            .filter_map(|name| name.as_str().map(str::to_string))
            .map(|policy_name| {
                let ctx = ctx.clone();
                let user_name = user.user_name.clone();
                async move { fetch_inline_policy(&ctx, &user_name, &policy_name).await }
            });

        let policies = fanout::join_all_first_error(calls, fanout::DEFAULT_FANOUT).await?;
        Ok(Value::Array(policies))
    }
    .boxed()
}

async fn fetch_inline_policy(
    ctx: &QueryContext,
    user_name: &str,
    policy_name: &str,
) -> Result<Value> {
    let response = ctx
        .client()
        .call(
            SERVICE,
            TARGET_GET_USER_POLICY,
            &json!({ "UserName": user_name, "PolicyName": policy_name }),
        )
        .await?;

    // Policy documents come back URL-encoded
    let document = match response.get("PolicyDocument") {
        Some(Value::Null) | None => Value::Null,
        Some(encoded) => transform::url_decoded_json(encoded)?,
    };

    Ok(json!({
        "PolicyName": response.get("PolicyName").cloned().unwrap_or_else(|| json!(policy_name)),
        "PolicyDocument": document,
    }))
}
