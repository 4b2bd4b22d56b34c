//! Integration tests driving full table queries against mocked AWS endpoints
//!
//! A single wiremock server stands in for every service endpoint (the
//! endpoint override routes all services to one host); operations are
//! distinguished by their `X-Amz-Target` header, per-resource calls by
//! partial body matching.

use awstab::{CellValue, ConnectionConfig, Plugin, Row};
use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{bearer_token, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn plugin_for(server: &MockServer) -> Plugin {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let config = ConnectionConfig {
        region: Some("us-east-1".to_string()),
        endpoint_url: Some(server.uri()),
        bearer_token: Some("test-token".to_string()),
        ignore_error_codes: Vec::new(),
    };
    awstab::plugin(&config).expect("plugin should build")
}

fn string_cell(row: &Row, column: &str) -> String {
    match row.get(column) {
        Some(CellValue::String(s)) => s.clone(),
        other => panic!("column '{column}' should be a string, got {other:?}"),
    }
}

/// Mount the baseline IAM hydrate responses every user falls back to
async fn mount_iam_hydrate_defaults(server: &MockServer) {
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonIdentityManagement.GetUser"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "User": {"Tags": []}
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(header(
            "X-Amz-Target",
            "AmazonIdentityManagement.ListGroupsForUser",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Groups": [{"GroupName": "devs", "Arn": "arn:aws:iam::123456789012:group/devs"}]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(header(
            "X-Amz-Target",
            "AmazonIdentityManagement.ListAttachedUserPolicies",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AttachedPolicies": [
                {"PolicyName": "ReadOnlyAccess", "PolicyArn": "arn:aws:iam::aws:policy/ReadOnlyAccess"}
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(header(
            "X-Amz-Target",
            "AmazonIdentityManagement.ListUserPolicies",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "PolicyNames": []
        })))
        .mount(server)
        .await;
}

/// Three users across two pages; one user's inline policy fetch fails with
/// a server error. The failing user becomes an `Err` row entry while the
/// other two render fully.
#[tokio::test]
async fn iam_list_paginates_and_scopes_failures_per_user() {
    let server = MockServer::start().await;

    // page 1: exhausted after one use so the follow-up request (which
    // carries the Marker) falls through to the page 2 mock
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("X-Amz-Target", "AmazonIdentityManagement.ListUsers"))
        .and(bearer_token("test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Users": [
                {"UserName": "alice", "UserId": "AIDAALICE", "Arn": "arn:aws:iam::123456789012:user/alice", "CreateDate": "2021-03-01T12:00:00Z"},
                {"UserName": "bob", "UserId": "AIDABOB", "Arn": "arn:aws:iam::123456789012:user/bob"}
            ],
            "IsTruncated": true,
            "Marker": "m1"
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonIdentityManagement.ListUsers"))
        .and(body_partial_json(json!({"Marker": "m1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Users": [
                {"UserName": "carol", "UserId": "AIDACAROL", "Arn": "arn:aws:iam::123456789012:user/carol"}
            ],
            "IsTruncated": false
        })))
        .mount(&server)
        .await;

    mount_iam_hydrate_defaults(&server).await;

    // alice carries tags and two inline policies
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonIdentityManagement.GetUser"))
        .and(body_partial_json(json!({"UserName": "alice"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "User": {
                "UserName": "alice",
                "Tags": [{"Key": "team", "Value": "core"}],
                "PermissionsBoundary": {
                    "PermissionsBoundaryArn": "arn:aws:iam::aws:policy/boundary",
                    "PermissionsBoundaryType": "Policy"
                }
            }
        })))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header(
            "X-Amz-Target",
            "AmazonIdentityManagement.ListUserPolicies",
        ))
        .and(body_partial_json(json!({"UserName": "alice"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "PolicyNames": ["inline-1", "inline-2"]
        })))
        .with_priority(1)
        .mount(&server)
        .await;

    for name in ["inline-1", "inline-2"] {
        Mock::given(method("POST"))
            .and(header(
                "X-Amz-Target",
                "AmazonIdentityManagement.GetUserPolicy",
            ))
            .and(body_partial_json(json!({"UserName": "alice", "PolicyName": name})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "PolicyName": name,
                // URL-encoded {"Version":"2012-10-17"}
                "PolicyDocument": "%7B%22Version%22%3A%222012-10-17%22%7D"
            })))
            .with_priority(1)
            .mount(&server)
            .await;
    }

    // bob's single inline policy document cannot be fetched
    Mock::given(method("POST"))
        .and(header(
            "X-Amz-Target",
            "AmazonIdentityManagement.ListUserPolicies",
        ))
        .and(body_partial_json(json!({"UserName": "bob"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "PolicyNames": ["broken"]
        })))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header(
            "X-Amz-Target",
            "AmazonIdentityManagement.GetUserPolicy",
        ))
        .and(body_partial_json(json!({"UserName": "bob"})))
        .respond_with(
            ResponseTemplate::new(500)
                .insert_header("x-amzn-errortype", "InternalFailure")
                .set_body_json(json!({"message": "internal failure"})),
        )
        .with_priority(1)
        .mount(&server)
        .await;

    let plugin = plugin_for(&server);
    let rows: Vec<_> = plugin
        .list("aws_iam_user", plugin.query_context())
        .unwrap()
        .collect()
        .await;

    assert_eq!(rows.len(), 3);

    let failures: Vec<_> = rows.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].code(), Some("InternalFailure"));

    let ok_rows: Vec<&Row> = rows.iter().filter_map(|r| r.as_ref().ok()).collect();
    let mut names: Vec<String> = ok_rows
        .iter()
        .map(|row| string_cell(row, "name"))
        .collect();
    names.sort();
    assert_eq!(names, ["alice", "carol"]);

    let alice = ok_rows
        .iter()
        .copied()
        .find(|&row| string_cell(row, "name") == "alice")
        .unwrap();
    assert_eq!(string_cell(alice, "title"), "alice");
    assert_eq!(
        string_cell(alice, "permissions_boundary_type"),
        "Policy"
    );
    assert!(matches!(alice.get("create_date"), Some(CellValue::Timestamp(_))));
    match alice.get("tags") {
        Some(CellValue::Json(tags)) => assert_eq!(tags, &json!({"team": "core"})),
        other => panic!("tags should be a json map, got {other:?}"),
    }
    match alice.get("inline_policies") {
        Some(CellValue::Json(policies)) => {
            let policies = policies.as_array().unwrap();
            assert_eq!(policies.len(), 2);
            for policy in policies {
                assert_eq!(policy["PolicyDocument"]["Version"], json!("2012-10-17"));
            }
        }
        other => panic!("inline_policies should be a json array, got {other:?}"),
    }
    match alice.get("akas") {
        Some(CellValue::Json(akas)) => {
            assert_eq!(akas, &json!(["arn:aws:iam::123456789012:user/alice"]))
        }
        other => panic!("akas should be a json array, got {other:?}"),
    }
}

#[tokio::test]
async fn iam_get_returns_one_fully_hydrated_row() {
    let server = MockServer::start().await;
    mount_iam_hydrate_defaults(&server).await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonIdentityManagement.GetUser"))
        .and(body_partial_json(json!({"UserName": "alice"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "User": {
                "UserName": "alice",
                "UserId": "AIDAALICE",
                "Arn": "arn:aws:iam::123456789012:user/alice",
                "CreateDate": "2021-03-01T12:00:00Z",
                "Tags": []
            }
        })))
        .with_priority(1)
        .mount(&server)
        .await;

    let plugin = plugin_for(&server);
    let row = plugin
        .get(
            "aws_iam_user",
            plugin.query_context().with_qual("name", "alice"),
        )
        .await
        .unwrap()
        .expect("row should exist");

    assert_eq!(string_cell(&row, "name"), "alice");
    assert_eq!(string_cell(&row, "user_id"), "AIDAALICE");
    match row.get("groups") {
        Some(CellValue::Json(groups)) => assert_eq!(groups.as_array().unwrap().len(), 1),
        other => panic!("groups should be json, got {other:?}"),
    }
}

#[tokio::test]
async fn iam_get_suppresses_not_found_but_propagates_other_codes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonIdentityManagement.GetUser"))
        .and(body_partial_json(json!({"UserName": "ghost"})))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("x-amzn-errortype", "NoSuchEntity")
                .set_body_json(json!({"message": "user ghost not found"})),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonIdentityManagement.GetUser"))
        .and(body_partial_json(json!({"UserName": "locked"})))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-amzn-errortype", "AccessDenied")
                .set_body_json(json!({"message": "denied"})),
        )
        .mount(&server)
        .await;

    let plugin = plugin_for(&server);

    // NoSuchEntity is in the default suppression set
    let row = plugin
        .get(
            "aws_iam_user",
            plugin.query_context().with_qual("name", "ghost"),
        )
        .await
        .unwrap();
    assert!(row.is_none());

    let err = plugin
        .get(
            "aws_iam_user",
            plugin.query_context().with_qual("name", "locked"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("AccessDenied"));
}

/// A long error body with multi-byte text right at the log-truncation
/// point must still surface as an API error, not a panic.
#[tokio::test]
async fn long_multibyte_error_body_still_propagates_as_api_error() {
    let server = MockServer::start().await;

    let body = format!("{}{}", "a".repeat(199), "é".repeat(20));
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonIdentityManagement.GetUser"))
        .respond_with(ResponseTemplate::new(500).set_body_string(body))
        .mount(&server)
        .await;

    let plugin = plugin_for(&server);
    let err = plugin
        .get(
            "aws_iam_user",
            plugin.query_context().with_qual("name", "alice"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, awstab::Error::Api { status: 500, .. }));
}

#[tokio::test]
async fn iam_get_without_key_column_fails() {
    let server = MockServer::start().await;
    let plugin = plugin_for(&server);

    let err = plugin
        .get("aws_iam_user", plugin.query_context())
        .await
        .unwrap_err();
    assert!(matches!(err, awstab::Error::MissingKey("name")));
}

#[tokio::test]
async fn iam_list_stops_at_the_row_limit() {
    let server = MockServer::start().await;
    mount_iam_hydrate_defaults(&server).await;

    let users: Vec<_> = (0..10)
        .map(|i| json!({"UserName": format!("user-{i}")}))
        .collect();
    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonIdentityManagement.ListUsers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Users": users,
            "IsTruncated": false
        })))
        .mount(&server)
        .await;

    let plugin = plugin_for(&server);
    let rows: Vec<_> = plugin
        .list("aws_iam_user", plugin.query_context().with_limit(2))
        .unwrap()
        .collect()
        .await;

    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.is_ok()));
}

#[tokio::test]
async fn iam_list_fetch_error_terminates_the_stream() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonIdentityManagement.ListUsers"))
        .respond_with(
            ResponseTemplate::new(500)
                .insert_header("x-amzn-errortype", "InternalFailure")
                .set_body_json(json!({"message": "listing failed"})),
        )
        .mount(&server)
        .await;

    let plugin = plugin_for(&server);
    let rows: Vec<_> = plugin
        .list("aws_iam_user", plugin.query_context())
        .unwrap()
        .collect()
        .await;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].as_ref().unwrap_err().code(), Some("InternalFailure"));
}

#[tokio::test]
async fn ssm_list_hydrates_window_details_and_tags() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonSSM.DescribeMaintenanceWindows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "WindowIdentities": [{
                "WindowId": "mw-0123456789abcdef0",
                "Name": "patch-tuesday",
                "Enabled": true,
                "Duration": 4,
                "Cutoff": 1,
                "Schedule": "cron(0 4 ? * TUE *)",
                "NextExecutionTime": "2026-09-01T04:00:00Z"
            }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonSSM.GetMaintenanceWindow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "WindowId": "mw-0123456789abcdef0",
            "AllowUnassociatedTargets": false,
            "CreatedDate": "2023-01-01T00:00:00Z",
            "ModifiedDate": "2024-06-15T08:30:00Z"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonSSM.ListTagsForResource"))
        .and(body_partial_json(json!({
            "ResourceType": "MaintenanceWindow",
            "ResourceId": "mw-0123456789abcdef0"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "TagList": [{"Key": "env", "Value": "prod"}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header(
            "X-Amz-Target",
            "AmazonSSM.DescribeMaintenanceWindowTargets",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Targets": [{"WindowTargetId": "wt-1", "ResourceType": "INSTANCE"}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header(
            "X-Amz-Target",
            "AmazonSSM.DescribeMaintenanceWindowTasks",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Tasks": [{"WindowTaskId": "task-1", "Type": "RUN_COMMAND"}]
        })))
        .mount(&server)
        .await;

    let plugin = plugin_for(&server);
    let rows: Vec<_> = plugin
        .list("aws_ssm_maintenance_window", plugin.query_context())
        .unwrap()
        .collect()
        .await;

    assert_eq!(rows.len(), 1);
    let row = rows[0].as_ref().unwrap();
    assert_eq!(string_cell(row, "window_id"), "mw-0123456789abcdef0");
    assert_eq!(string_cell(row, "title"), "patch-tuesday");
    assert_eq!(row.get("enabled"), Some(&CellValue::Bool(true)));
    assert_eq!(
        row.get("allow_unassociated_targets"),
        Some(&CellValue::Bool(false))
    );
    assert_eq!(row.get("duration"), Some(&CellValue::Int(4)));
    assert!(matches!(row.get("created_date"), Some(CellValue::Timestamp(_))));
    match row.get("tags") {
        Some(CellValue::Json(tags)) => assert_eq!(tags, &json!({"env": "prod"})),
        other => panic!("tags should be json, got {other:?}"),
    }
    match row.get("tasks") {
        Some(CellValue::Json(tasks)) => assert_eq!(tasks.as_array().unwrap().len(), 1),
        other => panic!("tasks should be json, got {other:?}"),
    }
}

#[tokio::test]
async fn ssm_get_suppresses_does_not_exist() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonSSM.GetMaintenanceWindow"))
        .respond_with(
            ResponseTemplate::new(400)
                .insert_header(
                    "x-amzn-errortype",
                    "DoesNotExistException:http://internal.amazon.com/coral/",
                )
                .set_body_json(json!({"Message": "window does not exist"})),
        )
        .mount(&server)
        .await;

    let plugin = plugin_for(&server);
    let row = plugin
        .get(
            "aws_ssm_maintenance_window",
            plugin
                .query_context()
                .with_qual("window_id", "mw-0000000000000000"),
        )
        .await
        .unwrap();
    assert!(row.is_none());
}

/// Every SQS attribute arrives as a string; the column types drive the
/// coercion into ints, bools, timestamps, and parsed JSON documents.
#[tokio::test]
async fn sqs_attributes_coerce_by_column_type() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonSQS.ListQueues"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "QueueUrls": ["https://sqs.us-east-1.amazonaws.com/123456789012/orders"]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonSQS.GetQueueAttributes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Attributes": {
                "QueueArn": "arn:aws:sqs:us-east-1:123456789012:orders",
                "ApproximateNumberOfMessages": "4",
                "ApproximateNumberOfMessagesDelayed": "0",
                "ApproximateNumberOfMessagesNotVisible": "1",
                "FifoQueue": "false",
                "DelaySeconds": "30",
                "MaximumMessageSize": "262144",
                "MessageRetentionPeriod": "345600",
                "ReceiveMessageWaitTimeSeconds": "0",
                "VisibilityTimeout": "43200",
                "CreatedTimestamp": "1609459200",
                "LastModifiedTimestamp": "1609459200",
                "Policy": "{\"Version\":\"2012-10-17\",\"Statement\":[]}"
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonSQS.ListQueueTags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Tags": {"env": "prod"}
        })))
        .mount(&server)
        .await;

    let plugin = plugin_for(&server);
    let rows: Vec<_> = plugin
        .list("aws_sqs_queue", plugin.query_context())
        .unwrap()
        .collect()
        .await;

    assert_eq!(rows.len(), 1);
    let row = rows[0].as_ref().unwrap();
    assert_eq!(string_cell(row, "title"), "orders");
    assert_eq!(
        string_cell(row, "queue_arn"),
        "arn:aws:sqs:us-east-1:123456789012:orders"
    );
    assert_eq!(
        row.get("approximate_number_of_messages"),
        Some(&CellValue::Int(4))
    );
    assert_eq!(row.get("delay_seconds"), Some(&CellValue::Int(30)));
    assert_eq!(row.get("fifo_queue"), Some(&CellValue::Bool(false)));
    match row.get("created_timestamp") {
        Some(CellValue::Timestamp(ts)) => assert_eq!(ts.timestamp(), 1609459200),
        other => panic!("created_timestamp should be a timestamp, got {other:?}"),
    }
    match row.get("policy") {
        Some(CellValue::Json(policy)) => {
            assert_eq!(policy["Version"], json!("2012-10-17"));
        }
        other => panic!("policy should be parsed json, got {other:?}"),
    }
    // attributes the queue does not carry stay null
    assert_eq!(row.get("kms_master_key_id"), Some(&CellValue::Null));
    match row.get("tags") {
        Some(CellValue::Json(tags)) => assert_eq!(tags, &json!({"env": "prod"})),
        other => panic!("tags should be json, got {other:?}"),
    }
}

#[tokio::test]
async fn sqs_get_probes_the_queue_and_suppresses_missing_queues() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("X-Amz-Target", "AmazonSQS.GetQueueAttributes"))
        .respond_with(
            ResponseTemplate::new(400)
                .insert_header("x-amzn-errortype", "AWS.SimpleQueueService.NonExistentQueue")
                .set_body_json(json!({"message": "queue does not exist"})),
        )
        .mount(&server)
        .await;

    let plugin = plugin_for(&server);
    let row = plugin
        .get(
            "aws_sqs_queue",
            plugin.query_context().with_qual(
                "queue_url",
                "https://sqs.us-east-1.amazonaws.com/123456789012/missing",
            ),
        )
        .await
        .unwrap();
    assert!(row.is_none());
}
