//! aws_sqs_queue table
//!
//! SQS queues. ListQueues only yields queue URLs; everything else lives in
//! the GetQueueAttributes map, where every attribute value is a string and
//! the column types drive the coercion (counts to ints, flags to bools,
//! epoch-second strings to timestamps).

use crate::error::{Error, Result};
use crate::table::{
    stream_item, transform, Column, ColumnType, GetConfig, HydrateMap, Hydrator, ItemSender,
    QueryContext, Table, Transform,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const SERVICE: &str = "sqs";
const TARGET_LIST_QUEUES: &str = "AmazonSQS.ListQueues";
const TARGET_GET_QUEUE_ATTRIBUTES: &str = "AmazonSQS.GetQueueAttributes";
const TARGET_LIST_QUEUE_TAGS: &str = "AmazonSQS.ListQueueTags";

/// Error codes SQS uses for a missing queue
const NOT_FOUND_CODES: &[&str] = &[
    "AWS.SimpleQueueService.NonExistentQueue",
    "QueueDoesNotExist",
];

/// One SQS queue; the URL is the only listing-level fact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SqsQueue {
    pub queue_url: String,
}

pub fn table() -> Table<SqsQueue> {
    Table::new("aws_sqs_queue", "AWS SQS Queue", list_queues)
        .get_config(GetConfig::new("queue_url", get_queue).ignore_codes(NOT_FOUND_CODES))
        .hydrator(Hydrator::new("queue_attributes", queue_attributes))
        .hydrator(Hydrator::new("queue_tags", queue_tags))
        .columns(vec![
            Column::new("queue_url", "The URL of the Amazon SQS queue", ColumnType::String),
            Column::new(
                "queue_arn",
                "The Amazon Resource Name (ARN) of the queue",
                ColumnType::String,
            )
            .hydrate("queue_attributes")
            .transform(Transform::from_field("Attributes.QueueArn")),
            Column::new(
                "fifo_queue",
                "Returns true if the queue is FIFO",
                ColumnType::Bool,
            )
            .hydrate("queue_attributes")
            .transform(Transform::from_field("Attributes.FifoQueue")),
            Column::new(
                "content_based_deduplication",
                "Returns true if content-based deduplication is enabled for the queue",
                ColumnType::Bool,
            )
            .hydrate("queue_attributes")
            .transform(Transform::from_field("Attributes.ContentBasedDeduplication")),
            Column::new(
                "delay_seconds",
                "The default delay on the queue in seconds",
                ColumnType::Int,
            )
            .hydrate("queue_attributes")
            .transform(Transform::from_field("Attributes.DelaySeconds")),
            Column::new(
                "max_message_size",
                "The limit of how many bytes a message can contain before Amazon SQS rejects it",
                ColumnType::Int,
            )
            .hydrate("queue_attributes")
            .transform(Transform::from_field("Attributes.MaximumMessageSize")),
            Column::new(
                "message_retention_seconds",
                "The length of time, in seconds, for which Amazon SQS retains a message",
                ColumnType::Int,
            )
            .hydrate("queue_attributes")
            .transform(Transform::from_field("Attributes.MessageRetentionPeriod")),
            Column::new(
                "receive_wait_time_seconds",
                "The length of time, in seconds, for which the ReceiveMessage action waits for a message to arrive",
                ColumnType::Int,
            )
            .hydrate("queue_attributes")
            .transform(Transform::from_field("Attributes.ReceiveMessageWaitTimeSeconds")),
            Column::new(
                "visibility_timeout_seconds",
                "The visibility timeout for the queue in seconds",
                ColumnType::Int,
            )
            .hydrate("queue_attributes")
            .transform(Transform::from_field("Attributes.VisibilityTimeout")),
            Column::new(
                "approximate_number_of_messages",
                "The approximate number of messages available for retrieval from the queue",
                ColumnType::Int,
            )
            .hydrate("queue_attributes")
            .transform(Transform::from_field("Attributes.ApproximateNumberOfMessages")),
            Column::new(
                "approximate_number_of_messages_delayed",
                "The approximate number of messages in the queue that are delayed and not available for reading immediately",
                ColumnType::Int,
            )
            .hydrate("queue_attributes")
            .transform(Transform::from_field("Attributes.ApproximateNumberOfMessagesDelayed")),
            Column::new(
                "approximate_number_of_messages_not_visible",
                "The approximate number of messages that are in flight",
                ColumnType::Int,
            )
            .hydrate("queue_attributes")
            .transform(Transform::from_field("Attributes.ApproximateNumberOfMessagesNotVisible")),
            Column::new(
                "created_timestamp",
                "The time when the queue was created",
                ColumnType::Timestamp,
            )
            .hydrate("queue_attributes")
            .transform(Transform::from_field("Attributes.CreatedTimestamp")),
            Column::new(
                "last_modified_timestamp",
                "The time when the queue was last changed",
                ColumnType::Timestamp,
            )
            .hydrate("queue_attributes")
            .transform(Transform::from_field("Attributes.LastModifiedTimestamp")),
            Column::new(
                "kms_master_key_id",
                "The ID of an AWS managed customer master key (CMK) for Amazon SQS or a custom CMK",
                ColumnType::String,
            )
            .hydrate("queue_attributes")
            .transform(Transform::from_field("Attributes.KmsMasterKeyId")),
            Column::new(
                "policy",
                "The resource IAM policy of the queue",
                ColumnType::Json,
            )
            .hydrate("queue_attributes")
            .transform(Transform::from_field("Attributes.Policy").map(transform::embedded_json)),
            Column::new(
                "redrive_policy",
                "The string that includes the parameters for the dead-letter queue functionality of the source queue",
                ColumnType::Json,
            )
            .hydrate("queue_attributes")
            .transform(Transform::from_field("Attributes.RedrivePolicy").map(transform::embedded_json)),
            Column::new("tags", "A map of tags for the resource", ColumnType::Json)
                .hydrate("queue_tags")
                .transform(Transform::from_field("Tags")),
            Column::new("title", "Title of the resource", ColumnType::String)
                .transform(Transform::from_field("QueueUrl").map(queue_name_from_url)),
            Column::new("akas", "Array of globally unique identifier strings (also known as) for the resource", ColumnType::Json)
                .hydrate("queue_attributes")
                .transform(Transform::from_field("Attributes.QueueArn").map(transform::arn_to_akas)),
        ])
}

/// Last path segment of the queue URL is the queue name
fn queue_name_from_url(value: &Value) -> Result<Value> {
    let url = value
        .as_str()
        .ok_or_else(|| Error::decode("queue URL", "expected a string"))?;
    let name = url.rsplit('/').next().unwrap_or(url);
    Ok(Value::String(name.to_string()))
}

//// LIST FUNCTION

fn list_queues(ctx: QueryContext, mut tx: ItemSender<SqsQueue>) -> BoxFuture<'static, Result<()>> {
    async move {
        let mut next_token: Option<String> = None;

        loop {
            let mut body = json!({ "MaxResults": 1000 });
            if let Some(token) = &next_token {
                body["NextToken"] = json!(token);
            }

            let response = ctx.client().call(SERVICE, TARGET_LIST_QUEUES, &body).await?;

            let urls = response
                .get("QueueUrls")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for url in urls {
                let Some(url) = url.as_str() else {
                    return Err(Error::decode("queue URL", "expected a string"));
                };
                let queue = SqsQueue {
                    queue_url: url.to_string(),
                };
                if !stream_item(&mut tx, queue).await {
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

/// ListQueues carries no per-queue detail, so get probes the queue with a
/// minimal GetQueueAttributes call; a not-found error code surfaces here
/// and the suppression set turns it into an empty result.
fn get_queue(ctx: QueryContext) -> BoxFuture<'static, Result<SqsQueue>> {
    async move {
        let queue_url = ctx.require_qual("queue_url")?.to_string();
        ctx.client()
            .call(
                SERVICE,
                TARGET_GET_QUEUE_ATTRIBUTES,
                &json!({ "QueueUrl": queue_url, "AttributeNames": ["QueueArn"] }),
            )
            .await?;
        Ok(SqsQueue { queue_url })
    }
    .boxed()
}

//// HYDRATE FUNCTIONS

fn queue_attributes<'a>(
    ctx: &'a QueryContext,
    queue: &'a SqsQueue,
    _deps: &'a HydrateMap,
) -> BoxFuture<'a, Result<Value>> {
    async move {
        tracing::trace!("queue_attributes: {}", queue.queue_url);
        ctx.client()
            .call(
                SERVICE,
                TARGET_GET_QUEUE_ATTRIBUTES,
                &json!({ "QueueUrl": queue.queue_url, "AttributeNames": ["All"] }),
            )
            .await
    }
    .boxed()
}

fn queue_tags<'a>(
    ctx: &'a QueryContext,
    queue: &'a SqsQueue,
    _deps: &'a HydrateMap,
) -> BoxFuture<'a, Result<Value>> {
    async move {
        tracing::trace!("queue_tags: {}", queue.queue_url);
        ctx.client()
            .call(
                SERVICE,
                TARGET_LIST_QUEUE_TAGS,
                &json!({ "QueueUrl": queue.queue_url }),
            )
            .await
    }
    .boxed()
}
