//! AWS API interaction module
//!
//! Core functionality for calling AWS service APIs: credential resolution,
//! the HTTP wrapper for the JSON target protocol, and per-service endpoint
//! construction.
//!
//! # Module Structure
//!
//! - [`credentials`] - Bearer token resolution (signing is out of scope)
//! - [`client`] - Main AWS client for making API requests
//! - [`http`] - HTTP utilities for the AWS JSON protocol
//!
//! # Example
//!
//! ```ignore
//! use crate::aws::client::AwsClient;
//! use crate::config::ConnectionConfig;
//!
//! async fn example() -> crate::error::Result<()> {
//!     let client = AwsClient::new(&ConnectionConfig::load())?;
//!     let users = client
//!         .call("iam", "AmazonIdentityManagement.ListUsers", &serde_json::json!({}))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod credentials;
pub mod http;
