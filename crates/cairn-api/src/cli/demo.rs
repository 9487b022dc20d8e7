//! Bundled demo service used by `cairn manifest`.
//!
//! A small storage service: it provisions a bucket, keeps it reconciled with
//! a state handler, copies a list of prefixes into it, and hands off to an
//! external notifier.

use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use cairn_core::prelude::*;
use cairn_types::config::SdkConfig;

pub mod storage {
    use super::*;

    /// Desired state of a bucket.
    #[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
    pub struct BucketState {
        pub name: String,
        #[schemars(extend("x-alias" = "bucket_region"))]
        pub region: String,
        pub versioned: bool,
    }

    impl Default for BucketState {
        fn default() -> Self {
            Self {
                name: "artifacts".to_string(),
                region: "eu-west-1".to_string(),
                versioned: true,
            }
        }
    }

    #[derive(Debug, Deserialize, JsonSchema)]
    pub struct CopyInput {
        pub prefix: String,
        #[schemars(extend("x-lookup" = "secrets/storage-token"))]
        pub token: String,
    }

    #[derive(Debug, Serialize, JsonSchema)]
    pub struct CopyOutput {
        pub objects: u64,
    }

    pub fn copy_prefix(input: CopyInput) -> Result<CopyOutput, String> {
        if input.token.is_empty() {
            return Err(format!("no credentials to copy '{}'", input.prefix));
        }
        Ok(CopyOutput {
            objects: input.prefix.len() as u64,
        })
    }
}

/// Declare the demo service into a fresh registry.
pub fn build(config: SdkConfig) -> Result<Registry> {
    let handler = HandlerInterface {
        type_name: "storage.BucketHandler".to_string(),
        state: RecordType::of::<storage::BucketState>()?,
        operations: vec![
            HandlerOperation::Create,
            HandlerOperation::Read,
            HandlerOperation::Update,
            HandlerOperation::Delete,
        ],
    };

    let mut service = ServiceBuilder::with_config(config);
    service.workflow(|w| {
        w.name("deploy")
            .parameters([Parameter::new("region", "string").with_default(json!("eu-west-1"))]);
        w.resource(|r| {
            r.name("bucket")
                .external_id("artifacts")
                .when("enabled")
                .state_struct(&storage::BucketState::default());
        });
        w.handler(|h| {
            h.name("reconcile").when("bucket and !frozen").api(handler);
        });
        w.iterator(|i| {
            i.style(IterationStyle::Each)
                .over(json!(["logs", "assets", "reports"]))
                .into("copied");
            i.action(|a| {
                a.name("copy").doer(Callable::from_fn(storage::copy_prefix));
            });
        });
        w.call(|c| {
            c.name("notify")
                .when("copied or (force and !quiet)")
                .call_to("alerts::send");
        });
    });
    service.reference(|r| {
        r.name("cleanup").call_to("maintenance::cleanup");
    });
    Ok(service.finish()?)
}
