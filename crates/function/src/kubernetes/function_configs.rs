use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use kube::{
    api::{Api, ResourceExt},
    runtime::{
        controller::{Action, Controller},
        reflector::{ObjectRef, Store},
        watcher::Config,
    },
    Client,
};
use tracing::{debug, error, info};

use crate::credentials::{CredentialError, FunctionConfigSource};
use crate::crd::{FunctionConfig, FunctionConfigSpec};
use crate::{Error, Result};

struct Context {
    resync: Duration,
}

/// FunctionConfigs served from a watched cache, falling back to the API
/// server for objects the cache has not seen yet.
pub struct KubeFunctionConfigs {
    client: Client,
    store: Store<FunctionConfig>,
}

impl KubeFunctionConfigs {
    /// Start the FunctionConfig controller in the background. Every object
    /// is requeued after `resync`.
    pub fn start(client: Client, resync: Duration) -> Arc<Self> {
        info!(resync_seconds = resync.as_secs(), "Starting FunctionConfig controller");

        let configs: Api<FunctionConfig> = Api::all(client.clone());
        let controller = Controller::new(configs, Config::default());
        let store = controller.store();
        let ctx = Arc::new(Context { resync });

        tokio::spawn(
            controller
                .run(Self::reconcile, Self::error_policy, ctx)
                .for_each(|res| async move {
                    match res {
                        Ok((config, _action)) => debug!(function_config = %config.name, "Reconciled FunctionConfig"),
                        Err(e) => error!("FunctionConfig reconciliation error: {}", e),
                    }
                }),
        );

        Arc::new(Self::with_store(client, store))
    }

    pub fn with_store(client: Client, store: Store<FunctionConfig>) -> Self {
        Self { client, store }
    }

    async fn reconcile(config: Arc<FunctionConfig>, ctx: Arc<Context>) -> Result<Action> {
        let uses_aws = config.spec.aws.is_some();
        debug!(function_config = %config.name_any(), uses_aws, "Observed FunctionConfig");
        Ok(Action::requeue(ctx.resync))
    }

    fn error_policy(config: Arc<FunctionConfig>, err: &Error, _ctx: Arc<Context>) -> Action {
        error!("Error processing FunctionConfig {}: {}", config.name_any(), err);
        Action::requeue(Duration::from_secs(60))
    }

    fn cached(&self, name: &str) -> Option<FunctionConfigSpec> {
        self.store
            .get(&ObjectRef::new(name))
            .map(|config| config.spec.clone())
    }
}

#[async_trait]
impl FunctionConfigSource for KubeFunctionConfigs {
    async fn get(&self, name: &str) -> std::result::Result<FunctionConfigSpec, CredentialError> {
        if let Some(spec) = self.cached(name) {
            debug!(function_config = name, "FunctionConfig served from cache");
            return Ok(spec);
        }

        debug!(function_config = name, "FunctionConfig not cached, reading from the API server");
        let configs: Api<FunctionConfig> = Api::all(self.client.clone());
        configs
            .get_opt(name)
            .await
            .map_err(|source| CredentialError::Kubernetes {
                name: name.to_string(),
                source,
            })?
            .map(|config| config.spec)
            .ok_or_else(|| CredentialError::FunctionConfigNotFound(name.to_string()))
    }
}
