pub mod function_configs;

use kube::Client;

use crate::Result;

pub use function_configs::KubeFunctionConfigs;

/// Namespace the function runs in, used for Secrets referenced without one.
pub fn current_namespace() -> String {
    std::env::var("POD_NAMESPACE")
        .or_else(|_| std::env::var("NAMESPACE"))
        .unwrap_or_else(|_| "crossplane-system".to_string())
}

/// Client from the in-cluster service account or the local kubeconfig.
pub async fn client() -> Result<Client> {
    Ok(Client::try_default().await?)
}
