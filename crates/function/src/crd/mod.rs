pub mod function_config;
pub mod input;

pub use function_config::{
    AwsConfig, AwsCredentialsConfig, CredentialsSource, FunctionConfig, FunctionConfigSpec,
    FunctionConfigStatus, SecretKeySelector,
};
pub use input::{AwsInput, BedrockInput, FunctionConfigReference, StatusTransformation};
