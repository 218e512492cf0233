use kube::CustomResourceExt;
use schemars::schema_for;
use status_transformer::crd::{FunctionConfig, StatusTransformation};

fn main() -> anyhow::Result<()> {
    println!("---");
    println!("# FunctionConfig CRD");
    println!("{}", serde_yaml::to_string(&FunctionConfig::crd())?);

    println!("---");
    println!("# StatusTransformation input schema");
    println!("{}", serde_yaml::to_string(&schema_for!(StatusTransformation))?);

    Ok(())
}
