//! Prompt Templates
//!
//! The fixed system and instruction prompts, and the data template that
//! carries the observed resources, the last status and the user's context.

use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
    #[error("cannot render resource {key:?}: {source}")]
    Resource {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

pub const SYSTEM_PROMPT: &str = r#"
You are a Kubernetes operator trained in identifying and fixing issues with
Kubernetes resources. You will be given a set of composed Kubernetes resources,
some of which may be in a bad state. Your job is to identify the issues present
on each of the resources in the context of the full set of resources and
communicate these issues to the user.
"#;

pub const INSTRUCTIONS_PROMPT: &str = r#"
<instructions>
Please follow these instructions carefully:

1. Analyze the provided set of composed resources searching for any resources
   that are in an unhealthy state. Use the status.conditions field to determine
   the status of the resource.

2. For each resource that is in an unhealthy state, provide a succinct,
   human-readable explanation of the issue. Only include resources that are
   unhealthy. Use the metadata.name and namespace field to identify the
   resource.

3. If there are no unhealthy resources, output an empty "resourceStatuses"
   array, an "overallStatus" of "Ready", and a summary of "No unhealthy
   resources found".

4. Along with the set of composed resources, I will also provide you with the
   last status you produced. If your summary matches the previous summary
   and/or the resource status messages are still accurate, return the previous
   status unchanged.

5. Provide a JSON object with the structure shown below in the <example> tag.
   Submit the JSON object, encoded as a string, to the submit_status tool.
</instructions>

<example>
{
	"resourceStatuses": [{
		"name": [resource-name],
		"namespace": [resource-namespace],
		"kind": [resource-kind],
		"apiVersion": [resource-apiVersion],
		"ready": [true|false],
		"message": [human-friendly-explanation-of-problems]
	}],
	"overallStatus": ["Ready"|"NotReady"],
	"summary": [summary-of-problems]
}
</example>
"#;

const DATA_TEMPLATE_NAME: &str = "data";

const DATA_TEMPLATE: &str = r#"
Here is the observed composite resource:

<composite>
{{ composite }}
</composite>

If there are any existing composed resources, they will be provided here:

<composed>
{{ composed }}
</composed>

The last status you produced is provided here:
<last-status>
{{ last_status }}
</last-status>

Additional input provided by the Kubernetes operator is provided here:

<input>
{{ input }}
</input>
"#;

/// Values substituted into the data template.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptVariables {
    /// Observed composite resource.
    pub composite: String,
    /// Observed composed resources, keyed by name.
    pub composed: String,
    /// Last status produced, as JSON (`null` when there is none).
    pub last_status: String,
    /// Additional context from the function input.
    pub input: String,
}

/// Compiled once at startup and shared read-only across requests.
pub struct PromptRenderer {
    tera: Tera,
}

impl PromptRenderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_template(DATA_TEMPLATE_NAME, DATA_TEMPLATE)?;
        Ok(Self { tera })
    }

    pub fn system(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    pub fn instructions(&self) -> &'static str {
        INSTRUCTIONS_PROMPT
    }

    pub fn render(&self, variables: &PromptVariables) -> Result<String, RenderError> {
        let context = Context::from_serialize(variables)?;
        Ok(self.tera.render(DATA_TEMPLATE_NAME, &context)?)
    }
}
