use super::request::{
    Condition, ConditionStatus, FunctionResult, ResponseMeta, RunFunctionRequest,
    RunFunctionResponse, Severity,
};

/// How long Crossplane may cache a response before calling the function again.
pub const DEFAULT_TTL: &str = "60s";

/// Build a response for the supplied request, carrying its desired state and
/// context forward unchanged.
pub fn to(req: &RunFunctionRequest) -> RunFunctionResponse {
    RunFunctionResponse {
        meta: ResponseMeta {
            tag: req.meta.tag.clone(),
            ttl: DEFAULT_TTL.to_string(),
        },
        desired: req.desired.clone(),
        context: req.context.clone(),
        results: Vec::new(),
        conditions: Vec::new(),
    }
}

/// Terminate the pipeline with a fatal result.
pub fn fatal(rsp: &mut RunFunctionResponse, message: impl Into<String>) {
    rsp.results.push(FunctionResult {
        severity: Severity::Fatal,
        message: message.into(),
        reason: None,
        target: None,
    });
}

pub fn normal(rsp: &mut RunFunctionResponse, message: impl Into<String>, reason: Option<String>) {
    rsp.results.push(FunctionResult {
        severity: Severity::Normal,
        message: message.into(),
        reason,
        target: None,
    });
}

pub fn set_condition(
    rsp: &mut RunFunctionResponse,
    condition_type: &str,
    status: ConditionStatus,
    reason: String,
    message: Option<String>,
) {
    rsp.conditions.retain(|c| c.condition_type != condition_type);
    rsp.conditions.push(Condition {
        condition_type: condition_type.to_string(),
        status,
        reason,
        message,
        target: None,
    });
}

pub fn is_fatal(rsp: &RunFunctionResponse) -> bool {
    rsp.results.iter().any(|r| r.severity == Severity::Fatal)
}
