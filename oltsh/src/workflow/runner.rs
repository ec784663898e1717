//! Executes a plan step by step on a locked session.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Serialize;

use super::plan::{ProvisioningPlan, Stage};
use crate::error::{Error, ProvisioningError, Result};
use crate::executor::{CommandExecutor, CommandRequest};
use crate::session::SessionManager;
use crate::transport::Connector;

/// A step that ran to completion.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    /// Position in the plan, starting at 0.
    pub index: usize,
    pub stage: Stage,
    /// The command with secrets masked.
    pub command: String,
    /// Raw device output for the step.
    pub response: String,
    pub elapsed: Duration,
}

/// Record of a fully applied plan.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningReport {
    pub operation: &'static str,
    pub steps: Vec<StepOutcome>,
    pub elapsed: Duration,
}

impl ProvisioningReport {
    /// Executed commands, secrets masked.
    pub fn commands(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.command.as_str()).collect()
    }
}

/// Run every step of `plan` in order.
///
/// The first step that times out, loses the connection, or comes back with
/// a device error marker stops the run. The session is invalidated, since
/// the CLI may be left in an unknown mode, and the completed steps are
/// returned inside [`ProvisioningError::Partial`]. Nothing is rolled back.
///
/// Configuration errors surface unchanged: no step was sent.
pub async fn execute_plan<C: Connector>(
    executor: &CommandExecutor,
    manager: &mut SessionManager<C>,
    plan: &ProvisioningPlan,
) -> Result<ProvisioningReport> {
    let start = Instant::now();
    let mut completed: Vec<StepOutcome> = Vec::with_capacity(plan.len());

    for (index, step) in plan.steps().iter().enumerate() {
        debug!(
            "{} step {}/{}: {}",
            plan.operation(),
            index + 1,
            plan.len(),
            step.display()
        );
        let mut request = CommandRequest::new(step.command()).with_display(step.display());
        if let Some(secret) = step.secret() {
            request = request.with_secret(secret.clone());
        }

        let (reason, response) = match executor.execute(manager, &request).await {
            Ok(resp) => match resp.failure_message {
                None => {
                    completed.push(StepOutcome {
                        index,
                        stage: step.stage,
                        command: resp.command,
                        response: resp.raw_result,
                        elapsed: resp.elapsed,
                    });
                    continue;
                }
                Some(failure) => (failure, resp.raw_result),
            },
            Err(Error::Config(e)) => return Err(Error::Config(e)),
            Err(Error::Command(e)) => {
                let partial = e.partial_output().to_string();
                (e.to_string(), partial)
            }
            Err(e) => (e.to_string(), String::new()),
        };

        manager.invalidate();
        warn!(
            "{} aborted at step {} ('{}') after {} completed step(s): {}",
            plan.operation(),
            index,
            step.display(),
            completed.len(),
            reason
        );
        return Err(ProvisioningError::Partial {
            operation: plan.operation(),
            step_index: index,
            command: step.display().to_string(),
            reason,
            response,
            completed,
        }
        .into());
    }

    let elapsed = start.elapsed();
    info!(
        "{} applied {} step(s) in {:?}",
        plan.operation(),
        completed.len(),
        elapsed
    );
    Ok(ProvisioningReport {
        operation: plan.operation(),
        steps: completed,
        elapsed,
    })
}
