//! Multi-step ONU provisioning.
//!
//! A [`ProvisioningPlan`] is a pure value: the exact commands, validated
//! before the serializer is even acquired. [`execute_plan`] then runs it on a
//! locked session. The OLT has no transactions, so a failure part-way through
//! leaves the completed steps applied and reports them in
//! [`ProvisioningError::Partial`](crate::error::ProvisioningError::Partial).

mod plan;
mod runner;

pub use plan::{OnuRegistration, PlanStep, ProvisioningDefaults, ProvisioningPlan, Stage};
pub(crate) use plan::validate_slot_port;
pub use runner::{ProvisioningReport, StepOutcome, execute_plan};
