//! # oltsh
//!
//! Async Telnet CLI client for provisioning and monitoring ZTE ZXAN GPON
//! OLTs.
//!
//! The OLT offers one interactive, prompt-driven CLI session and no
//! transactions. This crate keeps that single session alive, queues every
//! caller's commands through a FIFO lock so replies can never be attributed
//! to the wrong request, turns the firmware's free-form text into records,
//! and runs multi-step ONU provisioning with partial failure reported step by
//! step.
//!
//! ## Features
//!
//! - Telnet option negotiation and login handshake on tokio
//! - Pattern buffer with tail search and ANSI stripping
//! - One cached session per client, rebuilt after any command failure
//! - FIFO serialization of concurrent operations
//! - Pure parsers for ONU state, details, running-config, optics and cards
//! - ONU register/delete plans built and validated before any I/O
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oltsh::{OltClientBuilder, OnuRegistration};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), oltsh::Error> {
//!     let client = OltClientBuilder::new("10.0.0.2")
//!         .username("admin")
//!         .password("secret")
//!         .build()?;
//!
//!     for onu in client.get_unconfigured_onus().await? {
//!         println!("{} {}", onu.interface, onu.serial);
//!     }
//!
//!     let params = OnuRegistration::new("1/1/1", 4, "ZTEGC1234", "ZTE-F609", "20M")
//!         .vlan(200)
//!         .pppoe("alice", "secret");
//!     let report = client.register_onu(&params).await?;
//!     println!("applied {} steps", report.steps.len());
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod client;
pub mod error;
pub mod executor;
pub mod parse;
pub mod serializer;
pub mod session;
pub mod transport;
pub mod workflow;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use client::{OltClient, OltClientBuilder};
pub use error::{Error, Result};
pub use executor::{CommandExecutor, CommandRequest, Response};
pub use serializer::{CommandSerializer, SerializerGuard};
pub use session::SessionManager;
pub use transport::{Connector, OltConfig, PromptConfig, TcpConnector};
pub use workflow::{OnuRegistration, ProvisioningDefaults, ProvisioningPlan, ProvisioningReport};
