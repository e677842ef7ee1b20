//! Node Remediation Kubernetes Operator
//!
//! This operator expands NodeRemediationTemplates into one NodeRemediation
//! per matching node and keeps that set in line as nodes and templates
//! change.

pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod index;
pub mod metrics;
pub mod reconcilers;
pub mod router;
pub mod selector;
pub mod store;

pub use error::{Error, Result};
