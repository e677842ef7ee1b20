//! Reconcilers for Node Remediation CRDs
//!
//! This module contains the business logic for reconciling each CRD type.
//! Reconcilers are responsible for:
//! - Computing the desired NodeRemediation set from live node state
//! - Creating, updating and deleting NodeRemediations to match it
//! - Recording operator-visible events

pub mod remediation_template;
