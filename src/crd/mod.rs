//! Custom Resource Definitions for the Node Remediation Operator

mod node_remediation;
mod node_remediation_template;

pub use node_remediation::*;
pub use node_remediation_template::*;

use kube::CustomResourceExt;

/// Generate all CRD YAML manifests
pub fn generate_crds() -> Result<Vec<String>, serde_yaml::Error> {
    Ok(vec![
        serde_yaml::to_string(&NodeRemediationTemplate::crd())?,
        serde_yaml::to_string(&NodeRemediation::crd())?,
    ])
}
