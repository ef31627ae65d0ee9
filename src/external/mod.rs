//! External tool abstractions
//!
//! This module provides trait-based abstractions for the external CLI tools
//! kubeforge sequences (terraform, kubectl, helm), enabling testable code
//! through dependency injection and mock implementations.

pub mod command;
pub mod helm;
pub mod kubectl;
pub mod terraform;

pub use command::{CommandError, CommandExecutor, CommandOutput, ProcessCommandExecutor};
pub use helm::{HelmCli, ReleaseError, ReleaseManager, ReleaseRequest};
pub use kubectl::{ClusterApi, ClusterApiError, KubectlClient};
pub use terraform::{Provisioner, ProvisionerError, TerraformCli, TfVars};
