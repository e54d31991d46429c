pub mod categorizer_execution;
pub mod version_control;
pub mod workspace_scanner;

pub use categorizer_execution::CategorizerExecutionAgent;
pub use version_control::{PublishOutcome, VersionControlAgent};
pub use workspace_scanner::{WorkspaceInfo, WorkspaceScannerAgent};
