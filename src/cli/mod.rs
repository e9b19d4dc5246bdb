//! CLI module for the stackplan deployment tool.
//!
//! This module provides the command-line interface: argument definitions,
//! confirmation prompts, output formatting and exit-code mapping.

mod commands;
mod confirm;
mod output;

pub use commands::{ChangeSetCommands, Cli, Commands, OutputFormat};
pub use confirm::{TerminalConfirmer, ask};
pub use output::{ChangeSetPrinter, OutputFormatter, no_changes_marker};

use crate::error::UpdateError;
use crate::planner::{ExecutionResult, UpdateReport};

/// Process exit status for success.
pub const EXIT_SUCCESS: u8 = 0;

/// Process exit status for any failure.
pub const EXIT_FAILURE: u8 = 1;

/// Maps an executor result to an exit status.
#[must_use]
pub fn exit_status(result: &ExecutionResult) -> u8 {
    if result.all_successful() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

/// Maps a change-set update to an exit status.
///
/// Declined confirmations and aborted updates are failures.
#[must_use]
pub fn update_exit_status(result: &Result<UpdateReport, UpdateError>) -> u8 {
    match result {
        Ok(report) if report.all_successful() => EXIT_SUCCESS,
        _ => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Op, RecordingBackend};
    use crate::backend::{LocalBackend, StackBackend};
    use crate::error::BackendError;
    use crate::planner::{ActionOutput, Outcome, Plan, StackActions};
    use crate::stack::{ChangeSetStatus, Stack, StackGraph, StackStatus, test_stack};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_exit_status_for_results() {
        let mut result = ExecutionResult::new();
        result.insert("dev/a", Outcome::Success(ActionOutput::Status(StackStatus::CreateComplete)));
        result.insert("dev/b", Outcome::Success(ActionOutput::Status(StackStatus::NoChanges)));
        assert_eq!(exit_status(&result), EXIT_SUCCESS);

        result.insert("dev/c", Outcome::Failure(BackendError::corrupted("bad")));
        assert_eq!(exit_status(&result), EXIT_FAILURE);
    }

    #[test]
    fn test_declined_update_fails() {
        let declined = Err(UpdateError::Declined {
            stacks: vec![String::from("dev/vpc")],
            applied: vec![],
        });
        assert_eq!(update_exit_status(&declined), EXIT_FAILURE);
        assert_eq!(update_exit_status(&Ok(UpdateReport::default())), EXIT_SUCCESS);
    }

    fn plan_over(stacks: Vec<Stack>, backend: Arc<dyn StackBackend>) -> Plan {
        let graph = StackGraph::from_stacks(stacks).expect("graph builds");
        Plan::new("dev", Arc::new(graph), StackActions::new(backend))
    }

    #[tokio::test]
    async fn test_update_with_unchanged_stack_prints_marker_and_succeeds() {
        let backend = Arc::new(RecordingBackend::new().change_set_status("dev/dns", ChangeSetStatus::NoChanges));
        let plan = plan_over(
            vec![test_stack("dev/vpc", &[]), test_stack("dev/dns", &[])],
            backend.clone(),
        );
        let printer = ChangeSetPrinter::new(Vec::new(), OutputFormat::Text, false);

        let result = plan
            .update_with_change_sets(&TerminalConfirmer::new(), &printer, true)
            .await;

        assert_eq!(update_exit_status(&result), EXIT_SUCCESS);
        let output = String::from_utf8(printer.into_inner()).expect("utf-8");
        assert!(output.contains(&format!("\n{:<50} NO CHANGES\n", "dev/dns")));
        assert!(output.contains("StackName: dev/vpc"));

        assert_eq!(backend.count_for(Op::Execute, "dev/vpc"), 1);
        assert_eq!(backend.count_for(Op::Execute, "dev/dns"), 0);
        assert_eq!(backend.count_for(Op::DeleteChangeSet, "dev/vpc"), 1);
        assert_eq!(backend.count_for(Op::DeleteChangeSet, "dev/dns"), 1);
    }

    #[tokio::test]
    async fn test_update_against_local_backend_leaves_no_change_sets() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let mut stacks = Vec::new();
        for name in ["dev/app", "dev/dns"] {
            let path = temp.path().join(format!("{}.yaml", name.replace('/', "-")));
            std::fs::write(&path, "Resources:\n  Main:\n    Type: Test::Resource\n").expect("write template");
            let mut stack = test_stack(name, &[]);
            stack.template_path = path;
            stacks.push(stack);
        }
        let backend = Arc::new(LocalBackend::with_base_dir(temp.path().join(".stackplan")));
        let plan = plan_over(stacks.clone(), backend.clone());

        let launched = plan.launch().await.expect("resolves");
        assert_eq!(exit_status(&launched), EXIT_SUCCESS);

        std::fs::write(
            &stacks[0].template_path,
            "Resources:\n  Main:\n    Type: Test::Resource\n    Properties:\n      Size: 2\n",
        )
        .expect("write template");

        let printer = ChangeSetPrinter::new(Vec::new(), OutputFormat::Text, false);
        let result = plan
            .update_with_change_sets(&TerminalConfirmer::new(), &printer, true)
            .await;

        assert_eq!(update_exit_status(&result), EXIT_SUCCESS);
        let report = result.expect("update succeeds");
        assert_eq!(report.executed_stacks(), vec!["dev/app"]);

        let output = String::from_utf8(printer.into_inner()).expect("utf-8");
        assert!(output.contains(&format!("\n{:<50} NO CHANGES\n", "dev/dns")));

        let change_set = &report.batches[0].change_set;
        for stack in &stacks {
            assert!(matches!(
                backend.describe_change_set(stack, change_set).await,
                Err(BackendError::ChangeSetNotFound { .. })
            ));
        }
        assert_eq!(
            backend.get_status(&stacks[0]).await.expect("status"),
            StackStatus::UpdateComplete
        );
        assert_eq!(
            backend.get_status(&stacks[1]).await.expect("status"),
            StackStatus::CreateComplete
        );
    }
}
