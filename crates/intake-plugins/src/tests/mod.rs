//! Crate-level tests wiring manifests, executors, and handles together.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mockall::mock;
use rstest::rstest;

use crate::capability::ProcessorHandle;
use crate::error::PluginError;
use crate::manifest::PluginManifest;
use crate::operation::Operation;
use crate::process::{PluginExecutor, ProcessPlugin};
use crate::protocol::{PluginRequest, PluginResponse};
use crate::registry::PluginRegistry;

mock! {
    Executor {}
    impl PluginExecutor for Executor {
        fn execute(
            &self,
            manifest: &PluginManifest,
            request: &PluginRequest,
        ) -> Result<PluginResponse, PluginError>;
    }
}

fn rates_manifest() -> PluginManifest {
    PluginManifest::new("rates", "1.0.0", PathBuf::from("/usr/bin/rates"))
}

fn handle_with(executor: MockExecutor) -> ProcessorHandle {
    let plugin = ProcessPlugin::new(rates_manifest(), Arc::new(executor));
    ProcessorHandle::new("rates", Arc::new(plugin))
}

#[rstest]
#[case::history(Operation::History)]
#[case::security(Operation::Security)]
#[case::complex(Operation::ComplexAnalysis)]
fn process_plugin_sends_requested_operation(#[case] operation: Operation) {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .withf(move |manifest, request| {
            manifest.name() == "rates"
                && request.operation() == operation
                && request.path() == Path::new("/inbox/ratelimits.xml")
        })
        .times(1)
        .returning(|_, _| Ok(PluginResponse::success()));

    handle_with(executor)
        .invoke(operation, Path::new("/inbox/ratelimits.xml"))
        .expect("plugin succeeds");
}

#[test]
fn failure_response_becomes_reported_error() {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .returning(|_, _| Ok(PluginResponse::failure("limits exceed policy")));

    let error = handle_with(executor)
        .invoke(Operation::Security, Path::new("/inbox/ratelimits.xml"))
        .expect_err("failure propagates");

    assert!(matches!(
        error,
        PluginError::Reported { ref name, operation: Operation::Security, ref message }
            if name == "rates" && message == "limits exceed policy"
    ));
}

#[test]
fn executor_errors_pass_through() {
    let mut executor = MockExecutor::new();
    executor.expect_execute().returning(|_, _| {
        Err(PluginError::Timeout {
            name: "rates".into(),
            timeout_secs: 30,
        })
    });

    let error = handle_with(executor)
        .invoke(Operation::History, Path::new("/inbox/ratehistory.xml"))
        .expect_err("timeout propagates");

    assert!(matches!(error, PluginError::Timeout { .. }));
}

#[test]
fn registry_hands_out_working_handles() {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .times(1)
        .returning(|_, _| Ok(PluginResponse::success().with_message("stored")));
    let mut registry = PluginRegistry::new();
    registry
        .register(
            "rates",
            Arc::new(ProcessPlugin::new(rates_manifest(), Arc::new(executor))),
        )
        .expect("register");

    let handle = registry.get("rates").expect("handle present");
    handle
        .invoke(Operation::History, Path::new("/inbox/ratehistory.xml"))
        .expect("invocation succeeds");
}
