//! Per-invocation wiring: configuration, credentials, clients, gate.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use pplink_config::SettingsStore;
use pplink_core::{
    ApiClient, AzCliTokenSource, ConfirmationGate, CredentialProvider, ForceGate, PollSettings,
    PromptGate, Report, ReqwestTransport, StepOutcome,
};
use pplink_platform::{ApiVersions, Endpoints, Platform};
use tracing::debug;

use super::{CliError, GlobalArgs};

/// Polling budget: flags win over configuration, configuration over defaults.
pub fn poll_settings(global: &GlobalArgs, store: &SettingsStore) -> PollSettings {
    let defaults = PollSettings::default();
    let settings = store.settings();
    let interval = global
        .poll_interval
        .or(settings.poll_interval_secs)
        .map(Duration::from_secs)
        .unwrap_or(defaults.interval);
    let max_attempts = global
        .max_attempts
        .or(settings.poll_max_attempts)
        .unwrap_or(defaults.max_attempts);
    PollSettings::new(interval, max_attempts)
}

pub fn endpoints(global: &GlobalArgs, store: &SettingsStore) -> Endpoints {
    let mut endpoints = Endpoints::default().with_versions(ApiVersions::from_settings(store.settings()));
    if let Some(arm) = &global.arm_endpoint {
        endpoints = endpoints.with_arm_base(arm.as_str());
    }
    if let Some(admin) = &global.admin_endpoint {
        endpoints = endpoints.with_admin_base(admin.as_str());
    }
    endpoints
}

pub fn load_store(global: &GlobalArgs) -> Result<SettingsStore> {
    debug!("Loading configuration from {:?}", global.env_file);
    Ok(SettingsStore::load(&global.env_file)?)
}

/// Build the clients for one run.
pub fn platform(global: &GlobalArgs, store: &SettingsStore) -> Result<Platform> {
    store.settings().validate_ids()?;

    let mut source = AzCliTokenSource::new().allow_login(global.allow_login);
    if let Some(tenant) = &store.settings().tenant_id {
        source = source.with_tenant(tenant.as_str());
    }
    let credentials = Arc::new(CredentialProvider::new(Arc::new(source)));
    let client = ApiClient::new(Arc::new(ReqwestTransport::new()?), credentials);

    let poll = poll_settings(global, store);
    debug!("Polling every {:?}, up to {} times", poll.interval, poll.max_attempts);
    Ok(Platform::new(client, endpoints(global, store), poll))
}

pub fn gate(global: &GlobalArgs) -> Arc<dyn ConfirmationGate> {
    if global.force {
        Arc::new(ForceGate)
    } else {
        Arc::new(PromptGate::stdio())
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
pub async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Print the teardown ledger.
pub fn print_report(report: &Report) {
    println!();
    println!("📋 Summary");
    for record in &report.records {
        let seconds = (record.finished_at - record.started_at).num_seconds();
        match &record.outcome {
            StepOutcome::Success { detail } => println!("   ✅ {} ({}s): {}", record.step, seconds, detail),
            StepOutcome::Skipped { reason } => println!("   ⏭️  {}: {}", record.step, reason),
            StepOutcome::Failed { error } => println!("   ❌ {} ({}s): {}", record.step, seconds, error),
        }
    }
    if let Some(step) = &report.halted_at {
        println!("   ⛔ Stopped after fatal failure in {}", step);
    }
    if report.interrupted {
        println!("   ⚠️  Interrupted; remaining steps were not run");
    }
    println!(
        "   {} succeeded, {} skipped, {} failed",
        report.successes().len(),
        report.skipped().len(),
        report.errors().len()
    );
}

/// Map a finished report to the command result.
pub fn finish(report: Report) -> Result<()> {
    let attempted = report.records.len();
    let failed = report.errors().len();
    let interrupted = report.interrupted;
    report.into_result()?;

    if failed > 0 || interrupted {
        return Err(CliError::TeardownIncomplete { failed, attempted }.into());
    }
    Ok(())
}
