use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn attempt_started() {
    metrics::counter!("exam_attempts_started_total").increment(1);
}

pub(crate) fn attempt_submitted(late: bool) {
    let late = if late { "true" } else { "false" };
    metrics::counter!("exam_attempts_submitted_total", "late" => late).increment(1);
}

pub(crate) fn attempts_auto_submitted(count: u64) {
    if count > 0 {
        metrics::counter!("exam_attempts_auto_submitted_total").increment(count);
    }
}

pub(crate) fn integrity_guard_hit(guard: &'static str) {
    metrics::counter!("integrity_guard_rejections_total", "guard" => guard).increment(1);
}
