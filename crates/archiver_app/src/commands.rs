use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use archiver_core::{MetadataStore, ProbeStatus, RunReport, ValidationPolicy};
use archiver_engine::{
    load_metadata, save_metadata, ArchiveLayout, Archiver, ArchiverConfig, AtomicFileWriter,
    DocumentFetcher, FetchSettings, MirrorSettings, ReqwestProber, RunLock, StrategyFetcher,
    WgetMirror,
};
use archiver_logging::{archiver_info, archiver_warn};
use chrono::NaiveDate;

use crate::config::{Config, PublishTarget};
use crate::publish::publish;
use crate::report::{render_report, ReportInput};

pub struct Context {
    pub config_path: PathBuf,
    pub site_root: PathBuf,
}

impl Context {
    fn load_config(&self) -> Result<Config> {
        Config::load(&self.config_path)
            .with_context(|| format!("failed to load configuration {:?}", self.config_path))
    }
}

/// Capture everything, persist the store, write the report and publish.
pub fn run(
    context: &Context,
    validation: Option<ValidationPolicy>,
    allow_publish: bool,
) -> Result<()> {
    let config = context.load_config()?;
    let publish_target = if allow_publish {
        config.resolve_publish(|name| std::env::var(name).ok())?
    } else {
        None
    };

    let lock = RunLock::acquire(&context.site_root).context("cannot start run")?;
    let metadata_path = config.metadata_file.resolve(&context.site_root);
    let mut store = load_metadata(&metadata_path);

    let today = chrono::Local::now().date_naive();
    let archiver = build_archiver(
        &config,
        context,
        validation.unwrap_or(config.validation),
        today,
    )?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let report = runtime
        .block_on(archiver.run(&config.artifacts, &mut store))
        .context("run aborted before any capture")?;

    finish_run(
        context,
        &config,
        &store,
        &report,
        today,
        lock,
        publish_target.as_ref(),
    )
}

/// Persist the store and the report, release the run lock, then publish.
/// The lock is gone before the publish command sees the site root.
fn finish_run(
    context: &Context,
    config: &Config,
    store: &MetadataStore,
    report: &RunReport,
    today: NaiveDate,
    lock: RunLock,
    publish_target: Option<&PublishTarget>,
) -> Result<()> {
    let metadata_path = config.metadata_file.resolve(&context.site_root);
    save_metadata(&metadata_path, store)
        .with_context(|| format!("failed to persist metadata to {:?}", metadata_path))?;

    let markdown = render_report(&ReportInput {
        update_schedule: config.update_schedule.as_deref(),
        artifacts: &config.artifacts,
        store,
        run: Some(report),
        generated_on: today,
    });
    if let Err(err) = write_report(context, config, &markdown) {
        archiver_warn!("Failed to write report: {:#}", err);
    }
    drop(lock);

    if let Some(target) = publish_target {
        if let Err(err) = publish(target, &context.site_root) {
            archiver_warn!("Publishing failed: {}", err);
        }
    }
    Ok(())
}

/// Probe every artifact and fail if any probe hard-fails.
pub fn validate(context: &Context) -> Result<()> {
    let config = context.load_config()?;
    let today = chrono::Local::now().date_naive();
    let archiver = build_archiver(&config, context, ValidationPolicy::Disabled, today)?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let sweep = runtime.block_on(archiver.validate(&config.artifacts));

    for (identity, status) in &sweep.results {
        let label = match status {
            ProbeStatus::Reachable => "reachable".to_string(),
            ProbeStatus::NotFound => "not found".to_string(),
            ProbeStatus::HardFailure(failure) => format!("FAILED ({failure})"),
        };
        println!("{identity}: {label}");
    }

    let failures = sweep.hard_failures();
    if !failures.is_empty() {
        bail!("{} artifact(s) failed validation", failures.len());
    }
    archiver_info!("All {} artifact(s) passed validation", sweep.results.len());
    Ok(())
}

/// Print the stored state without touching the network.
pub fn status(context: &Context) -> Result<()> {
    let config = context.load_config()?;
    let store = load_metadata(&config.metadata_file.resolve(&context.site_root));
    let markdown = render_report(&ReportInput {
        update_schedule: config.update_schedule.as_deref(),
        artifacts: &config.artifacts,
        store: &store,
        run: None,
        generated_on: chrono::Local::now().date_naive(),
    });
    print!("{markdown}");
    Ok(())
}

fn build_archiver(
    config: &Config,
    context: &Context,
    validation: ValidationPolicy,
    today: NaiveDate,
) -> Result<Archiver> {
    let capture = &config.capture;
    let layout = ArchiveLayout {
        site_root: context.site_root.clone(),
        archive_dir: config.archive_dir.clone(),
    };

    let fetch_settings = FetchSettings {
        probe_timeout: capture.probe_timeout(),
        request_timeout: capture.fetch_timeout(),
        user_agent: capture.user_agent.clone(),
        contact: capture.contact.clone(),
        ..FetchSettings::default()
    };
    let mirror_settings = MirrorSettings {
        binary: capture.mirror_binary.clone(),
        timeout: capture.fetch_timeout(),
        rate_limit: capture.rate_limit.clone(),
        user_agent: capture.user_agent.clone(),
        contact: capture.contact.clone(),
    };

    let prober = ReqwestProber::new(&fetch_settings).context("failed to build http client")?;
    let document = DocumentFetcher::new(fetch_settings, layout.clone())
        .context("failed to build http client")?;
    let fetcher = StrategyFetcher::new(WgetMirror::new(mirror_settings, layout), document);

    let archiver_config = ArchiverConfig {
        archive_dir: config.archive_dir.clone(),
        validation,
        delay_between_captures: capture.delay_between_captures(),
        today: Arc::new(move || today),
    };
    Ok(Archiver::new(
        archiver_config,
        Arc::new(prober),
        Arc::new(fetcher),
    ))
}

fn write_report(context: &Context, config: &Config, markdown: &str) -> Result<()> {
    let path = config.report_file.resolve(&context.site_root);
    let (dir, filename) = match (path.parent(), path.file_name()) {
        (Some(dir), Some(name)) => (dir.to_path_buf(), name.to_string_lossy().into_owned()),
        _ => bail!("report path {:?} has no file name", path),
    };
    AtomicFileWriter::new(dir).write(&filename, markdown.as_bytes())?;
    archiver_info!("Wrote report to {:?}", path);
    Ok(())
}
