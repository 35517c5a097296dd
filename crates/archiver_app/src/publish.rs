use std::path::Path;
use std::process::Command;

use archiver_logging::archiver_info;
use thiserror::Error;

use crate::config::PublishTarget;

/// Environment variable the publish command receives its credential in.
pub const TOKEN_VAR: &str = "ARCHIVER_PUBLISH_TOKEN";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to start publish command {program:?}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("publish command exited with {0:?}")]
    Exit(Option<i32>),
}

/// Hand the site root to the configured publish command.
pub fn publish(target: &PublishTarget, site_root: &Path) -> Result<(), PublishError> {
    let Some((program, args)) = target.command.split_first() else {
        return Err(PublishError::Exit(None));
    };
    archiver_info!("Publishing {:?} with {}", site_root, program);

    let status = Command::new(program)
        .args(args)
        .current_dir(site_root)
        .env(TOKEN_VAR, &target.token)
        .status()
        .map_err(|source| PublishError::Spawn {
            program: program.clone(),
            source,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(PublishError::Exit(status.code()))
    }
}
