use keyturn_credential::{Reaper, SecretId};
use std::process::ExitCode;

use crate::settings::Settings;

pub async fn run(settings: &Settings, secret_id: Option<String>) -> anyhow::Result<ExitCode> {
    let services = super::services(settings).await;
    let reaper = Reaper::new(services, settings.rotation.clone());

    if let Some(secret_id) = secret_id {
        let report = reaper.reap_secret(&SecretId::new(secret_id)).await?;
        super::print_json(&report)?;
        return Ok(ExitCode::SUCCESS);
    }

    let report = reaper.sweep().await?;
    super::print_json(&report)?;
    Ok(super::exit_code(report.is_clean()))
}
