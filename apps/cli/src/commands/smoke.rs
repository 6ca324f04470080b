use keyturn_credential::{SecretId, ValidationSweep};
use std::process::ExitCode;

use crate::settings::Settings;

pub async fn run(settings: &Settings, secret_id: Option<String>) -> anyhow::Result<ExitCode> {
    let services = super::services(settings).await;
    let sweep = ValidationSweep::new(services, settings.rotation.clone());

    if let Some(secret_id) = secret_id {
        let pass = sweep.check_secret(&SecretId::new(secret_id)).await?;
        super::print_json(&pass)?;
        return Ok(ExitCode::SUCCESS);
    }

    let report = sweep.run().await?;
    super::print_json(&report)?;
    Ok(super::exit_code(report.all_passed()))
}
