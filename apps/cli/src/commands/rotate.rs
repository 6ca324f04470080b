use anyhow::Context;
use keyturn_credential::rotation::{Phase, RotationCoordinator, RotationEvent, RotationRequest};
use serde_json::json;
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

use crate::settings::Settings;

/// Builds the request from flags or from a host event file.
pub fn request(
    secret_id: Option<String>,
    token: Option<String>,
    step: Option<String>,
    event: Option<&Path>,
) -> anyhow::Result<RotationRequest> {
    if let Some(path) = event {
        let raw = read_event(path)?;
        let event: RotationEvent =
            serde_json::from_str(&raw).context("failed to decode rotation event")?;
        return Ok(RotationRequest::try_from(event)?);
    }

    let (Some(secret_id), Some(token), Some(step)) = (secret_id, token, step) else {
        anyhow::bail!("--secret-id, --token and --step must be given together");
    };
    let phase: Phase = step.parse()?;
    Ok(RotationRequest::new(secret_id, token, phase))
}

fn read_event(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read event from stdin")?;
        Ok(raw)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read event file {}", path.display()))
    }
}

pub async fn run(settings: &Settings, request: RotationRequest) -> anyhow::Result<ExitCode> {
    let services = super::services(settings).await;
    let coordinator = RotationCoordinator::new(services, settings.rotation.clone());

    let outcome = coordinator.handle(&request).await?;

    super::print_json(&json!({
        "secret_id": request.secret_id,
        "token": request.token,
        "step": request.phase,
        "result": outcome,
    }))?;
    Ok(ExitCode::SUCCESS)
}
