pub mod reap;
pub mod rotate;
pub mod smoke;

use keyturn_credential::Services;
use keyturn_credential::providers::AwsServices;
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;

use crate::settings::Settings;

/// Exit status when the command ran but some secrets failed.
pub const PARTIAL_FAILURE: u8 = 2;

pub async fn services(settings: &Settings) -> Arc<Services> {
    Arc::new(AwsServices::load(&settings.aws, &settings.rotation).await)
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn exit_code(clean: bool) -> ExitCode {
    if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(PARTIAL_FAILURE)
    }
}
