//! SIM lookup command

use anyhow::Result;
use clap::Args;
use jasper_portal::SimDataService;

use crate::output::{print_envelope, OutputFormat};

#[derive(Args)]
pub struct QueryArgs {
    /// Project whose portal account is used
    pub project: String,

    /// ICCID or VIN to look up
    pub search_value: String,
}

pub async fn execute(args: QueryArgs, service: SimDataService, format: OutputFormat) -> Result<()> {
    let envelope = service.fetch(&args.project, &args.search_value).await?;
    print_envelope(&envelope, format);
    Ok(())
}
