//! Build command: publish only the chosen units of a bundle

use anyhow::Result;
use forgeport_packages::PipelineOptions;

use super::{apply_overrides, import, load_config};
use crate::cli::{BuildArgs, GlobalArgs};

pub async fn run(args: BuildArgs, globals: &GlobalArgs) -> Result<()> {
    let mut config = load_config(globals)?;
    apply_overrides(&mut config, &args.overrides);

    let options = PipelineOptions {
        is_update_check: false,
        is_release: args.release,
        selected: Some(args.units),
    };
    import::execute(config, &args.archive, &options, args.json).await
}
