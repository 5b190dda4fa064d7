//! Signature commands

use anyhow::{Context, Result};
use camino::Utf8Path;
use forgeport_core::types::ResourceSignatureState;
use forgeport_packages::{compute_signature, SignatureTracker};

use super::{load_config, open_registry};
use crate::cli::{GlobalArgs, SignatureCommands};
use crate::output;

pub async fn run(cmd: SignatureCommands, globals: &GlobalArgs) -> Result<()> {
    let config = load_config(globals)?;
    let tracker = SignatureTracker::new(open_registry(&config)?);

    match cmd {
        SignatureCommands::Update(args) => {
            let hash = definition_hash(&args.file)?;
            let state = tracker
                .update_signature(&args.name, &hash, args.added, args.deleted)
                .await?;
            print_state(&state);
        }
        SignatureCommands::Show(args) => {
            let state = tracker.state(&args.name).await?;
            output::kv(&args.name, &state.to_string());
        }
        SignatureCommands::MarkDirty(args) => {
            let state = tracker.mark_dirty(&args.name).await?;
            print_state(&state);
        }
        SignatureCommands::Reset(args) => {
            let state = tracker.reset_dirty(&args.name).await?;
            output::success(&format!("{} marked clean", state.name));
        }
    }
    Ok(())
}

/// Hash of a YAML or JSON definition, independent of key order and formatting
fn definition_hash(path: &Utf8Path) -> Result<String> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let value: serde_json::Value = serde_yaml_ng::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path))?;
    Ok(compute_signature(&value)?)
}

fn print_state(state: &ResourceSignatureState) {
    output::kv("Resource", &state.name);
    output::kv("Signature", &state.signature);
    output::kv("Dirty", &state.is_dirty.to_string());
}
