//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Forgeport - build and publish agent, proxy and plugin packages
#[derive(Parser, Debug)]
#[command(name = "forgeport")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a pipeline.yaml overlay (replaces ~/.forgeport/pipeline.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Directory packages are published under
    #[arg(long, global = true)]
    pub download_root: Option<Utf8PathBuf>,

    /// JSON file backing the registry
    #[arg(long, global = true)]
    pub registry_path: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Options every command resolves its configuration with
    pub fn globals(&self) -> GlobalArgs {
        GlobalArgs {
            config: self.config.clone(),
            download_root: self.download_root.clone(),
            registry_path: self.registry_path.clone(),
        }
    }
}

/// Global flags, detached from the parsed command
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config: Option<Utf8PathBuf>,
    pub download_root: Option<Utf8PathBuf>,
    pub registry_path: Option<Utf8PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import every package unit of an uploaded bundle
    Import(ImportArgs),

    /// Build and publish selected units of a bundle
    Build(BuildArgs),

    /// Parse a bundle without building or publishing
    Describe(DescribeArgs),

    /// Show the latest config templates for a plugin
    Templates(TemplatesArgs),

    /// Resource signature tracking
    #[command(subcommand)]
    Signature(SignatureCommands),

    /// Pipeline configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Flags overriding pipeline configuration for one run
#[derive(Args, Debug, Clone, Default)]
pub struct PublishOverrides {
    /// Directory holding TLS material to ship with agents and proxies
    #[arg(long)]
    pub cert_path: Option<Utf8PathBuf>,

    /// Also publish every package under this version alias
    #[arg(long)]
    pub overwrite_version: Option<String>,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Bundle archive (.tar.gz, .tgz or .tar)
    pub archive: Utf8PathBuf,

    /// Fail units whose version does not update the published line
    #[arg(long)]
    pub update_check: bool,

    /// Mark published packages and templates as released
    #[arg(long)]
    pub release: bool,

    #[command(flatten)]
    pub overrides: PublishOverrides,

    /// Output the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Bundle archive (.tar.gz, .tgz or .tar)
    pub archive: Utf8PathBuf,

    /// Unit to build, as reported by `describe` (repeatable)
    #[arg(short, long = "unit", required = true)]
    pub units: Vec<String>,

    /// Mark published packages and templates as released
    #[arg(long)]
    pub release: bool,

    #[command(flatten)]
    pub overrides: PublishOverrides,

    /// Output the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DescribeArgs {
    /// Bundle archive (.tar.gz, .tgz or .tar)
    pub archive: Utf8PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct TemplatesArgs {
    /// Plugin name
    pub plugin: String,

    /// Target in os_arch form, e.g. linux_x86_64
    #[arg(short, long)]
    pub target: String,

    /// Prefer templates declared for this plugin version
    #[arg(long)]
    pub plugin_version: Option<String>,

    /// Print template contents
    #[arg(long)]
    pub content: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum SignatureCommands {
    /// Record the signature of a resource definition file
    Update(SignatureUpdateArgs),

    /// Show whether a resource is dirty
    Show(SignatureNameArgs),

    /// Force a resource dirty
    MarkDirty(SignatureNameArgs),

    /// Clear the dirty flag after a sync
    Reset(SignatureNameArgs),
}

#[derive(Args, Debug)]
pub struct SignatureUpdateArgs {
    /// Resource name
    pub name: String,

    /// YAML or JSON definition to hash
    #[arg(short, long)]
    pub file: Utf8PathBuf,

    /// Number of members added since the last sync
    #[arg(long, default_value_t = 0)]
    pub added: usize,

    /// Number of members deleted since the last sync
    #[arg(long, default_value_t = 0)]
    pub deleted: usize,
}

#[derive(Args, Debug)]
pub struct SignatureNameArgs {
    /// Resource name
    pub name: String,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved pipeline configuration
    Show(ConfigShowArgs),

    /// Check that the configuration loads
    Validate,
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_flags() {
        let cli = Cli::try_parse_from([
            "forgeport",
            "--download-root",
            "/srv/download",
            "import",
            "bundle.tgz",
            "--update-check",
            "--overwrite-version",
            "latest",
        ])
        .unwrap();

        assert_eq!(
            cli.globals().download_root.as_deref().map(|p| p.as_str()),
            Some("/srv/download")
        );
        match cli.command {
            Commands::Import(args) => {
                assert_eq!(args.archive, "bundle.tgz");
                assert!(args.update_check);
                assert!(!args.release);
                assert_eq!(args.overrides.overwrite_version.as_deref(), Some("latest"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_build_requires_units() {
        assert!(Cli::try_parse_from(["forgeport", "build", "bundle.tgz"]).is_err());

        let cli = Cli::try_parse_from([
            "forgeport",
            "build",
            "bundle.tgz",
            "-u",
            "plugins_linux_x86_64/basereport",
            "-u",
            "plugins_windows_x86_64/basereport",
        ])
        .unwrap();
        match cli.command {
            Commands::Build(args) => assert_eq!(args.units.len(), 2),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_signature_subcommands() {
        let cli = Cli::try_parse_from([
            "forgeport",
            "signature",
            "update",
            "host-group",
            "--file",
            "group.yaml",
            "--added",
            "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Signature(SignatureCommands::Update(args)) => {
                assert_eq!(args.name, "host-group");
                assert_eq!(args.added, 2);
                assert_eq!(args.deleted, 0);
            }
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Cli::try_parse_from(["forgeport", "signature", "mark-dirty", "x"]).is_ok());
    }
}
