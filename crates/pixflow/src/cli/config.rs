//! The `pixflow config` command: inspect, check, and create the config file.

use anyhow::Context;
use clap::{Args, Subcommand};
use pixflow_core::Config;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::overrides::{expand, Overrides};

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the configuration a run would use, as TOML
    Show {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Validate a config file and report the resolved settings
    Check {
        /// File to check (defaults to the standard location)
        file: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Print the config file location
    Path,

    /// Write a config file from defaults plus any overrides
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Loaded,
    Missing,
    Invalid(String),
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show { overrides } => {
            let path = Config::default_path();
            let (mut config, source) = load_source(&path);
            overrides.apply(&mut config);
            print!("{}", describe(&config, &path, &source, &overrides));
            println!("{}", config.to_toml()?);
        }

        ConfigCommand::Check { file, overrides } => {
            let path = file
                .as_deref()
                .map(expand)
                .unwrap_or_else(Config::default_path);
            let config = check(&path, &overrides)?;
            print!("{}", describe(&config, &path, &Source::Loaded, &overrides));
            println!("Config OK: {}", path.display());
        }

        ConfigCommand::Path => {
            println!("{}", Config::default_path().display());
        }

        ConfigCommand::Init { force, overrides } => {
            let path = Config::default_path();
            init_at(&path, force, &overrides)?;
            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

/// Load `path`, falling back to defaults when it is absent or unusable.
fn load_source(path: &Path) -> (Config, Source) {
    if !path.exists() {
        return (Config::default(), Source::Missing);
    }
    match Config::load_from(path) {
        Ok(config) => (config, Source::Loaded),
        Err(e) => (Config::default(), Source::Invalid(e.to_string())),
    }
}

/// Load a file that must exist and be valid once `overrides` are applied.
fn check(path: &Path, overrides: &Overrides) -> anyhow::Result<Config> {
    if !path.exists() {
        anyhow::bail!(
            "No config file at {}\n\n  Hint: create one with `pixflow config init`.",
            path.display()
        );
    }
    let mut config = Config::load_from(path)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    overrides.apply(&mut config);
    config
        .validate()
        .context("Overrides produce an invalid configuration")?;
    Ok(config)
}

fn init_at(path: &Path, force: bool, overrides: &Overrides) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let mut config = Config::default();
    overrides.apply(&mut config);
    config.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, config.to_toml()?)?;
    Ok(())
}

/// TOML comment header describing where the settings came from and what they
/// resolve to. Keeps `config show` output loadable as a config file.
fn describe(config: &Config, path: &Path, source: &Source, overrides: &Overrides) -> String {
    let source = match source {
        Source::Loaded => "loaded".to_string(),
        Source::Missing => "not found, using defaults".to_string(),
        Source::Invalid(e) => format!("invalid ({e}), using defaults"),
    };
    let storage_dir = config.storage_dir();
    let storage_state = if storage_dir.is_dir() {
        "exists"
    } else {
        "created on first run"
    };
    let validation = match config.validate() {
        Ok(()) => "ok".to_string(),
        Err(e) => e.to_string(),
    };

    let mut out = String::new();
    let _ = writeln!(out, "# config file: {} ({source})", path.display());
    if !overrides.is_empty() {
        let _ = writeln!(out, "# overrides:   command-line flags applied");
    }
    let _ = writeln!(
        out,
        "# storage dir: {} ({storage_state})",
        storage_dir.display()
    );
    let _ = writeln!(
        out,
        "# resize:      {}px wide, fetch timeout {:?}",
        config.resize.target_width,
        config.fetch_timeout()
    );
    let _ = writeln!(out, "# validation:  {validation}");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_source_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, source) = load_source(&dir.path().join("nope.toml"));
        assert_eq!(source, Source::Missing);
        assert_eq!(config.resize.target_width, 800);
    }

    #[test]
    fn test_load_source_invalid_file_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[resize]\ntarget_width = 0\n").unwrap();

        let (config, source) = load_source(&path);
        assert!(matches!(source, Source::Invalid(ref e) if e.contains("target_width")));
        assert_eq!(config.resize.target_width, 800);
    }

    #[test]
    fn test_describe_reports_overrides_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        let overrides = Overrides {
            storage_dir: Some(dir.path().to_path_buf()),
            timeout_ms: Some(0),
            ..Default::default()
        };
        overrides.apply(&mut config);

        let path = Path::new("/etc/pixflow.toml");
        let header = describe(&config, path, &Source::Loaded, &overrides);
        assert!(header.contains("/etc/pixflow.toml (loaded)"));
        assert!(header.contains("command-line flags applied"));
        assert!(header.contains(&format!("{} (exists)", dir.path().display())));
        assert!(header.contains("timeout_ms"));
        assert!(header.lines().all(|line| line.is_empty() || line.starts_with('#')));
    }

    #[test]
    fn test_show_output_is_loadable_toml() {
        let config = Config::default();
        let output = format!(
            "{}{}",
            describe(
                &config,
                Path::new("c.toml"),
                &Source::Missing,
                &Overrides::default()
            ),
            config.to_toml().unwrap()
        );
        let parsed: Config = toml::from_str(&output).unwrap();
        assert_eq!(parsed.resize.target_width, config.resize.target_width);
    }

    #[test]
    fn test_check_rejects_bad_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[resize]\ntarget_width = 640\n").unwrap();

        let config = check(&path, &Overrides::default()).unwrap();
        assert_eq!(config.resize.target_width, 640);

        let bad = Overrides {
            target_width: Some(0),
            ..Default::default()
        };
        let err = check(&path, &bad).unwrap_err();
        assert!(err.to_string().contains("Overrides"));
    }

    #[test]
    fn test_check_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = check(&dir.path().join("absent.toml"), &Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("config init"));
    }

    #[test]
    fn test_init_writes_overrides_and_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let overrides = Overrides {
            target_width: Some(1024),
            ..Default::default()
        };

        init_at(&path, false, &overrides).unwrap();
        let written = Config::load_from(&path).unwrap();
        assert_eq!(written.resize.target_width, 1024);

        assert!(init_at(&path, false, &Overrides::default()).is_err());
        init_at(&path, true, &Overrides::default()).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().resize.target_width, 800);
    }
}
