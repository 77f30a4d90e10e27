use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::{
    compress::compress_dir,
    config::{Config, ConfigLogLevel, load_config},
    version::{
        GitCli, VERSION_ENV_OVERRIDE, VersionPolicy, render_header, resolve_version, write_header,
    },
};

/// Firmware build helpers command-line interface
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = "Build steps for firmware projects: gzip web assets and stamp the firmware version from git",
    propagate_version = true
)]
pub struct Cli {
    /// Project root, relative paths in the config resolve against it
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    /// Config file to use instead of fwbuild.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level, RUST_LOG takes precedence when set
    #[arg(long, global = true, value_enum)]
    log_level: Option<ConfigLogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write a .gz sibling for every matching file in the data directory
    Gzip {
        /// Directory to compress, defaults to data/ in the project
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// File extension to compress, may be repeated
        #[arg(long = "ext")]
        extensions: Vec<String>,
    },
    /// Derive the firmware version from git and write it to a header
    Version {
        /// How the tag and commit count become the version string
        #[arg(long, value_enum)]
        policy: Option<VersionPolicy>,
        /// Header file to write, relative to the project
        #[arg(long)]
        header: Option<PathBuf>,
        /// Name of the preprocessor define
        #[arg(long)]
        define: Option<String>,
    },
    /// Run gzip and then version
    All,
}

impl Cli {
    /// Parse command-line arguments with Clap
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Load the config and apply command-line overrides
    pub fn config(&self) -> Result<Config> {
        let config = load_config(self.project_dir.clone(), self.config.clone())?
            .with_log_level(self.log_level);

        Ok(match &self.command {
            Command::Gzip {
                data_dir,
                extensions,
            } => config
                .with_data_dir(data_dir.clone())
                .with_extensions(extensions.clone()),
            Command::Version {
                policy,
                header,
                define,
            } => config
                .with_policy(*policy)
                .with_header_path(header.clone())
                .with_define_name(define.clone()),
            Command::All => config,
        })
    }

    pub fn run(&self, config: &Config) -> Result<()> {
        match self.command {
            Command::Gzip { .. } => gzip(config),
            Command::Version { .. } => stamp_version(config).map(|_| ()),
            Command::All => {
                gzip(config)?;
                stamp_version(config).map(|_| ())
            }
        }
    }
}

fn gzip(config: &Config) -> Result<()> {
    tracing::info!("🗜️ Compressing assets in {}", config.data_dir().display());
    let report = compress_dir(config.data_dir(), config.extensions())
        .with_context(|| format!("compressing {}", config.data_dir().display()))?;

    tracing::info!(
        "✅ Compressed {} files, {} -> {} bytes ({:.0}%)",
        report.files,
        report.bytes_in,
        report.bytes_out,
        report.ratio() * 100.0
    );
    Ok(())
}

fn stamp_version(config: &Config) -> Result<String> {
    let source = GitCli::new(config.project_dir());
    let version = resolve_version(
        &source,
        *config.policy(),
        std::env::var(VERSION_ENV_OVERRIDE).ok(),
    );

    let header = render_header(config.define_name(), &version)?;
    let written = write_header(config.header_path(), &header)
        .with_context(|| format!("writing {}", config.header_path().display()))?;

    if written {
        tracing::info!("📝 Wrote {}", config.header_path().display());
    } else {
        tracing::info!("👌 {} is up to date", config.header_path().display());
    }
    println!("[version] {} set to: {version}", config.define_name());

    Ok(version)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use tempfile::TempDir;

    use super::*;

    /// Write a config into `dir` so no user-level config file leaks into the test.
    fn write_config(dir: &TempDir, contents: &str) -> String {
        let path = dir.path().join("test-config.toml");
        std::fs::write(&path, contents).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_gzip_with_repeated_ext() {
        let cli = Cli::parse_from(["fwbuild", "gzip", "--ext", "html", "--ext", "svg"]);
        assert_eq!(
            cli.command,
            Command::Gzip {
                data_dir: None,
                extensions: vec!["html".into(), "svg".into()],
            }
        );
        assert_eq!(cli.project_dir, PathBuf::from("."));
    }

    #[test]
    fn test_parse_version_with_global_flags() {
        let cli = Cli::parse_from([
            "fwbuild",
            "version",
            "--policy",
            "since-tag",
            "--define",
            "APP_VERSION",
            "--project-dir",
            "/fw",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.project_dir, PathBuf::from("/fw"));
        assert_eq!(cli.log_level, Some(ConfigLogLevel::Debug));
        assert_eq!(
            cli.command,
            Command::Version {
                policy: Some(VersionPolicy::SinceTag),
                header: None,
                define: Some("APP_VERSION".into()),
            }
        );
    }

    #[test]
    fn test_gzip_overrides_apply_to_config() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().to_str().unwrap();
        let config_path = write_config(&dir, "");
        let cli = Cli::parse_from([
            "fwbuild",
            "--project-dir",
            project,
            "--config",
            config_path.as_str(),
            "gzip",
            "--data-dir",
            "public",
        ]);

        let config = cli.config().unwrap();
        assert_eq!(config.data_dir(), &dir.path().join("public"));
        assert_eq!(config.extensions(), &vec!["html", "js", "css"]);
    }

    #[test]
    fn test_all_compresses_and_stamps() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("index.html"), "<h1>hi</h1>").unwrap();
        let config_path = write_config(&dir, "define_name = \"FW_VERSION\"\n");

        let cli = Cli::parse_from([
            "fwbuild",
            "--project-dir",
            dir.path().to_str().unwrap(),
            "--config",
            config_path.as_str(),
            "all",
        ]);
        let config = cli.config().unwrap();
        cli.run(&config).unwrap();

        assert!(data.join("index.html.gz").exists());
        let header =
            std::fs::read_to_string(dir.path().join("src/assets/firmware_version.h")).unwrap();
        assert!(header.starts_with("#pragma once\n#define FW_VERSION \""));
        assert_eq!(header.lines().filter(|l| l.starts_with("#define")).count(), 1);
    }
}
