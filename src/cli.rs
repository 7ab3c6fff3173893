use crate::filewalker::WalkFilter;
#[cfg(feature = "strip")]
use crate::strip::StripOptions;
use crate::sync::{DEFAULT_SOURCE_ROOT, SyncOptions};
use crate::utils::normalize_extension;
use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use regex::RegexBuilder;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const DEFAULT_SCAN_DIR: &str = "src";
pub const DEFAULT_CHANGES_FILE: &str = "scripts/changes.md";
pub const DEFAULT_OUTPUT_FILE: &str = "src-documentation.md";
pub const DEFAULT_TITLE: &str = "Source Code Documentation";

pub struct Config {
    pub project_root: PathBuf,
    pub verbosity: u8,
    pub mode: Mode,
}

pub enum Mode {
    Combine(CombineOptions),
    Sync {
        options: SyncOptions,
        /// Skip the confirmation prompt.
        assume_yes: bool,
    },
    #[cfg(feature = "strip")]
    Strip(StripOptions),
}

pub struct CombineOptions {
    pub project_root: PathBuf,
    /// Directory to document, relative to `project_root`.
    pub scan_dir: PathBuf,
    pub output_path: PathBuf,
    pub title: String,
    pub filter: WalkFilter,
    /// Write a `// filepath:` line at the top of each block.
    pub annotate: bool,
}

fn extensions_arg() -> Arg {
    Arg::new("ext")
        .short('e')
        .long("ext")
        .value_name("EXT")
        .help("Only include files with these extensions (comma separated)")
        .value_delimiter(',')
        .action(ArgAction::Append)
}

fn source_root_arg() -> Arg {
    Arg::new("source-root")
        .long("source-root")
        .value_name("SEGMENT")
        .help("Leading path segment every synced path must start with")
        .default_value(DEFAULT_SOURCE_ROOT)
}

pub fn build_command() -> Command {
    let command = Command::new("mdsync")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Mirrors a source tree into a Markdown document and syncs modified files back")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("root")
                .short('C')
                .long("root")
                .value_name("DIR")
                .help("Project root (defaults to the current directory)")
                .global(true)
                .num_args(1),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log output (-v, -vv, -vvv)")
                .global(true)
                .action(ArgAction::Count),
        )
        .subcommand(
            Command::new("combine")
                .about("Collects source files into a single Markdown document")
                .arg(
                    Arg::new("dir")
                        .short('d')
                        .long("dir")
                        .value_name("DIR")
                        .help("Directory to document, relative to the project root")
                        .default_value(DEFAULT_SCAN_DIR),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Sets the output .md file path")
                        .num_args(1),
                )
                .arg(
                    Arg::new("title")
                        .long("title")
                        .value_name("TITLE")
                        .help("Top-level heading of the document")
                        .default_value(DEFAULT_TITLE),
                )
                .arg(extensions_arg())
                .arg(
                    Arg::new("match")
                        .short('m')
                        .long("match")
                        .value_name("REGEX")
                        .help("Only include files whose name matches (case-insensitive)")
                        .num_args(1),
                )
                .arg(
                    Arg::new("ignore")
                        .short('i')
                        .long("ignore")
                        .value_name("FILE")
                        .help("Sets the ignore file path")
                        .num_args(1),
                )
                .arg(
                    Arg::new("no-annotate")
                        .long("no-annotate")
                        .help("Do not write a filepath comment at the top of each block")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("sync")
                .about("Writes the modified files from a changes document into the project")
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .value_name("FILE")
                        .help("Changes document to read")
                        .num_args(1),
                )
                .arg(source_root_arg())
                .arg(
                    Arg::new("yes")
                        .short('y')
                        .long("yes")
                        .help("Do not ask for confirmation")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("Show what would be written without writing any files")
                        .action(ArgAction::SetTrue),
                ),
        );

    #[cfg(feature = "strip")]
    let command = command.subcommand(
        Command::new("strip")
            .about("Removes generated filepath comments from source files")
            .arg(
                Arg::new("dir")
                    .short('d')
                    .long("dir")
                    .value_name("DIR")
                    .help("Directory to clean, relative to the project root")
                    .default_value(DEFAULT_SCAN_DIR),
            )
            .arg(extensions_arg())
            .arg(source_root_arg()),
    );

    command
}

pub fn parse_args() -> Result<Config> {
    let matches = build_command().get_matches();
    config_from_matches(&matches, std::env::current_dir()?)
}

/// Parses an explicit argument list; relative paths resolve against `cwd`.
pub fn parse_args_from<I, T>(args: I, cwd: &Path) -> Result<Config>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_command().try_get_matches_from(args)?;
    config_from_matches(&matches, cwd.to_path_buf())
}

fn config_from_matches(matches: &ArgMatches, cwd: PathBuf) -> Result<Config> {
    let project_root = matches
        .get_one::<String>("root")
        .map(|root| cwd.join(root))
        .unwrap_or_else(|| cwd.clone());

    let verbosity = matches.get_count("verbose");

    let mode = match matches.subcommand() {
        Some(("combine", sub)) => Mode::Combine(combine_options(sub, &cwd, &project_root)?),
        Some(("sync", sub)) => {
            let input = sub
                .get_one::<String>("input")
                .map(|p| cwd.join(p))
                .unwrap_or_else(|| project_root.join(DEFAULT_CHANGES_FILE));
            Mode::Sync {
                options: SyncOptions {
                    input,
                    project_root: project_root.clone(),
                    source_root: source_root(sub),
                    dry_run: sub.get_flag("dry-run"),
                },
                assume_yes: sub.get_flag("yes"),
            }
        }
        #[cfg(feature = "strip")]
        Some(("strip", sub)) => {
            let extensions = extensions(sub);
            Mode::Strip(StripOptions {
                project_root: project_root.clone(),
                scan_dir: scan_dir(sub),
                extensions: if extensions.is_empty() {
                    StripOptions::default_extensions()
                } else {
                    extensions
                },
                source_root: source_root(sub),
            })
        }
        _ => anyhow::bail!("no subcommand given"),
    };

    Ok(Config {
        project_root,
        verbosity,
        mode,
    })
}

fn combine_options(sub: &ArgMatches, cwd: &Path, project_root: &Path) -> Result<CombineOptions> {
    let output_path = sub
        .get_one::<String>("output")
        .map(|p| cwd.join(p))
        .unwrap_or_else(|| project_root.join(DEFAULT_OUTPUT_FILE));

    let name_pattern = sub
        .get_one::<String>("match")
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("Invalid --match pattern: {pattern}"))
        })
        .transpose()?;

    Ok(CombineOptions {
        project_root: project_root.to_path_buf(),
        scan_dir: scan_dir(sub),
        output_path,
        title: sub
            .get_one::<String>("title")
            .cloned()
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        filter: WalkFilter {
            extensions: extensions(sub),
            name_pattern,
            ignore_file: sub.get_one::<String>("ignore").map(|p| cwd.join(p)),
        },
        annotate: !sub.get_flag("no-annotate"),
    })
}

fn scan_dir(sub: &ArgMatches) -> PathBuf {
    sub.get_one::<String>("dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCAN_DIR))
}

fn extensions(sub: &ArgMatches) -> Vec<String> {
    sub.get_many::<String>("ext")
        .map(|vals| {
            vals.map(|ext| normalize_extension(ext))
                .filter(|ext| !ext.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn source_root(sub: &ArgMatches) -> String {
    sub.get_one::<String>("source-root")
        .map(|s| s.trim_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_SOURCE_ROOT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        build_command().debug_assert();
    }

    #[test]
    fn test_sync_defaults() {
        let cwd = Path::new("/work/project");
        let config = parse_args_from(["mdsync", "sync"], cwd).unwrap();
        assert_eq!(config.project_root, cwd);
        match config.mode {
            Mode::Sync {
                options,
                assume_yes,
            } => {
                assert_eq!(options.input, cwd.join("scripts/changes.md"));
                assert_eq!(options.source_root, "src");
                assert!(!options.dry_run);
                assert!(!assume_yes);
            }
            _ => panic!("expected sync mode"),
        }
    }

    #[test]
    fn test_combine_flags() {
        let cwd = Path::new("/work");
        let config = parse_args_from(
            [
                "mdsync", "-vv", "--root", "project", "combine", "--dir", "docs", "-e", ".JS,ts",
                "--match", "common|ecu", "-o", "out.md", "--no-annotate",
            ],
            cwd,
        )
        .unwrap();
        assert_eq!(config.verbosity, 2);
        assert_eq!(config.project_root, cwd.join("project"));
        match config.mode {
            Mode::Combine(options) => {
                assert_eq!(options.scan_dir, PathBuf::from("docs"));
                assert_eq!(options.output_path, cwd.join("out.md"));
                assert_eq!(options.filter.extensions, vec!["js", "ts"]);
                assert!(options.filter.name_pattern.unwrap().is_match("ECU-Tools.js"));
                assert!(!options.annotate);
                assert_eq!(options.title, DEFAULT_TITLE);
            }
            _ => panic!("expected combine mode"),
        }
    }

    #[test]
    fn test_invalid_match_pattern_is_rejected() {
        let result = parse_args_from(["mdsync", "combine", "--match", "("], Path::new("/w"));
        assert!(result.is_err());
    }

    #[cfg(feature = "strip")]
    #[test]
    fn test_strip_defaults() {
        let config = parse_args_from(["mdsync", "strip"], Path::new("/w")).unwrap();
        match config.mode {
            Mode::Strip(options) => {
                assert_eq!(options.scan_dir, PathBuf::from("src"));
                assert_eq!(options.extensions, StripOptions::default_extensions());
            }
            _ => panic!("expected strip mode"),
        }
    }
}
