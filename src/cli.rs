//! Command-line interface for mutcheck.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use regex::Regex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::analysis::{AnalysisSession, ClassName, ClassSource, ClasspathSource};
use crate::config::{self, ConfigFile, Configuration, Preset};
use crate::report::{self, JsonReport, ReportMode, Summary};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "MUTCHECK_LOG";

/// Static immutability analysis for compiled JVM classes.
///
/// Mutcheck reads class files from directories and jars and reports, for
/// each class, whether its instances can change state after construction
/// and why.
#[derive(Parser)]
#[command(name = "mutcheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyse classes for immutability
    #[command(visible_alias = "analyse")]
    Check(CheckArgs),
    /// Create a new mutcheck configuration from a template
    Init(InitArgs),
}

/// Arguments for the check command.
#[derive(Parser)]
pub struct CheckArgs {
    /// Classes to analyse (default: every class on the classpath)
    pub classes: Vec<String>,

    /// Class directories or jar files to read classes from
    #[arg(short = 'p', long, required = true, num_args = 1..)]
    pub classpath: Vec<PathBuf>,

    /// File listing classes to analyse, one per line
    #[arg(long)]
    pub class_list: Option<PathBuf>,

    /// Only analyse classes whose name matches this regular expression
    #[arg(short, long = "match")]
    pub match_pattern: Option<String>,

    /// Path to configuration YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Presets of known classes to load: jdk, guava
    #[arg(long = "preset")]
    pub presets: Vec<String>,

    /// Abort on the first class or checker that cannot be analysed
    #[arg(long)]
    pub fail_fast: bool,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Which results to report: all, immutable or mutable
    #[arg(short, long, default_value = "all")]
    pub report: String,

    /// Print verdict counts after the results
    #[arg(long)]
    pub summary: bool,

    /// Analyse requested classes in parallel
    #[arg(long)]
    pub parallel: bool,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "mutcheck.yaml")]
    pub output: PathBuf,

    /// Template to use
    #[arg(short, long, default_value = DEFAULT_TEMPLATE)]
    pub template: String,

    /// List available templates
    #[arg(short, long)]
    pub list: bool,
}

const DEFAULT_TEMPLATE: &str = "minimal";

/// A bundled starter configuration.
struct Template {
    name: &'static str,
    description: &'static str,
    content: &'static str,
}

impl Template {
    fn named(name: &str) -> Option<&'static Template> {
        TEMPLATES.iter().find(|t| t.name == name)
    }

    fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
        }
        std::fs::write(path, self.content).with_context(|| format!("write {}", path.display()))
    }
}

static TEMPLATES: &[Template] = &[
    Template {
        name: "minimal",
        description: "JDK preset, carry on past unreadable classes",
        content: include_str!("templates/minimal.yaml"),
    },
    Template {
        name: "guava",
        description: "JDK and Guava presets with Guava collection idioms",
        content: include_str!("templates/guava.yaml"),
    },
    Template {
        name: "strict",
        description: "Fail fast, no presets: every dependency must be on the classpath",
        content: include_str!("templates/strict.yaml"),
    },
];

/// Install the stderr log subscriber. `MUTCHECK_LOG` wins over `-v`.
pub fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Read a class list: one name per line, `#` starts a comment.
pub fn read_class_list(path: &Path) -> anyhow::Result<Vec<ClassName>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read class list {}", path.display()))?;
    Ok(parse_class_list(&content))
}

pub fn parse_class_list(content: &str) -> Vec<ClassName> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(ClassName::new)
        .collect()
}

/// Assemble the configuration from the config file and command-line flags.
pub fn build_configuration(args: &CheckArgs) -> anyhow::Result<Configuration> {
    let path = match &args.config {
        Some(p) => Some(p.clone()),
        None => config::discover("."),
    };
    let file = match &path {
        Some(p) => {
            info!(path = %p.display(), "loading configuration");
            ConfigFile::parse_file(p)?
        }
        None => ConfigFile::default(),
    };

    let mut builder = file.apply(Configuration::builder())?;
    for name in &args.presets {
        let preset = name.parse::<Preset>().map_err(anyhow::Error::msg)?;
        builder = builder.merge_preset(preset);
    }
    // Without a config file the JDK preset is implied.
    if path.is_none() && args.presets.is_empty() {
        builder = builder.merge_preset(Preset::Jdk);
    }
    if args.fail_fast {
        builder = builder.fail_fast();
    }
    Ok(builder.build())
}

/// Work out which classes to analyse.
fn select_classes(args: &CheckArgs, source: &dyn ClassSource) -> anyhow::Result<Vec<ClassName>> {
    let mut classes: Vec<ClassName> = args.classes.iter().map(ClassName::new).collect();
    if let Some(list) = &args.class_list {
        classes.extend(read_class_list(list)?);
    }
    if classes.is_empty() {
        classes = source.list_classes()?;
    }

    if let Some(pattern) = &args.match_pattern {
        let re = Regex::new(pattern).with_context(|| format!("invalid --match pattern {:?}", pattern))?;
        classes.retain(|c| re.is_match(c.as_str()));
    }

    classes.sort();
    classes.dedup();
    Ok(classes)
}

/// Run the check command.
pub fn run_check(args: &CheckArgs) -> anyhow::Result<i32> {
    if args.format != "pretty" && args.format != "json" {
        eprintln!("Error: invalid format {:?}, must be 'pretty' or 'json'", args.format);
        return Ok(EXIT_ERROR);
    }
    let mode: ReportMode = match args.report.parse() {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let configuration = match build_configuration(args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: invalid configuration: {:#}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let source = Arc::new(ClasspathSource::new(&args.classpath)?);
    let classes = select_classes(args, source.as_ref())?;
    if classes.is_empty() {
        eprintln!("Warning: no classes to analyse");
        return Ok(EXIT_SUCCESS);
    }
    info!(classes = classes.len(), parallel = args.parallel, "starting analysis");

    let session = AnalysisSession::new(source, configuration);
    let outcome = if args.parallel {
        session.analyze_all_parallel(&classes)
    } else {
        session.analyze_all(classes.iter().cloned())
    };
    let results = match outcome {
        Ok(results) => results,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    let errors = session.errors();

    let classpath: Vec<String> = args
        .classpath
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect();
    let mut stdout = io::stdout().lock();
    match args.format.as_str() {
        "json" => {
            let report = JsonReport::new(&classpath, &results, &errors, mode);
            report::write_json(&mut stdout, &report)?;
        }
        _ => {
            report::write_pretty(&mut stdout, &classpath, &results, &errors, mode, args.summary)?;
        }
    }

    if Summary::from_results(&results, &errors).passed() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Write a starter configuration. An existing file is left alone.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.list {
        print!("{}", template_listing());
        return Ok(EXIT_SUCCESS);
    }

    let Some(template) = Template::named(&args.template) else {
        let known: Vec<&str> = TEMPLATES.iter().map(|t| t.name).collect();
        eprintln!("Unknown template {:?}; choose one of {}", args.template, known.join(", "));
        return Ok(EXIT_ERROR);
    };
    if args.output.exists() {
        eprintln!("{} already exists, not overwriting it", args.output.display());
        return Ok(EXIT_ERROR);
    }

    template.write_to(&args.output)?;
    info!(path = %args.output.display(), template = template.name, "wrote configuration");
    println!(
        "Wrote {} from the {} template.\nUse it with: mutcheck check --classpath <dir-or-jar> --config {}",
        args.output.display(),
        template.name,
        args.output.display()
    );
    Ok(EXIT_SUCCESS)
}

/// One template per line; the default is starred.
fn template_listing() -> String {
    TEMPLATES
        .iter()
        .map(|t| {
            let marker = if t.name == DEFAULT_TEMPLATE { '*' } else { ' ' };
            format!("{} {:<8} {}\n", marker, t.name, t.description)
        })
        .collect()
}
