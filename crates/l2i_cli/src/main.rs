//! L2I CLI
//!
//! Compiles intent documents against domain profiles and prints plans or
//! backend artifacts. Artifacts go to stdout, logs to stderr.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use console::style;
use l2i_core::{Deployment, Profile, EMBEDDED_PROFILES};
use l2i_emit::{Artifact, Backend};
use l2i_pipeline::{
    compatibility_map, load_profile, Compatibility, CompilerConfig, Pipeline, PipelineResult,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Exit status when the pipeline halts
const EXIT_HALTED: u8 = 2;

#[derive(Parser)]
#[command(name = "l2i")]
#[command(about = "L2I - intent compiler for heterogeneous L2 domains", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// Intent document; repeat for several
    #[arg(short, long = "spec", required = true)]
    specs: Vec<PathBuf>,
    /// Profile for a single-domain deployment: legacy, netconf, p4 or a path
    #[arg(short, long)]
    profile: Option<String>,
    /// Domain id used with --profile
    #[arg(long, default_value = "default")]
    domain: String,
    /// Compiler configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and print the IR plan
    Plan {
        #[command(flatten)]
        inputs: Inputs,
        /// Also print artifacts for the configured backends
        #[arg(long)]
        emit: bool,
    },
    /// Compile and print the NETCONF-like artifact
    Netconf {
        #[command(flatten)]
        inputs: Inputs,
        /// Print RPC XML instead of JSON
        #[arg(long)]
        xml: bool,
    },
    /// Compile and print the P4Runtime-like artifact
    P4 {
        #[command(flatten)]
        inputs: Inputs,
    },
    /// Print the intent × domain compatibility matrix
    Compat {
        #[command(flatten)]
        inputs: Inputs,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List embedded profiles
    Profiles {
        /// Print one profile in full
        #[arg(long)]
        show: Option<String>,
    },
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Plan { inputs, emit } => {
            let (config, deployment, docs) = inputs.load()?;
            let pipeline = Pipeline::from_config(&config);
            let result = pipeline.compile(&docs, &deployment);
            println!("{}", serde_json::to_string_pretty(&result)?);
            if let (true, Some(plan)) = (emit, result.plan()) {
                for artifact in pipeline.emit(plan, &config.backends) {
                    println!("{}", artifact.to_json()?);
                }
            }
            Ok(exit_code(&result))
        }
        Commands::Netconf { inputs, xml } => {
            let (config, deployment, docs) = inputs.load()?;
            compile_and_emit(&config, &deployment, &docs, Backend::Netconf, |artifact| {
                match artifact {
                    Artifact::Netconf(netconf) if xml => Ok(netconf.render_xml()),
                    other => Ok(other.to_json()?),
                }
            })
        }
        Commands::P4 { inputs } => {
            let (config, deployment, docs) = inputs.load()?;
            compile_and_emit(&config, &deployment, &docs, Backend::P4runtime, |artifact| {
                Ok(artifact.to_json()?)
            })
        }
        Commands::Compat { inputs, json } => {
            let (config, deployment) = inputs.environment()?;
            let named = inputs.named_documents()?;
            let map = compatibility_map(&named, &deployment, &config.policy, config.fold_strategy);
            if json {
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                let domains: Vec<&str> = deployment.iter().map(|(id, _)| id).collect();
                print_matrix(&domains, &map);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Profiles { show } => {
            match show {
                Some(name) => {
                    let profile = Profile::embedded(&name)?;
                    println!("{}", serde_json::to_string_pretty(&profile)?);
                }
                None => {
                    for (alias, id) in EMBEDDED_PROFILES {
                        let profile = Profile::embedded(id)?;
                        println!(
                            "{:<16} {:<8} queues={} wfq={} meters={} multicast={} atomic={}",
                            profile.profile_id,
                            alias,
                            profile.queues.max_queues,
                            profile.supports_wfq(),
                            profile.meters.supported,
                            profile.multicast.mode,
                            profile.atomic_commit
                        );
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("l2i=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

impl Inputs {
    /// Configuration, deployment and parsed documents
    fn load(&self) -> Result<(CompilerConfig, Deployment, Vec<Value>)> {
        let (config, deployment) = self.environment()?;
        let docs = self
            .specs
            .iter()
            .map(|path| read_document(path))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(
            specs = docs.len(),
            domains = deployment.len(),
            "inputs loaded"
        );
        Ok((config, deployment, docs))
    }

    /// Configuration and deployment; --profile overrides configured domains
    fn environment(&self) -> Result<(CompilerConfig, Deployment)> {
        let config = match &self.config {
            Some(path) => CompilerConfig::load(path)?,
            None => CompilerConfig::new(),
        };
        let deployment = match (&self.profile, config.domains.is_empty()) {
            (Some(reference), _) => Deployment::single(&self.domain, load_profile(reference)?),
            (None, false) => config.deployment()?,
            (None, true) => Deployment::single(&self.domain, Profile::embedded("legacy")?),
        };
        Ok((config, deployment))
    }

    /// Documents keyed by file stem
    fn named_documents(&self) -> Result<Vec<(String, Value)>> {
        self.specs
            .iter()
            .map(|path| {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .ok_or_else(|| eyre!("{} has no file name", path.display()))?;
                Ok((name, read_document(path)?))
            })
            .collect()
    }
}

fn read_document(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).wrap_err_with(|| format!("{} is not valid JSON", path.display()))
}

fn compile_and_emit<F>(
    config: &CompilerConfig,
    deployment: &Deployment,
    docs: &[Value],
    backend: Backend,
    render: F,
) -> Result<ExitCode>
where
    F: Fn(&Artifact) -> Result<String>,
{
    let pipeline = Pipeline::from_config(config);
    let result = pipeline.compile(docs, deployment);
    let Some(plan) = result.plan() else {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(exit_code(&result));
    };

    for artifact in pipeline.emit(plan, &[backend]) {
        tracing::info!(
            backend = %artifact.backend(),
            fingerprint = %artifact.fingerprint()?.to_hex(),
            "artifact rendered"
        );
        println!("{}", render(&artifact)?);
    }
    Ok(ExitCode::SUCCESS)
}

fn exit_code(result: &PipelineResult) -> ExitCode {
    ExitCode::from(exit_status(result))
}

fn exit_status(result: &PipelineResult) -> u8 {
    if result.is_planned() { 0 } else { EXIT_HALTED }
}

fn print_matrix(domains: &[&str], map: &l2i_pipeline::CompatibilityMap) {
    let width = map.keys().map(String::len).max().unwrap_or(0).max(6);
    print!("{:<width$}", "intent", width = width);
    for domain in domains {
        print!("  {}", style(domain).bold());
    }
    println!();

    for (intent, row) in map {
        print!("{:<width$}", intent, width = width);
        for domain in domains {
            let cell = match row.get(*domain) {
                Some(verdict @ Compatibility::Allow) => style(verdict.to_string()).green(),
                Some(verdict @ Compatibility::Adjust { .. }) => {
                    style(verdict.to_string()).yellow()
                }
                Some(verdict) => style(verdict.to_string()).red(),
                None => style("-".to_string()).dim(),
            };
            print!("  {}", cell);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn spec_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_repeated_specs() {
        let cli = Cli::try_parse_from([
            "l2i", "netconf", "--spec", "a.json", "--spec", "b.json", "--profile", "p4", "--xml",
        ])
        .unwrap();
        match cli.command {
            Commands::Netconf { inputs, xml } => {
                assert_eq!(inputs.specs.len(), 2);
                assert_eq!(inputs.profile.as_deref(), Some("p4"));
                assert!(xml);
            }
            _ => panic!("expected netconf"),
        }
    }

    #[test]
    fn test_spec_is_required() {
        assert!(Cli::try_parse_from(["l2i", "plan"]).is_err());
    }

    #[test]
    fn test_load_defaults_to_legacy() {
        let file = spec_file(r#"{"id": "s1", "flows": []}"#);
        let inputs = Inputs {
            specs: vec![file.path().to_path_buf()],
            profile: None,
            domain: "default".to_string(),
            config: None,
        };
        let (config, deployment, docs) = inputs.load().unwrap();
        assert_eq!(config, CompilerConfig::new());
        assert_eq!(
            deployment.profile("default").map(|p| p.profile_id.as_str()),
            Some("legacy-vlan-tc")
        );
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let file = spec_file("{not json");
        assert!(read_document(file.path()).is_err());
    }

    #[test]
    fn test_embedded_profiles_load() {
        for (alias, id) in EMBEDDED_PROFILES {
            assert_eq!(Profile::embedded(alias).unwrap().profile_id, *id);
            assert_eq!(Profile::embedded(id).unwrap().profile_id, *id);
        }
    }

    #[test]
    fn test_exit_code_for_halt() {
        let deployment = Deployment::single("default", Profile::embedded("legacy").unwrap());
        let result = Pipeline::new().compile(&[serde_json::json!({})], &deployment);
        assert_eq!(exit_status(&result), EXIT_HALTED);
    }
}
