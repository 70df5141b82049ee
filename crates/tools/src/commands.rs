//! `enkf-param` subcommands.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use enkf_node::report::write_results;
use enkf_node::{
    alloc_mean, alloc_stats, ActiveList, AnyNode, EnkfNode, MultfltConfig, ParameterConfig,
};
use enkf_storage::{EnsembleFs, RealizationState};
use tracing::{info, warn};

#[derive(Subcommand, Debug)]
pub enum ParamCommand {
    /// Create an empty ensemble case.
    Create {
        /// Case directory
        case: PathBuf,
    },

    /// Sample realizations from the prior and store them.
    Init {
        /// Case directory (created if missing)
        case: PathBuf,

        /// Parameter config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Ensemble seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Number of realizations, numbered from 0
        #[arg(short = 'n', long, default_value = "100")]
        realizations: usize,
    },

    /// Print the parameter values of one realization.
    Report {
        /// Case directory
        case: PathBuf,

        /// Parameter config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Realization index
        #[arg(short, long)]
        realization: usize,
    },

    /// Print the ensemble mean over every stored realization.
    Mean {
        /// Case directory
        case: PathBuf,

        /// Parameter config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Also print the standard deviation of the latent values
        #[arg(long)]
        std: bool,
    },

    /// Clamp every stored realization to its configured bounds.
    Truncate {
        /// Case directory
        case: PathBuf,

        /// Parameter config (JSON)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Write the MULTFLT include keyword of one realization.
    ExportKeyword {
        /// Case directory
        case: PathBuf,

        /// Parameter config (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Realization index
        #[arg(short, long)]
        realization: usize,

        /// Output include file
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Run a subcommand; reports go to `out`.
pub fn run(cmd: ParamCommand, out: &mut dyn Write) -> Result<()> {
    match cmd {
        ParamCommand::Create { case } => {
            let fs = EnsembleFs::create(&case)?;
            info!("Case '{}' ready at {}", fs.case_name(), case.display());
        }

        ParamCommand::Init {
            case,
            config,
            seed,
            realizations,
        } => {
            let config = load_config(&config)?;
            let mut fs = EnsembleFs::create(&case)?;
            let all: Vec<usize> = (0..realizations).collect();
            fs.init_ensemble(&config.alloc()?, seed, &all)?;
        }

        ParamCommand::Report {
            case,
            config,
            realization,
        } => {
            let config = load_config(&config)?;
            let fs = EnsembleFs::mount(&case, true)?;
            let mut node = config.alloc()?;
            fs.load_node(realization, &mut node)
                .with_context(|| format!("loading realization {realization}"))?;
            node.fprintf_results(out)?;
        }

        ParamCommand::Mean { case, config, std } => {
            let config = load_config(&config)?;
            let fs = EnsembleFs::mount(&case, true)?;
            let realizations = stored_realizations(&fs);
            let nodes = fs.load_ensemble(&config.alloc()?, &realizations)?;
            let members: Vec<&AnyNode> = nodes.iter().collect();
            info!(realizations = members.len(), "Computing ensemble mean");

            if std {
                let (mut mean, deviation) = alloc_stats(&members)?;
                mean.fprintf_results(out)?;
                let mut values = vec![0.0; deviation.size()];
                deviation.serialize(&ActiveList::All, &mut values, 0)?;
                writeln!(out, "# std (latent)")?;
                write_results(out, config.names(), &values)?;
            } else {
                alloc_mean(&members)?.fprintf_results(out)?;
            }
        }

        ParamCommand::Truncate { case, config } => {
            let config = load_config(&config)?;
            let mut fs = EnsembleFs::mount(&case, false)?;
            let realizations = stored_realizations(&fs);
            let mut changed = 0;
            for &iens in &realizations {
                let mut node = config.alloc()?;
                fs.load_node(iens, &mut node)?;
                if node.truncate() {
                    fs.save_node(iens, &node)?;
                    changed += 1;
                }
            }
            info!(
                realizations = realizations.len(),
                changed, "Ensemble truncated"
            );
        }

        ParamCommand::ExportKeyword {
            case,
            config,
            realization,
            output,
        } => {
            let config = load_config(&config)?;
            let fs = EnsembleFs::mount(&case, true)?;
            let mut node = config.alloc()?;
            fs.load_node(realization, &mut node)
                .with_context(|| format!("loading realization {realization}"))?;
            let Some(multflt) = node.as_multflt_mut() else {
                bail!("{} is not a MULTFLT group", config.key());
            };
            let mut file = BufWriter::new(
                File::create(&output)
                    .with_context(|| format!("creating {}", output.display()))?,
            );
            multflt.write_keyword(&mut file)?;
            file.flush()?;
            info!("Wrote {}", output.display());
        }
    }
    Ok(())
}

/// Read a parameter config file.
pub fn load_config(path: &Path) -> Result<ParameterConfig> {
    let config = MultfltConfig::from_json_file(path)
        .with_context(|| format!("reading parameter config {}", path.display()))?;
    Ok(config.shared().into())
}

/// Realizations holding parameters, ascending.
fn stored_realizations(fs: &EnsembleFs) -> Vec<usize> {
    let mut realizations = fs.realizations(RealizationState::Initialized);
    realizations.extend(fs.realizations(RealizationState::HasData));
    realizations.sort_unstable();
    let skipped = fs.state_map().len() - realizations.len();
    if skipped > 0 {
        warn!(skipped, "Skipping realizations without parameters");
    }
    realizations
}
