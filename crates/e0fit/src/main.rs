use std::{fs::File, io::Write};

use anyhow::Context;
use clap::Parser;
use e0::{Corrector, max_threads, validate};
use e0fit::{
    config::Config,
    model,
    report::{Summary, write_report},
};
use log::info;

/// re-estimate the atomic reference energies of a foundation potential
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// input file
    #[arg(value_parser, default_value_t = String::from("e0fit.toml"))]
    infile: String,

    /// Set the maximum number of threads to use, overriding the input file.
    /// 0 means to use as many threads as there are CPUs.
    #[arg(short, long)]
    threads: Option<usize>,

    /// Print only the corrected E0s as a JSON object and exit.
    #[arg(short, long, default_value_t = false)]
    json: bool,

    /// Also write the corrected E0s and the fit diagnostics to this file as
    /// JSON.
    #[arg(short, long)]
    output: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = Config::load(&args.infile)
        .with_context(|| format!("failed to load {}", args.infile))?;
    max_threads(args.threads.unwrap_or(config.threads));

    let training = xyz::load_file(&config.training, &config.energy_key)
        .with_context(|| format!("failed to load {}", config.training))?;
    info!(
        "loaded {} training configurations from {}",
        training.len(),
        config.training
    );
    info!("evaluating the {} model", config.model);
    let model = model::build(&config.model, &config.foundation_e0s);

    let result = Corrector::new(config.rcond).run(
        model.as_ref(),
        &config.foundation_e0s,
        &training,
        &config.elements,
    )?;

    let validation = match &config.validation {
        Some(path) => {
            let configs = xyz::load_file(path, &config.energy_key)
                .with_context(|| format!("failed to load {path}"))?;
            validate(
                model.as_ref(),
                &config.foundation_e0s,
                &result.e0s,
                &configs,
            )?
        }
        None => None,
    };

    if let Some(path) = &args.output {
        let mut f = File::create(path)
            .with_context(|| format!("failed to create {path}"))?;
        let summary = Summary::new(&result, validation.as_ref());
        writeln!(f, "{}", serde_json::to_string_pretty(&summary)?)?;
    }

    if args.json {
        println!("{}", serde_json::to_string(&result.e0s)?);
        return Ok(());
    }

    write_report(
        &mut std::io::stdout().lock(),
        &config.foundation_e0s,
        &config.elements,
        &result,
        validation.as_ref(),
    )?;

    Ok(())
}
