//! dut-recovery - run repair plans against a lab device

mod jsonl;

use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use recovery_engine::{
    run_configuration, ExecRegistry, ExecTable, LogMetricSaver, LogStepReporter, MetricSaver,
    RunArgs,
};
use recovery_plan::Configuration;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn cli() -> Command {
    Command::new("dut-recovery")
        .version(recovery_engine::VERSION)
        .about("Diagnose and repair lab devices with declarative plans")
        .subcommand_required(true)
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("run")
                .about("Run the configured plans against a device")
                .arg(config_arg())
                .arg(
                    Arg::new("resource")
                        .long("resource")
                        .required(true)
                        .help("Device under test"),
                )
                .arg(
                    Arg::new("plan")
                        .long("plan")
                        .action(ArgAction::Append)
                        .help("Run only these plans, in the given order"),
                )
                .arg(
                    Arg::new("no-recovery")
                        .long("no-recovery")
                        .action(ArgAction::SetTrue)
                        .help("Do not run recovery actions"),
                )
                .arg(
                    Arg::new("steps")
                        .long("steps")
                        .action(ArgAction::SetTrue)
                        .help("Log every plan and action step"),
                )
                .arg(
                    Arg::new("metrics-out")
                        .long("metrics-out")
                        .value_parser(value_parser!(PathBuf))
                        .help("Append metrics as JSON lines to this file"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Show the plans of a configuration")
                .arg(config_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the normalized configuration as JSON"),
                ),
        )
        .subcommand(Command::new("execs").about("List built-in execs"))
}

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Plan configuration file (.json, .yaml)")
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn load_config(args: &ArgMatches) -> anyhow::Result<Configuration> {
    let path = args
        .get_one::<PathBuf>("config")
        .context("missing --config")?;
    Configuration::load(path).with_context(|| format!("load {}", path.display()))
}

async fn run_command(args: &ArgMatches) -> anyhow::Result<()> {
    let mut config = load_config(args)?;
    if let Some(plans) = args.get_many::<String>("plan") {
        config.plan_names = plans.cloned().collect();
        config.check_plan_names()?;
    }
    if config.plan_names.is_empty() {
        bail!("configuration lists no plans to run");
    }

    let execs = ExecTable::with_builtins();
    config.check_execs(|name| execs.contains(name))?;

    let resource = args
        .get_one::<String>("resource")
        .context("missing --resource")?;
    let mut run_args = RunArgs::new(resource.as_str(), Arc::new(execs))
        .with_recovery(!args.get_flag("no-recovery"));
    if args.get_flag("steps") {
        run_args = run_args.with_steps(Arc::new(LogStepReporter));
    }

    let metric_saver: Arc<dyn MetricSaver> = match args.get_one::<PathBuf>("metrics-out") {
        Some(path) => Arc::new(
            jsonl::JsonLinesMetricSaver::open(path)
                .with_context(|| format!("open {}", path.display()))?,
        ),
        None => Arc::new(LogMetricSaver),
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            on_signal.cancel();
        }
    });

    run_configuration(&cancel, &config, &run_args, Some(metric_saver)).await?;
    Ok(())
}

fn show_command(args: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(args)?;
    if args.get_flag("json") {
        println!("{}", config.to_json()?);
        return Ok(());
    }
    for (name, plan) in config.plans_in_order() {
        println!(
            "{name}: {} critical, {} actions{}",
            plan.critical_actions.len(),
            plan.actions.len(),
            if plan.allow_fail { ", allowed to fail" } else { "" }
        );
        for critical in &plan.critical_actions {
            println!("  - {critical}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    let result = match matches.subcommand() {
        Some(("run", args)) => run_command(args).await,
        Some(("show", args)) => show_command(args),
        Some(("execs", _)) => {
            for name in ExecTable::with_builtins().names() {
                println!("{name}");
            }
            Ok(())
        }
        _ => Ok(()),
    };

    if let Err(err) = result {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}
