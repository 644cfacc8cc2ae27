use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use modeltest_core::test_harness::{find_scenario, logging, run_scenario, scenarios, Scenario};
use modeltest_core::{HarnessConfig, ReplayEngine, ScenarioReport};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("modeltest")
        .version(modeltest_core::VERSION)
        .about("Transformation and replay checks for versioned management models")
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(Command::new("list").about("List bundled scenarios"))
        .subcommand(
            Command::new("run")
                .about("Run scenarios against the configured legacy versions")
                .arg(
                    Arg::new("scenario")
                        .long("scenario")
                        .short('s')
                        .help("Scenario to run (default: all)"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .value_parser(value_parser!(std::path::PathBuf))
                        .help("TOML or YAML harness configuration"),
                )
                .arg(
                    Arg::new("max-correction-rounds")
                        .long("max-correction-rounds")
                        .value_parser(value_parser!(usize))
                        .help("Override the correction round bound"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output reports as JSON"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Print the default harness configuration as TOML"),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(args: &clap::ArgMatches) -> anyhow::Result<bool> {
    let mut config = match args.get_one::<std::path::PathBuf>("config") {
        Some(path) => HarnessConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => logging::default_config(),
    };
    if let Some(rounds) = args.get_one::<usize>("max-correction-rounds") {
        config = config.with_max_correction_rounds(*rounds);
        config.validate()?;
    }

    let selected: Vec<Scenario> = match args.get_one::<String>("scenario") {
        Some(name) => vec![find_scenario(name)
            .with_context(|| format!("unknown scenario {name}"))?],
        None => scenarios(),
    };

    let engine = ReplayEngine::new(config);
    let reports: Vec<ScenarioReport> = selected
        .iter()
        .map(|scenario| run_scenario(&engine, scenario))
        .collect();

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("{}", report.generate_text());
        }
    }
    Ok(reports.iter().all(ScenarioReport::passed))
}

fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("list", _)) => {
            for scenario in scenarios() {
                println!("{:<14} {}", scenario.name, scenario.description);
            }
        }
        Some(("run", args)) => {
            let passed = run(args)?;
            std::process::exit(if passed { 0 } else { 1 });
        }
        Some(("config", _)) => {
            print!("{}", logging::default_config().to_toml()?);
        }
        _ => {
            cli().print_help()?;
        }
    }
    Ok(())
}
