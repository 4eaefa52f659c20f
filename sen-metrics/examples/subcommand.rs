//! Instrumented CLI with one subcommand.
//!
//! ```sh
//! cargo run -p sen-metrics --example subcommand -- sync --force
//! cargo run -p sen-metrics --example subcommand -- remote add upstream --url https://example.com
//! RUST_LOG=sen_metrics=debug cargo run -p sen-metrics --example subcommand -- --help
//! ```
//!
//! The final snapshot is printed to stdout by the OpenTelemetry stdout
//! exporter after the command output.

use anyhow::Context;
use opentelemetry::KeyValue;
use sen_command::{CliError, Command, CommandTree, FlagSpec};
use sen_metrics::logging::{init_logging, LogConfig};
use sen_metrics::{Config, MeteredCommand};

fn build_tree() -> CommandTree {
    CommandTree::new(
        Command::new("myapp")
            .about("Demo application with usage metrics")
            .flag(FlagSpec::switch("verbose").short('v').about("Verbose output"))
            .subcommand(
                Command::new("sync")
                    .about("Synchronise with a remote")
                    .flag(FlagSpec::switch("force").short('f').about("Overwrite local changes"))
                    .flag(FlagSpec::value("remote").about("Remote name"))
                    .run(|inv| {
                        let remote = inv.flag_value("remote").unwrap_or("origin");
                        Ok(format!(
                            "synced with {remote}{}",
                            if inv.is_present("force") { " (forced)" } else { "" }
                        ))
                    }),
            )
            .subcommand(
                Command::new("remote").about("Manage remotes").subcommand(
                    Command::new("add")
                        .about("Add a remote")
                        .flag(FlagSpec::value("url").about("Remote URL"))
                        .run(|inv| match inv.args().first() {
                            Some(name) => Ok(format!("added remote {name}")),
                            None => Err(CliError::user("remote name required")),
                        }),
                ),
            )
            .subcommand(
                Command::new("check")
                    .about("Fail on purpose")
                    .run(|_| Err::<(), _>(CliError::user("check failed"))),
            ),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(&LogConfig::default()).context("installing log subscriber")?;

    let tree = build_tree();
    let config = Config::builder(tree.root_name())
        .stdout_debug(true)
        .build()
        .context("building metrics config")?;
    let app = MeteredCommand::setup(tree, &config).context("setting up metrics")?;

    let started = app.meter().u64_counter("demo_runs").with_unit("1").build();
    started.add(1, &[KeyValue::new("demo", true)]);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let response = match app.execute(args).await {
        Ok(response) => response,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(e.exit_code());
        }
    };

    if !response.output.is_empty() {
        println!("{}", response.output);
    }
    if response.exit_code != 0 {
        std::process::exit(response.exit_code);
    }
    Ok(())
}
