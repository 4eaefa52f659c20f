//! Interrupts delivered to a real process, during and after a command.
//!
//! Each case re-runs this test binary with `interrupt_child_entry` selected
//! and the scenario in the environment, then checks the child's exit
//! status and what its exporter wrote.

#![cfg(unix)]

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::{Command as Process, ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use opentelemetry_sdk::metrics::data::ResourceMetrics;
use sen_command::{Command, CommandTree};
use sen_metrics::consent::{AutoConsentPrompt, MemoryConsentStore};
use sen_metrics::snapshot::counter_total;
use sen_metrics::{Config, ConsentResolver, ExporterError, MeteredCommand, MetricExporter};

const SCENARIO_ENV: &str = "SEN_METRICS_INTERRUPT_SCENARIO";
const OUTPUT_ENV: &str = "SEN_METRICS_INTERRUPT_OUTPUT";

/// Writes the `upload` count to a file on export.
struct FileExporter {
    path: PathBuf,
}

#[async_trait]
impl MetricExporter for FileExporter {
    fn name(&self) -> &str {
        "file"
    }

    async fn export(&self, metrics: &mut ResourceMetrics) -> Result<(), ExporterError> {
        fs::write(&self.path, counter_total(metrics, "upload").to_string())
            .map_err(|e| ExporterError::Other(e.to_string()))
    }

    async fn shutdown(&self) -> Result<(), ExporterError> {
        Ok(())
    }
}

fn upload_tree(signal_in_handler: Option<libc::c_int>) -> CommandTree {
    CommandTree::new(Command::new("myapp").subcommand(Command::new("upload").run(
        move |_| {
            if let Some(signal) = signal_in_handler {
                unsafe { libc::raise(signal) };
                std::thread::sleep(Duration::from_secs(5));
            }
            Ok("uploaded")
        },
    )))
}

fn run_scenario(scenario: &str, output: PathBuf) {
    let runtime = match scenario {
        "current-thread" => tokio::runtime::Builder::new_current_thread(),
        _ => tokio::runtime::Builder::new_multi_thread(),
    }
    .enable_all()
    .build()
    .unwrap();

    runtime.block_on(async {
        let config = Config::builder("myapp")
            .exporter(FileExporter { path: output })
            .flush_deadline(Duration::from_secs(2))
            .build()
            .unwrap();
        let consent =
            ConsentResolver::new(MemoryConsentStore::new(), AutoConsentPrompt::allow(), false);
        let signal_in_handler = match scenario {
            "after-return" => None,
            "sigint" => Some(libc::SIGINT),
            _ => Some(libc::SIGTERM),
        };
        let app =
            MeteredCommand::setup_with_consent(upload_tree(signal_in_handler), &config, consent)
                .unwrap();

        app.execute(["upload"]).await.unwrap();

        if scenario == "after-return" {
            unsafe { libc::raise(libc::SIGINT) };
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    });
    std::process::exit(0);
}

#[test]
fn interrupt_child_entry() {
    if let (Ok(scenario), Some(output)) = (env::var(SCENARIO_ENV), env::var_os(OUTPUT_ENV)) {
        run_scenario(&scenario, PathBuf::from(output));
    }
}

fn run_child(scenario: &str) -> (ExitStatus, Option<String>) {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("exported");
    let status = Process::new(env::current_exe().unwrap())
        .args(["--exact", "interrupt_child_entry", "--test-threads=1"])
        .env(SCENARIO_ENV, scenario)
        .env(OUTPUT_ENV, &output)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    (status, fs::read_to_string(&output).ok())
}

#[test]
fn test_sigterm_in_handler_flushes_then_exits_1() {
    let (status, exported) = run_child("multi-thread");
    assert_eq!(status.code(), Some(1));
    assert_eq!(exported.as_deref(), Some("1"));
}

#[test]
fn test_sigterm_in_handler_on_current_thread_runtime() {
    let (status, exported) = run_child("current-thread");
    assert_eq!(status.code(), Some(1));
    assert_eq!(exported.as_deref(), Some("1"));
}

#[test]
fn test_sigint_in_handler_flushes_then_exits_1() {
    let (status, exported) = run_child("sigint");
    assert_eq!(status.code(), Some(1));
    assert_eq!(exported.as_deref(), Some("1"));
}

#[test]
fn test_interrupt_after_command_returns_still_exits_1() {
    let (status, exported) = run_child("after-return");
    assert_eq!(status.code(), Some(1));
    assert_eq!(exported.as_deref(), Some("1"));
}
