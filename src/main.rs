use anyhow::Result;
use clap::Parser;
use std::collections::HashMap;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use xapi_block_hotplug::cli::Cli;
use xapi_block_hotplug::collaborators::{ProcCdromRegistry, ScriptSharingCheck};
use xapi_block_hotplug::config::HotplugConfig;
use xapi_block_hotplug::executor::{Executor, HostSystem};
use xapi_block_hotplug::{pipeline, report};

/// Initialize tracing subscriber; stdout is reserved for the report
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Cli) -> Result<bool> {
    let config = HotplugConfig::load(args.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    let registry = ProcCdromRegistry::new(&config.cdrom_info);
    let sharing = ScriptSharingCheck::in_dir(&config.script_dir);

    let decision = match args.explicit_event() {
        Some(event) => pipeline::decide(event?, &registry, &sharing),
        None => {
            let vars: HashMap<String, String> = std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect();
            pipeline::decide_env(&vars, &config.sys_root, &registry, &sharing)
        }
    };

    if args.dry_run {
        print!("{}", report::render(args.format, &decision, None)?);
        return Ok(true);
    }

    let executor = Executor::new(HostSystem::new(&config));
    let execution = executor.execute(&decision.actions);
    print!("{}", report::render(args.format, &decision, Some(&execution))?);

    Ok(execution.is_success())
}

fn main() -> ExitCode {
    let args = Cli::parse();
    init_tracing(args.debug);

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("xapi-block-hotplug: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
