use std::{
    io,
    process::ExitCode,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use crossbeam::channel::{bounded, tick, unbounded};
use io_pattern::{
    agg::interval::IntervalAggregator,
    cli::Cli,
    driver::{Driver, Schedule, Stop},
    error::IoPatternError,
    trace::spawn_source,
    ui::report::{ReportLayout, Reporter},
};
use log::info;
use time::UtcOffset;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Must happen before any thread exists.
    let utc_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    match run(cli, utc_offset) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("io-pattern: {e:#}");
            if let Some(IoPatternError::Configuration(_)) = e.downcast_ref::<IoPatternError>() {
                eprintln!("{}", Cli::command().render_usage());
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, utc_offset: UtcOffset) -> Result<()> {
    let config = cli.into_config(utc_offset)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let (stop_tx, stop_rx) = bounded::<()>(1);
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
            let _ = stop_tx.try_send(());
        })
        .context("failed to install signal handler")?;
    }

    let (event_tx, event_rx) = unbounded();
    // Detached: a replay reader may be blocked on stdin at exit.
    let _source = spawn_source(&config, event_tx, Arc::clone(&shutdown))?;

    let mut driver = Driver::new(
        IntervalAggregator::new(config.filter.clone(), config.first_io),
        Reporter::new(ReportLayout::from_config(&config)),
        Schedule::new(config.interval_secs, config.count),
        config.utc_offset,
    );

    let ticks = tick(Duration::from_secs(1));
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let stop = driver.run(&event_rx, &ticks, &stop_rx, &mut out)?;

    shutdown.store(true, Ordering::Relaxed);
    match stop {
        Stop::Finished => info!("report count reached"),
        Stop::Interrupted => info!("interrupted"),
    }
    Ok(())
}
