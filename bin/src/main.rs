use std::io::{self, Write};
use std::process::ExitCode;

use bench_config::BenchConfig;
use ccbench::args::Args;
use ccbench::report::{write_catalogue, write_header, write_report};
use clap::Parser;
use coherence::Benchmark;
use log::{error, info};
use utils::placement::available_cores;
use utils::timer::Timer;

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.list_tests {
        return match write_catalogue(&mut out) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                error!("failed to write the test list: {err}");
                ExitCode::FAILURE
            }
        };
    }

    match run(&args, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = out.flush();
            eprintln!("ccbench: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, out: &mut impl Write) -> Result<(), Box<dyn std::error::Error>> {
    let config = BenchConfig::try_from(args)?;
    info!(
        "{} logical cores available, {} requested",
        available_cores(),
        config.num_threads()
    );

    let started = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    write_header(out, &config, &started)?;
    out.flush()?;

    let timer = Timer::new("ccbench", true);
    let benchmark = Benchmark::new(config)?;
    let config = benchmark.config().clone();
    let report = benchmark.run()?;
    timer.stop();

    write_report(out, &config, &report)?;
    out.flush()?;
    Ok(())
}
