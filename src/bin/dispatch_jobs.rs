use std::io::Write;

use clap;
use clap::{Parser, ValueEnum};
use log;
use simple_logger;

use rust_thread_dispatch::{Config, Dispatch};

const WORKER_THREAD_NAME: &str = "dispatch-jobs-worker";

#[derive(clap::Parser)]
#[command(version, about = "Runs a batch of jobs on a worker thread pool", long_about = None)]
struct Cli {
    /// Worker pool size. Set to 0 for auto-selection.
    #[arg(short, long, default_value_t = 0)]
    threads: usize,
    /// Number of jobs to submit
    #[arg(short, long, default_value_t = 10)]
    jobs: usize,
    /// Time each job sleeps before printing, in milliseconds
    #[arg(short, long, default_value_t = 3000)]
    sleep_ms: u64,
    /// Greeting printed by each job
    #[arg(short, long, default_value = "Hello!")]
    greeting: String,
    /// Message printed by each job
    #[arg(short, long, default_value = "I have a message for you from the people of Earth.")]
    message: String,
    /// Make every n-th job panic to exercise failure reporting. 0 disables it.
    #[arg(short, long, default_value_t = 0)]
    fail_every: usize,
    /// Set log level
    #[arg(short, long, default_value = "info")]
    log_level: LogLevel,
}

#[derive(Clone, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

fn job(index: usize, sleep: std::time::Duration, greeting: String, message: String, fail: bool) {
    std::thread::sleep(sleep);
    if fail {
        panic!("job {} failed on purpose", index);
    }

    // Jobs share stdout, keep each message in one piece.
    let mut stdout = std::io::stdout().lock();
    if let Err(err) = writeln!(stdout, "[job {}] {} {}", index, greeting, message) {
        log::warn!("Job {} cannot write to stdout: {}", index, err);
    }
}

// Job panics on worker threads reach the log through the pool's reporter,
// keep the default hook for every other thread.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let on_worker = std::thread::current()
            .name()
            .is_some_and(|name| name.starts_with(WORKER_THREAD_NAME));
        if !on_worker {
            default_hook(info);
        }
    }));
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = match cli.log_level {
        LogLevel::Debug => log::LevelFilter::Debug,
        LogLevel::Info => log::LevelFilter::Info,
        LogLevel::Warning => log::LevelFilter::Warn,
        LogLevel::Error => log::LevelFilter::Error,
    };
    simple_logger::SimpleLogger::new().with_level(log_level).init()?;
    install_panic_hook();

    let dispatch = match Dispatch::with_config(Config::new().threads(cli.threads).thread_name(WORKER_THREAD_NAME)) {
        Ok(dispatch) => dispatch,
        Err(err) => {
            log::error!("{}", err);
            return Err(Box::new(err));
        }
    };
    log::info!("Submitting {} jobs to {} workers", cli.jobs, dispatch.thread_count());

    let sleep = std::time::Duration::from_millis(cli.sleep_ms);
    for index in 0..cli.jobs {
        let fail = cli.fail_every > 0 && (index + 1) % cli.fail_every == 0;
        dispatch.submit_with(job, (index, sleep, cli.greeting.clone(), cli.message.clone(), fail))?;
    }

    dispatch.shutdown();
    log::info!("All {} jobs finished", cli.jobs);

    return Ok(());
}
