//! `brrtflow` demo binary.
//!
//! ```text
//! brrtflow echo hello world
//! brrtflow cron 5
//! ```
//!
//! Configuration comes from the YAML file named by `BRRTFLOW_CONFIG` when set,
//! otherwise from `BRRTFLOW_*` environment variables.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use brrtflow::adapter::{use_cron, use_task, CronScheduler, Overlap, TaskRunner};
use brrtflow::logging::init_logging;
use brrtflow::replicate::{ByClone, Factory};
use brrtflow::{AppConfig, ContextBuilder, Contextual, HandlerBase, Job, Task};

const DEFAULT_CRON_SECONDS: u64 = 10;

/// Prints its arguments back.
#[derive(Clone, Default)]
struct Echo {
    base: HandlerBase,
}

impl Contextual for Echo {
    fn base(&self) -> &HandlerBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut HandlerBase {
        &mut self.base
    }
}

impl Task for Echo {
    fn run(&mut self, args: &[String]) -> Result<()> {
        let line = args.join(" ");
        self.log().info(format_args!("echo: {line}"));
        println!("{line}");
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Heartbeat {
    base: HandlerBase,
}

impl Contextual for Heartbeat {
    fn base(&self) -> &HandlerBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut HandlerBase {
        &mut self.base
    }
}

impl Job for Heartbeat {
    fn run(&mut self) -> Result<()> {
        self.log().info(format_args!("heartbeat from {}", self.log_ctx().local_addr));
        Ok(())
    }
}

/// Runs [`Heartbeat`] every second for a bounded time.
struct CronDemo {
    base: HandlerBase,
    builder: ContextBuilder,
}

impl Contextual for CronDemo {
    fn base(&self) -> &HandlerBase {
        &self.base
    }
    fn base_mut(&mut self) -> &mut HandlerBase {
        &mut self.base
    }
}

impl Task for CronDemo {
    fn run(&mut self, args: &[String]) -> Result<()> {
        let seconds = match args.first() {
            Some(s) => s
                .parse::<u64>()
                .with_context(|| format!("invalid duration '{s}'"))?,
            None => DEFAULT_CRON_SECONDS,
        };

        let mut scheduler = CronScheduler::new();
        scheduler.add_with_overlap(
            "heartbeat",
            "* * * * * *",
            Overlap::Skip,
            use_cron("heartbeat", ByClone(Heartbeat::default()), self.builder.clone()),
        )?;

        self.log().info(format_args!("running scheduler for {seconds}s"));
        let handle = scheduler.start()?;
        thread::sleep(Duration::from_secs(seconds));
        handle.shutdown();
        Ok(())
    }
}

fn main() -> Result<()> {
    let config = match std::env::var_os("BRRTFLOW_CONFIG") {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::from_env(),
    };
    let _guard = init_logging(&config.log)?;
    let builder = ContextBuilder::new(config);

    let cron_builder = builder.clone();
    let runner = TaskRunner::new("brrtflow")
        .about("Run handler tasks")
        .register(
            "echo",
            "Print the arguments back",
            use_task(ByClone(Echo::default()), builder.clone()),
        )
        .register(
            "cron",
            "Run a heartbeat job every second for N seconds (default 10)",
            use_task::<CronDemo, _>(
                Factory(move || CronDemo {
                    base: HandlerBase::default(),
                    builder: cron_builder.clone(),
                }),
                builder,
            ),
        );

    if let Err(err) = runner.run() {
        if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
            clap_err.exit();
        }
        return Err(err);
    }
    Ok(())
}
