//! CLI adapter: tasks behind `clap` subcommands.

use std::collections::HashMap;
use std::ffi::OsString;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Arg, Command};
use tracing::info;

use crate::context::{ContextBuilder, RequestContext};
use crate::handler::Task;
use crate::replicate::Replicate;

/// Boxed task entry point as stored by [`TaskRunner`].
pub type TaskFn = Box<dyn Fn(&Command, &[String]) -> Result<()> + Send + Sync>;

/// Adapt a task into a CLI entry point.
///
/// The task runs against a detached context named after the matched
/// command. Errors from `run` are logged and returned. Panics are not
/// contained.
pub fn use_task<H, R>(
    source: R,
    builder: ContextBuilder,
) -> impl Fn(&Command, &[String]) -> Result<()> + Send + Sync + Clone + 'static
where
    H: Task + 'static,
    R: Replicate<H>,
{
    let source = Arc::new(source);
    move |cmd: &Command, args: &[String]| {
        let name = cmd.get_name();
        let mut task = source.replicate();
        builder.attach(&mut task, RequestContext::detached(name));

        task.pre_use();
        let result = task.run(args);
        if let Err(err) = &result {
            task.log().error(format_args!("[task error] {name}: {err:#}"));
        }
        result
    }
}

/// A `clap` root command with one subcommand per registered task.
///
/// Every subcommand takes free-form trailing arguments, handed to the task
/// verbatim.
pub struct TaskRunner {
    root: Command,
    subcommands: Vec<Command>,
    tasks: HashMap<String, TaskFn>,
}

impl TaskRunner {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            root: Command::new(name)
                .subcommand_required(true)
                .arg_required_else_help(true),
            subcommands: Vec::new(),
            tasks: HashMap::new(),
        }
    }

    #[must_use]
    pub fn about(mut self, about: &'static str) -> Self {
        self.root = self.root.about(about);
        self
    }

    /// Register `task` under the subcommand `name`. A later registration
    /// under the same name replaces the earlier one.
    #[must_use]
    pub fn register<F>(mut self, name: &'static str, about: &'static str, task: F) -> Self
    where
        F: Fn(&Command, &[String]) -> Result<()> + Send + Sync + 'static,
    {
        let sub = Command::new(name).about(about).arg(
            Arg::new("args")
                .value_name("ARGS")
                .num_args(0..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true),
        );
        self.subcommands.retain(|s| s.get_name() != name);
        self.subcommands.push(sub);
        self.tasks.insert(name.to_string(), Box::new(task));
        self
    }

    /// The assembled root command, for help output and completions.
    #[must_use]
    pub fn command(&self) -> Command {
        self.root.clone().subcommands(self.subcommands.iter().cloned())
    }

    /// Names of the registered tasks.
    #[must_use]
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.keys().map(String::as_str).collect()
    }

    /// Parse `argv` (program name first) and run the matched task.
    ///
    /// Parse failures, `--help` and `--version` come back as
    /// [`clap::Error`] inside the `anyhow::Error`.
    pub fn run_from<I, T>(&self, argv: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let root = self.command();
        let matches = root.clone().try_get_matches_from(argv)?;
        let (name, sub_matches) = matches
            .subcommand()
            .ok_or_else(|| anyhow!("no task selected"))?;
        let task = self
            .tasks
            .get(name)
            .ok_or_else(|| anyhow!("task '{name}' is not registered"))?;
        let cmd = root
            .find_subcommand(name)
            .ok_or_else(|| anyhow!("task '{name}' has no command"))?;
        let args: Vec<String> = sub_matches
            .get_many::<String>("args")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        info!(task = %name, args = args.len(), "Running task");
        task(cmd, &args)
    }

    /// Parse the process arguments and run the matched task.
    pub fn run(&self) -> Result<()> {
        self.run_from(std::env::args_os())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::handler::{Contextual, HandlerBase};
    use crate::replicate::ByClone;
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<(String, Vec<String>)>>>;

    #[derive(Clone, Default)]
    struct Record {
        base: HandlerBase,
        seen: Seen,
    }

    impl Contextual for Record {
        fn base(&self) -> &HandlerBase {
            &self.base
        }
        fn base_mut(&mut self) -> &mut HandlerBase {
            &mut self.base
        }
    }

    impl Task for Record {
        fn run(&mut self, args: &[String]) -> Result<()> {
            let name = self.context().handler_name.clone();
            self.seen.lock().unwrap().push((name, args.to_vec()));
            Ok(())
        }
    }

    fn builder() -> ContextBuilder {
        ContextBuilder::new(AppConfig::new("tools", "10.0.0.2"))
    }

    #[test]
    fn test_runner_passes_trailing_args() {
        let seen = Seen::default();
        let task = use_task(
            ByClone(Record {
                seen: Arc::clone(&seen),
                ..Record::default()
            }),
            builder(),
        );
        let runner = TaskRunner::new("tools").register("import", "Import records", task);

        runner
            .run_from(["tools", "import", "--dry-run", "orders.csv"])
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[(
                "import".to_string(),
                vec!["--dry-run".to_string(), "orders.csv".to_string()]
            )]
        );
    }

    #[test]
    fn test_runner_without_args() {
        let seen = Seen::default();
        let task = use_task(
            ByClone(Record {
                seen: Arc::clone(&seen),
                ..Record::default()
            }),
            builder(),
        );
        let runner = TaskRunner::new("tools").register("purge", "Purge caches", task);
        runner.run_from(["tools", "purge"]).unwrap();
        assert!(seen.lock().unwrap()[0].1.is_empty());
    }

    #[test]
    fn test_runner_unknown_task_is_clap_error() {
        let runner = TaskRunner::new("tools").register("noop", "Nothing", |_: &Command, _: &[String]| Ok(()));
        let err = runner.run_from(["tools", "missing"]).unwrap_err();
        assert!(err.downcast_ref::<clap::Error>().is_some());
    }

    #[test]
    fn test_reregistering_replaces_task() {
        let runner = TaskRunner::new("tools")
            .register("sync", "Old", |_: &Command, _: &[String]| anyhow::bail!("old"))
            .register("sync", "New", |_: &Command, _: &[String]| Ok(()));
        assert_eq!(runner.task_names(), vec!["sync"]);
        assert_eq!(runner.command().get_subcommands().count(), 1);
        runner.run_from(["tools", "sync"]).unwrap();
    }
}
