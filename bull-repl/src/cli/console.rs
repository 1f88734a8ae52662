//! Command execution against the active queue.

use crate::cli::command::{parse_json_arg, CleanRequest, ListArgs, ReplCommand};
use crate::config::ConnectionSettings;
use crate::confirm::{confirm, Prompter};
use crate::error::ConsoleResult;
use crate::filter;
use crate::queue::{
    Job, JobCounts, JobLogs, JobState, PauseScope, QueueBackend, QueueConnector, QueueTarget,
};
use crate::resolver::{resolve, resolve_one};
use crate::session::Session;
use crate::snapshot::{project, JobSnapshot};
use futures_util::future::try_join_all;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// Job counts plus the paused list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Counts per state.
    #[serde(flatten)]
    pub counts: JobCounts,
    /// Jobs waiting in the paused list.
    pub paused: u64,
    /// Whether this console paused the queue locally.
    pub paused_locally: bool,
}

/// Result of a successful command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Session connected.
    Connected(QueueTarget),
    /// Job counts.
    Stats(QueueStats),
    /// Jobs to display and ids that matched nothing.
    Jobs {
        /// Matching jobs.
        jobs: Vec<JobSnapshot>,
        /// Ids with no job.
        not_found: Vec<String>,
    },
    /// A mutation ran.
    Applied {
        /// What was done; `None` when nothing was found to act on.
        message: Option<String>,
        /// Ids with no job.
        not_found: Vec<String>,
    },
    /// Job log lines.
    Logs(JobLogs),
    /// The operator asked to leave.
    Closed,
}

impl Outcome {
    fn applied(message: impl Into<String>) -> Self {
        Self::Applied {
            message: Some(message.into()),
            not_found: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum BatchAction {
    Remove,
    Retry,
    Promote,
}

impl BatchAction {
    const fn question(self) -> &'static str {
        match self {
            Self::Remove => "Remove",
            Self::Retry => "Retry",
            Self::Promote => "Promote",
        }
    }

    const fn done(self) -> &'static str {
        match self {
            Self::Remove => "removed",
            Self::Retry => "retried",
            Self::Promote => "promoted",
        }
    }
}

/// Interactive console state: the session plus its collaborators.
pub struct Console {
    session: Session,
    connector: Box<dyn QueueConnector>,
    prompter: Box<dyn Prompter>,
    defaults: ConnectionSettings,
    pause_scope: PauseScope,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("session", &self.session)
            .field("defaults", &self.defaults)
            .field("pause_scope", &self.pause_scope)
            .finish_non_exhaustive()
    }
}

impl Console {
    /// Create a console without a connection.
    #[must_use]
    pub fn new(
        connector: Box<dyn QueueConnector>,
        prompter: Box<dyn Prompter>,
        defaults: ConnectionSettings,
        pause_scope: PauseScope,
    ) -> Self {
        Self {
            session: Session::new(),
            connector,
            prompter,
            defaults,
            pause_scope,
        }
    }

    /// Prompt showing the connected queue.
    #[must_use]
    pub fn prompt(&self) -> String {
        self.session.active().map_or_else(
            || "BULL-REPL> ".to_string(),
            |active| format!("BULL-REPL | {}.{}> ", active.prefix(), active.name()),
        )
    }

    /// Close the session.
    pub async fn shutdown(&mut self) {
        self.session.close().await;
    }

    /// Run one command.
    ///
    /// Input is validated and, for mutating commands, confirmed before the
    /// queue is touched.
    ///
    /// # Errors
    ///
    /// Returns the [`ConsoleError`](crate::error::ConsoleError) the command
    /// ended with.
    pub async fn execute(&mut self, command: ReplCommand) -> ConsoleResult<Outcome> {
        if command.is_mutating() {
            info!(?command, "Executing mutating command");
        } else {
            debug!(?command, "Executing command");
        }
        match command {
            ReplCommand::Connect {
                queue,
                prefix,
                redis,
            } => self.connect(queue, prefix, redis).await,
            ReplCommand::Stats => self.stats().await,
            ReplCommand::Active(args) => self.list(JobState::Active, &args).await,
            ReplCommand::Waiting(args) => self.list(JobState::Waiting, &args).await,
            ReplCommand::Completed(args) => self.list(JobState::Completed, &args).await,
            ReplCommand::Failed(args) => self.list(JobState::Failed, &args).await,
            ReplCommand::Delayed(args) => self.list(JobState::Delayed, &args).await,
            ReplCommand::Pause => self.pause().await,
            ReplCommand::Resume => self.resume().await,
            ReplCommand::Get { ids } => self.get(&ids).await,
            ReplCommand::Add { data, name } => self.add(&data, &name).await,
            ReplCommand::Remove { ids } => self.batch(&ids, BatchAction::Remove).await,
            ReplCommand::Retry { ids } => self.batch(&ids, BatchAction::Retry).await,
            ReplCommand::Promote { ids } => self.batch(&ids, BatchAction::Promote).await,
            ReplCommand::RetryFailed => self.retry_failed().await,
            ReplCommand::Fail { id, reason } => self.fail(&id, &reason.join(" ")).await,
            ReplCommand::Complete { id, data } => self.complete(&id, &data).await,
            ReplCommand::Clean {
                period,
                status,
                limit,
            } => self.clean(&period, &status, limit).await,
            ReplCommand::Logs { id, start, end } => self.logs(&id, start, end).await,
            ReplCommand::Log { id, text } => self.log(&id, &text.join(" ")).await,
            ReplCommand::Exit => Ok(Outcome::Closed),
        }
    }

    fn queue(&self) -> ConsoleResult<&dyn QueueBackend> {
        self.session.queue()
    }

    fn confirm(&self, question: &str) -> ConsoleResult<()> {
        confirm(self.prompter.as_ref(), question)
    }

    async fn connect(
        &mut self,
        queue: String,
        prefix: Option<String>,
        redis: Option<String>,
    ) -> ConsoleResult<Outcome> {
        let target = QueueTarget::from_args(
            queue,
            redis.as_deref().unwrap_or(&self.defaults.redis_url),
            prefix.unwrap_or_else(|| self.defaults.prefix.clone()),
        );
        let active = self
            .session
            .connect(self.connector.as_ref(), target)
            .await?;
        Ok(Outcome::Connected(active.target().clone()))
    }

    async fn stats(&self) -> ConsoleResult<Outcome> {
        let queue = self.queue()?;
        let (counts, paused) = tokio::try_join!(queue.job_counts(), queue.paused_count())?;
        Ok(Outcome::Stats(QueueStats {
            counts,
            paused,
            paused_locally: queue.is_paused_locally(),
        }))
    }

    async fn list(&self, state: JobState, args: &ListArgs) -> ConsoleResult<Outcome> {
        let queue = self.queue()?;
        let job_filter = filter::compile(args.filter.as_deref(), args.time_ago.as_deref())?;
        let jobs = queue.jobs_in_state(state).await?;
        let total = jobs.len();
        let jobs = job_filter.apply(project(&jobs));
        debug!(%state, total, shown = jobs.len(), "Listed jobs");
        Ok(Outcome::Jobs {
            jobs,
            not_found: Vec::new(),
        })
    }

    async fn get(&self, ids: &[String]) -> ConsoleResult<Outcome> {
        let resolution = resolve(&self.session, ids).await?;
        Ok(Outcome::Jobs {
            jobs: project(&resolution.found),
            not_found: resolution.not_found,
        })
    }

    async fn pause(&self) -> ConsoleResult<Outcome> {
        let queue = self.queue()?;
        self.confirm("Pause queue")?;
        queue.pause(self.pause_scope).await?;
        Ok(Outcome::applied(match self.pause_scope {
            PauseScope::Global => "Queue paused",
            PauseScope::Local => "Queue paused locally",
        }))
    }

    async fn resume(&self) -> ConsoleResult<Outcome> {
        let queue = self.queue()?;
        self.confirm("Resume queue")?;
        queue.resume(self.pause_scope).await?;
        Ok(Outcome::applied(match self.pause_scope {
            PauseScope::Global => "Queue resumed from pause",
            PauseScope::Local => "Queue resumed locally",
        }))
    }

    async fn add(&self, data: &str, name: &str) -> ConsoleResult<Outcome> {
        let queue = self.queue()?;
        let data = parse_json_arg(data)?;
        self.confirm("Add")?;
        let job = queue.add(name, data).await?;
        Ok(Outcome::applied(format!(
            "Job with name '{name}', id '{}' added",
            job.id
        )))
    }

    async fn batch(&self, ids: &[String], action: BatchAction) -> ConsoleResult<Outcome> {
        let resolution = resolve(&self.session, ids).await?;
        if resolution.is_empty() {
            return Ok(Outcome::Applied {
                message: None,
                not_found: resolution.not_found,
            });
        }

        // Repeated ids act once.
        let mut seen = HashSet::new();
        let jobs: Vec<&Job> = resolution
            .found
            .iter()
            .filter(|job| seen.insert(job.id.as_str()))
            .collect();

        self.confirm(action.question())?;

        let queue = self.queue()?;
        try_join_all(jobs.iter().map(|job| match action {
            BatchAction::Remove => queue.remove(job),
            BatchAction::Retry => queue.retry(job),
            BatchAction::Promote => queue.promote(job),
        }))
        .await?;

        let done: Vec<_> = jobs.iter().map(|job| job.id.to_string()).collect();
        info!(ids = ?done, action = action.done(), "Batch applied");
        Ok(Outcome::Applied {
            message: Some(format!("Jobs \"{}\" {}", done.join(","), action.done())),
            not_found: resolution.not_found,
        })
    }

    async fn retry_failed(&self) -> ConsoleResult<Outcome> {
        let queue = self.queue()?;
        self.confirm("Retry failed jobs")?;
        let failed = queue.jobs_in_state(JobState::Failed).await?;
        try_join_all(failed.iter().map(|job| queue.retry(job))).await?;
        Ok(Outcome::applied(format!(
            "All failed jobs retried ({})",
            failed.len()
        )))
    }

    async fn fail(&self, id: &str, reason: &str) -> ConsoleResult<Outcome> {
        let job = resolve_one(&self.session, id).await?;
        self.confirm("Fail")?;
        self.queue()?.move_to_failed(&job, reason, true).await?;
        Ok(Outcome::applied(format!("Job \"{id}\" failed")))
    }

    async fn complete(&self, id: &str, data: &str) -> ConsoleResult<Outcome> {
        let value = parse_json_arg(data)?;
        let job = resolve_one(&self.session, id).await?;
        self.confirm("Complete")?;
        self.queue()?.move_to_completed(&job, value, true).await?;
        Ok(Outcome::applied(format!("Job \"{id}\" completed")))
    }

    async fn clean(
        &self,
        period: &str,
        status: &str,
        limit: Option<u64>,
    ) -> ConsoleResult<Outcome> {
        let queue = self.queue()?;
        let request = CleanRequest::parse(period, status, limit)?;
        self.confirm("Clean")?;
        let removed = queue
            .clean(request.grace, request.status, request.limit)
            .await?;
        Ok(Outcome::applied(format!(
            "Jobs cleaned: {} {}",
            removed.len(),
            request.status
        )))
    }

    async fn logs(&self, id: &str, start: i64, end: i64) -> ConsoleResult<Outcome> {
        let logs = self.queue()?.job_logs(id, start, end).await?;
        Ok(Outcome::Logs(logs))
    }

    async fn log(&self, id: &str, text: &str) -> ConsoleResult<Outcome> {
        let job = resolve_one(&self.session, id).await?;
        self.confirm("Add log")?;
        let count = self.queue()?.log(&job, text).await?;
        debug!(job_id = %id, count, "Log line added");
        Ok(Outcome::applied("Log added to job"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::MockPrompter;
    use crate::error::ConsoleError;
    use crate::queue::{CleanStatus, Job, JobId, MockQueueBackend, MockQueueConnector};
    use serde_json::json;
    use std::time::Duration;

    const HOUR_MS: i64 = 3_600_000;

    fn base_backend() -> MockQueueBackend {
        let mut backend = MockQueueBackend::new();
        backend.expect_is_ready().returning(|| Ok(()));
        backend.expect_close().returning(|| Ok(()));
        backend
    }

    fn answering(answer: &'static str) -> MockPrompter {
        let mut prompter = MockPrompter::new();
        prompter
            .expect_ask()
            .times(1)
            .returning(move |_| Ok(answer.to_string()));
        prompter
    }

    fn silent() -> MockPrompter {
        let mut prompter = MockPrompter::new();
        prompter.expect_ask().never();
        prompter
    }

    fn console(prompter: MockPrompter, backend: MockQueueBackend) -> Console {
        let mut connector = MockQueueConnector::new();
        connector
            .expect_open()
            .return_once(move |_| Ok(Box::new(backend) as Box<dyn QueueBackend>));
        Console::new(
            Box::new(connector),
            Box::new(prompter),
            ConnectionSettings::default(),
            PauseScope::Global,
        )
    }

    async fn connected(prompter: MockPrompter, backend: MockQueueBackend) -> Console {
        let mut console = console(prompter, backend);
        console
            .execute(ReplCommand::Connect {
                queue: "jobs".to_string(),
                prefix: None,
                redis: None,
            })
            .await
            .unwrap();
        console
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    fn job(id: &str, name: &str, timestamp: i64) -> Job {
        Job::new(JobId::new(id), name, json!({}), timestamp)
    }

    #[tokio::test]
    async fn test_commands_need_connection() {
        let mut console = console(silent(), base_backend());
        assert_eq!(console.prompt(), "BULL-REPL> ");
        for command in [
            ReplCommand::Stats,
            ReplCommand::Pause,
            ReplCommand::Get { ids: ids(&["1"]) },
            ReplCommand::Remove { ids: ids(&["1"]) },
        ] {
            let result = console.execute(command).await;
            assert!(matches!(result, Err(ConsoleError::NotConnected)));
        }
    }

    #[tokio::test]
    async fn test_connect_uses_defaults() {
        let mut console = console(silent(), base_backend());
        let outcome = console
            .execute(ReplCommand::Connect {
                queue: "jobs".to_string(),
                prefix: None,
                redis: None,
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Connected(QueueTarget {
                name: "jobs".to_string(),
                url: "redis://localhost:6379".to_string(),
                prefix: "bull".to_string(),
            })
        );
        assert_eq!(console.prompt(), "BULL-REPL | bull.jobs> ");
    }

    #[tokio::test]
    async fn test_stats_includes_paused() {
        let mut backend = base_backend();
        backend.expect_job_counts().returning(|| {
            Ok(JobCounts {
                waiting: 1,
                active: 2,
                completed: 3,
                failed: 4,
                delayed: 5,
            })
        });
        backend.expect_paused_count().returning(|| Ok(6));
        backend.expect_is_paused_locally().returning(|| true);

        let mut console = connected(silent(), backend).await;
        let outcome = console.execute(ReplCommand::Stats).await.unwrap();

        let Outcome::Stats(stats) = outcome else {
            panic!("expected stats, got {outcome:?}");
        };
        assert_eq!(stats.counts.failed, 4);
        assert_eq!(stats.paused, 6);
        assert!(stats.paused_locally);
        let value = serde_json::to_value(stats).unwrap();
        assert_eq!(value["waiting"], 1);
        assert_eq!(value["paused"], 6);
    }

    #[tokio::test]
    async fn test_add_confirmed() {
        let mut backend = base_backend();
        backend
            .expect_add()
            .withf(|name, data| name == "__default__" && *data == json!({"x": 1}))
            .times(1)
            .returning(|name, data| Ok(Job::new(JobId::new("12"), name, data, 0)));

        let mut console = connected(answering("y"), backend).await;
        let outcome = console
            .execute(ReplCommand::Add {
                data: r#"{"x":1}"#.to_string(),
                name: "__default__".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::applied("Job with name '__default__', id '12' added")
        );
    }

    #[tokio::test]
    async fn test_add_declined_creates_nothing() {
        let mut backend = base_backend();
        backend.expect_add().never();

        let mut console = connected(answering("n"), backend).await;
        let result = console
            .execute(ReplCommand::Add {
                data: r#"{"x":1}"#.to_string(),
                name: "__default__".to_string(),
            })
            .await;

        assert!(matches!(result, Err(ConsoleError::Cancelled)));
    }

    #[tokio::test]
    async fn test_add_rejects_bad_json_before_prompt() {
        let mut backend = base_backend();
        backend.expect_add().never();

        let mut console = connected(silent(), backend).await;
        let result = console
            .execute(ReplCommand::Add {
                data: "{x:1}".to_string(),
                name: "__default__".to_string(),
            })
            .await;

        assert!(matches!(result, Err(ConsoleError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_get_reports_missing_ids() {
        let mut backend = base_backend();
        backend
            .expect_get_job()
            .returning(|id| Ok((id == "5").then(|| job("5", "email", 0))));

        let mut console = connected(silent(), backend).await;
        let outcome = console
            .execute(ReplCommand::Get { ids: ids(&["5", "99"]) })
            .await
            .unwrap();

        let Outcome::Jobs { jobs, not_found } = outcome else {
            panic!("expected jobs, got {outcome:?}");
        };
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "5");
        assert_eq!(not_found, vec!["99"]);
    }

    #[tokio::test]
    async fn test_get_nothing_found() {
        let mut backend = base_backend();
        backend.expect_get_job().returning(|_| Ok(None));

        let mut console = connected(silent(), backend).await;
        let outcome = console
            .execute(ReplCommand::Get { ids: ids(&["1", "2"]) })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Jobs {
                jobs: Vec::new(),
                not_found: ids(&["1", "2"]),
            }
        );
    }

    #[tokio::test]
    async fn test_batch_without_matches_skips_prompt() {
        let mut backend = base_backend();
        backend.expect_get_job().returning(|_| Ok(None));
        backend.expect_remove().never();

        let mut console = connected(silent(), backend).await;
        let outcome = console
            .execute(ReplCommand::Remove { ids: ids(&["8", "9"]) })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Applied {
                message: None,
                not_found: ids(&["8", "9"]),
            }
        );
    }

    #[tokio::test]
    async fn test_batch_confirms_once() {
        let mut backend = base_backend();
        backend
            .expect_get_job()
            .returning(|id| Ok((id != "3").then(|| job(id, "x", 0))));
        backend.expect_retry().times(2).returning(|_| Ok(()));

        let mut console = connected(answering("y"), backend).await;
        let outcome = console
            .execute(ReplCommand::Retry { ids: ids(&["1", "2", "3"]) })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Applied {
                message: Some("Jobs \"1,2\" retried".to_string()),
                not_found: ids(&["3"]),
            }
        );
    }

    #[tokio::test]
    async fn test_batch_declined_mutates_nothing() {
        let mut backend = base_backend();
        backend
            .expect_get_job()
            .returning(|id| Ok(Some(job(id, "x", 0))));
        backend.expect_promote().never();

        let mut console = connected(answering("no"), backend).await;
        let result = console
            .execute(ReplCommand::Promote { ids: ids(&["1"]) })
            .await;

        assert!(matches!(result, Err(ConsoleError::Cancelled)));
    }

    #[tokio::test]
    async fn test_clean_rejects_bad_status_before_prompt() {
        let mut backend = base_backend();
        backend.expect_clean().never();

        let mut console = connected(silent(), backend).await;
        let result = console
            .execute(ReplCommand::Clean {
                period: "1d".to_string(),
                status: "bogus".to_string(),
                limit: None,
            })
            .await;

        assert!(matches!(result, Err(ConsoleError::InvalidStatus(s)) if s == "bogus"));
    }

    #[tokio::test]
    async fn test_clean_confirmed() {
        let mut backend = base_backend();
        backend
            .expect_clean()
            .withf(|grace, status, limit| {
                *grace == Duration::from_secs(86_400)
                    && *status == CleanStatus::Completed
                    && limit.is_none()
            })
            .times(1)
            .returning(|_, _, _| Ok(vec!["1".to_string(), "2".to_string()]));

        let mut console = connected(answering("y"), backend).await;
        let outcome = console
            .execute(ReplCommand::Clean {
                period: "1d".to_string(),
                status: "completed".to_string(),
                limit: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::applied("Jobs cleaned: 2 completed"));
    }

    #[tokio::test]
    async fn test_active_filtered_by_name_and_age() {
        let now = chrono::Utc::now().timestamp_millis();
        let mut backend = base_backend();
        backend
            .expect_jobs_in_state()
            .withf(|state| *state == JobState::Active)
            .returning(move |_| {
                Ok(vec![
                    job("1", "email", now - HOUR_MS),
                    job("2", "email", now - 3 * HOUR_MS),
                    job("3", "sms", now - HOUR_MS),
                    job("4", "email", now - 10_000),
                ])
            });

        let mut console = connected(silent(), backend).await;
        let outcome = console
            .execute(ReplCommand::Active(ListArgs {
                filter: Some(r#"{"name":"email"}"#.to_string()),
                time_ago: Some("2h".to_string()),
            }))
            .await
            .unwrap();

        let Outcome::Jobs { jobs, .. } = outcome else {
            panic!("expected jobs, got {outcome:?}");
        };
        let shown: Vec<_> = jobs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(shown, vec!["1", "4"]);
    }

    #[tokio::test]
    async fn test_invalid_filter_skips_fetch() {
        let mut backend = base_backend();
        backend.expect_jobs_in_state().never();

        let mut console = connected(silent(), backend).await;
        let result = console
            .execute(ReplCommand::Failed(ListArgs {
                filter: Some("not json".to_string()),
                time_ago: None,
            }))
            .await;

        assert!(matches!(result, Err(ConsoleError::InvalidFilter(_))));
    }

    #[tokio::test]
    async fn test_pause_uses_configured_scope() {
        let mut backend = base_backend();
        backend
            .expect_pause()
            .withf(|scope| *scope == PauseScope::Global)
            .times(1)
            .returning(|_| Ok(()));

        let mut console = connected(answering("y"), backend).await;
        let outcome = console.execute(ReplCommand::Pause).await.unwrap();
        assert_eq!(outcome, Outcome::applied("Queue paused"));
    }

    #[tokio::test]
    async fn test_fail_missing_job() {
        let mut backend = base_backend();
        backend.expect_get_job().returning(|_| Ok(None));
        backend.expect_move_to_failed().never();

        let mut console = connected(silent(), backend).await;
        let result = console
            .execute(ReplCommand::Fail {
                id: "4".to_string(),
                reason: vec!["boom".to_string()],
            })
            .await;

        assert!(matches!(result, Err(ConsoleError::JobNotFound(id)) if id == "4"));
    }

    #[tokio::test]
    async fn test_complete_ignores_lock() {
        let mut backend = base_backend();
        backend
            .expect_get_job()
            .returning(|id| Ok(Some(job(id, "x", 0))));
        backend
            .expect_move_to_completed()
            .withf(|job, value, ignore_lock| {
                job.id.as_str() == "4" && *value == json!({"ok": true}) && *ignore_lock
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut console = connected(answering("y"), backend).await;
        let outcome = console
            .execute(ReplCommand::Complete {
                id: "4".to_string(),
                data: r#"{"ok":true}"#.to_string(),
            })
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::applied("Job \"4\" completed"));
    }

    #[tokio::test]
    async fn test_log_appends_joined_text() {
        let mut backend = base_backend();
        backend
            .expect_get_job()
            .returning(|id| Ok(Some(job(id, "x", 0))));
        backend
            .expect_log()
            .withf(|_, line| line == "hello there")
            .times(1)
            .returning(|_, _| Ok(1));

        let mut console = connected(answering("y"), backend).await;
        let outcome = console
            .execute(ReplCommand::Log {
                id: "2".to_string(),
                text: vec!["hello".to_string(), "there".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::applied("Log added to job"));
    }

    #[tokio::test]
    async fn test_logs_passes_range() {
        let mut backend = base_backend();
        backend
            .expect_job_logs()
            .withf(|id, start, end| id == "2" && *start == 0 && *end == -1)
            .returning(|_, _, _| {
                Ok(JobLogs {
                    logs: vec!["a".to_string()],
                    count: 1,
                })
            });

        let mut console = connected(silent(), backend).await;
        let outcome = console
            .execute(ReplCommand::Logs {
                id: "2".to_string(),
                start: 0,
                end: -1,
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Logs(JobLogs {
                logs: vec!["a".to_string()],
                count: 1,
            })
        );
    }

    #[tokio::test]
    async fn test_retry_failed_retries_every_job() {
        let mut backend = base_backend();
        backend
            .expect_jobs_in_state()
            .withf(|state| *state == JobState::Failed)
            .returning(|_| Ok(vec![job("1", "x", 0), job("2", "x", 0)]));
        backend.expect_retry().times(2).returning(|_| Ok(()));

        let mut console = connected(answering("y"), backend).await;
        let outcome = console.execute(ReplCommand::RetryFailed).await.unwrap();
        assert_eq!(outcome, Outcome::applied("All failed jobs retried (2)"));
    }

    #[tokio::test]
    async fn test_exit() {
        let mut console = console(silent(), base_backend());
        assert_eq!(console.execute(ReplCommand::Exit).await.unwrap(), Outcome::Closed);
    }

    #[tokio::test]
    async fn test_batch_acts_once_per_repeated_id() {
        let mut backend = base_backend();
        backend
            .expect_get_job()
            .returning(|id| Ok(Some(job(id, "x", 0))));
        backend
            .expect_retry()
            .withf(|job| job.id.as_str() == "5")
            .times(1)
            .returning(|_| Ok(()));

        let mut console = connected(answering("y"), backend).await;
        let outcome = console
            .execute(ReplCommand::Retry { ids: ids(&["5", "5"]) })
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::applied("Jobs \"5\" retried"));
    }

    #[tokio::test]
    async fn test_declined_pause_and_resume_leave_queue_running() {
        let mut backend = base_backend();
        backend.expect_pause().never();
        backend.expect_resume().never();

        let mut prompter = MockPrompter::new();
        prompter
            .expect_ask()
            .times(2)
            .returning(|_| Ok("n".to_string()));

        let mut console = connected(prompter, backend).await;
        for command in [ReplCommand::Pause, ReplCommand::Resume] {
            let result = console.execute(command).await;
            assert!(matches!(result, Err(ConsoleError::Cancelled)));
        }
    }

    #[tokio::test]
    async fn test_declined_retry_failed_fetches_nothing() {
        let mut backend = base_backend();
        backend.expect_jobs_in_state().never();
        backend.expect_retry().never();

        let mut console = connected(answering(""), backend).await;
        let result = console.execute(ReplCommand::RetryFailed).await;
        assert!(matches!(result, Err(ConsoleError::Cancelled)));
    }

    #[tokio::test]
    async fn test_declined_fail_keeps_job() {
        let mut backend = base_backend();
        backend
            .expect_get_job()
            .returning(|id| Ok(Some(job(id, "x", 0))));
        backend.expect_move_to_failed().never();

        let mut console = connected(answering("Y"), backend).await;
        let result = console
            .execute(ReplCommand::Fail {
                id: "4".to_string(),
                reason: vec!["boom".to_string()],
            })
            .await;
        assert!(matches!(result, Err(ConsoleError::Cancelled)));
    }

    #[tokio::test]
    async fn test_declined_complete_keeps_job() {
        let mut backend = base_backend();
        backend
            .expect_get_job()
            .returning(|id| Ok(Some(job(id, "x", 0))));
        backend.expect_move_to_completed().never();

        let mut console = connected(answering("yes"), backend).await;
        let result = console
            .execute(ReplCommand::Complete {
                id: "4".to_string(),
                data: "{}".to_string(),
            })
            .await;
        assert!(matches!(result, Err(ConsoleError::Cancelled)));
    }

    #[tokio::test]
    async fn test_declined_clean_removes_nothing() {
        let mut backend = base_backend();
        backend.expect_clean().never();

        let mut console = connected(answering("n"), backend).await;
        let result = console
            .execute(ReplCommand::Clean {
                period: "1d".to_string(),
                status: "failed".to_string(),
                limit: None,
            })
            .await;
        assert!(matches!(result, Err(ConsoleError::Cancelled)));
    }

    #[tokio::test]
    async fn test_declined_log_appends_nothing() {
        let mut backend = base_backend();
        backend
            .expect_get_job()
            .returning(|id| Ok(Some(job(id, "x", 0))));
        backend.expect_log().never();

        let mut console = connected(answering("n"), backend).await;
        let result = console
            .execute(ReplCommand::Log {
                id: "2".to_string(),
                text: vec!["hello".to_string()],
            })
            .await;
        assert!(matches!(result, Err(ConsoleError::Cancelled)));
    }

    #[tokio::test]
    async fn test_complete_rejects_bad_json_before_lookup() {
        let mut backend = base_backend();
        backend.expect_get_job().never();
        backend.expect_move_to_completed().never();

        let mut console = connected(silent(), backend).await;
        let result = console
            .execute(ReplCommand::Complete {
                id: "4".to_string(),
                data: "{ok".to_string(),
            })
            .await;
        assert!(matches!(result, Err(ConsoleError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_complete_and_log_missing_job() {
        let mut backend = base_backend();
        backend.expect_get_job().returning(|_| Ok(None));
        backend.expect_move_to_completed().never();
        backend.expect_log().never();

        let mut console = connected(silent(), backend).await;
        let complete = console
            .execute(ReplCommand::Complete {
                id: "7".to_string(),
                data: "{}".to_string(),
            })
            .await;
        assert!(matches!(complete, Err(ConsoleError::JobNotFound(id)) if id == "7"));

        let log = console
            .execute(ReplCommand::Log {
                id: "8".to_string(),
                text: vec!["hi".to_string()],
            })
            .await;
        assert!(matches!(log, Err(ConsoleError::JobNotFound(id)) if id == "8"));
    }

    #[tokio::test]
    async fn test_clean_zero_limit_cleans_everything() {
        let mut backend = base_backend();
        backend
            .expect_clean()
            .withf(|_, status, limit| *status == CleanStatus::Failed && limit.is_none())
            .times(1)
            .returning(|_, _, _| Ok(vec!["1".to_string()]));

        let mut console = connected(answering("y"), backend).await;
        let outcome = console
            .execute(ReplCommand::Clean {
                period: "1h".to_string(),
                status: "failed".to_string(),
                limit: Some(0),
            })
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::applied("Jobs cleaned: 1 failed"));
    }
}
