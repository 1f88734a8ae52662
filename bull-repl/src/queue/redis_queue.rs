//! Bull queue backend on top of Redis.
//!
//! Uses the Bull v3 key layout under `{prefix}:{queue}`:
//!
//! - `wait`, `active`, `paused` lists of job ids
//! - `completed`, `failed`, `delayed`, `priority` sorted sets of job ids
//! - `id` counter, `meta-paused` flag
//! - `{id}` job hash, `{id}:logs` list, `{id}:lock` worker lock
//!
//! Every mutation that reads state before writing runs as a Lua script, so
//! the check and the writes happen in one step on the server. A job is never
//! pushed twice by concurrent moves, and a worker lock taken meanwhile is
//! always seen.

use super::{
    CleanStatus, Job, JobCounts, JobId, JobLogs, JobState, PauseScope, QueueBackend,
    QueueConnector, QueueError, QueueResult, QueueTarget,
};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use once_cell::sync::Lazy;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Store a new job and push it to `wait`, or `paused` while the queue is
/// globally paused.
///
/// KEYS: job, wait, paused, meta-paused.
/// ARGV: id, name, data, opts, timestamp, waiting channel.
static ADD_JOB: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
redis.call("HSET", KEYS[1], "name", ARGV[2], "data", ARGV[3], "opts", ARGV[4],
  "timestamp", ARGV[5], "delay", 0, "priority", 0)
local target = KEYS[2]
if redis.call("EXISTS", KEYS[4]) == 1 then
  target = KEYS[3]
end
redis.call("LPUSH", target, ARGV[1])
redis.call("PUBLISH", ARGV[6], ARGV[1])
return 1
"#,
    )
});

/// Move every job from one list to the other and set or clear `meta-paused`.
///
/// KEYS: source list, destination list, meta-paused.
/// ARGV: event (`paused` or `resumed`), event channel.
static PAUSE: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
if redis.call("EXISTS", KEYS[1]) == 1 then
  redis.call("RENAME", KEYS[1], KEYS[2])
end
if ARGV[1] == "paused" then
  redis.call("SET", KEYS[3], 1)
else
  redis.call("DEL", KEYS[3])
end
redis.call("PUBLISH", ARGV[2], ARGV[1])
return 1
"#,
    )
});

/// Move a job from a sorted set back to `wait` (or `paused`).
///
/// The push only happens when the job was actually removed from the source
/// set. Returns 1 when moved, 0 when the job was not in the set, -1 when the
/// job is locked.
///
/// KEYS: source set, job, lock, wait, paused, meta-paused.
/// ARGV: id, waiting channel, `retry` or `promote`.
static REQUEUE_JOB: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
if redis.call("EXISTS", KEYS[3]) == 1 then
  return -1
end
if redis.call("ZREM", KEYS[1], ARGV[1]) == 0 then
  return 0
end
if ARGV[3] == "retry" then
  redis.call("HDEL", KEYS[2], "finishedOn", "processedOn", "failedReason")
else
  redis.call("HSET", KEYS[2], "delay", 0)
end
local target = KEYS[4]
if redis.call("EXISTS", KEYS[6]) == 1 then
  target = KEYS[5]
end
redis.call("LPUSH", target, ARGV[1])
redis.call("PUBLISH", ARGV[2], ARGV[1])
return 1
"#,
    )
});

/// Delete a job from every state and its hash and logs.
///
/// Returns 1 when removed, 0 when the job does not exist, -1 when locked.
///
/// KEYS: wait, active, paused, completed, failed, delayed, priority, job,
/// logs, lock.
/// ARGV: id.
static REMOVE_JOB: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
if redis.call("EXISTS", KEYS[10]) == 1 then
  return -1
end
if redis.call("EXISTS", KEYS[8]) == 0 then
  return 0
end
for i = 1, 3 do
  redis.call("LREM", KEYS[i], 0, ARGV[1])
end
for i = 4, 7 do
  redis.call("ZREM", KEYS[i], ARGV[1])
end
redis.call("DEL", KEYS[8], KEYS[9])
return 1
"#,
    )
});

/// Move a job into `completed` or `failed` and record the result fields.
///
/// Returns 1 when moved, 0 when the job does not exist, -1 when locked and
/// the lock is honoured.
///
/// KEYS: wait, active, paused, completed, failed, delayed, destination set,
/// job, lock.
/// ARGV: id, honour lock (`1`/`0`), finishedOn, then field/value pairs.
static FINISH_JOB: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
if ARGV[2] == "1" and redis.call("EXISTS", KEYS[9]) == 1 then
  return -1
end
if redis.call("EXISTS", KEYS[8]) == 0 then
  return 0
end
for i = 1, 3 do
  redis.call("LREM", KEYS[i], 0, ARGV[1])
end
for i = 4, 6 do
  redis.call("ZREM", KEYS[i], ARGV[1])
end
redis.call("ZADD", KEYS[7], ARGV[3], ARGV[1])
redis.call("HSET", KEYS[8], "finishedOn", ARGV[3], unpack(ARGV, 4))
return 1
"#,
    )
});

/// Delete jobs of one state whose reference time is before a cutoff.
///
/// The reference is `finishedOn` (falling back to `timestamp`) for finished
/// states and `timestamp` otherwise. Jobs without either are removed. Returns
/// the removed ids.
///
/// KEYS: state key.
/// ARGV: job key prefix, cutoff ms, limit (0 = none), sorted set (`1`/`0`),
/// use finishedOn (`1`/`0`), skip locked (`1`/`0`).
static CLEAN_JOBS: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
local ids
if ARGV[4] == "1" then
  ids = redis.call("ZRANGE", KEYS[1], 0, -1)
else
  ids = redis.call("LRANGE", KEYS[1], 0, -1)
end
local cutoff = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local removed = {}
for _, id in ipairs(ids) do
  if limit > 0 and #removed >= limit then
    break
  end
  local jobKey = ARGV[1] .. id
  local fields = redis.call("HMGET", jobKey, "finishedOn", "timestamp")
  local reference = tonumber(fields[2])
  if ARGV[5] == "1" then
    reference = tonumber(fields[1]) or reference
  end
  local keep = reference ~= nil and reference >= cutoff
  if not keep and ARGV[6] == "1" and redis.call("EXISTS", jobKey .. ":lock") == 1 then
    keep = true
  end
  if not keep then
    if ARGV[4] == "1" then
      redis.call("ZREM", KEYS[1], id)
    else
      redis.call("LREM", KEYS[1], 0, id)
    end
    redis.call("DEL", jobKey, jobKey .. ":logs")
    removed[#removed + 1] = id
  end
end
return removed
"#,
    )
});

const STATES: [JobState; 6] = [
    JobState::Waiting,
    JobState::Active,
    JobState::Paused,
    JobState::Completed,
    JobState::Failed,
    JobState::Delayed,
];

/// Redis key names of one queue.
#[derive(Debug, Clone)]
struct Keys {
    base: String,
}

impl Keys {
    fn new(prefix: &str, name: &str) -> Self {
        Self {
            base: format!("{prefix}:{name}"),
        }
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{suffix}", self.base)
    }

    fn state(&self, state: JobState) -> String {
        self.key(state.key_suffix())
    }

    fn job(&self, id: &str) -> String {
        self.key(id)
    }

    fn logs(&self, id: &str) -> String {
        format!("{}:{id}:logs", self.base)
    }

    fn lock(&self, id: &str) -> String {
        format!("{}:{id}:lock", self.base)
    }

    /// Prefix that turns a job id into its hash key inside scripts.
    fn job_prefix(&self) -> String {
        format!("{}:", self.base)
    }
}

/// Bull queue accessed through a multiplexed Redis connection.
///
/// The connection is cloneable (Arc-based internally); every operation works
/// on its own clone. After [`close`](QueueBackend::close) every operation
/// fails with [`QueueError::Closed`].
pub struct RedisQueue {
    conn: MultiplexedConnection,
    keys: Keys,
    url: String,
    locally_paused: AtomicBool,
    closed: AtomicBool,
}

impl std::fmt::Debug for RedisQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisQueue")
            .field("keys", &self.keys.base)
            .field("url", &self.url)
            .field("locally_paused", &self.locally_paused.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl RedisQueue {
    /// Open a connection for `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or Redis is unreachable.
    pub async fn connect(target: &QueueTarget) -> QueueResult<Self> {
        let client = redis::Client::open(target.url.as_str())?;
        let conn = client.get_multiplexed_async_connection().await?;

        debug!(url = %target.url, queue = %target.name, "Connected to Redis");

        Ok(Self {
            conn,
            keys: Keys::new(&target.prefix, &target.name),
            url: target.url.clone(),
            locally_paused: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> QueueResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    fn connection(&self) -> QueueResult<MultiplexedConnection> {
        self.ensure_open()?;
        Ok(self.conn.clone())
    }

    /// Shared body of `retry` and `promote`.
    async fn requeue(&self, job: &Job, from: JobState, mode: &str) -> QueueResult<()> {
        let mut conn = self.connection()?;
        let id = job.id.as_str();
        let code: i64 = REQUEUE_JOB
            .key(self.keys.state(from))
            .key(self.keys.job(id))
            .key(self.keys.lock(id))
            .key(self.keys.state(JobState::Waiting))
            .key(self.keys.state(JobState::Paused))
            .key(self.keys.key("meta-paused"))
            .arg(id)
            .arg(self.keys.key("waiting"))
            .arg(mode)
            .invoke_async(&mut conn)
            .await?;

        match code {
            1 => Ok(()),
            -1 => Err(QueueError::Locked(id.to_string())),
            _ => Err(QueueError::InvalidState {
                id: id.to_string(),
                expected: from,
            }),
        }
    }

    /// Shared body of `move_to_failed` and `move_to_completed`.
    async fn finish(
        &self,
        job: &Job,
        into: JobState,
        fields: &[(&str, String)],
        ignore_lock: bool,
    ) -> QueueResult<()> {
        let mut conn = self.connection()?;
        let id = job.id.as_str();
        let finished_on = chrono::Utc::now().timestamp_millis();

        let mut invocation = FINISH_JOB.prepare_invoke();
        for state in STATES {
            invocation.key(self.keys.state(state));
        }
        invocation
            .key(self.keys.state(into))
            .key(self.keys.job(id))
            .key(self.keys.lock(id))
            .arg(id)
            .arg(if ignore_lock { "0" } else { "1" })
            .arg(finished_on);
        for (field, value) in fields {
            invocation.arg(*field).arg(value);
        }
        let code: i64 = invocation.invoke_async(&mut conn).await?;

        match code {
            1 => Ok(()),
            -1 => Err(QueueError::Locked(id.to_string())),
            _ => Err(QueueError::Missing(id.to_string())),
        }
    }
}

#[async_trait]
impl QueueBackend for RedisQueue {
    async fn is_ready(&self) -> QueueResult<()> {
        let mut conn = self.connection()?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn close(&self) -> QueueResult<()> {
        // The multiplexed connection shuts down when the last clone drops.
        self.closed.store(true, Ordering::Release);
        debug!(url = %self.url, queue = %self.keys.base, "Closed queue connection");
        Ok(())
    }

    async fn get_job(&self, id: &str) -> QueueResult<Option<Job>> {
        let mut conn = self.connection()?;
        let hash: HashMap<String, String> = conn.hgetall(self.keys.job(id)).await?;
        if hash.is_empty() {
            return Ok(None);
        }
        Job::from_hash(JobId::new(id), hash).map(Some)
    }

    async fn job_counts(&self) -> QueueResult<JobCounts> {
        let mut conn = self.connection()?;
        let (waiting, active, completed, failed, delayed): (u64, u64, u64, u64, u64) =
            redis::pipe()
                .cmd("LLEN")
                .arg(self.keys.state(JobState::Waiting))
                .cmd("LLEN")
                .arg(self.keys.state(JobState::Active))
                .cmd("ZCARD")
                .arg(self.keys.state(JobState::Completed))
                .cmd("ZCARD")
                .arg(self.keys.state(JobState::Failed))
                .cmd("ZCARD")
                .arg(self.keys.state(JobState::Delayed))
                .query_async(&mut conn)
                .await?;

        Ok(JobCounts {
            waiting,
            active,
            completed,
            failed,
            delayed,
        })
    }

    async fn paused_count(&self) -> QueueResult<u64> {
        let mut conn = self.connection()?;
        Ok(conn.llen(self.keys.state(JobState::Paused)).await?)
    }

    async fn jobs_in_state(&self, state: JobState) -> QueueResult<Vec<Job>> {
        let mut conn = self.connection()?;
        let key = self.keys.state(state);
        let ids: Vec<String> = match state {
            JobState::Completed | JobState::Failed => conn.zrevrange(&key, 0, -1).await?,
            JobState::Delayed => conn.zrange(&key, 0, -1).await?,
            JobState::Waiting | JobState::Active | JobState::Paused => {
                conn.lrange(&key, 0, -1).await?
            }
        };

        // Jobs can disappear between listing and loading.
        let jobs = try_join_all(ids.iter().map(|id| self.get_job(id))).await?;
        Ok(jobs.into_iter().flatten().collect())
    }

    async fn add(&self, name: &str, data: Value) -> QueueResult<Job> {
        let mut conn = self.connection()?;
        let next: u64 = conn.incr(self.keys.key("id"), 1).await?;
        let id = next.to_string();
        let timestamp = chrono::Utc::now().timestamp_millis();

        let mut job = Job::new(JobId::new(id.as_str()), name, data, timestamp);
        job.opts = json!({ "attempts": 1, "delay": 0, "timestamp": timestamp });

        let _: i64 = ADD_JOB
            .key(self.keys.job(&id))
            .key(self.keys.state(JobState::Waiting))
            .key(self.keys.state(JobState::Paused))
            .key(self.keys.key("meta-paused"))
            .arg(&id)
            .arg(name)
            .arg(serde_json::to_string(&job.data)?)
            .arg(serde_json::to_string(&job.opts)?)
            .arg(timestamp)
            .arg(self.keys.key("waiting"))
            .invoke_async(&mut conn)
            .await?;

        info!(job_id = %id, name, "Added job");
        Ok(job)
    }

    async fn pause(&self, scope: PauseScope) -> QueueResult<()> {
        self.ensure_open()?;
        if scope == PauseScope::Local {
            self.locally_paused.store(true, Ordering::Release);
            warn!(queue = %self.keys.base, "Paused locally; no workers run in this process");
            return Ok(());
        }

        let mut conn = self.connection()?;
        let _: i64 = PAUSE
            .key(self.keys.state(JobState::Waiting))
            .key(self.keys.state(JobState::Paused))
            .key(self.keys.key("meta-paused"))
            .arg("paused")
            .arg(self.keys.key("paused"))
            .invoke_async(&mut conn)
            .await?;

        info!(queue = %self.keys.base, "Paused queue");
        Ok(())
    }

    async fn resume(&self, scope: PauseScope) -> QueueResult<()> {
        self.ensure_open()?;
        if scope == PauseScope::Local {
            self.locally_paused.store(false, Ordering::Release);
            warn!(queue = %self.keys.base, "Resumed locally; no workers run in this process");
            return Ok(());
        }

        let mut conn = self.connection()?;
        let _: i64 = PAUSE
            .key(self.keys.state(JobState::Paused))
            .key(self.keys.state(JobState::Waiting))
            .key(self.keys.key("meta-paused"))
            .arg("resumed")
            .arg(self.keys.key("resumed"))
            .invoke_async(&mut conn)
            .await?;

        info!(queue = %self.keys.base, "Resumed queue");
        Ok(())
    }

    fn is_paused_locally(&self) -> bool {
        self.locally_paused.load(Ordering::Acquire)
    }

    async fn clean(
        &self,
        grace: Duration,
        status: CleanStatus,
        limit: Option<u64>,
    ) -> QueueResult<Vec<String>> {
        let mut conn = self.connection()?;
        let state = status.state();
        let grace_ms = i64::try_from(grace.as_millis()).unwrap_or(i64::MAX);
        let cutoff = chrono::Utc::now().timestamp_millis().saturating_sub(grace_ms);
        let flag = |on: bool| if on { "1" } else { "0" };

        let removed: Vec<String> = CLEAN_JOBS
            .key(self.keys.state(state))
            .arg(self.keys.job_prefix())
            .arg(cutoff)
            .arg(limit.unwrap_or(0))
            .arg(flag(state.is_sorted_set()))
            .arg(flag(matches!(state, JobState::Completed | JobState::Failed)))
            .arg(flag(state == JobState::Active))
            .invoke_async(&mut conn)
            .await?;

        info!(queue = %self.keys.base, %status, removed = removed.len(), "Cleaned jobs");
        Ok(removed)
    }

    async fn job_logs(&self, id: &str, start: i64, end: i64) -> QueueResult<JobLogs> {
        let mut conn = self.connection()?;
        let key = self.keys.logs(id);
        let (logs, count): (Vec<String>, u64) = redis::pipe()
            .cmd("LRANGE")
            .arg(&key)
            .arg(start)
            .arg(end)
            .cmd("LLEN")
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        Ok(JobLogs { logs, count })
    }

    async fn remove(&self, job: &Job) -> QueueResult<()> {
        let mut conn = self.connection()?;
        let id = job.id.as_str();

        let mut invocation = REMOVE_JOB.prepare_invoke();
        for state in STATES {
            invocation.key(self.keys.state(state));
        }
        let code: i64 = invocation
            .key(self.keys.key("priority"))
            .key(self.keys.job(id))
            .key(self.keys.logs(id))
            .key(self.keys.lock(id))
            .arg(id)
            .invoke_async(&mut conn)
            .await?;

        match code {
            1 => {
                info!(job_id = %id, "Removed job");
                Ok(())
            }
            -1 => Err(QueueError::Locked(id.to_string())),
            _ => Err(QueueError::Missing(id.to_string())),
        }
    }

    async fn retry(&self, job: &Job) -> QueueResult<()> {
        self.requeue(job, JobState::Failed, "retry").await?;
        info!(job_id = %job.id, "Retried job");
        Ok(())
    }

    async fn promote(&self, job: &Job) -> QueueResult<()> {
        self.requeue(job, JobState::Delayed, "promote").await?;
        info!(job_id = %job.id, "Promoted job");
        Ok(())
    }

    async fn move_to_failed(&self, job: &Job, reason: &str, ignore_lock: bool) -> QueueResult<()> {
        let fields = [
            ("failedReason", reason.to_string()),
            ("attemptsMade", job.attempts_made.saturating_add(1).to_string()),
            ("stacktrace", serde_json::to_string(&job.stacktrace)?),
        ];
        self.finish(job, JobState::Failed, &fields, ignore_lock)
            .await?;

        info!(job_id = %job.id, reason, "Moved job to failed");
        Ok(())
    }

    async fn move_to_completed(
        &self,
        job: &Job,
        value: Value,
        ignore_lock: bool,
    ) -> QueueResult<()> {
        let fields = [("returnvalue", serde_json::to_string(&value)?)];
        self.finish(job, JobState::Completed, &fields, ignore_lock)
            .await?;

        info!(job_id = %job.id, "Moved job to completed");
        Ok(())
    }

    async fn log(&self, job: &Job, line: &str) -> QueueResult<u64> {
        let mut conn = self.connection()?;
        let count: u64 = conn.rpush(self.keys.logs(job.id.as_str()), line).await?;
        debug!(job_id = %job.id, count, "Appended job log");
        Ok(count)
    }
}

/// Opens [`RedisQueue`] backends.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

#[async_trait]
impl QueueConnector for RedisConnector {
    async fn open(&self, target: &QueueTarget) -> QueueResult<Box<dyn QueueBackend>> {
        Ok(Box::new(RedisQueue::connect(target).await?))
    }
}
