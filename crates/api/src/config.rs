use std::path::PathBuf;
use std::time::Duration;

use studio_core::retry::RetryPolicy;
use studio_core::task::TaskKind;

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Server configuration loaded from environment variables.
///
/// Everything except `COMFYUI_DIR` has a default suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `300`).
    ///
    /// Must cover the longest polling budget or long jobs are cut off
    /// by the timeout layer.
    pub request_timeout_secs: u64,
    /// Candidate ComfyUI base URLs, probed in order at startup.
    pub comfyui_urls: Vec<String>,
    /// ComfyUI installation directory; outputs are read from and uploads
    /// staged under it.
    pub comfyui_dir: PathBuf,
    /// Directory holding the workflow templates.
    pub workflow_dir: PathBuf,
    /// Maximum accepted request body size in bytes.
    pub upload_limit_bytes: usize,
    /// Wait between status queries.
    pub poll_interval: Duration,
    /// Per-task attempt overrides from `POLL_MAX_ATTEMPTS_<TASK>`.
    pub max_attempts_overrides: Vec<(TaskKind, u32)>,
    /// Exchanges remembered per chat session.
    pub session_max_turns: usize,
    /// Idle time after which a chat session is dropped.
    pub session_idle: Duration,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                  |
    /// |----------------------------|--------------------------|
    /// | `HOST`                     | `0.0.0.0`                |
    /// | `PORT`                     | `3000`                   |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`     | `300`                    |
    /// | `COMFYUI_URLS`             | `http://127.0.0.1:8188`  |
    /// | `COMFYUI_DIR`              | required                 |
    /// | `WORKFLOW_DIR`             | `assets/workflows`       |
    /// | `UPLOAD_LIMIT_BYTES`       | `10485760`               |
    /// | `POLL_INTERVAL_MS`         | `1000`                   |
    /// | `POLL_MAX_ATTEMPTS_<TASK>` | per task                 |
    /// | `SESSION_MAX_TURNS`        | `8`                      |
    /// | `SESSION_IDLE_SECS`        | `3600`                   |
    /// | `LOG_FORMAT`               | `pretty`                 |
    ///
    /// Panics on malformed values; misconfiguration should stop startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = split_list(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let comfyui_urls = split_list(
            &std::env::var("COMFYUI_URLS").unwrap_or_else(|_| "http://127.0.0.1:8188".into()),
        );
        assert!(!comfyui_urls.is_empty(), "COMFYUI_URLS must list at least one URL");

        let comfyui_dir: PathBuf = std::env::var("COMFYUI_DIR")
            .expect("COMFYUI_DIR must be set")
            .into();

        let workflow_dir: PathBuf = std::env::var("WORKFLOW_DIR")
            .unwrap_or_else(|_| "assets/workflows".into())
            .into();

        let upload_limit_bytes: usize = std::env::var("UPLOAD_LIMIT_BYTES")
            .unwrap_or_else(|_| "10485760".into())
            .parse()
            .expect("UPLOAD_LIMIT_BYTES must be a valid usize");

        let poll_interval_ms: u64 = std::env::var("POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("POLL_INTERVAL_MS must be a valid u64");

        let max_attempts_overrides = TaskKind::ALL
            .iter()
            .filter_map(|&task| {
                let var = task.max_attempts_env_var();
                let raw = std::env::var(&var).ok()?;
                let attempts: u32 = raw
                    .parse()
                    .unwrap_or_else(|_| panic!("{var} must be a valid u32"));
                Some((task, attempts))
            })
            .collect();

        let session_max_turns: usize = std::env::var("SESSION_MAX_TURNS")
            .unwrap_or_else(|_| "8".into())
            .parse()
            .expect("SESSION_MAX_TURNS must be a valid usize");

        let session_idle_secs: u64 = std::env::var("SESSION_IDLE_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("SESSION_IDLE_SECS must be a valid u64");

        let log_format = match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            comfyui_urls,
            comfyui_dir,
            workflow_dir,
            upload_limit_bytes,
            poll_interval: Duration::from_millis(poll_interval_ms),
            max_attempts_overrides,
            session_max_turns,
            session_idle: Duration::from_secs(session_idle_secs),
            log_format,
        }
    }

    /// Polling budget for `task`: the shared interval and the task's
    /// attempt count, overridden per task from the environment.
    pub fn retry_policy(&self, task: TaskKind) -> RetryPolicy {
        let max_attempts = self
            .max_attempts_overrides
            .iter()
            .find(|(t, _)| *t == task)
            .map(|&(_, n)| n)
            .unwrap_or_else(|| task.default_max_attempts());
        RetryPolicy::new(self.poll_interval, max_attempts)
    }

    /// Longest worst-case polling wait across all tasks.
    pub fn longest_poll_budget(&self) -> Duration {
        TaskKind::ALL
            .iter()
            .map(|&task| self.retry_policy(task).budget())
            .max()
            .unwrap_or_default()
    }

    /// Where uploads are staged for the backend to load.
    pub fn input_dir(&self) -> PathBuf {
        self.comfyui_dir.join("input")
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: vec![],
            request_timeout_secs: 30,
            comfyui_urls: vec!["http://127.0.0.1:8188".into()],
            comfyui_dir: "/srv/comfyui".into(),
            workflow_dir: "assets/workflows".into(),
            upload_limit_bytes: 1024,
            poll_interval: Duration::from_millis(250),
            max_attempts_overrides: vec![(TaskKind::Tts, 7)],
            session_max_turns: 4,
            session_idle: Duration::from_secs(60),
            log_format: LogFormat::Pretty,
        }
    }

    #[test]
    fn retry_policy_uses_task_default() {
        let policy = config().retry_policy(TaskKind::CharacterPortrait);
        assert_eq!(policy.max_attempts, 120);
        assert_eq!(policy.interval, Duration::from_millis(250));
    }

    #[test]
    fn retry_policy_honours_override() {
        assert_eq!(config().retry_policy(TaskKind::Tts).max_attempts, 7);
    }

    #[test]
    fn longest_poll_budget_covers_slowest_task() {
        // 120 attempts at 250ms for the portrait tasks.
        assert_eq!(config().longest_poll_budget(), Duration::from_secs(30));
    }

    #[test]
    fn input_dir_is_under_backend_dir() {
        assert_eq!(config().input_dir(), PathBuf::from("/srv/comfyui/input"));
    }

    #[test]
    fn split_list_drops_blanks() {
        assert_eq!(
            split_list(" http://a:1 , ,http://b:2,"),
            vec!["http://a:1".to_string(), "http://b:2".to_string()]
        );
    }
}
