//! Background-service lifecycle. Manages the one long-running helper process this crate
//! cannot invoke inline: the ML frame-extraction subprocess. Startup acquires an exclusive
//! lock on a PID file before spawning so two app instances never race to start two helpers;
//! shutdown removes the PID file only after the child is confirmed dead. On startup, a PID
//! file left by a previous, uncleanly terminated run is either signalled to exit (if still
//! alive) or removed as stale.
//!
//! The extractor's actual ML computation is an opaque external subprocess; only its
//! lifecycle is this crate's concern.

use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::config::MlServiceConfig;
use crate::error::{ReelVaultError, Result};

pub struct BackgroundService {
    pid_path: PathBuf,
    lock_file: Option<File>,
    child: Option<Child>,
    config: MlServiceConfig,
    started_at: Option<Instant>,
    last_activity: Option<Instant>,
}

impl BackgroundService {
    pub fn new(pid_path: PathBuf, config: MlServiceConfig) -> Self {
        Self {
            pid_path,
            lock_file: None,
            child: None,
            config,
            started_at: None,
            last_activity: None,
        }
    }

    /// Reaps an orphaned PID file left by a previous, uncleanly terminated run. Signals a
    /// still-alive process to exit; removes a stale file past the staleness threshold with a
    /// warning; leaves a fresh-looking orphan alone for the caller to re-check.
    pub fn reap_orphan(&self) -> Result<()> {
        if !self.pid_path.exists() {
            return Ok(());
        }

        let age = fs::metadata(&self.pid_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|m| m.elapsed().ok());

        let pid = fs::read_to_string(&self.pid_path)
            .ok()
            .and_then(|s| s.trim().parse::<i32>().ok());

        if let Some(pid) = pid {
            if process_alive(pid) {
                log::warn!("signalling orphaned ML-extractor process {pid} to exit");
                signal_terminate(pid);
                return Ok(());
            }
        }

        let stale_threshold = Duration::from_secs(crate::constants::ORPHAN_STALE_THRESHOLD_SECONDS as u64);
        if age.map(|a| a > stale_threshold).unwrap_or(true) {
            log::warn!("removing stale ML-extractor PID file at {}", self.pid_path.display());
            let _ = fs::remove_file(&self.pid_path);
        } else {
            log::warn!("orphaned ML-extractor PID file looks fresh; leaving for next health check");
        }

        Ok(())
    }

    /// Acquires the exclusive PID-file lock, spawns the extractor, and polls its health
    /// endpoint until it responds or `startup_timeout_seconds` elapses.
    pub fn start(&mut self, executable: &Path, args: &[String]) -> Result<()> {
        if let Some(parent) = self.pid_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.pid_path)?;
        lock_file
            .try_lock_exclusive()
            .map_err(|e| ReelVaultError::Lifecycle(format!("ML extractor already running: {e}")))?;

        let child = Command::new(executable)
            .args(args)
            .spawn()
            .map_err(|e| ReelVaultError::Lifecycle(format!("failed to spawn ML extractor: {e}")))?;

        lock_file.set_len(0)?;
        writeln!(lock_file, "{}", child.id())?;

        self.lock_file = Some(lock_file);
        self.child = Some(child);
        self.started_at = Some(Instant::now());
        self.last_activity = Some(Instant::now());

        self.wait_until_healthy()
    }

    fn wait_until_healthy(&self) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(self.config.startup_timeout_seconds);
        let client = reqwest::blocking::Client::new();

        while Instant::now() < deadline {
            if client.get(&self.config.health_url).send().map(|r| r.status().is_success()).unwrap_or(false) {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(self.config.health_poll_interval_ms));
        }

        Err(ReelVaultError::Lifecycle("ML extractor never became healthy".to_string()))
    }

    /// Records that the extractor was just asked to do work, resetting the idle clock.
    pub fn mark_active(&mut self) {
        self.last_activity = Some(Instant::now());
    }

    /// True once `idle_timeout_seconds` have passed since the last recorded activity.
    pub fn is_idle(&self) -> bool {
        self.last_activity
            .map(|t| t.elapsed() > Duration::from_secs(self.config.idle_timeout_seconds))
            .unwrap_or(false)
    }

    /// Graceful shutdown: signal the child, wait briefly, escalate to kill, then remove the
    /// PID file only once the process is confirmed gone.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            let pid = child.id() as i32;
            signal_terminate(pid);

            let deadline = Instant::now() + Duration::from_secs(5);
            loop {
                match child.try_wait() {
                    Ok(Some(_)) => break,
                    Ok(None) if Instant::now() < deadline => std::thread::sleep(Duration::from_millis(100)),
                    _ => {
                        let _ = child.kill();
                        let _ = child.wait();
                        break;
                    }
                }
            }
        }

        self.lock_file = None;
        if self.pid_path.exists() {
            fs::remove_file(&self.pid_path)?;
        }
        Ok(())
    }
}

impl Drop for BackgroundService {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    // `kill -0` sends no signal but reports via exit status whether the process exists
    // and is signalable, per kill(2).
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn process_alive(_pid: i32) -> bool {
    false
}

#[cfg(unix)]
fn signal_terminate(pid: i32) {
    let _ = Command::new("kill").args(["-TERM", &pid.to_string()]).output();
}

#[cfg(not(unix))]
fn signal_terminate(_pid: i32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reap_orphan_is_a_noop_without_a_pid_file() {
        let dir = tempdir().unwrap();
        let service = BackgroundService::new(dir.path().join("ml.pid"), MlServiceConfig::default());
        assert!(service.reap_orphan().is_ok());
    }

    #[test]
    fn is_idle_false_before_any_activity_is_recorded() {
        let dir = tempdir().unwrap();
        let service = BackgroundService::new(dir.path().join("ml.pid"), MlServiceConfig::default());
        assert!(!service.is_idle());
    }
}
