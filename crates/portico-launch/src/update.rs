use std::process::{Command, Stdio};
use std::time::Duration;

use portico_core::Provider;
use tracing::{info, warn};
use wait_timeout::ChildExt;

use crate::error::LaunchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

pub fn run_update(
    provider: &Provider,
    timeout: Duration,
) -> Result<Option<UpdateOutcome>, LaunchError> {
    let Some(raw) = provider.update_cmd.as_deref().filter(|c| !c.trim().is_empty()) else {
        return Ok(None);
    };
    let args = shlex::split(raw).ok_or_else(|| LaunchError::InvalidCommand {
        provider: provider.id.clone(),
        command: raw.to_string(),
    })?;
    let Some((program, rest)) = args.split_first() else {
        return Ok(None);
    };

    info!(provider = %provider.id, command = raw, "running update");
    let mut child = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            program: program.clone(),
            source,
        })?;

    let waited = child.wait_timeout(timeout).map_err(|source| LaunchError::Wait {
        program: program.clone(),
        source,
    })?;
    let Some(status) = waited else {
        warn!(provider = %provider.id, timeout_ms = timeout.as_millis() as u64, "update timed out");
        let _ = child.kill();
        let _ = child.wait();
        return Ok(Some(UpdateOutcome {
            success: false,
            exit_code: None,
            timed_out: true,
        }));
    };

    Ok(Some(UpdateOutcome {
        success: status.success(),
        exit_code: status.code(),
        timed_out: false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_update(cmd: &str) -> Provider {
        let mut provider = Provider::new("tool", "Tool");
        provider.update_cmd = Some(cmd.to_string());
        provider
    }

    #[test]
    fn no_update_command_is_not_an_error() {
        let outcome =
            run_update(&Provider::new("bare", "Bare"), Duration::from_secs(1)).expect("run");
        assert!(outcome.is_none());
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        let err =
            run_update(&with_update("npm 'install"), Duration::from_secs(1)).expect_err("bad");
        assert!(matches!(err, LaunchError::InvalidCommand { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn reports_exit_status() {
        let outcome = run_update(&with_update("sh -c 'exit 4'"), Duration::from_secs(5))
            .expect("run")
            .expect("outcome");
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(4));
        assert!(!outcome.timed_out);
    }

    #[cfg(unix)]
    #[test]
    fn kills_on_timeout() {
        let outcome = run_update(&with_update("sleep 5"), Duration::from_millis(100))
            .expect("run")
            .expect("outcome");
        assert!(outcome.timed_out);
        assert!(!outcome.success);
    }
}
