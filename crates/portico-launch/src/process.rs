use std::collections::BTreeMap;
use std::process::{Command, ExitStatus, Stdio};

use tracing::{debug, info};

use crate::error::LaunchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec {
    pub provider_id: String,
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

pub trait ProcessRunner: Send + Sync {
    fn run(&self, spec: &SpawnSpec) -> Result<i32, LaunchError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, spec: &SpawnSpec) -> Result<i32, LaunchError> {
        info!(provider = %spec.provider_id, program = %spec.program, "spawning");
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        let forwarder = signals::Forwarder::install(child.id());
        let status = child.wait().map_err(|source| LaunchError::Wait {
            program: spec.program.clone(),
            source,
        });
        drop(forwarder);

        let code = exit_code(status?);
        debug!(provider = %spec.provider_id, code, "child exited");
        Ok(code)
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(unix)]
mod signals {
    use std::thread::{self, JoinHandle};

    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::{Handle, Signals};
    use tracing::{debug, warn};

    pub struct Forwarder {
        handle: Handle,
        thread: Option<JoinHandle<()>>,
    }

    impl Forwarder {
        pub fn install(child_pid: u32) -> Option<Self> {
            let mut signals = match Signals::new([SIGINT, SIGTERM]) {
                Ok(signals) => signals,
                Err(err) => {
                    warn!("signal forwarding unavailable: {err}");
                    return None;
                }
            };
            let handle = signals.handle();
            let Ok(pid) = libc::pid_t::try_from(child_pid) else {
                warn!(child_pid, "child pid out of range, not forwarding signals");
                handle.close();
                return None;
            };
            let thread = thread::spawn(move || {
                for signal in signals.forever() {
                    debug!(signal, pid, "forwarding signal to child");
                    // SAFETY: kill(2) with a pid we spawned and a valid signal number.
                    unsafe {
                        libc::kill(pid, signal);
                    }
                }
            });
            Some(Self {
                handle,
                thread: Some(thread),
            })
        }
    }

    impl Drop for Forwarder {
        fn drop(&mut self) {
            self.handle.close();
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }
}

#[cfg(not(unix))]
mod signals {
    pub struct Forwarder;

    impl Forwarder {
        pub fn install(_child_pid: u32) -> Option<Self> {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Forwarders relay to every live child, so tests that spawn through
    // SystemRunner must not overlap with the one that raises signals.
    static SPAWNING: Mutex<()> = Mutex::new(());

    fn spec(program: &str, args: &[&str]) -> SpawnSpec {
        SpawnSpec {
            provider_id: "test".to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            env: BTreeMap::new(),
        }
    }

    #[test]
    fn missing_executable_is_a_spawn_error() {
        let err = SystemRunner
            .run(&spec("nonexistent-xyz-binary", &[]))
            .expect_err("must fail");
        assert!(matches!(err, LaunchError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn propagates_exit_code_and_environment() {
        let _guard = SPAWNING.lock().unwrap_or_else(|e| e.into_inner());
        let mut with_env = spec("sh", &["-c", "test \"$PORTICO_PROVIDER\" = zai && exit 7"]);
        with_env
            .env
            .insert("PORTICO_PROVIDER".to_string(), "zai".to_string());
        assert_eq!(SystemRunner.run(&with_env).expect("run"), 7);
        assert_eq!(SystemRunner.run(&spec("true", &[])).expect("run"), 0);
    }

    #[cfg(unix)]
    #[test]
    fn sigterm_to_parent_reaches_child() {
        use std::thread;
        use std::time::Duration;

        let _guard = SPAWNING.lock().unwrap_or_else(|e| e.into_inner());
        let child = spec(
            "sh",
            &[
                "-c",
                "trap 'exit 42' TERM; i=0; while [ $i -lt 100 ]; do sleep 0.1; i=$((i+1)); done; exit 3",
            ],
        );
        let runner = thread::spawn(move || SystemRunner.run(&child));

        thread::sleep(Duration::from_millis(500));
        // SAFETY: signalling our own pid; the forwarder installed by run() handles it.
        unsafe {
            libc::kill(libc::getpid(), libc::SIGTERM);
        }

        let code = runner.join().expect("runner thread").expect("run");
        assert_eq!(code, 42);
    }
}
