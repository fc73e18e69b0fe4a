//! Server and mod updates through SteamCMD.

use log::{debug, error, info};
use shared::{Mod, ServerConfig, DAYZ_APP_ID};
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};

use crate::error::{FailedModUpdates, SyncError};

pub const STEAMCMD: &str = "steamcmd";

/// Runs an external program to completion.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<ExitStatus>;

    /// Like [`CommandRunner::run`], with `dir` as the working directory.
    fn run_in(&self, _dir: &Path, program: &str, args: &[String]) -> io::Result<ExitStatus> {
        self.run(program, args)
    }
}

/// Spawns the program as a child process that inherits stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<ExitStatus> {
        Command::new(program).args(args).status()
    }

    fn run_in(&self, dir: &Path, program: &str, args: &[String]) -> io::Result<ExitStatus> {
        Command::new(program).current_dir(dir).args(args).status()
    }
}

/// Invokes the package manager once per server or mod.
#[derive(Debug, Clone)]
pub struct Synchronizer<R = SystemRunner> {
    program: String,
    user: String,
    runner: R,
}

impl Synchronizer<SystemRunner> {
    pub fn new(user: impl Into<String>) -> Self {
        Self::with_runner(user, SystemRunner)
    }
}

impl<R: CommandRunner> Synchronizer<R> {
    pub fn with_runner(user: impl Into<String>, runner: R) -> Self {
        Self {
            program: STEAMCMD.to_string(),
            user: user.into(),
            runner,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn base_args(&self, server: &ServerConfig) -> Vec<String> {
        vec![
            "+force_install_dir".to_string(),
            server.base_dir.display().to_string(),
            "+login".to_string(),
            self.user.clone(),
        ]
    }

    pub fn server_args(&self, server: &ServerConfig) -> Vec<String> {
        let mut args = self.base_args(server);
        args.extend([
            "+app_update".to_string(),
            server.app_id.to_string(),
            "validate".to_string(),
            "+quit".to_string(),
        ]);
        args
    }

    pub fn mod_args(&self, server: &ServerConfig, workshop_mod: &Mod) -> Vec<String> {
        let mut args = self.base_args(server);
        args.extend([
            "+workshop_download_item".to_string(),
            DAYZ_APP_ID.to_string(),
            workshop_mod.id.to_string(),
            "validate".to_string(),
            "+quit".to_string(),
        ]);
        args
    }

    fn execute(&self, item: String, args: &[String]) -> Result<(), SyncError> {
        debug!("Executing: {} {}", self.program, args.join(" "));

        let status = self
            .runner
            .run(&self.program, args)
            .map_err(|source| SyncError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(SyncError::Failed { item, status })
        }
    }

    pub fn sync_server(&self, server: &ServerConfig) -> Result<(), SyncError> {
        info!("Updating server {}", server.name);
        self.execute(format!("server {}", server.name), &self.server_args(server))
    }

    pub fn sync_mod(&self, server: &ServerConfig, workshop_mod: &Mod) -> Result<(), SyncError> {
        info!("Updating mod {}", workshop_mod);
        self.execute(
            format!("mod {}", workshop_mod.id),
            &self.mod_args(server, workshop_mod),
        )
    }

    /// Updates every enabled mod in order. A failed mod does not stop the
    /// remaining ones.
    pub fn sync_mods<'a>(
        &self,
        server: &ServerConfig,
        mods: impl IntoIterator<Item = &'a Mod>,
    ) -> Result<(), FailedModUpdates> {
        let mut failures = FailedModUpdates::default();

        for workshop_mod in mods.into_iter().filter(|m| m.enabled) {
            if let Err(e) = self.sync_mod(server, workshop_mod) {
                error!("{}", e);
                failures.failed.insert(workshop_mod.id);
            }
        }

        if failures.failed.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::parse_servers;
    use std::cell::RefCell;

    #[cfg(unix)]
    fn status(code: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }

    #[cfg(windows)]
    fn status(code: i32) -> ExitStatus {
        use std::os::windows::process::ExitStatusExt;
        ExitStatus::from_raw(code as u32)
    }

    /// Records invocations and fails for arguments containing `fail_on`.
    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<Vec<String>>>,
        fail_on: Option<String>,
    }

    impl CommandRunner for Recorder {
        fn run(&self, _program: &str, args: &[String]) -> io::Result<ExitStatus> {
            self.calls.borrow_mut().push(args.to_vec());

            let failed = self
                .fail_on
                .as_ref()
                .is_some_and(|needle| args.iter().any(|arg| arg == needle));
            Ok(status(if failed { 1 } else { 0 }))
        }
    }

    struct Unspawnable;

    impl CommandRunner for Unspawnable {
        fn run(&self, program: &str, _args: &[String]) -> io::Result<ExitStatus> {
            Err(io::Error::new(io::ErrorKind::NotFound, program.to_string()))
        }
    }

    fn server() -> ServerConfig {
        parse_servers(r#"{"test": {"basedir": "/srv/dayz", "mods": [1, -2, 3]}}"#)
            .unwrap()
            .remove("test")
            .unwrap()
    }

    #[test]
    fn test_server_args() {
        let sync = Synchronizer::with_runner("anonymous", Recorder::default());
        sync.sync_server(&server()).unwrap();

        assert_eq!(
            sync.runner().calls.borrow()[0],
            vec![
                "+force_install_dir",
                "/srv/dayz",
                "+login",
                "anonymous",
                "+app_update",
                "223350",
                "validate",
                "+quit",
            ]
        );
    }

    #[test]
    fn test_mod_args() {
        let sync = Synchronizer::with_runner("steam", Recorder::default());
        sync.sync_mod(&server(), &Mod::new(1559212036)).unwrap();

        assert_eq!(
            sync.runner().calls.borrow()[0][4..],
            [
                "+workshop_download_item",
                "221100",
                "1559212036",
                "validate",
                "+quit",
            ]
        );
    }

    #[test]
    fn test_sync_mods_skips_disabled() {
        let sync = Synchronizer::with_runner("steam", Recorder::default());
        let server = server();
        sync.sync_mods(&server, &server.mods).unwrap();

        let ids: Vec<String> = sync
            .runner()
            .calls
            .borrow()
            .iter()
            .map(|args| args[6].clone())
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_failed_exit_status() {
        let recorder = Recorder {
            fail_on: Some("+app_update".to_string()),
            ..Recorder::default()
        };
        let sync = Synchronizer::with_runner("steam", recorder);

        assert!(matches!(
            sync.sync_server(&server()),
            Err(SyncError::Failed { .. })
        ));
    }

    #[test]
    fn test_spawn_failure() {
        let sync = Synchronizer::with_runner("steam", Unspawnable).with_program("missing-steamcmd");
        let result = sync.sync_server(&server());

        match result {
            Err(SyncError::Spawn { program, .. }) => assert_eq!(program, "missing-steamcmd"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
