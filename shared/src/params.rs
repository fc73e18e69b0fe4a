//! Launch parameters of the server executable.

use serde::Deserialize;

use crate::CONFIG_FILE;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerParams {
    pub config_file: String,
    pub do_logs: bool,
    pub admin_log: bool,
    pub net_log: bool,
    pub src_allow_file_write: bool,
    pub no_file_patching: bool,
    pub freeze_check: bool,
    pub instance_id: Option<u32>,
    pub port: Option<u16>,
    pub profiles_dir: Option<String>,
    pub cpus: Option<usize>,
}

impl Default for ServerParams {
    fn default() -> Self {
        Self {
            config_file: CONFIG_FILE.to_string(),
            do_logs: true,
            admin_log: true,
            net_log: true,
            src_allow_file_write: true,
            no_file_patching: true,
            freeze_check: true,
            instance_id: None,
            port: None,
            profiles_dir: None,
            cpus: std::thread::available_parallelism()
                .map(|n| n.get())
                .ok(),
        }
    }
}

impl ServerParams {
    pub fn executable_args(&self) -> Vec<String> {
        let mut args = vec![format!("-config={}", self.config_file)];

        let flags = [
            (self.do_logs, "-dologs"),
            (self.admin_log, "-adminlog"),
            (self.net_log, "-netlog"),
            (self.src_allow_file_write, "-srcAllowFileWrite"),
            (self.no_file_patching, "-noFilePatching"),
            (self.freeze_check, "-freezecheck"),
        ];
        args.extend(
            flags
                .iter()
                .filter(|(enabled, _)| *enabled)
                .map(|(_, flag)| flag.to_string()),
        );

        if let Some(instance_id) = self.instance_id {
            args.push(format!("-instanceId={}", instance_id));
        }

        if let Some(port) = self.port {
            args.push(format!("-port={}", port));
        }

        if let Some(profiles_dir) = &self.profiles_dir {
            args.push(format!("-profiles={}", profiles_dir));
        }

        if let Some(cpus) = self.cpus {
            args.push(format!("-cpuCount={}", cpus));
        }

        args
    }
}
