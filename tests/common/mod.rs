//! Common test utilities for procrun tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const MEGA: usize = 1024 * 1024;

/// Creates a temporary directory holding a config file
pub fn create_config(content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = dir.path().join("procrun.toml");
    std::fs::write(&config_path, content).expect("Failed to write config");
    (dir, config_path)
}

/// Creates an executable script in `dir`
pub fn create_script(dir: &Path, name: &str, content: &str) -> PathBuf {
    let script_path = dir.join(name);
    std::fs::write(&script_path, content).expect("Failed to write script");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&script_path)
            .expect("Failed to get metadata")
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script_path, perms).expect("Failed to set permissions");
    }

    script_path
}

/// Incompressible filler bytes (xorshift64, fixed seed)
pub fn noise(len: usize) -> Vec<u8> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}

/// Reads a pid written by `echo $$ > file`
pub fn read_pid(path: &Path) -> u32 {
    std::fs::read_to_string(path)
        .expect("Failed to read pid file")
        .trim()
        .parse()
        .expect("pid file did not contain a pid")
}

/// True while a process with this pid exists
pub fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Sample config with a couple of profiles
pub const SAMPLE_CONFIG: &str = r#"
[defaults]
timeout_ms = 3000

[env]
PROCRUN_GREETING = "hello"

[profiles.greet]
command = "sh"
args = ["-c", "echo $PROCRUN_GREETING $TARGET"]

[profiles.greet.env]
TARGET = "world"

[profiles.fail]
command = "sh"
args = ["-c", "echo boom >&2; exit 4"]

[profiles.tolerant]
command = "sh"
args = ["-c", "exit 4"]
expected_exit_codes = [0, 4]
"#;
