//! Contract tests for the PTY console
//!
//! Spawn real processes behind a pseudo-terminal and drive them the way a
//! console server session would be driven.

#![cfg(unix)]

#[path = "../test_utils/mod.rs"]
mod test_utils;

use std::time::Duration;

use modepilot::console::pty::PtySpawnConfig;
use modepilot::console::Console;
use modepilot::{Error, GotoOptions, Mode, ModeContext, ProductConfig, PtyConsole};
use regex::Regex;

/// A shell loop that behaves like a device with a bootloader and a Linux shell
const FAKE_DEVICE: &str = r#"state='=> '
printf '%s' "$state"
while IFS= read -r line; do
  case "$line" in
    boot) state='root@uut:~# ' ;;
    reboot) state='=> ' ;;
  esac
  printf '%s' "$state"
done"#;

const FAKE_DEVICE_DEFINITION: &str = r#"
[settings]
hop_timeout_secs = 5
wake_settle_ms = 300

[[modes]]
name = "uboot"
edges = [{ to = "linux", cost = 10 }]

[[modes]]
name = "linux"
edges = [{ to = "uboot", cost = 20 }]

[[prompts]]
mode = "uboot"
pattern = '=> $'

[[prompts]]
mode = "linux"
pattern = '~# $'

[[transitions]]
from = "uboot"
to = "linux"
steps = [{ send = "boot" }]

[[transitions]]
from = "linux"
to = "uboot"
steps = [{ send = "reboot" }]
"#;

fn spawn_fake_device() -> PtyConsole {
    PtyConsole::spawn("sh", &["-c".to_string(), FAKE_DEVICE.to_string()]).unwrap()
}

#[tokio::test]
async fn test_cat_echoes_input() {
    let mut console = PtyConsole::spawn("cat", &[]).unwrap();
    assert!(console.is_alive());
    assert!(console.process_id().is_some());

    console.send_line("hello pty").await.unwrap();
    let matched = console
        .wait_for(&Regex::new("hello pty").unwrap(), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(matched.ends_with("hello pty"));

    console.kill().unwrap();
}

#[tokio::test]
async fn test_environment_reaches_child() {
    let mut config = PtySpawnConfig::default();
    config
        .env
        .insert("MODEPILOT_TEST_BANNER".to_string(), "uut-ready".to_string());
    let mut console = PtyConsole::spawn_with(
        "sh",
        &["-c".to_string(), "echo $MODEPILOT_TEST_BANNER".to_string()],
        &config,
    )
    .unwrap();

    console
        .wait_for(&Regex::new("uut-ready").unwrap(), Duration::from_secs(5))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_exited_child_closes_console() {
    let mut console = PtyConsole::spawn("sh", &["-c".to_string(), "exit 0".to_string()]).unwrap();

    let err = console
        .wait_for(&Regex::new("never printed").unwrap(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConsoleClosed | Error::ConsoleTimeout { .. }));
}

#[tokio::test]
async fn test_goto_over_real_pty() {
    let config: ProductConfig = toml::from_str(FAKE_DEVICE_DEFINITION).unwrap();
    let context = ModeContext::from_config(&config).unwrap();
    let mut manager = context.manager(spawn_fake_device());

    assert_eq!(
        manager.get_current_mode(true).await.unwrap(),
        Mode::new("uboot")
    );

    let report = manager
        .goto_mode(&Mode::new("linux"), GotoOptions::new())
        .await
        .unwrap();
    assert_eq!(report.hops_executed, 1);
    assert!(manager.is_mode(&Mode::new("linux"), true).await.unwrap());

    let report = manager
        .goto_mode(&Mode::new("uboot"), GotoOptions::new())
        .await
        .unwrap();
    assert_eq!(report.reached, Mode::new("uboot"));
}
