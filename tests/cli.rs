use std::process::Command;

#[test]
fn prints_version() {
    let exe = env!("CARGO_BIN_EXE_memeverse-tui");
    let output = Command::new(exe)
        .arg("--version")
        .output()
        .expect("run memeverse-tui --version");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    assert!(stdout.contains("MemeVerse TUI"));
    assert!(
        stdout.contains(env!("CARGO_PKG_VERSION")),
        "stdout was: {}",
        stdout.trim()
    );
}

#[test]
fn prints_help() {
    let exe = env!("CARGO_BIN_EXE_memeverse-tui");
    let output = Command::new(exe)
        .arg("--help")
        .output()
        .expect("run memeverse-tui --help");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    assert!(stdout.contains("MemeVerse TUI"));
    assert!(stdout.contains("--version"));
    assert!(stdout.contains("--check-updates"));
    assert!(stdout.contains("--sitemap"));
}

#[test]
fn update_check_honors_skip_env() {
    use assert_cmd::Command;
    use predicates::prelude::*;

    Command::cargo_bin("memeverse-tui")
        .expect("binary builds")
        .arg("--check-updates")
        .env(memeverse_tui::update::SKIP_UPDATE_ENV, "1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Update check skipped"));
}
