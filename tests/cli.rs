use std::path::PathBuf;
use std::process::Command;

fn yav() -> Command {
    let exe = std::env::var_os("CARGO_BIN_EXE_yav")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("target").join("debug").join("yav"));
    Command::new(exe)
}

#[test]
fn help_exits_zero() {
    let out = yav().arg("--help").output().unwrap();
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("--image"));
    assert!(text.contains("--anchor"));
    assert!(text.contains("--dev"));
}

#[test]
fn backend_help_exits_zero_without_a_device() {
    for (dev, needle) in [("fb:?", "/dev/fb0"), ("drm:?", "connector")] {
        let out = yav().args(["--dev", dev]).output().unwrap();
        assert!(out.status.success(), "--dev {dev}");
        assert!(String::from_utf8_lossy(&out.stdout).contains(needle));
    }
}

#[test]
fn unknown_backend_exits_one() {
    let out = yav().args(["--dev", "vga"]).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("vga"));
}

#[test]
fn conflicting_flags_exit_one() {
    let out = yav()
        .args(["--static", "--loop", "3", "--image", "x.png"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn bad_connector_id_exits_one() {
    let out = yav().args(["--dev", "drm@banana"]).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("banana"));
}
