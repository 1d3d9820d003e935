//! Black-box tests against the built `vla-agent` binary.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_serve_subcommand() {
    Command::cargo_bin("vla-agent")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn serve_exits_with_code_2_on_port_in_use() {
    let root = tempfile::tempdir().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    Command::cargo_bin("vla-agent")
        .unwrap()
        .args(["--root", root.path().to_str().unwrap(), "serve", "--port"])
        .arg(port.to_string())
        .timeout(std::time::Duration::from_secs(5))
        .assert()
        .code(2);
}

#[test]
fn client_subcommand_without_running_gateway_exits_nonzero() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("config").join("secrets")).unwrap();
    std::fs::write(root.path().join("config").join("secrets").join("api_key"), "test-key").unwrap();

    Command::cargo_bin("vla-agent")
        .unwrap()
        .args([
            "--root",
            root.path().to_str().unwrap(),
            "--remote-url",
            "http://127.0.0.1:1",
            "health",
        ])
        .assert()
        .failure();
}
