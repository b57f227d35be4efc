use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn opn() -> Command {
    let mut cmd = Command::cargo_bin("opn").expect("binary exists");
    cmd.env_remove("OPN_LOG").env_remove("OPN_PATH");
    cmd
}

#[test]
fn transpile_demo_inlines_package() {
    opn()
        .args(["transpile", "demos/hello.prisma", "-I", "demos/opn.import"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# OPN Package: greetings"))
        .stdout(predicate::str::contains("def greet(name):"))
        .stdout(predicate::str::contains("for i in range(1, 3 + 1):"))
        .stdout(predicate::str::contains("py_print(14, \"done\")"))
        .stdout(predicate::str::ends_with(
            "if __name__ == \"__main__\":\n    main()\n",
        ));
}

#[test]
fn unknown_package_becomes_host_import() {
    opn()
        .args(["transpile", "demos/hello.prisma"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\nimport greetings\n"));
}

#[test]
fn transpile_writes_output_file() {
    let dir = tempdir().expect("create temp dir");
    let out = dir.path().join("hello.py");
    opn()
        .args(["transpile", "demos/hello.prisma", "-o"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Transpiled to:"));
    let contents = fs::read_to_string(&out).expect("read generated file");
    assert!(contents.contains("def square(n):"));
}

#[test]
fn transpile_reads_stdin() {
    opn()
        .args(["transpile", "-"])
        .write_stdin("main { js.log(1); }")
        .assert()
        .success()
        .stdout(predicate::str::contains("    js_log(1)"));
}

#[test]
fn check_reports_rendered_syntax_error() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("broken.prisma");
    fs::write(&script, "main {\n    let x = 1\n}\n").expect("write script");

    opn()
        .arg("check")
        .arg(&script)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--- Syntax error ---"))
        .stderr(predicate::str::contains("broken.prisma:3:1"))
        .stderr(predicate::str::contains("hint: statements end with ';'"))
        .stderr(predicate::str::contains("^"));
}

#[test]
fn check_accepts_valid_source() {
    opn()
        .args(["check", "demos/hello.prisma"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demos/hello.prisma: ok"));
}

#[test]
fn metadata_files_are_not_source() {
    opn()
        .args(["transpile", "demos/opn.import/greetings/greetings.opn"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("package metadata file"));
}

#[test]
fn package_command_shows_metadata() {
    opn()
        .args(["package", "greetings", "-I", "demos/opn.import"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"version\": \"0.1.0\""));

    opn()
        .args(["package", "nowhere", "-I", "demos/opn.import"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no OPN package named 'nowhere'"));
}

#[test]
fn rejects_bad_log_filter() {
    opn()
        .args(["--log-level", "chatty", "check", "demos/hello.prisma"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown log level 'chatty'"));
}
