// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::Result;
use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;

fn buildmeta(directory: &TempDir) -> Command {
    let mut cmd = Command::new(cargo_bin("buildmeta"));
    cmd.current_dir(directory.path()).env_remove("RUST_LOG");
    cmd
}

fn stdout_json(cmd: &mut Command) -> Result<Value> {
    let output = cmd.assert().success().get_output().stdout.clone();
    Ok(serde_json::from_slice(&output)?)
}

#[test]
fn exit_code_for_empty_arguments() -> Result<()> {
    let temp = TempDir::new()?;

    buildmeta(&temp).assert().failure().stderr(predicate::str::contains("Usage: buildmeta"));
    Ok(())
}

#[test]
fn exit_code_for_help() -> Result<()> {
    let temp = TempDir::new()?;

    for subcommand in ["parse", "builtins", "scan"] {
        buildmeta(&temp)
            .args([subcommand, "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Usage: buildmeta"));
    }
    Ok(())
}

#[test]
fn parse_single_command_line() -> Result<()> {
    let temp = TempDir::new()?;

    let value = stdout_json(buildmeta(&temp).args([
        "parse",
        "--cwd",
        "/work",
        "--",
        "g++",
        "-I",
        "my include",
        "-DVERSION=\"1.0\"",
        "-std=c++20",
        "-c",
        "main.cpp",
    ]))?;

    assert_eq!(value["family"], json!("gcc"));
    assert_eq!(
        value["entries"],
        json!([
            {"kind": "include_path", "path": "/work/my include", "include": "normal", "origin": "argument"},
            {"kind": "macro_define", "name": "VERSION", "value": "1.0", "origin": "argument"},
            {"kind": "language_standard", "text": "-std=c++20", "origin": "argument"}
        ])
    );
    assert_eq!(
        value["detection_command"],
        json!(["g++", "-std=c++20", "-E", "-P", "-dM", "-Wp,-v", "spec.cpp"])
    );
    Ok(())
}

#[test]
fn parse_compilation_database() -> Result<()> {
    let temp = TempDir::new()?;
    fs::write(
        temp.path().join("compile_commands.json"),
        r#"[
            {"directory": "/project", "file": "main.c", "command": "cc -DA=1 -c main.c"},
            {"directory": "/project", "file": "tool.c", "arguments": ["/usr/bin/clang", "-isystem", "/opt/inc", "-c", "tool.c"]}
        ]"#,
    )?;

    let value = stdout_json(buildmeta(&temp).args(["parse", "--compile-commands", "compile_commands.json"]))?;

    assert_eq!(value.as_array().map(Vec::len), Some(2));
    assert_eq!(value[0]["entries"][0]["name"], json!("A"));
    assert_eq!(value[1]["family"], json!("clang"));
    assert_eq!(value[1]["entries"][0]["include"], json!("system"));
    Ok(())
}

#[test]
fn parse_with_configured_version_suffix() -> Result<()> {
    let temp = TempDir::new()?;
    fs::write(
        temp.path().join("buildmeta.yml"),
        "schema: 1.0\ndetection:\n  version_suffix: \"-[0-9]+\"\n",
    )?;

    let value = stdout_json(buildmeta(&temp).args(["parse", "--", "gcc-13 -DX -c x.c"]))?;

    assert_eq!(value["family"], json!("gcc"));
    assert_eq!(value["executable"], json!("gcc-13"));
    Ok(())
}

#[test]
fn invalid_configuration_fails() -> Result<()> {
    let temp = TempDir::new()?;
    let config = temp.path().join("broken.yml");
    fs::write(&config, "schema: 1.0\nresponse_files:\n  marker: \"\"\n")?;

    buildmeta(&temp)
        .args(["-c", &*config.to_string_lossy(), "parse", "--", "gcc -c x.c"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn builtins_from_standard_input() -> Result<()> {
    let temp = TempDir::new()?;
    let input = "#define __STDC__ 1\n\
        #define __x86_64__ 1\n\
        #include \"...\" search starts here:\n\
        #include <...> search starts here:\n \
        /usr/lib/gcc/x86_64-linux-gnu/13/include\n \
        /usr/include\n\
        End of search list.\n";

    let value = stdout_json(buildmeta(&temp).args(["builtins", "--family", "gcc"]).write_stdin(input))?;

    assert_eq!(value.as_array().map(Vec::len), Some(4));
    assert_eq!(value[3], json!({"kind": "include_path", "path": "/usr/include", "include": "system", "origin": "builtin"}));
    Ok(())
}

#[test]
fn builtins_echo_forwards_the_input() -> Result<()> {
    let temp = TempDir::new()?;
    let input = "#define __clang__ 1\n";

    buildmeta(&temp)
        .args(["builtins", "--family", "clang", "--echo"])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(input)
        .stderr(predicate::str::contains("\"name\": \"__clang__\""));
    Ok(())
}

#[test]
fn scan_build_output() -> Result<()> {
    let temp = TempDir::new()?;
    let input = "-- The C compiler identification is GNU 13.2.0\n\
        CMake Warning (dev) at cmake/deps.cmake:12 (message):\n  \
        Dependency not pinned.\n\
        \n\
        \n\
        CMake Error: The source directory \"/nowhere\" does not exist.\n";

    let value = stdout_json(buildmeta(&temp).args(["scan", "--source-root", "/src"]).write_stdin(input))?;

    assert_eq!(
        value,
        json!([
            {
                "file": "/src/cmake/deps.cmake",
                "line": 12,
                "description": "Dependency not pinned.",
                "severity": "warning",
                "kind": "script",
                "context": "message"
            },
            {
                "description": "The source directory \"/nowhere\" does not exist.",
                "severity": "error_build",
                "kind": "build"
            }
        ])
    );
    Ok(())
}

#[test]
fn missing_input_file_fails() -> Result<()> {
    let temp = TempDir::new()?;

    buildmeta(&temp)
        .args(["scan", "--input", "missing.log"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open input"));
    Ok(())
}
