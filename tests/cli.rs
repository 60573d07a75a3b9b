use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use anyhow::Result;
use serde_json::{json, Value};
use tempfile::tempdir;

fn gd(dir: &Path, args: &[&str]) -> Result<Output> {
    let output = Command::new(env!("CARGO_BIN_EXE_gd"))
        .args(args)
        .current_dir(dir)
        .env_remove("GD_CONFIG")
        .output()?;
    Ok(output)
}

fn write_grid(dir: &Path, grid: &Value) -> Result<()> {
    fs::write(dir.join("grid.json"), serde_json::to_string_pretty(grid)?)?;
    Ok(())
}

fn grid(command: &str) -> Value {
    json!({
        "scheduler_config": {"gpu": ["0", ["1", "2"]]},
        "global_config": {"command": command, "num_epoch": 200},
        "test_config": [
            {"method": ["A", "B"], "num_packing": [1, 2]},
            {"method": ["C"], "num_packing": [3, 4]},
        ],
    })
}

const WORK_DIRS: [&str; 6] = [
    "method-A,num_packing-1,",
    "method-A,num_packing-2,",
    "method-B,num_packing-1,",
    "method-B,num_packing-2,",
    "method-C,num_packing-3,",
    "method-C,num_packing-4,",
];

fn check_results(dir: &Path) -> Result<()> {
    for name in WORK_DIRS {
        let work_dir = dir.join("results").join(name);
        let out = fs::read_to_string(work_dir.join("out.txt"))?;
        let (method, device) = out
            .trim()
            .split_once(' ')
            .ok_or_else(|| anyhow::anyhow!("unexpected output {out:?}"))?;
        assert!(name.starts_with(&format!("method-{method},")), "{name}: {out}");
        assert!(device == "0" || device == "1,2", "{name}: {out}");
        assert!(work_dir.join("worker.log").exists());
    }
    Ok(())
}

#[test]
fn test_run() -> Result<()> {
    let dir = tempdir()?;
    write_grid(
        dir.path(),
        &grid(r#"echo "$method $CUDA_VISIBLE_DEVICES" > out.txt"#),
    )?;

    let output = gd(dir.path(), &["run", "-c", "grid.json"])?;
    assert!(output.status.success(), "{:?}", output);
    check_results(dir.path())?;

    let log = fs::read_to_string(dir.path().join("scheduler.log"))?;
    assert_eq!(log.matches("receives task").count(), 6);
    assert_eq!(log.matches("finishes task").count(), 6);
    assert!(dir.path().join("temp/plan.json").exists());
    assert!(dir.path().join("temp/gpu0_descriptor").exists());

    // second run finds every work dir and launches nothing:
    let output = gd(dir.path(), &["run", "-c", "grid.json"])?;
    assert!(output.status.success(), "{:?}", output);
    let log = fs::read_to_string(dir.path().join("scheduler.log"))?;
    assert_eq!(log.matches("skips task").count(), 6);
    assert_eq!(log.matches("finishes task").count(), 6);
    Ok(())
}

#[test]
fn test_run_in_process() -> Result<()> {
    let dir = tempdir()?;
    write_grid(
        dir.path(),
        &grid(r#"echo "$method $CUDA_VISIBLE_DEVICES" > out.txt"#),
    )?;

    let output = gd(dir.path(), &["run", "-c", "grid.json", "--in-process", "-v"])?;
    assert!(output.status.success(), "{:?}", output);
    check_results(dir.path())?;

    // -v also shows what loading the grid did:
    let log = fs::read_to_string(dir.path().join("scheduler.log"))?;
    assert!(log.contains("expanded 2 axis groups into 6 configurations"), "{log}");
    assert!(log.contains("temp folder:"), "{log}");
    Ok(())
}

#[test]
fn test_failing_tasks_do_not_fail_the_run() -> Result<()> {
    let dir = tempdir()?;
    write_grid(dir.path(), &grid("echo oops >&2; exit 3"))?;

    let output = gd(dir.path(), &["run", "-c", "grid.json"])?;
    assert!(output.status.success(), "{:?}", output);

    let log = fs::read_to_string(dir.path().join("scheduler.log"))?;
    assert_eq!(log.matches("finishes task").count(), 6);
    let worker_log = fs::read_to_string(dir.path().join("results/method-A,num_packing-1,/worker.log"))?;
    assert!(worker_log.contains("oops"), "{worker_log}");
    Ok(())
}

#[test]
fn test_no_gpus() -> Result<()> {
    let dir = tempdir()?;
    let mut grid = grid("true");
    grid["scheduler_config"]["gpu"] = json!([]);
    write_grid(dir.path(), &grid)?;

    let output = gd(dir.path(), &["run", "-c", "grid.json"])?;
    assert!(!output.status.success());
    assert!(!dir.path().join("results").exists());
    Ok(())
}

#[test]
fn test_missing_config() -> Result<()> {
    let dir = tempdir()?;
    let output = gd(dir.path(), &["run"])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("grid.json"));
    Ok(())
}

#[test]
fn test_list() -> Result<()> {
    let dir = tempdir()?;
    write_grid(dir.path(), &grid("true"))?;

    let output = gd(dir.path(), &["list"])?;
    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.starts_with("6 configurations:"), "{stdout}");
    for name in WORK_DIRS {
        assert!(stdout.contains(name), "{stdout}");
    }
    assert!(stdout.contains("gpu1,2\tCUDA_VISIBLE_DEVICES=1,2"), "{stdout}");
    assert!(!dir.path().join("results").exists());
    Ok(())
}
