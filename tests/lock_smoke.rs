// Multi-process lock smoke test: a pool is attached by at most one process.
use std::process::{Command, Stdio};

use bakehouse::api::{PoolOptions, Target, make_pool};

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_bakehouse");
    Command::new(exe)
}

#[test]
fn held_pool_refuses_other_processes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let pool_path = temp.path().join("lockpool.bake");
    drop(make_pool(&pool_path, PoolOptions::new(1024 * 1024)).expect("make pool"));

    let held = Target::open(&pool_path).expect("open");
    let region = held.create_write_persist(b"still mine").expect("write");

    let workers = 4;
    let mut children = Vec::new();
    for _ in 0..workers {
        let child = cmd()
            .args(["serve", "--bind", "127.0.0.1:0", "--target"])
            .arg(&pool_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn");
        children.push(child);
    }

    for child in children {
        let output = child.wait_with_output().expect("wait");
        assert_eq!(output.status.code(), Some(5));
        let value: serde_json::Value =
            serde_json::from_slice(&output.stderr).expect("json error");
        assert_eq!(value["error"]["kind"], "Busy");
    }

    assert_eq!(held.read(&region, 0, 10).expect("read"), b"still mine");
    drop(held);
    let reopened = Target::open(&pool_path).expect("reopen after release");
    assert_eq!(reopened.list_regions(), vec![region]);
}
