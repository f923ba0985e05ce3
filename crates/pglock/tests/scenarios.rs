//! End-to-end scenarios against a real PostgreSQL server
//!
//! Skipped unless `PGLOCK_TEST_DATABASE_URL` is set.

mod common;

use std::time::{Duration, Instant};

use anyhow::Result;
use common::{Marker, TestDatabase, TEST_DATABASE_URL};
use predicates::prelude::*;
use serial_test::serial;

macro_rules! require_database {
    () => {
        match TestDatabase::try_new() {
            Some(db) => db,
            None => {
                eprintln!("Skipping test: {TEST_DATABASE_URL} not set");
                return Ok(());
            }
        }
    };
}

#[tokio::test]
#[serial]
async fn test_free_lock_runs_command() -> Result<()> {
    let db = require_database!();
    let marker = Marker::new()?;

    let mut cmd = db.pglock(42, 0)?;
    cmd.args(marker.touch_command());
    tokio::task::spawn_blocking(move || {
        cmd.assert()
            .success()
            .stderr(predicate::str::contains("obtained successfully"));
    })
    .await?;

    assert!(marker.exists());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_held_lock_skips_command() -> Result<()> {
    let db = require_database!();
    let marker = Marker::new()?;
    let holder = db.hold(42).await?;

    let mut cmd = db.pglock(42, 0)?;
    cmd.args(marker.touch_command());
    tokio::task::spawn_blocking(move || {
        cmd.assert()
            .success()
            .stderr(predicate::str::contains("Could not obtain lock 42"));
    })
    .await?;

    assert!(!marker.exists());
    holder.release_after(Duration::ZERO).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_wait_expires_and_skips_command() -> Result<()> {
    let db = require_database!();
    let marker = Marker::new()?;
    let holder = db.hold(42).await?;

    let mut cmd = db.pglock(42, 2)?;
    cmd.args(marker.touch_command());
    let start = Instant::now();
    tokio::task::spawn_blocking(move || {
        cmd.assert()
            .success()
            .stderr(predicate::str::contains("Could not obtain lock 42"));
    })
    .await?;

    assert!(start.elapsed() >= Duration::from_secs(2));
    assert!(!marker.exists());
    holder.release_after(Duration::ZERO).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn test_wait_runs_command_once_holder_leaves() -> Result<()> {
    let db = require_database!();
    let marker = Marker::new()?;
    let holder = db.hold(42).await?;
    let release = tokio::spawn(holder.release_after(Duration::from_secs(1)));

    let mut cmd = db.pglock(42, 10)?;
    cmd.args(marker.touch_command());
    let start = Instant::now();
    tokio::task::spawn_blocking(move || {
        cmd.assert().success();
    })
    .await?;

    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(marker.exists());
    release.await?;
    Ok(())
}

#[tokio::test]
#[serial]
async fn test_failing_command_exit_code_is_propagated() -> Result<()> {
    let db = require_database!();

    let mut cmd = db.pglock(42, 0)?;
    cmd.args(["sh", "-c", "exit 3"]);
    tokio::task::spawn_blocking(move || {
        cmd.assert()
            .failure()
            .code(3)
            .stderr(predicate::str::contains("obtained successfully"))
            .stderr(predicate::str::contains("exited with status 3"))
            .stderr(predicate::str::contains("Error trying to obtain lock").not());
    })
    .await?;
    Ok(())
}
