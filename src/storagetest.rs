//! # Conformance Suite
//!
//! Behavioural checks any [`KeyValueStore`] must pass. Used by this crate's
//! own tests against the in-memory store, and by the live-cluster test
//! against a real API server.
//!
//! All keys are created below `base`, so the suite can share a backing
//! object with other data. Keys the suite writes are deleted again before a
//! successful return.
//!
//! ```no_run
//! # async fn doc(storage: crd_storage::Storage) -> anyhow::Result<()> {
//! crd_storage::storagetest::run(&storage, "/conformance").await?;
//! # Ok(())
//! # }
//! ```

use crate::error::ErrorKind;
use crate::storage::KeyValueStore;
use anyhow::{ensure, Context, Result};

/// Run every check in order, stopping at the first failure
///
/// # Errors
///
/// Returns a description of the first violated property, or the store
/// error that prevented checking it.
pub async fn run<S: KeyValueStore + ?Sized>(store: &S, base: &str) -> Result<()> {
    put_then_search(store, base).await.context("put then search")?;
    create_is_upsert(store, base).await.context("create is upsert")?;
    delete_removes_key(store, base).await.context("delete removes key")?;
    delete_absent_key(store, base).await.context("delete absent key")?;
    search_miss_is_not_found(store, base)
        .await
        .context("search miss is not found")?;
    list_is_segment_aware(store, base)
        .await
        .context("list is segment aware")?;
    concurrent_puts_on_distinct_keys(store, base)
        .await
        .context("concurrent puts on distinct keys")?;
    Ok(())
}

async fn put_then_search<S: KeyValueStore + ?Sized>(store: &S, base: &str) -> Result<()> {
    let key = format!("{base}/put/key");
    store.put(&key, "first").await?;
    ensure!(store.exists(&key).await?, "{key} should exist after put");
    let value = store.search(&key).await?;
    ensure!(value == "first", "{key}: expected \"first\", got {value:?}");

    store.put(&key, "second").await?;
    let value = store.search(&key).await?;
    ensure!(value == "second", "{key}: expected \"second\", got {value:?}");

    store.delete(&key).await?;
    Ok(())
}

async fn create_is_upsert<S: KeyValueStore + ?Sized>(store: &S, base: &str) -> Result<()> {
    let key = format!("{base}/create/key");
    store.create(&key, "one").await?;
    store.create(&key, "two").await?;
    let value = store.search(&key).await?;
    ensure!(value == "two", "{key}: expected \"two\", got {value:?}");

    store.delete(&key).await?;
    Ok(())
}

async fn delete_removes_key<S: KeyValueStore + ?Sized>(store: &S, base: &str) -> Result<()> {
    let key = format!("{base}/delete/key");
    store.put(&key, "value").await?;
    store.delete(&key).await?;

    ensure!(!store.exists(&key).await?, "{key} should not exist after delete");
    match store.search(&key).await {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).context(format!("{key}: expected not found")),
        Ok(value) => anyhow::bail!("{key}: expected not found, got {value:?}"),
    }
}

async fn delete_absent_key<S: KeyValueStore + ?Sized>(store: &S, base: &str) -> Result<()> {
    let key = format!("{base}/delete/never-written");
    store.delete(&key).await?;
    store.delete(&key).await?;
    Ok(())
}

async fn search_miss_is_not_found<S: KeyValueStore + ?Sized>(store: &S, base: &str) -> Result<()> {
    let key = format!("{base}/search/never-written");
    match store.search(&key).await {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).context(format!("{key}: expected not found")),
        Ok(value) => anyhow::bail!("{key}: expected not found, got {value:?}"),
    }
}

async fn list_is_segment_aware<S: KeyValueStore + ?Sized>(store: &S, base: &str) -> Result<()> {
    let prefix = format!("{base}/list/foo");
    let entries = [
        (prefix.clone(), "a"),
        (format!("{prefix}/bar"), "b"),
        (format!("{prefix}/bar/baz"), "c"),
        (format!("{prefix}bar"), "d"),
    ];
    for (key, value) in &entries {
        store.put(key, value).await?;
    }

    let mut listed = store.list(&prefix).await?;
    listed.sort();
    ensure!(
        listed == ["", "bar", "bar/baz"],
        "list {prefix}: expected [\"\", \"bar\", \"bar/baz\"], got {listed:?}"
    );

    let missing = store.list(&format!("{base}/list/missing")).await?;
    ensure!(missing.is_empty(), "list of unknown prefix returned {missing:?}");

    for (key, _) in &entries {
        store.delete(key).await?;
    }
    Ok(())
}

async fn concurrent_puts_on_distinct_keys<S: KeyValueStore + ?Sized>(
    store: &S,
    base: &str,
) -> Result<()> {
    let keys: Vec<String> = (0..3).map(|i| format!("{base}/concurrent/{i}")).collect();

    let writes = keys.iter().map(|key| store.put(key, key));
    for result in futures::future::join_all(writes).await {
        result?;
    }

    for key in &keys {
        let value = store.search(key).await?;
        ensure!(&value == key, "{key}: expected {key:?}, got {value:?}");
    }
    let mut listed = store.list(&format!("{base}/concurrent")).await?;
    listed.sort();
    ensure!(
        listed == ["0", "1", "2"],
        "concurrent writers clobbered each other: {listed:?}"
    );

    for key in &keys {
        store.delete(key).await?;
    }
    Ok(())
}
