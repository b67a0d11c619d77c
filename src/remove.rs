//! `redirects remove`, `remove-all` and `remove-by-host`.

use anyhow::Result;
use log::info;

use redirect_handler_core::RedirectStore;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Removes one redirect. Returns `false` if it did not exist.
pub async fn run_remove(config: &Config, source: &str, host: Option<&str>) -> Result<bool> {
    let store = SqliteStore::connect(config).await?;
    let removed = store.delete_one(source, host).await?;
    store.close().await;

    if removed {
        info!("removed redirect \"{}\" for {}", source, host.unwrap_or("all hosts"));
        println!("Removed redirect with the source URI path \"{}\"", source);
    } else {
        println!(
            "There is no redirect with the source URI path \"{}\", maybe you forgot the --host argument?",
            source
        );
    }
    Ok(removed)
}

pub async fn run_remove_all(config: &Config) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let removed = store.delete_all().await?;
    store.close().await;

    info!("removed {} redirects", removed);
    println!("Removed all redirects ({})", removed);
    Ok(())
}

/// Removes one host scope; `all` selects the redirects valid for all hosts.
pub async fn run_remove_by_host(config: &Config, host: &str) -> Result<()> {
    let store = SqliteStore::connect(config).await?;
    let scope = if host == "all" { None } else { Some(host) };
    let removed = store.delete_by_host(scope).await?;
    store.close().await;

    info!("removed {} redirects for {}", removed, scope.unwrap_or("all hosts"));
    match scope {
        None => println!("Removed {} redirects matching all hosts", removed),
        Some(host) => println!("Removed {} redirects for host \"{}\"", removed, host),
    }
    Ok(())
}
