//! `redirects add`: create a single redirect.
//!
//! An existing redirect with the same source in the same host scope is
//! left alone when identical, refused when different, and replaced with
//! `--force`. The replacement happens in the same atomic write as the
//! insert.

use anyhow::Result;

use redirect_handler_core::rows::parse_datetime;
use redirect_handler_core::{AddRedirect, Redirect, RedirectStore, RedirectType};

use crate::config::Config;

/// Arguments of `redirects add`.
#[derive(Debug, Clone)]
pub struct AddArgs {
    pub source: String,
    pub target: String,
    pub status_code: u16,
    pub host: Option<String>,
    pub force: bool,
    pub comment: Option<String>,
    pub creator: Option<String>,
    pub kind: Option<RedirectType>,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// One protocol line: `   ++ source => target (301) - host`.
pub fn format_redirect_line(prefix: &str, redirect: &Redirect) -> String {
    format!(
        "   {} {} => {} ({}) - {}",
        prefix,
        redirect.source_uri_path,
        redirect.target_uri_path,
        redirect.status_code,
        redirect.host_label()
    )
}

pub fn print_legend() {
    println!("Legend");
    println!();
    println!("   ++ Redirect created");
    println!("   -- Redirect removed");
    println!("   ~~ Redirect not modified");
    println!("   !! Error");
    println!();
}

fn is_same(redirect: &Redirect, args: &AddArgs) -> bool {
    redirect.target_uri_path == args.target && redirect.status_code == args.status_code
}

/// Runs the command. Returns `false` when an existing redirect blocks the add.
pub async fn run_add(config: &Config, args: AddArgs) -> Result<bool> {
    let start = args
        .start
        .as_deref()
        .map(|v| parse_datetime("Start", v))
        .transpose()?;
    let end = args
        .end
        .as_deref()
        .map(|v| parse_datetime("End", v))
        .transpose()?;

    let (store, engine) = crate::open_engine(config).await?;

    println!();
    println!("Create a redirect ...");
    println!();

    let existing = store
        .find_one(&args.source, args.host.as_deref(), false)
        .await?;
    let replaced = match existing {
        Some(redirect) if is_same(&redirect, &args) => {
            println!("{}", format_redirect_line("~~", &redirect));
            println!();
            print_legend();
            store.close().await;
            return Ok(true);
        }
        Some(redirect) if !args.force => {
            println!("A redirect with the same source URI exists, see below:");
            println!();
            println!("{}", format_redirect_line("!!", &redirect));
            println!();
            println!("Use --force to replace it");
            println!();
            store.close().await;
            return Ok(false);
        }
        // The engine replaces it in the same batch as the insert.
        replaced => replaced,
    };

    let mut request = AddRedirect::new(&args.source, &args.target)
        .status_code(args.status_code)
        .window(start, end);
    if let Some(host) = &args.host {
        request = request.host(host.clone());
    }
    if let Some(comment) = args.comment {
        request = request.comment(comment);
    }
    if let Some(creator) = args.creator {
        request = request.creator(creator);
    }
    if let Some(kind) = args.kind {
        request = request.kind(kind);
    }

    let created = engine.add_redirect(request).await?;
    if let Some(redirect) = &replaced {
        println!("{}", format_redirect_line("--", redirect));
    }
    for redirect in &created {
        println!("{}", format_redirect_line("++", redirect));
    }
    println!();
    print_legend();

    store.close().await;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use redirect_handler_core::NewRedirect;

    #[test]
    fn test_format_redirect_line() {
        let redirect = NewRedirect {
            source_uri_path: "old".into(),
            target_uri_path: "new".into(),
            status_code: 301,
            host: None,
            creator: None,
            comment: None,
            kind: RedirectType::Manual,
            start_date_time: None,
            end_date_time: None,
        }
        .into_redirect(Utc::now());

        assert_eq!(
            format_redirect_line("++", &redirect),
            "   ++ old => new (301) - all hosts"
        );
    }
}
