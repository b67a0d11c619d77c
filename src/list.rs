//! `redirects list`: print redirects grouped by host scope.

use anyhow::{Context, Result};
use regex::Regex;

use redirect_handler_core::store::RedirectFilter;
use redirect_handler_core::{Redirect, RedirectStore};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Lists one host scope, or the global scope followed by every host.
///
/// With `pattern`, only redirects whose source or target matches are
/// shown, with the matches wrapped in `[...]`.
pub async fn run_list(config: &Config, host: Option<&str>, pattern: Option<&str>) -> Result<()> {
    let pattern = pattern
        .map(|p| Regex::new(p).with_context(|| format!("Invalid --match pattern: '{}'", p)))
        .transpose()?;

    let store = SqliteStore::connect(config).await?;

    let scopes: Vec<Option<String>> = match host {
        Some(host) => vec![Some(host.to_string())],
        None => {
            let mut scopes = vec![None];
            scopes.extend(store.distinct_hosts().await?.into_iter().map(Some));
            scopes
        }
    };

    for scope in scopes {
        let redirects = store
            .find_all(&RedirectFilter::scope(scope.as_deref()))
            .await?;
        println!();
        match &scope {
            Some(host) => println!("== Redirects for {}", host),
            None => println!("== Redirects valid for all hosts"),
        }
        if let Some(pattern) = &pattern {
            println!(
                "   ++ Only showing redirects where source or target URI matches {}",
                pattern.as_str()
            );
        }
        println!();

        let lines: Vec<String> = redirects
            .iter()
            .filter_map(|r| format_list_line(r, pattern.as_ref()))
            .collect();
        if lines.is_empty() {
            println!("   (none)");
        }
        for line in lines {
            println!("{}", line);
        }
    }
    println!();

    store.close().await;
    Ok(())
}

fn format_list_line(redirect: &Redirect, pattern: Option<&Regex>) -> Option<String> {
    let (source, target) = match pattern {
        None => (
            redirect.source_uri_path.clone(),
            redirect.target_uri_path.clone(),
        ),
        Some(re) => {
            if !re.is_match(&redirect.source_uri_path) && !re.is_match(&redirect.target_uri_path)
            {
                return None;
            }
            (
                re.replace_all(&redirect.source_uri_path, "[$0]").into_owned(),
                re.replace_all(&redirect.target_uri_path, "[$0]").into_owned(),
            )
        }
    };
    Some(format!(
        "   > {} => {} ({})",
        source, target, redirect.status_code
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use redirect_handler_core::{NewRedirect, RedirectType};

    fn redirect(source: &str, target: &str) -> Redirect {
        NewRedirect {
            source_uri_path: source.into(),
            target_uri_path: target.into(),
            status_code: 302,
            host: None,
            creator: None,
            comment: None,
            kind: RedirectType::Generated,
            start_date_time: None,
            end_date_time: None,
        }
        .into_redirect(Utc::now())
    }

    #[test]
    fn test_list_line_without_pattern() {
        assert_eq!(
            format_list_line(&redirect("a/b", "c"), None).unwrap(),
            "   > a/b => c (302)"
        );
    }

    #[test]
    fn test_list_line_highlights_matches() {
        let re = Regex::new("blog").unwrap();
        assert_eq!(
            format_list_line(&redirect("old/blog", "news"), Some(&re)).unwrap(),
            "   > old/[blog] => news (302)"
        );
        assert!(format_list_line(&redirect("a", "b"), Some(&re)).is_none());
    }
}
