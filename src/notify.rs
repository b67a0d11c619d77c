//! Observers for redirect creation.

use log::info;

use redirect_handler_core::{Redirect, RedirectObserver};

/// Logs every created redirect at `info`.
pub struct LogObserver;

impl RedirectObserver for LogObserver {
    fn on_redirect_created(&self, redirect: &Redirect) {
        info!(
            "Redirect from {} {} -> {} ({}) added",
            redirect.host_label(),
            redirect.source_uri_path,
            redirect.target_uri_path,
            redirect.status_code
        );
    }
}
