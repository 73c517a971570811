//! Asynchronous style fetching
//!
//! The fetch runs on a detached thread and reports through a one-shot
//! completion callback. Cancellation is by abandonment: a superseded fetch is
//! not aborted, its late completion is rejected by the coordinator's
//! generation check.

use crate::tiles::loader::HTTP_CLIENT;
use crate::Result;
use std::thread;

pub type StyleFetchDone = Box<dyn FnOnce(Result<String>) + Send>;

pub trait StyleFetch: Send + Sync {
    fn fetch(&self, url: &str, done: StyleFetchDone);
}

/// Fetches styles over HTTP on a detached thread
pub struct HttpStyleFetch;

impl StyleFetch for HttpStyleFetch {
    fn fetch(&self, url: &str, done: StyleFetchDone) {
        let url = url.to_string();
        thread::spawn(move || {
            log::debug!("fetching style {url}");
            let result: Result<String> = (|| {
                let resp = HTTP_CLIENT.get(&url).send()?;
                if !resp.status().is_success() {
                    return Err(format!("HTTP {}", resp.status()).into());
                }
                Ok(resp.text()?)
            })();
            if let Err(e) = &result {
                log::warn!("style fetch {url} failed: {e}");
            }
            done(result);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    // A fetch against an unroutable address must complete with an error
    // rather than hang or panic.
    #[test]
    fn test_failed_fetch_reports_error() {
        let (tx, rx) = mpsc::channel();
        HttpStyleFetch.fetch(
            "http://127.0.0.1:1/style.json",
            Box::new(move |result| {
                let _ = tx.send(result.is_err());
            }),
        );
        let failed = rx
            .recv_timeout(Duration::from_secs(30))
            .expect("fetch callback never ran");
        assert!(failed);
    }
}
