//! The `DownloadCallback` collaborator interface (spec §6.4).
//!
//! Resolution only needs a dependency's own manifest to keep walking the
//! tree; fetching the bytes that manifest lives in is someone else's job
//! (a Git client, a tarball cache, a test fixture). This module defines
//! the narrow interface the resolver calls through, never implements a
//! fetcher itself. Grounded on the teacher's `PackageSource`-style seam
//! ([`crate::dependency::resolver::PackageSource`] here) and, for the
//! de-duplication requirement ("called at most once per unique id per
//! resolve"), on its `FetcherCache`-shaped idea of memoizing one
//! collaborator call per identity rather than re-invoking it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::dependency::DependencyReference;

/// Materializes a package's install directory for a given reference.
/// Returns `None` on failure (network error, host unreachable, ref not
/// found) — the core treats that as a package that could not be fetched,
/// never panics or propagates the underlying transport error, since this
/// crate has no opinion on what kind of transport a caller chose.
pub trait DownloadCallback {
    fn download(&mut self, dep_ref: &DependencyReference, modules_dir: &Path) -> Option<PathBuf>;
}

/// Wraps a [`DownloadCallback`], ensuring it is invoked at most once per
/// unique dependency id within one resolve (spec §6.4). A second request
/// for the same id returns the first call's (possibly `None`) result
/// without invoking the callback again.
pub struct MemoizedDownloader<'a> {
    inner: &'a mut dyn DownloadCallback,
    modules_dir: PathBuf,
    results: HashMap<String, Option<PathBuf>>,
}

impl<'a> MemoizedDownloader<'a> {
    #[must_use]
    pub fn new(inner: &'a mut dyn DownloadCallback, modules_dir: PathBuf) -> Self {
        Self { inner, modules_dir, results: HashMap::new() }
    }

    /// Get (or fetch, the first time) the install directory for `dep_ref`.
    pub fn get(&mut self, dep_ref: &DependencyReference) -> Option<PathBuf> {
        let id = dep_ref.id();
        if let Some(cached) = self.results.get(&id) {
            return cached.clone();
        }
        let result = self.inner.download(dep_ref, &self.modules_dir);
        self.results.insert(id, result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingDownloader {
        calls: usize,
    }

    impl DownloadCallback for CountingDownloader {
        fn download(&mut self, dep_ref: &DependencyReference, modules_dir: &Path) -> Option<PathBuf> {
            self.calls += 1;
            Some(modules_dir.join(dep_ref.id()))
        }
    }

    #[test]
    fn calls_the_callback_once_per_unique_id() {
        let reference = DependencyReference::parse("owner/repo").unwrap();
        let mut downloader = CountingDownloader { calls: 0 };
        {
            let mut memo = MemoizedDownloader::new(&mut downloader, PathBuf::from("apm_modules"));
            let first = memo.get(&reference);
            let second = memo.get(&reference);
            assert_eq!(first, second);
        }
        assert_eq!(downloader.calls, 1);
    }

    #[test]
    fn failed_download_is_remembered_as_none_not_retried() {
        struct FailingDownloader {
            calls: usize,
        }
        impl DownloadCallback for FailingDownloader {
            fn download(&mut self, _dep_ref: &DependencyReference, _modules_dir: &Path) -> Option<PathBuf> {
                self.calls += 1;
                None
            }
        }

        let reference = DependencyReference::parse("owner/repo").unwrap();
        let mut downloader = FailingDownloader { calls: 0 };
        {
            let mut memo = MemoizedDownloader::new(&mut downloader, PathBuf::from("apm_modules"));
            assert_eq!(memo.get(&reference), None);
            assert_eq!(memo.get(&reference), None);
        }
        assert_eq!(downloader.calls, 1);
    }

    #[test]
    fn distinct_ids_each_get_their_own_call() {
        let a = DependencyReference::parse("owner/a").unwrap();
        let b = DependencyReference::parse("owner/b").unwrap();
        let mut downloader = CountingDownloader { calls: 0 };
        {
            let mut memo = MemoizedDownloader::new(&mut downloader, PathBuf::from("apm_modules"));
            memo.get(&a);
            memo.get(&b);
        }
        assert_eq!(downloader.calls, 2);
    }
}
