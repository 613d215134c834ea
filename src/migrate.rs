// Migration driver: authenticate once, read the export, then upload each
// photo and create its post.
//
// Records are processed in manifest order when `concurrency` is 1. Higher
// values start that many worker threads which pull the next record from a
// shared cursor, so remote-side ordering is no longer deterministic. Either
// way each record gets one upload attempt and, unless the upload could not
// be sent at all, one post attempt.

use crate::api::{BlogClient, Credential, RemoteError, RemoteOutcome};
use crate::config::Config;
use crate::export::{read_records, MediaRecord};
use crate::post::PostPayload;
use crate::ui;
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::ops::AddAssign;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, info, warn};

/// How one remote step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Accepted,
    Rejected,
    /// The request never produced a response (network, file, decoding).
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub slug: String,
    pub upload: Step,
    /// `None` when the record was skipped after a failed upload.
    pub post: Option<Step>,
}

/// Counters for a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub total: usize,
    pub uploaded: usize,
    pub upload_rejected: usize,
    pub posted: usize,
    pub post_rejected: usize,
    pub post_failed: usize,
    pub skipped: usize,
}

impl MigrationReport {
    pub fn record(&mut self, outcome: &RecordOutcome) {
        self.total += 1;
        match outcome.upload {
            Step::Accepted => self.uploaded += 1,
            Step::Rejected => self.upload_rejected += 1,
            Step::Failed => {}
        }
        match outcome.post {
            Some(Step::Accepted) => self.posted += 1,
            Some(Step::Rejected) => self.post_rejected += 1,
            Some(Step::Failed) => self.post_failed += 1,
            None => self.skipped += 1,
        }
    }

    /// Records for which a post was requested.
    pub fn post_attempts(&self) -> usize {
        self.posted + self.post_rejected + self.post_failed
    }
}

impl AddAssign for MigrationReport {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.uploaded += other.uploaded;
        self.upload_rejected += other.upload_rejected;
        self.posted += other.posted;
        self.post_rejected += other.post_rejected;
        self.post_failed += other.post_failed;
        self.skipped += other.skipped;
    }
}

/// Build every payload without touching the network; feature images are
/// left empty since nothing is uploaded.
pub fn plan(config: &Config, records: &[MediaRecord]) -> Vec<PostPayload> {
    records
        .iter()
        .map(|r| PostPayload::build(r, None, &config.post))
        .collect()
}

/// Run `migrate` over `records` on `workers` scoped threads. Each thread
/// takes the next unclaimed index, so at most `workers` records are in
/// flight at once and each record is handled exactly once.
pub fn run_bounded<T, F>(records: &[T], workers: usize, migrate: F) -> MigrationReport
where
    T: Sync,
    F: Fn(&T) -> RecordOutcome + Sync,
{
    let cursor = &AtomicUsize::new(0);
    let migrate = &migrate;
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers.max(1))
            .map(|_| {
                scope.spawn(move || {
                    let mut report = MigrationReport::default();
                    loop {
                        let i = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(record) = records.get(i) else { break };
                        report.record(&migrate(record));
                    }
                    report
                })
            })
            .collect();

        let mut total = MigrationReport::default();
        for handle in handles {
            match handle.join() {
                Ok(report) => total += report,
                Err(_) => error!("migration worker panicked"),
            }
        }
        total
    })
}

/// Run-scoped context: the client, the configuration and the progress bar.
pub struct Migrator<'a> {
    client: &'a BlogClient,
    config: &'a Config,
    progress: ProgressBar,
}

impl<'a> Migrator<'a> {
    pub fn new(client: &'a BlogClient, config: &'a Config, progress: ProgressBar) -> Self {
        Migrator {
            client,
            config,
            progress,
        }
    }

    /// Full run: token, manifest, then every record.
    pub fn run(&self) -> Result<MigrationReport> {
        let credential = self.authenticate()?;

        let manifest = self.config.manifest_path();
        let records = read_records(&manifest)
            .with_context(|| format!("Reading export manifest {}", manifest.display()))?;
        info!(count = records.len(), manifest = %manifest.display(), "loaded export");

        let report = self.migrate_records(&credential, &records);
        self.progress.finish_and_clear();
        Ok(report)
    }

    /// Obtain the bearer token. Errors in the answer are logged and the run
    /// goes on with whatever token came back (possibly none); only a request
    /// that could not be sent is an error.
    pub fn authenticate(&self) -> Result<Credential> {
        let auth = &self.config.auth;
        let grant = self
            .client
            .authenticate(
                &auth.username,
                &auth.password,
                &auth.client_id,
                &auth.client_secret,
            )
            .context("Failed to request access token")?;
        if grant.is_rejected() {
            self.log_rejection("authentication", "-", &grant.errors);
        }
        let credential = grant.credential;
        if credential.is_empty() {
            warn!("no access token received, continuing unauthenticated");
        } else {
            info!("authenticated against {}", self.client.api_url());
        }
        Ok(credential)
    }

    pub fn migrate_records(
        &self,
        credential: &Credential,
        records: &[MediaRecord],
    ) -> MigrationReport {
        self.progress.set_length(records.len() as u64);
        let workers = self.config.concurrency.max(1).min(records.len().max(1));

        let report = if workers == 1 {
            let mut report = MigrationReport::default();
            for record in records {
                report.record(&self.migrate_record(credential, record));
            }
            report
        } else {
            run_bounded(records, workers, |record| self.migrate_record(credential, record))
        };

        info!(
            total = report.total,
            uploaded = report.uploaded,
            upload_rejected = report.upload_rejected,
            posted = report.posted,
            post_rejected = report.post_rejected,
            post_failed = report.post_failed,
            skipped = report.skipped,
            "migration finished"
        );
        report
    }

    /// Upload one photo, then create its post. A rejected upload still
    /// creates the post, without a feature image.
    pub fn migrate_record(&self, credential: &Credential, record: &MediaRecord) -> RecordOutcome {
        let slug = crate::post::slug_from_path(&record.path);
        self.progress.set_message(slug.clone());
        let image_path = record.image_path(&self.config.export_dir);

        let (upload, feature_image) = match self.client.upload_image(credential, &image_path) {
            Ok(RemoteOutcome::Accepted(url)) => {
                debug!(slug = %slug, url = %url, "image uploaded");
                (Step::Accepted, Some(url))
            }
            Ok(RemoteOutcome::Rejected(errors)) => {
                self.log_rejection("upload", &slug, &errors);
                (Step::Rejected, None)
            }
            Err(e) => {
                error!(slug = %slug, "upload failed, skipping record: {}", e);
                self.progress.inc(1);
                return RecordOutcome {
                    slug,
                    upload: Step::Failed,
                    post: None,
                };
            }
        };

        let payload = PostPayload::build(record, feature_image, &self.config.post);
        let post = match self.client.create_post(credential, &payload) {
            Ok(RemoteOutcome::Accepted(created)) => {
                ui::print_post_result(&self.progress, &created);
                Step::Accepted
            }
            Ok(RemoteOutcome::Rejected(errors)) => {
                self.log_rejection("post", &slug, &errors);
                Step::Rejected
            }
            Err(e) => {
                error!(slug = %slug, "creating post failed: {}", e);
                Step::Failed
            }
        };
        self.progress.inc(1);

        RecordOutcome {
            slug,
            upload,
            post: Some(post),
        }
    }

    fn log_rejection(&self, step: &str, slug: &str, errors: &[RemoteError]) {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        if self.config.log_errors {
            warn!(step, slug, "blog returned errors: {}", joined);
        } else {
            debug!(step, slug, "blog returned errors: {}", joined);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(upload: Step, post: Option<Step>) -> RecordOutcome {
        RecordOutcome {
            slug: "x".into(),
            upload,
            post,
        }
    }

    #[test]
    fn report_counts_each_step() {
        let mut report = MigrationReport::default();
        report.record(&outcome(Step::Accepted, Some(Step::Accepted)));
        report.record(&outcome(Step::Rejected, Some(Step::Rejected)));
        report.record(&outcome(Step::Failed, None));
        report.record(&outcome(Step::Accepted, Some(Step::Failed)));

        assert_eq!(report.total, 4);
        assert_eq!(report.uploaded, 2);
        assert_eq!(report.upload_rejected, 1);
        assert_eq!(report.posted, 1);
        assert_eq!(report.post_rejected, 1);
        assert_eq!(report.post_failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.post_attempts(), 3);
    }

    #[test]
    fn reports_add_up() {
        let mut a = MigrationReport::default();
        a.record(&outcome(Step::Accepted, Some(Step::Accepted)));
        let mut b = MigrationReport::default();
        b.record(&outcome(Step::Failed, None));
        a += b;
        assert_eq!(a.total, 2);
        assert_eq!(a.posted, 1);
        assert_eq!(a.skipped, 1);
    }

    #[test]
    fn bounded_pool_caps_records_in_flight() {
        use std::time::Duration;

        let records: Vec<usize> = (0..12).collect();
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let seen = std::sync::Mutex::new(Vec::new());

        let report = run_bounded(&records, 3, |n| {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            seen.lock().unwrap().push(*n);
            in_flight.fetch_sub(1, Ordering::SeqCst);
            outcome(Step::Accepted, Some(Step::Accepted))
        });

        assert_eq!(report.total, 12);
        assert_eq!(report.posted, 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, records);
    }

    #[test]
    fn plan_builds_one_payload_per_record() {
        let config = Config::new(Default::default());
        let records: Vec<MediaRecord> = ["a/one.jpg", "two.jpg", "three.png"]
            .iter()
            .map(|p| MediaRecord {
                path: p.to_string(),
                caption: None,
                location: None,
                taken_at: "2018-03-04T05:06:07".into(),
            })
            .collect();
        let payloads = plan(&config, &records);
        let slugs: Vec<_> = payloads.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["one", "two", "three.png"]);
        assert!(payloads.iter().all(|p| p.feature_image.is_none()));
    }
}
