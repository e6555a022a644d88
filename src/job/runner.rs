//! Per-job orchestration: scope expansion, per-city worker pool, progress
//! reporting, and cancellation — generalized from the teacher's
//! `crawl_engine::orchestrator` concurrent task pool down to one business
//! listing per unit of work instead of one page.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chromiumoxide::Page;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::browser_pool::{BrowserPool, PageVariant};
use crate::config::SharedConfig;
use crate::detail;
use crate::email;
use crate::errors::{is_connection_class_error, JobRunnerError, PipelineError};
use crate::geo;
use crate::listing;
use crate::model::{Business, EmailStatus, Job, JobId, JobProgress, JobStatus, LocationKey, ReviewTimeRange, SEARCH_TYPE};
use crate::review;
use crate::scroller;
use crate::verify::{self, DnsResolver};

use super::progress::{ProgressEvent, ProgressSink};
use super::scope::{self, Location};

const DETAIL_RACE_TIMEOUT: Duration = Duration::from_secs(25);
const MAX_DETAIL_RETRIES: u32 = 2;
const RETRY_BACKOFF_UNIT: Duration = Duration::from_millis(500);
const DEFAULT_MIN_POPULATION_FLOOR: u64 = 0;

/// Cooperative cancellation flag, polled at every suspension point the way
/// the spec's cancellation contract requires.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Shared resources a running job needs, assembled once per worker process.
pub struct JobRunnerContext {
    pub pool: Arc<BrowserPool>,
    pub config: SharedConfig,
    pub resolver: Arc<DnsResolver>,
    pub progress_sink: Arc<dyn ProgressSink>,
    pub cancellation: CancellationFlag,
}

/// Run a job to completion (or failure/cancellation), mutating `job` in
/// place. Per-city failures are logged and skipped; only a browser-pool
/// failure or explicit cancellation is job-fatal.
pub async fn run_job(job: &mut Job, ctx: &JobRunnerContext) -> Result<(), PipelineError> {
    job.status = JobStatus::Active;
    job.started_at = Some(chrono::Utc::now());

    let locations = scope::expand_scope(&job.params.scope, DEFAULT_MIN_POPULATION_FLOOR)
        .map_err(PipelineError::from)?;

    let mut collected: Vec<Business> = Vec::new();
    let mut records_remaining = job.params.max_records as i64;
    // In-job dedup: a location key seen twice (scope expansion should never
    // produce duplicates, but this is the enforcement point either way) is
    // skipped outright, and a detail URL seen twice across cities (e.g. a
    // chain with a listing in two neighboring search areas) is skipped by
    // the detail workers via `seen_urls` below.
    let mut seen_locations: HashSet<LocationKey> = HashSet::new();
    let seen_urls: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

    for location in locations {
        if records_remaining <= 0 {
            break;
        }
        if ctx.cancellation.is_cancelled() {
            return Err(cancel_job(job, ctx).await);
        }

        let location_key = LocationKey::new(&location.country, &location.state, &location.city);
        if !seen_locations.insert(location_key) {
            continue;
        }

        match run_city(job, &location, records_remaining as usize, &seen_urls, ctx).await {
            Ok(city_records) => {
                records_remaining -= city_records.len() as i64;
                collected.extend(city_records);
            }
            Err(PipelineError::Pool(e)) => {
                // The browser session itself is unrecoverable; no amount of
                // per-city skipping will help the rest of the scope either.
                return Err(PipelineError::Pool(e));
            }
            Err(e) => {
                warn!(city = %location.city, "city failed, continuing with next: {}", e);
            }
        }
    }

    collected.truncate(job.params.max_records);
    job.result = collected;
    job.metrics.data_points_collected = job.result.len();
    job.progress = job.progress.advance(JobProgress {
        percentage: 100,
        processed_listings: job.progress.processed_listings,
        total_listings: job.progress.total_listings,
        records_collected: job.result.len(),
        max_records: job.params.max_records,
    });
    job.status = JobStatus::Completed;
    job.completed_at = Some(chrono::Utc::now());
    ctx.progress_sink.emit(&job.user_id, ProgressEvent::JobUpdate { job_id: job.id, status: job.status });

    Ok(())
}

async fn cancel_job(job: &mut Job, ctx: &JobRunnerContext) -> PipelineError {
    job.status = JobStatus::Cancelled;
    job.completed_at = Some(chrono::Utc::now());
    job.error = Some(crate::model::JobError {
        message: "Job cancelled by user deletion".to_string(),
        timestamp: chrono::Utc::now(),
    });
    ctx.progress_sink.emit(&job.user_id, ProgressEvent::JobDeleted { job_id: job.id });
    PipelineError::Runner(JobRunnerError::Cancelled)
}

/// Search, scroll, harvest listings, then process detail URLs with a
/// bounded worker pool. Returns the `Business` records collected for this
/// city (already capped to `records_remaining`).
async fn run_city(
    job: &mut Job,
    location: &Location,
    records_remaining: usize,
    seen_urls: &Arc<Mutex<HashSet<String>>>,
    ctx: &JobRunnerContext,
) -> Result<Vec<Business>, PipelineError> {
    let search_location = format!("{}, {}, {}", location.city, location.state, location.country);
    let search_url = build_search_url(&job.params.keyword, location);

    let urls = {
        let guard = ctx
            .pool
            .acquire_page(PageVariant::Detail)
            .await
            .map_err(|e| PipelineError::Pool(e))?;
        let page = guard.page();

        page.goto(&search_url)
            .await
            .map_err(|e| PipelineError::Infrastructure(anyhow::anyhow!("search navigation failed: {e}")))?;
        let _ = page.wait_for_navigation().await;

        let _ = scroller::scroll_results_feed(page).await;

        let harvested = listing::harvest_listings(page, &job.params)
            .await
            .map_err(PipelineError::Infrastructure)?;

        info!(
            city = %location.city,
            pre_filter = harvested.pre_filter_count,
            surviving = harvested.urls.len(),
            "listing harvest complete"
        );
        harvested.urls
    };

    let listings_to_process = urls.len().min(records_remaining);
    if listings_to_process == 0 {
        return Ok(Vec::new());
    }

    let urls = Arc::new(urls);
    let next_index = Arc::new(AtomicUsize::new(0));
    let processed = Arc::new(AtomicUsize::new(0));
    let results: Arc<Mutex<Vec<Business>>> = Arc::new(Mutex::new(Vec::new()));

    let worker_count = ctx.config.scraper_concurrency().min(listings_to_process.max(1));
    let mut workers = Vec::with_capacity(worker_count);

    for worker_id in 0..worker_count {
        let urls = Arc::clone(&urls);
        let next_index = Arc::clone(&next_index);
        let processed = Arc::clone(&processed);
        let results = Arc::clone(&results);
        let pool = Arc::clone(&ctx.pool);
        let config = Arc::clone(&ctx.config);
        let resolver = Arc::clone(&ctx.resolver);
        let progress_sink = Arc::clone(&ctx.progress_sink);
        let cancellation = ctx.cancellation.clone();
        let user_id = job.user_id.clone();
        let job_id = job.id;
        let keyword = job.params.keyword.clone();
        let search_location = search_location.clone();
        let is_extract_email = job.params.is_extract_email;
        let is_validate = job.params.is_validate;
        let only_without_website = job.params.only_without_website;
        let review_time_range = job.params.review_time_range;
        let max_records = job.params.max_records;
        let seen_urls = Arc::clone(seen_urls);

        workers.push(tokio::spawn(async move {
            detail_worker(DetailWorkerArgs {
                worker_id,
                urls,
                next_index,
                processed,
                results,
                listings_to_process,
                pool,
                config,
                resolver,
                progress_sink,
                cancellation,
                user_id,
                job_id,
                keyword,
                search_location,
                is_extract_email,
                is_validate,
                only_without_website,
                review_time_range,
                max_records,
                seen_urls,
            })
            .await
        }));
    }

    for worker in workers {
        if let Err(e) = worker.await {
            warn!("detail worker panicked: {}", e);
        }
    }

    let mut city_records = Arc::try_unwrap(results).map(Mutex::into_inner).unwrap_or_default();
    city_records.truncate(records_remaining);
    Ok(city_records)
}

struct DetailWorkerArgs {
    worker_id: usize,
    urls: Arc<Vec<String>>,
    next_index: Arc<AtomicUsize>,
    processed: Arc<AtomicUsize>,
    results: Arc<Mutex<Vec<Business>>>,
    listings_to_process: usize,
    pool: Arc<BrowserPool>,
    config: SharedConfig,
    resolver: Arc<DnsResolver>,
    progress_sink: Arc<dyn ProgressSink>,
    cancellation: CancellationFlag,
    user_id: String,
    job_id: JobId,
    keyword: String,
    search_location: String,
    is_extract_email: bool,
    is_validate: bool,
    only_without_website: bool,
    review_time_range: Option<ReviewTimeRange>,
    max_records: usize,
    seen_urls: Arc<Mutex<HashSet<String>>>,
}

/// One worker owns a single persistent acquired page for its whole run,
/// recreating it only after a connection-class failure.
async fn detail_worker(args: DetailWorkerArgs) {
    let DetailWorkerArgs {
        worker_id,
        urls,
        next_index,
        processed,
        results,
        listings_to_process,
        pool,
        config,
        resolver,
        progress_sink,
        cancellation,
        user_id,
        job_id,
        keyword,
        search_location,
        is_extract_email,
        is_validate,
        only_without_website,
        review_time_range,
        max_records,
        seen_urls,
    } = args;

    let mut guard = match pool.acquire_page(PageVariant::Detail).await {
        Ok(g) => Some(g),
        Err(e) => {
            warn!(worker_id, "detail worker could not acquire initial page: {}", e);
            return;
        }
    };

    loop {
        if cancellation.is_cancelled() {
            return;
        }

        let idx = next_index.fetch_add(1, Ordering::SeqCst);
        if idx >= listings_to_process {
            return;
        }
        let url = urls[idx].clone();

        let already_seen = {
            let mut seen = seen_urls.lock().await;
            !seen.insert(url.clone())
        };
        if already_seen {
            let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
            report_progress_if_due(done, listings_to_process, &results, false, &progress_sink, &user_id, job_id, max_records).await;
            continue;
        }

        let mut attempt = 0u32;
        let mut detail_record: Option<detail::DetailRecord> = None;

        loop {
            if guard.is_none() {
                match pool.acquire_page(PageVariant::Detail).await {
                    Ok(g) => guard = Some(g),
                    Err(e) => {
                        warn!(worker_id, url = %url, "failed to recreate page: {}", e);
                        break;
                    }
                }
            }

            let page = guard.as_ref().expect("populated above").page();
            let attempt_result = tokio::time::timeout(DETAIL_RACE_TIMEOUT, detail::extract_detail(page, &url)).await;

            match attempt_result {
                Ok(Ok(Some(record))) => {
                    detail_record = Some(record);
                    break;
                }
                Ok(Ok(None)) => break,
                Ok(Err(e)) if is_connection_class_error(&e.to_string()) && attempt < MAX_DETAIL_RETRIES => {
                    debug!(worker_id, url = %url, attempt, "connection-class error, recreating page: {}", e);
                    if let Some(g) = guard.take() {
                        g.close().await;
                    }
                    attempt += 1;
                    tokio::time::sleep(RETRY_BACKOFF_UNIT * attempt).await;
                }
                Ok(Err(_)) => break,
                Err(_) if attempt < MAX_DETAIL_RETRIES => {
                    debug!(worker_id, url = %url, attempt, "detail extraction timed out, recreating page");
                    if let Some(g) = guard.take() {
                        g.close().await;
                    }
                    attempt += 1;
                    tokio::time::sleep(RETRY_BACKOFF_UNIT * attempt).await;
                }
                Err(_) => break,
            }
        }

        let mut record_added = false;
        if let (Some(detail_record), Some(page_guard)) = (detail_record, guard.as_ref()) {
            if detail::passes_policy_filters(detail_record.website.as_deref(), only_without_website, is_extract_email) {
                let business = build_business(
                    detail_record,
                    &url,
                    &keyword,
                    &search_location,
                    is_extract_email,
                    is_validate,
                    review_time_range,
                    page_guard.page(),
                    &pool,
                    &config,
                    &resolver,
                )
                .await;

                let mut guard_vec = results.lock().await;
                if guard_vec.len() < max_records {
                    guard_vec.push(business);
                    record_added = true;
                }
                drop(guard_vec);
            }
        }

        let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
        report_progress_if_due(done, listings_to_process, &results, record_added, &progress_sink, &user_id, job_id, max_records).await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn build_business(
    detail_record: detail::DetailRecord,
    detail_url: &str,
    keyword: &str,
    search_location: &str,
    is_extract_email: bool,
    is_validate: bool,
    review_time_range: Option<ReviewTimeRange>,
    detail_page: &Page,
    pool: &Arc<BrowserPool>,
    config: &SharedConfig,
    resolver: &Arc<DnsResolver>,
) -> Business {
    let (filtered_reviews, filtered_review_count) = if let Some(range) = review_time_range {
        let raw = review::extract_reviews(detail_page).await;
        let (kept, pre_count) = review::apply_time_range(raw, &range);
        (Some(kept), Some(pre_count))
    } else {
        (None, None)
    };

    let mut emails = Vec::new();
    let mut email_status = Vec::new();
    let mut email_verification = None;

    if is_extract_email {
        if let Some(website) = detail_record.website.as_deref() {
            let harvest = email::harvest_site_render(pool, website).await;
            emails = harvest.emails;

            if is_validate && !emails.is_empty() {
                let verification = verify::verify_emails(resolver.as_ref(), config.smtp(), &emails).await;
                email_status = verification.details.iter().map(|d| d.status).collect();
                email_verification = Some(verification);
            } else {
                email_status = vec![EmailStatus::Unverified; emails.len()];
            }
        }
    }

    Business {
        name: detail_record.name,
        phone: detail_record.phone,
        website: detail_record.website,
        address: detail_record.address,
        latitude: detail_record.latitude,
        longitude: detail_record.longitude,
        rating: detail_record.rating,
        rating_count: detail_record.rating_count,
        category: detail_record.category,
        search_term: keyword.to_string(),
        search_type: SEARCH_TYPE.to_string(),
        search_location: search_location.to_string(),
        detail_url: detail_url.to_string(),
        emails,
        email_status,
        email_verification,
        filtered_reviews,
        filtered_review_count,
    }
}

async fn report_progress_if_due(
    processed_listings: usize,
    total_listings: usize,
    results: &Arc<Mutex<Vec<Business>>>,
    record_added: bool,
    progress_sink: &Arc<dyn ProgressSink>,
    user_id: &str,
    job_id: JobId,
    max_records: usize,
) {
    let tenth = (total_listings / 10).max(1);
    let records_collected = results.lock().await.len();
    let is_tenth_boundary = processed_listings % tenth == 0;
    let is_last = processed_listings == total_listings;

    // Every tenth of `listingsToProcess`, on the last URL, and at least after
    // every record collected — a record on an off-boundary URL must still
    // be observable immediately, not held back for the next tenth.
    if is_tenth_boundary || is_last || record_added {
        let percentage = ((100 * records_collected) / max_records.max(1)).min(100) as u8;
        let progress = JobProgress {
            percentage,
            processed_listings,
            total_listings,
            records_collected,
            max_records,
        };
        progress_sink.emit(user_id, ProgressEvent::JobProgress { job_id, progress });
    }
}

fn build_search_url(keyword: &str, location: &Location) -> String {
    let query = format!("{keyword} in {}, {}, {}", location.city, location.state, location.country);
    let encoded = query.split_whitespace().collect::<Vec<_>>().join("+");
    format!("https://www.google.com/maps/search/{encoded}")
}

/// Whether a geo-resolved location is known to the catalog at all, used by
/// callers that want to validate a scope before enqueueing a job.
#[must_use]
pub fn location_is_known(country: &str, state: &str, city: &str) -> bool {
    geo::validate_city(country, state, city).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_flag_round_trips() {
        let flag = CancellationFlag::new();
        assert!(!flag.is_cancelled());
        flag.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn search_url_joins_location_with_plus_signs() {
        let location = Location { country: "US".to_string(), state: "CA".to_string(), city: "San Francisco".to_string() };
        let url = build_search_url("coffee shop", &location);
        assert!(url.contains("coffee+shop+in+San+Francisco,+CA,+US"));
    }
}
