use crate::error::{Result, ServiceError};
use discount_core::{Code, CodeLength, DiscountCode, Page, PageQuery, Repository, StorageError};
use discount_generator::{Generator, GeneratorError};
use jiff::Timestamp;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_GENERATION_BATCH_SIZE: usize = 512;
pub const DEFAULT_INSERT_CHUNK_SIZE: usize = 1000;

fn default_generation_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Tuning knobs for [`DiscountCodeService`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct ServiceSettings {
    /// Number of candidates generated and submitted per round of `generate`.
    #[builder(default = DEFAULT_GENERATION_BATCH_SIZE)]
    pub generation_batch_size: usize,
    /// Maximum number of codes sent to storage in one bulk insert.
    #[builder(default = DEFAULT_INSERT_CHUNK_SIZE)]
    pub insert_chunk_size: usize,
    /// Upper bound on blocking tasks used to generate one batch.
    #[builder(default = default_generation_workers())]
    pub max_generation_workers: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Result of the composite redemption flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// This call consumed the code.
    Redeemed,
    /// The code exists and had already been consumed.
    AlreadyUsed,
    /// The code is malformed or does not exist.
    Invalid,
}

/// The code lifecycle service.
///
/// Wraps a [`Repository`] and a [`Generator`]. Every operation normalizes its
/// code argument (trim + uppercase); operations acting on a single code also
/// require a length of 7 or 8, except lookup and deletion.
///
/// Every operation takes a [`CancellationToken`] which is checked before each
/// storage call and between generation batches.
#[derive(Debug)]
pub struct DiscountCodeService<R, G> {
    repository: Arc<R>,
    generator: Arc<G>,
    settings: ServiceSettings,
}

impl<R, G> Clone for DiscountCodeService<R, G> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            generator: Arc::clone(&self.generator),
            settings: self.settings.clone(),
        }
    }
}

fn ensure_active(cancel: &CancellationToken, inserted: u64) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(ServiceError::Cancelled { inserted });
    }
    Ok(())
}

/// Normalizes raw codes, drops blank entries and removes repeats while
/// keeping the first occurrence.
fn normalize_batch<I, S>(codes: I) -> Vec<Code>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    codes
        .into_iter()
        .map(|raw| Code::normalize(raw.as_ref()))
        .filter(|code| !code.is_empty())
        .filter(|code| seen.insert(code.clone()))
        .collect()
}

impl<R: Repository, G: Generator> DiscountCodeService<R, G> {
    /// Creates a service with default settings.
    pub fn new(repository: R, generator: G) -> Self {
        Self::with_settings(repository, generator, ServiceSettings::default())
    }

    pub fn with_settings(repository: R, generator: G, settings: ServiceSettings) -> Self {
        Self {
            repository: Arc::new(repository),
            generator: Arc::new(generator),
            settings,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Bulk-inserts arbitrary codes.
    ///
    /// Codes are normalized, blank entries dropped and duplicates removed.
    /// Returns `0` without touching storage when nothing is left. Codes that
    /// already exist are skipped by storage and not counted.
    #[instrument(skip(self, codes, cancel))]
    pub async fn create_many<I, S>(&self, codes: I, cancel: &CancellationToken) -> Result<u64>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let codes = normalize_batch(codes);
        if codes.is_empty() {
            return Ok(0);
        }

        let inserted = self.submit(&codes, Timestamp::now(), 0, cancel).await?;
        debug!(submitted = codes.len(), inserted, "bulk insert finished");
        Ok(inserted)
    }

    /// Generates up to `count` new codes of the given length.
    ///
    /// Works in rounds of `generation_batch_size` candidates. Each round is
    /// generated in parallel, deduplicated and submitted to storage. The loop
    /// stops once `count` codes were inserted or a round inserts nothing,
    /// so the result may be smaller than `count`; callers compare it against
    /// their request. Codes inserted before a cancellation stay persisted.
    #[instrument(skip(self, cancel))]
    pub async fn generate(
        &self,
        count: usize,
        length: CodeLength,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let target = count as u64;
        let batch_size = self.settings.generation_batch_size.max(1) as u64;
        let mut inserted = 0_u64;

        while inserted < target {
            ensure_active(cancel, inserted)?;

            let take = (target - inserted).min(batch_size) as usize;
            let candidates = self.generate_batch(take, length).await?;
            let batch = normalize_batch(candidates);

            let added = self
                .submit(&batch, Timestamp::now(), inserted, cancel)
                .await?;
            inserted += added;

            if added == 0 {
                warn!(
                    requested = count,
                    inserted, "generation batch inserted no new codes, stopping early"
                );
                break;
            }
        }

        info!(requested = count, inserted, %length, "code generation finished");
        Ok(inserted)
    }

    /// Creates a single unused code.
    ///
    /// Returns `false` when the code already exists; the stored row is left
    /// untouched.
    #[instrument(skip(self, cancel))]
    pub async fn create_one(&self, raw_code: &str, cancel: &CancellationToken) -> Result<bool> {
        let code = Code::parse(raw_code)?;
        ensure_active(cancel, 0)?;

        let record = DiscountCode::unused(code, Timestamp::now());
        match self.repository.insert(&record).await {
            Ok(()) => Ok(true),
            Err(StorageError::Conflict(existing)) => {
                debug!(code = %existing, "code already exists");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Looks up a code. The length is not validated; malformed codes are
    /// simply not found.
    #[instrument(skip(self, cancel))]
    pub async fn get(
        &self,
        raw_code: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<DiscountCode>> {
        let code = Code::normalize(raw_code);
        ensure_active(cancel, 0)?;
        Ok(self.repository.get(&code).await?)
    }

    /// Returns one page of codes, newest first.
    ///
    /// `total` is read separately from the page and may be slightly stale
    /// under concurrent writes.
    #[instrument(skip(self, cancel))]
    pub async fn list(
        &self,
        query: PageQuery,
        cancel: &CancellationToken,
    ) -> Result<Page<DiscountCode>> {
        ensure_active(cancel, 0)?;
        let (items, total) = self.repository.list(&query).await?;
        Ok(Page::new(&query, items, total))
    }

    /// Administrative override of the `used` flag.
    ///
    /// Setting it stamps `used_at` with the current time, clearing it resets
    /// `used_at`. This is not guarded against concurrent redemption.
    #[instrument(skip(self, cancel))]
    pub async fn update_used(
        &self,
        raw_code: &str,
        used: bool,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let code = Code::parse(raw_code)?;
        ensure_active(cancel, 0)?;

        let updated = self
            .repository
            .set_used(&code, used, Timestamp::now())
            .await?;
        if updated {
            info!(code = %code, used, "used flag overridden by administrator");
        }
        Ok(updated)
    }

    /// Deletes a code. Returns `true` if it existed.
    #[instrument(skip(self, cancel))]
    pub async fn delete(&self, raw_code: &str, cancel: &CancellationToken) -> Result<bool> {
        let code = Code::normalize(raw_code);
        ensure_active(cancel, 0)?;
        Ok(self.repository.delete(&code).await?)
    }

    /// Consumes an unused code in one atomic storage operation.
    ///
    /// Returns `true` only for the caller that performed the transition.
    /// Missing and already used codes yield `false`; a malformed code is an
    /// [`ServiceError::InvalidArgument`].
    #[instrument(skip(self, cancel))]
    pub async fn redeem_once(&self, raw_code: &str, cancel: &CancellationToken) -> Result<bool> {
        let code = Code::parse(raw_code)?;
        self.redeem_code(&code, cancel).await
    }

    /// Redeems a code and explains a failed attempt.
    ///
    /// A failed atomic redemption is followed by a lookup: an existing used
    /// code is [`RedeemOutcome::AlreadyUsed`], anything else, including a
    /// malformed code, is [`RedeemOutcome::Invalid`].
    #[instrument(skip(self, cancel))]
    pub async fn redeem(&self, raw_code: &str, cancel: &CancellationToken) -> Result<RedeemOutcome> {
        let code = match Code::parse(raw_code) {
            Ok(code) => code,
            Err(err) => {
                debug!(error = %err, "rejecting malformed code");
                return Ok(RedeemOutcome::Invalid);
            }
        };

        if self.redeem_code(&code, cancel).await? {
            return Ok(RedeemOutcome::Redeemed);
        }

        ensure_active(cancel, 0)?;
        let outcome = match self.repository.get(&code).await? {
            Some(record) if record.used => RedeemOutcome::AlreadyUsed,
            _ => RedeemOutcome::Invalid,
        };
        Ok(outcome)
    }

    async fn redeem_code(&self, code: &Code, cancel: &CancellationToken) -> Result<bool> {
        ensure_active(cancel, 0)?;
        let redeemed = self.repository.redeem(code, Timestamp::now()).await?;
        if redeemed {
            info!(code = %code, "code redeemed");
        }
        Ok(redeemed)
    }

    /// Sends codes to storage in chunks, checking cancellation before each.
    /// `already` is the progress made by the caller before this call.
    async fn submit(
        &self,
        codes: &[Code],
        created_at: Timestamp,
        already: u64,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let mut inserted = 0;
        for chunk in codes.chunks(self.settings.insert_chunk_size.max(1)) {
            ensure_active(cancel, already + inserted)?;
            inserted += self.repository.insert_many(chunk, created_at).await?;
        }
        Ok(inserted)
    }

    /// Generates `take` candidates on a bounded number of blocking tasks.
    async fn generate_batch(&self, take: usize, length: CodeLength) -> Result<Vec<Code>> {
        let workers = self.settings.max_generation_workers.clamp(1, take.max(1));
        let per_worker = take.div_ceil(workers);

        let mut tasks = JoinSet::new();
        let mut remaining = take;
        while remaining > 0 {
            let chunk = per_worker.min(remaining);
            remaining -= chunk;

            let generator = Arc::clone(&self.generator);
            tasks.spawn_blocking(move || {
                (0..chunk)
                    .map(|_| generator.generate(length.get()))
                    .collect::<std::result::Result<Vec<_>, GeneratorError>>()
            });
        }

        let mut codes = Vec::with_capacity(take);
        while let Some(joined) = tasks.join_next().await {
            let chunk = joined.map_err(|e| ServiceError::Worker(e.to_string()))??;
            codes.extend(chunk);
        }
        Ok(codes)
    }
}
