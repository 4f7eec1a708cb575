/*!
 * Variant-level fragment cache.
 *
 * A variant keeps the fragment of its last clean translation. Reads reuse
 * it without touching the translator; a miss translates the current markup
 * and stores the fragment only when no diagnostics were reported.
 */

use log::{debug, warn};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::database::models::VariantRecord;
use crate::database::Repository;
use crate::errors::RejectedTranslation;
use crate::translator::MarkupTranslator;

/// Fragment cache backed by the variant records themselves
#[derive(Clone)]
pub struct FragmentCache {
    /// Store the variants are persisted to
    repository: Repository,

    /// Translator run on a miss
    translator: Arc<dyn MarkupTranslator>,

    /// Cache hit counter
    hits: Arc<RwLock<usize>>,

    /// Cache miss counter
    misses: Arc<RwLock<usize>>,
}

impl FragmentCache {
    pub fn new(repository: Repository, translator: Arc<dyn MarkupTranslator>) -> Self {
        Self {
            repository,
            translator,
            hits: Arc::new(RwLock::new(0)),
            misses: Arc::new(RwLock::new(0)),
        }
    }

    /// The translator used on misses
    pub fn translator(&self) -> &Arc<dyn MarkupTranslator> {
        &self.translator
    }

    /// Fragment of the variant, translating and caching it when needed
    ///
    /// A cached fragment is trusted as is. A failure to persist a fresh
    /// fragment is logged; the fragment is still returned and the next read
    /// translates again.
    pub async fn get_or_translate(
        &self,
        variant: &mut VariantRecord,
    ) -> Result<String, RejectedTranslation> {
        if let Some(fragment) = &variant.cached_fragment {
            *self.hits.write() += 1;
            debug!("Fragment cache hit for variant {}", variant.id);
            return Ok(fragment.clone());
        }

        *self.misses.write() += 1;
        debug!("Fragment cache miss for variant {}", variant.id);

        let fragment = self
            .translator
            .translate(&variant.text)
            .into_fragment()
            .map_err(|diagnostics| RejectedTranslation {
                variant_id: variant.id.clone(),
                title: variant.title.clone(),
                diagnostics,
            })?;

        variant.cached_fragment = Some(fragment.clone());

        match self
            .repository
            .store_fragment(&variant.id, variant.revision, &fragment)
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!(
                "Variant {} changed since revision {}, fragment not cached",
                variant.id, variant.revision
            ),
            Err(e) => warn!("Failed to persist fragment of variant {}: {}", variant.id, e),
        }

        Ok(fragment)
    }

    /// Get cache statistics: (hits, misses, hit rate)
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = *self.hits.read();
        let misses = *self.misses.read();
        let total = hits + misses;

        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        (hits, misses, hit_rate)
    }
}
