// src/incremental/detect.rs

//! Change detection and invalidation propagation.
//!
//! Given the current source snapshot, [`detect_changes`] decides which
//! sources must be reprocessed and deletes their stale analysis entries.
//! It never touches sources it leaves clean.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use crate::incremental::analysis::Analysis;
use crate::incremental::oracle::Oracle;

/// Per-run partition of the source snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalAnalysis {
    /// Sources that must be handed to the compiler.
    pub dirty_sources: BTreeSet<PathBuf>,
    /// Sources whose recorded artifacts are still valid.
    pub clean_sources: BTreeSet<PathBuf>,
    /// Artifacts recorded for invalidated or removed sources.
    pub stale_products: BTreeSet<PathBuf>,
    /// Sources dirty on their own (new, out of date, or hit by an external).
    pub directly_modified_count: usize,
    /// Sources dirty only because something they depend on is.
    pub indirectly_modified_count: usize,
    pub removed_sources_count: usize,
}

impl ConditionalAnalysis {
    /// Nothing to compile and nothing was removed.
    pub fn is_up_to_date(&self) -> bool {
        self.dirty_sources.is_empty() && self.removed_sources_count == 0
    }
}

/// Partition `sources` into dirty and clean, mutating `analysis` so that
/// every dirty or removed source has no entry left.
pub fn detect_changes(
    sources: &BTreeSet<PathBuf>,
    analysis: &mut Analysis,
    oracle: &dyn Oracle,
) -> ConditionalAnalysis {
    let removed: BTreeSet<PathBuf> = analysis
        .all_sources()
        .difference(sources)
        .cloned()
        .collect();
    for source in &removed {
        debug!(source = ?source, "source removed");
        analysis.remove_dependent(source);
    }

    let mut modified: BTreeSet<PathBuf> = sources
        .iter()
        .filter(|source| is_source_modified(source, analysis, oracle))
        .cloned()
        .collect();

    apply_external_changes(sources, analysis, oracle, &mut modified);

    let directly_modified_count = modified.len();

    let indirectly_modified_count = propagate(sources, analysis, &removed, &mut modified);

    let mut stale_products = BTreeSet::new();
    for source in modified.iter().chain(removed.iter()) {
        if let Some(products) = analysis.products(source) {
            stale_products.extend(products.iter().cloned());
        }
        analysis.remove_source(source);
    }

    let clean_sources: BTreeSet<PathBuf> = sources.difference(&modified).cloned().collect();

    info!(
        dirty = modified.len(),
        clean = clean_sources.len(),
        direct = directly_modified_count,
        indirect = indirectly_modified_count,
        removed = removed.len(),
        "change detection finished"
    );

    ConditionalAnalysis {
        dirty_sources: modified,
        clean_sources,
        stale_products,
        directly_modified_count,
        indirectly_modified_count,
        removed_sources_count: removed.len(),
    }
}

/// New (never processed), or some artifact is missing or older than the
/// source.
fn is_source_modified(source: &Path, analysis: &Analysis, oracle: &dyn Oracle) -> bool {
    let Some(products) = analysis.products(source) else {
        debug!(source = ?source, "new source");
        return true;
    };

    let Some(source_time) = oracle.source_modified(source) else {
        debug!(source = ?source, "source timestamp unavailable; treating as modified");
        return true;
    };

    match products
        .iter()
        .find(|p| is_out_of_date(oracle.artifact_modified(p), source_time))
    {
        Some(product) => {
            debug!(source = ?source, product = ?product, "artifact missing or out of date");
            true
        }
        None => false,
    }
}

fn is_out_of_date(artifact_time: Option<SystemTime>, reference: SystemTime) -> bool {
    match artifact_time {
        Some(t) => t < reference,
        None => true,
    }
}

/// Unavailable externals invalidate all their dependents and are forgotten;
/// available ones invalidate dependents with artifacts older than the
/// external.
fn apply_external_changes(
    sources: &BTreeSet<PathBuf>,
    analysis: &mut Analysis,
    oracle: &dyn Oracle,
    modified: &mut BTreeSet<PathBuf>,
) {
    for external in analysis.all_externals() {
        let dependents: Vec<PathBuf> = analysis
            .external_dependents(&external)
            .iter()
            .filter(|s| sources.contains(*s))
            .cloned()
            .collect();

        match oracle.external_modified(&external) {
            None => {
                debug!(
                    external = ?external,
                    dependents = dependents.len(),
                    "external no longer available"
                );
                modified.extend(dependents);
                analysis.remove_external_dependency(&external);
            }
            Some(external_time) => {
                for dependent in dependents {
                    if modified.contains(&dependent) {
                        continue;
                    }
                    let stale = analysis.products(&dependent).is_some_and(|products| {
                        products
                            .iter()
                            .any(|p| is_out_of_date(oracle.artifact_modified(p), external_time))
                    });
                    if stale {
                        debug!(
                            source = ?dependent,
                            external = ?external,
                            "external newer than artifacts"
                        );
                        modified.insert(dependent);
                    }
                }
            }
        }
    }
}

/// Mark every transitive dependent of a modified or removed source as
/// modified. Returns how many sources were added.
fn propagate(
    sources: &BTreeSet<PathBuf>,
    analysis: &mut Analysis,
    removed: &BTreeSet<PathBuf>,
    modified: &mut BTreeSet<PathBuf>,
) -> usize {
    let mut worklist: Vec<PathBuf> = modified.iter().chain(removed.iter()).cloned().collect();
    let mut added = 0;

    while let Some(source) = worklist.pop() {
        for dependent in analysis.remove_dependencies(&source) {
            if sources.contains(&dependent) && modified.insert(dependent.clone()) {
                debug!(source = ?dependent, because = ?source, "invalidated by dependency");
                added += 1;
                worklist.push(dependent);
            }
        }
    }

    added
}
