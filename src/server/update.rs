//! The update coordinator and the fingerprint engine.
//!
//! A batch of changed files takes the fast path iff every file is
//! already known and structurally equal to its stored fingerprint;
//! otherwise the whole model is rebuilt on the slow path. Fingerprints
//! are computed per file in isolation on the worker pool.

use std::io::{BufRead, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};

use crate::errors::ErrorQueue;
use crate::model::file::{FileRef, SourceFile, SourceKind};
use crate::model::unfreeze::TableSet;
use crate::model::ProgramModel;
use crate::pipeline;
use crate::workers::PROGRESS_REFRESH_TIME_MILLIS;

use super::LspLoop;

/// Fingerprint one file in isolation: fresh silenced model, enter the
/// file, index → resolve (no typecheck), hash. A panic anywhere in the
/// pipeline reports 0, which forces at most a slow path later.
fn compute_one_hash(file: &Arc<SourceFile>) -> u32 {
    let file = Arc::clone(file);
    catch_unwind(AssertUnwindSafe(move || {
        let queue = Arc::new(ErrorQueue::new());
        let mut scratch = ProgramModel::new(Arc::clone(&queue));
        scratch.init_empty();
        scratch.silence_errors = true;
        let fref = {
            let mut scratch = scratch.unfreeze(TableSet::ALL);
            scratch.enter_file(file)
        };
        pipeline::index_one(&mut scratch, fref);
        pipeline::resolve(&mut scratch, &[fref]);
        let hash = scratch.structural_hash();
        // Fingerprinting must leave no trace on any diagnostic stream.
        if scratch.silence_errors {
            queue.drain_all();
        }
        hash
    }))
    .unwrap_or(0)
}

impl<R: BufRead, W: Write> LspLoop<R, W> {
    /// Admit or replace one file in the initial model and re-index it.
    /// Returns the file's ref.
    pub(crate) fn add_new_file(&mut self, file: &Arc<SourceFile>) -> FileRef {
        let mut fref = self.initial.find_file_by_path(file.path());
        if fref.exists() {
            self.initial.replace_file(fref, Arc::clone(file));
        } else {
            let mut initial = self.initial.unfreeze(TableSet::FILES);
            fref = initial.enter_file(Arc::clone(file));
        }
        pipeline::index_one(&mut self.initial, fref);
        fref
    }

    /// One structural fingerprint per input entry, at the original
    /// indices. Empty entries contribute 0. Deterministic and
    /// order-independent; all side effects stay on per-job scratch
    /// models.
    pub fn compute_state_hashes(&self, files: &[Option<Arc<SourceFile>>]) -> Vec<u32> {
        let mut res = vec![0u32; files.len()];
        if files.is_empty() {
            return res;
        }

        let (job_tx, job_rx) = bounded::<usize>(files.len());
        for i in 0..files.len() {
            let _ = job_tx.send(i);
        }
        drop(job_tx);

        let (res_tx, res_rx) = bounded::<Vec<(usize, u32)>>(files.len());
        let files_shared: Arc<Vec<Option<Arc<SourceFile>>>> = Arc::new(files.to_vec());
        self.workers.multiplex_job(move || {
            let mut thread_result = Vec::new();
            while let Ok(job) = job_rx.try_recv() {
                let hash = match &files_shared[job] {
                    None => 0,
                    Some(file) => compute_one_hash(file),
                };
                thread_result.push((job, hash));
            }
            if !thread_result.is_empty() {
                let _ = res_tx.send(thread_result);
            }
        });

        let mut collected = 0;
        while collected < files.len() {
            match res_rx.recv_timeout(Duration::from_millis(PROGRESS_REFRESH_TIME_MILLIS)) {
                Ok(batch) => {
                    collected += batch.len();
                    for (idx, hash) in batch {
                        res[idx] = hash;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::trace!(pending = files.len() - collected, "fingerprinting");
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        res
    }

    /// The fast/slow decision. Files are processed in input order; the
    /// first slow-path trigger does not short-circuit the loop, so
    /// every file's stored fingerprint stays accurate for subsequent
    /// batches.
    pub fn try_fast_path(&mut self, changed_files: Vec<Option<Arc<SourceFile>>>) {
        tracing::info!(
            changes = changed_files.len(),
            "checking whether the fast path applies"
        );
        let hashes = self.compute_state_hashes(&changed_files);
        debug_assert_eq!(changed_files.len(), hashes.len());

        let mut good = true;
        let mut subset = Vec::new();
        for (i, file) in changed_files.iter().enumerate() {
            let Some(file) = file else { continue };
            let was_files = self.initial.files_used();
            let fref = self.add_new_file(file);
            if was_files != self.initial.files_used() {
                tracing::info!(path = file.path(), "taking the slow path: new file");
                good = false;
                if self.global_state_hashes.len() <= fref.id() {
                    self.global_state_hashes.resize(fref.id() + 1, 0);
                }
                self.global_state_hashes[fref.id()] = hashes[i];
            } else {
                if hashes[i] != self.global_state_hashes[fref.id()] {
                    tracing::info!(path = file.path(), "taking the slow path: changed definitions");
                    good = false;
                    self.global_state_hashes[fref.id()] = hashes[i];
                }
                if good {
                    self.final_model.replace_file(fref, Arc::clone(file));
                }
                subset.push(fref);
            }
        }

        if good {
            tracing::info!("taking the fast path");
            self.invalidate_errors_for(&subset);
            // Reuse the resolved final model: re-index only the subset
            // into it, then resolve and typecheck just those trees.
            pipeline::index(&mut self.final_model, &subset, &self.workers);
            pipeline::resolve(&mut self.final_model, &subset);
            pipeline::typecheck(&mut self.final_model, &subset);
        } else {
            self.run_slow_path(changed_files);
        }
        debug_assert!(self.global_state_hashes.len() >= self.initial.files_used());
    }

    /// Full rebuild: re-add the changed files, deep-copy the initial
    /// model (trees included) and run resolve → typecheck over
    /// everything.
    pub fn run_slow_path(&mut self, changed_files: Vec<Option<Arc<SourceFile>>>) {
        tracing::info!("taking the slow path");
        self.invalidate_all_errors();

        for file in changed_files.iter().flatten() {
            self.add_new_file(file);
        }

        self.final_model = self.initial.deep_copy(true);
        let all = self.final_model.tree_refs();
        pipeline::resolve(&mut self.final_model, &all);
        pipeline::typecheck(&mut self.final_model, &all);
    }

    /// Populate the initial model from the configured inputs and index
    /// the batch on the worker pool. Runs once, at `initialized`.
    pub(crate) fn reindex_from_file_system(&mut self) {
        let payloads: Vec<_> = self.opts.payloads.clone();
        let inputs: Vec<_> = self.opts.inputs.clone();
        let mut entered = Vec::new();
        for (paths, kind) in [(payloads, SourceKind::Payload), (inputs, SourceKind::Normal)] {
            for path in paths {
                let on_disk = match &self.opts.root {
                    Some(root) if path.is_relative() => root.join(&path),
                    _ => path.clone(),
                };
                match std::fs::read_to_string(&on_disk) {
                    Ok(content) => {
                        let file = Arc::new(SourceFile::new(
                            path.to_string_lossy().into_owned(),
                            content,
                            kind,
                        ));
                        let known = self.initial.find_file_by_path(file.path());
                        if known.exists() {
                            self.initial.replace_file(known, file);
                            entered.push(known);
                        } else {
                            let mut initial = self.initial.unfreeze(TableSet::FILES);
                            entered.push(initial.enter_file(file));
                        }
                    }
                    Err(err) => {
                        tracing::warn!(path = %on_disk.display(), %err, "skipping unreadable input");
                    }
                }
            }
        }
        pipeline::index(&mut self.initial, &entered, &self.workers);
    }
}
