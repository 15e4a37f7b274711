//! The pipeline: index (parse + name), resolve, typecheck.
//!
//! Every pass takes the model explicitly; none touches globals. The
//! parallel stage of indexing parses on the worker pool and merges
//! into the caller's model single-threaded.

mod infer;
mod namer;
mod resolver;

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};

use crate::errors::{codes, BasicError, Diagnostic};
use crate::model::file::FileRef;
use crate::model::unfreeze::TableSet;
use crate::model::ProgramModel;
use crate::syntax::ast::IndexedTree;
use crate::syntax::parser::{self, Parse};
use crate::workers::{WorkerPool, PROGRESS_REFRESH_TIME_MILLIS};

/// Parse and name a single file, installing its indexed tree.
pub fn index_one(pm: &mut ProgramModel, fref: FileRef) {
    let content = Arc::clone(pm.file(fref).content());
    let parse = parser::parse(&content, fref);
    finish_index(pm, fref, parse);
}

/// Index a batch of files: parse in parallel on the worker pool, then
/// merge (diagnostics, naming, tree install) on the calling thread in
/// file-id order.
pub fn index(pm: &mut ProgramModel, frefs: &[FileRef], workers: &WorkerPool) {
    if frefs.is_empty() {
        return;
    }
    let (job_tx, job_rx) = bounded::<(FileRef, Arc<str>)>(frefs.len());
    for &fref in frefs {
        let _ = job_tx.send((fref, Arc::clone(pm.file(fref).content())));
    }
    drop(job_tx);

    let (res_tx, res_rx) = bounded::<(FileRef, Parse)>(frefs.len());
    workers.multiplex_job(move || {
        while let Ok((fref, content)) = job_rx.try_recv() {
            let parse = parser::parse(&content, fref);
            if res_tx.send((fref, parse)).is_err() {
                break;
            }
        }
    });

    let mut parses = Vec::with_capacity(frefs.len());
    while parses.len() < frefs.len() {
        match res_rx.recv_timeout(Duration::from_millis(PROGRESS_REFRESH_TIME_MILLIS)) {
            Ok(item) => parses.push(item),
            Err(RecvTimeoutError::Timeout) => {
                tracing::trace!(pending = frefs.len() - parses.len(), "indexing");
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    parses.sort_by_key(|(fref, _)| fref.id());
    for (fref, parse) in parses {
        finish_index(pm, fref, parse);
    }
}

fn finish_index(pm: &mut ProgramModel, fref: FileRef, parse: Parse) {
    for error in &parse.errors {
        pm.errors.push_diagnostic(Diagnostic::Basic(BasicError {
            loc: error.loc,
            what: codes::parser::SYNTAX_ERROR,
            message: error.message.clone(),
        }));
    }
    let mut tree = IndexedTree {
        fref,
        defs: parse.defs,
    };
    {
        let mut pm = pm.unfreeze(TableSet::SYMBOLS.union(TableSet::NAMES));
        namer::name_tree(&mut pm, &mut tree);
    }
    pm.set_tree(fref, tree);
}

/// Resolve constants and superclasses in the given files' trees.
pub fn resolve(pm: &mut ProgramModel, frefs: &[FileRef]) {
    let mut pm = pm.unfreeze(TableSet::SYMBOLS);
    for &fref in frefs {
        if let Some(mut tree) = pm.take_tree(fref) {
            resolver::resolve_tree(&mut pm, &mut tree);
            pm.set_tree(fref, tree);
        }
    }
}

/// Typecheck the given files' trees: result types first (so later
/// bodies see earlier signatures), then the checking sweep.
pub fn typecheck(pm: &mut ProgramModel, frefs: &[FileRef]) {
    {
        let mut pm = pm.unfreeze(TableSet::SYMBOLS);
        for &fref in frefs {
            if let Some(tree) = pm.take_tree(fref) {
                infer::infer_result_types(&mut pm, &tree);
                pm.set_tree(fref, tree);
            }
        }
    }
    for &fref in frefs {
        if let Some(tree) = pm.take_tree(fref) {
            infer::check_tree(pm, &tree);
            pm.set_tree(fref, tree);
        }
    }
}
