//! Scoped unfreeze guards for the model's three tables.
//!
//! The file, symbol and name tables of a model freeze after
//! `init_empty` (and after `deep_copy(true)`). Passes that legitimately
//! mutate a table take a guard for the tables they touch; the guard
//! restores the prior freeze state on every exit path, including
//! unwind.

use std::ops::{Deref, DerefMut};

use crate::model::ProgramModel;

/// Which tables a guard unfreezes. Combine with `union`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSet {
    pub files: bool,
    pub symbols: bool,
    pub names: bool,
}

impl TableSet {
    pub const FILES: TableSet = TableSet {
        files: true,
        symbols: false,
        names: false,
    };
    pub const SYMBOLS: TableSet = TableSet {
        files: false,
        symbols: true,
        names: false,
    };
    pub const NAMES: TableSet = TableSet {
        files: false,
        symbols: false,
        names: true,
    };
    pub const ALL: TableSet = TableSet {
        files: true,
        symbols: true,
        names: true,
    };

    pub const fn union(self, other: TableSet) -> TableSet {
        TableSet {
            files: self.files || other.files,
            symbols: self.symbols || other.symbols,
            names: self.names || other.names,
        }
    }
}

/// Lexically scoped unfreeze. Derefs to the model so call sites read
/// like plain model access.
pub struct UnfreezeGuard<'pm> {
    pm: &'pm mut ProgramModel,
    prior: (bool, bool, bool),
}

impl<'pm> UnfreezeGuard<'pm> {
    pub(crate) fn new(pm: &'pm mut ProgramModel, tables: TableSet) -> Self {
        let prior = pm.freeze_state();
        pm.set_freeze_state(
            prior.0 && !tables.files,
            prior.1 && !tables.symbols,
            prior.2 && !tables.names,
        );
        Self { pm, prior }
    }
}

impl Deref for UnfreezeGuard<'_> {
    type Target = ProgramModel;

    fn deref(&self) -> &ProgramModel {
        self.pm
    }
}

impl DerefMut for UnfreezeGuard<'_> {
    fn deref_mut(&mut self) -> &mut ProgramModel {
        self.pm
    }
}

impl Drop for UnfreezeGuard<'_> {
    fn drop(&mut self) {
        self.pm
            .set_freeze_state(self.prior.0, self.prior.1, self.prior.2);
    }
}
