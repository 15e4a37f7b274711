//! Error classes, grouped by the pass that raises them.

use super::ErrorClass;

pub mod parser {
    use super::ErrorClass;

    pub const SYNTAX_ERROR: ErrorClass = ErrorClass::new(2001);
}

pub mod namer {
    use super::ErrorClass;

    /// A method re-entered with a different arity.
    pub const METHOD_REDEFINED: ErrorClass = ErrorClass::new(4010);
    /// Two method arguments sharing a name.
    pub const DUPLICATE_VARIABLE: ErrorClass = ErrorClass::new(4012);
}

pub mod resolver {
    use super::ErrorClass;

    pub const UNRESOLVED_CONSTANT: ErrorClass = ErrorClass::new(5001);
    /// A class given two different superclasses.
    pub const PARENT_REDEFINED: ErrorClass = ErrorClass::new(5012);
}

pub mod infer {
    use super::ErrorClass;

    pub const WRONG_ARG_COUNT: ErrorClass = ErrorClass::new(7001);
    pub const ARGUMENT_MISMATCH: ErrorClass = ErrorClass::new(7002);
    pub const UNKNOWN_METHOD: ErrorClass = ErrorClass::new(7003);
}
