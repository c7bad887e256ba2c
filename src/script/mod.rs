//! # Script - the retina description language
//!
//! A script is read line by line. Every semantic line starts with `retina`
//! followed by a verb:
//!
//! ```text
//! retina.TempStep('1')
//! retina.Input('impulse',{'start','0','stop','5','amplitude','10','offset','0','sizeX','2','sizeY','2'})
//! retina.Create('LinearFilter','L1',{'tau','2','Exp','0'})
//! retina.Connect('L_cones','L1','Current')
//! retina.Connect('L1','Output','Current')
//! ```
//!
//! The call-like form above and the bare form (`retina TempStep 1`) are
//! equivalent. `#` starts a comment.

mod interpreter;
mod tokenizer;

pub use interpreter::Interpreter;
pub use tokenizer::tokenize;

use std::fmt;

use crate::error::RetinaError;

/// A malformed script line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptError {
    /// 1-based line number
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Incorrect syntax in line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ScriptError {}

impl From<ScriptError> for RetinaError {
    fn from(e: ScriptError) -> Self {
        RetinaError::Script {
            line: e.line,
            message: e.message,
        }
    }
}
