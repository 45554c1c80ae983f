//! Literal string substitutions applied before dispatch.

use crate::toolbox::{Command, CmdError};
use serde::{Deserialize, Serialize};

/// Replaces every occurrence of each `[from, to]` pair, in configured
/// order. Pairs of any other length are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct TranslateSequences {
    pub sequences: Vec<Vec<String>>,
}

impl TranslateSequences {
    pub fn transform(&self, cmd: &Command) -> Result<Command, CmdError> {
        let mut out = cmd.clone();
        for pair in &self.sequences {
            if let [from, to] = pair.as_slice() {
                out.content = out.content.replace(from, to);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_apply_in_order() {
        let filter = TranslateSequences {
            sequences: vec![
                vec!["#/".to_string(), "|".to_string()],
                vec!["|".to_string(), "!".to_string()],
            ],
        };
        let out = filter.transform(&Command::new("a #/ b", 5)).unwrap();
        assert_eq!(out.content, "a ! b");
    }

    #[test]
    fn malformed_pairs_are_ignored() {
        let filter = TranslateSequences {
            sequences: vec![
                vec!["only-one".to_string()],
                vec!["x".to_string(), "y".to_string(), "z".to_string()],
                vec!["a".to_string(), "b".to_string()],
            ],
        };
        let out = filter.transform(&Command::new("a only-one a", 5)).unwrap();
        assert_eq!(out.content, "b only-one b");
    }
}
