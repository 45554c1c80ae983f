//! Output shaping: character classes, whitespace, length windows.

use crate::toolbox::{CmdError, CommandResult};
use serde::{Deserialize, Serialize};

/// Shapes both `output` and `combined_output` of a result. Enabled
/// operations apply in a fixed order: keep visible 7-bit characters,
/// compress whitespace runs, collapse line breaks, trim, and slice text
/// extending past the `[begin_position, begin_position + max_length)`
/// window. Applying the same filter twice yields the same text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct LintText {
    pub trim_spaces: bool,
    pub compress_spaces: bool,
    pub compress_to_single_line: bool,
    #[serde(rename = "KeepVisible7BitCharOnly")]
    pub keep_visible_7bit_char_only: bool,
    /// Has no effect without a `max_length`.
    pub begin_position: usize,
    /// 0 disables the window entirely.
    pub max_length: usize,
}

impl LintText {
    /// Copy of this filter with the slice window replaced, used for the
    /// in-band PLT override.
    pub fn with_window(&self, begin_position: usize, max_length: usize) -> Self {
        Self {
            begin_position,
            max_length,
            ..self.clone()
        }
    }

    pub fn transform(&self, result: &mut CommandResult) -> Result<(), CmdError> {
        result.output = self.lint(&result.output);
        result.combined_output = self.lint(&result.combined_output);
        Ok(())
    }

    fn lint(&self, text: &str) -> String {
        let mut shaped: String = if self.keep_visible_7bit_char_only {
            text.chars()
                .map(|c| {
                    if c.is_ascii() && (c.is_ascii_graphic() || c.is_ascii_whitespace()) {
                        c
                    } else {
                        '?'
                    }
                })
                .collect()
        } else {
            text.to_string()
        };
        if self.compress_spaces {
            let mut compressed = String::with_capacity(shaped.len());
            let mut run_break = false;
            let mut in_run = false;
            for c in shaped.chars() {
                if c.is_whitespace() {
                    in_run = true;
                    run_break |= c == '\n';
                    continue;
                }
                if in_run {
                    // A run that crossed a line break stays a line break so
                    // single-line collapsing still sees it.
                    compressed.push(if run_break { '\n' } else { ' ' });
                    in_run = false;
                    run_break = false;
                }
                compressed.push(c);
            }
            if in_run {
                compressed.push(if run_break { '\n' } else { ' ' });
            }
            shaped = compressed;
        }
        if self.compress_to_single_line {
            shaped = shaped
                .replace("\r\n", "\n")
                .split('\n')
                .collect::<Vec<_>>()
                .join(";");
        }
        if self.trim_spaces {
            shaped = shaped.trim().to_string();
        }
        if self.max_length > 0 {
            // Slice only text that still extends past the window, so a
            // second application is always the identity.
            let count = shaped.chars().count();
            if count > self.begin_position + self.max_length {
                shaped = shaped
                    .chars()
                    .skip(self.begin_position)
                    .take(self.max_length)
                    .collect();
            } else if count > self.max_length {
                shaped = shaped.chars().take(self.max_length).collect();
            }
        }
        shaped
    }
}
