use std::io::{self, BufRead, Write};

use livesync_core::{Conflict, ConflictResolver, Resolution, SyncError};

/// Asks the operator which side wins a join conflict.
pub struct PromptResolver<R, W> {
    input: R,
    output: W,
}

impl PromptResolver<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptResolver<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, conflict: &Conflict<'_>) -> io::Result<String> {
        writeln!(
            self.output,
            "{} differs from the session content.",
            conflict.path.display()
        )?;
        write!(self.output, "Use (r)emote or keep (l)ocal? ")?;
        self.output.flush()?;

        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(answer)
    }
}

impl<R: BufRead, W: Write> ConflictResolver for PromptResolver<R, W> {
    fn resolve(&mut self, conflict: &Conflict<'_>) -> Result<Resolution, SyncError> {
        let answer = self
            .ask(conflict)
            .map_err(|e| SyncError::Prompt(e.to_string()))?;
        Ok(Resolution::from_answer(&answer))
    }
}
