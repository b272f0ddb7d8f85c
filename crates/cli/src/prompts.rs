use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result, bail};

/// Gate between the discover and generate phases. `assume_yes` (`--yes`)
/// answers without asking; otherwise a terminal is required.
pub fn confirm(message: &str, assume_yes: bool) -> Result<bool> {
  if assume_yes {
    return Ok(true);
  }

  if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
    bail!("cannot ask \"{message}\": stdin is not a terminal. Re-run with --yes to proceed.");
  }

  ask(message, &mut io::stdin().lock(), &mut io::stderr())
}

fn ask(message: &str, input: &mut impl BufRead, prompt: &mut impl Write) -> Result<bool> {
  write!(prompt, "{message} [y/N] ")?;
  prompt.flush()?;

  let mut answer = String::new();
  input.read_line(&mut answer).context("failed to read confirmation")?;
  Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
  let answer = answer.trim();
  answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}
