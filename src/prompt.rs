use std::io::{self, BufRead, Write};

pub const CONFIRM_PROMPT: &str = "⚠️  This will modify source files. Continue? [y/N]: ";

/// Asks a yes/no question. Only `y` or `yes` (any case) counts as yes; an
/// empty answer or end of input is a no.
pub fn confirm<R: BufRead, W: Write>(mut reader: R, mut writer: W, question: &str) -> io::Result<bool> {
    write!(writer, "{question}")?;
    writer.flush()?;

    let mut answer = String::new();
    if reader.read_line(&mut answer)? == 0 {
        writeln!(writer)?;
        return Ok(false);
    }

    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// [`confirm`] on the process's stdin and stdout.
pub fn confirm_on_terminal(question: &str) -> io::Result<bool> {
    confirm(io::stdin().lock(), io::stdout(), question)
}
