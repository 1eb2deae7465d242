//! Interactive terminal prompts
//!
//! Generic over the reader and writer so the same code drives stdin/stdout
//! in the binary and in-memory buffers in tests.

use std::io::{self, BufRead, Stdin, StdinLock, Stdout, Write};

use crate::error::PromptError;

/// Upper bound for the ladder depth prompt
pub const MAX_ORDER_LEVELS: usize = 10;

pub struct Prompter<R, W> {
    reader: R,
    writer: W,
}

impl Prompter<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        let stdin: Stdin = io::stdin();
        Self::new(stdin.lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Print `question` and read one trimmed line; end of input is an error
    fn ask(&mut self, question: &str) -> Result<String, PromptError> {
        write!(self.writer, "{}", question)?;
        self.writer.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(PromptError::Empty);
        }
        Ok(line.trim().to_string())
    }

    pub fn ask_token(&mut self) -> Result<String, PromptError> {
        let token = self.ask("Enter the token: ")?;
        if token.is_empty() {
            return Err(PromptError::Empty);
        }
        Ok(token)
    }

    /// List `names` 1-based and return the 0-based index picked
    pub fn select_bot(&mut self, names: &[&str]) -> Result<usize, PromptError> {
        for (i, name) in names.iter().enumerate() {
            writeln!(self.writer, "{}: {}", i + 1, name)?;
        }
        writeln!(self.writer, "{}", "=".repeat(50))?;

        let answer = self.ask("Enter the index of the bot you're looking for: ")?;
        let index: i64 = answer
            .parse()
            .map_err(|_| PromptError::NotAnInteger(answer.clone()))?;

        if index < 1 || index as usize > names.len() {
            return Err(PromptError::IndexOutOfRange {
                index,
                max: names.len(),
            });
        }
        let selected = (index - 1) as usize;
        writeln!(self.writer, "You selected: {}\n", names[selected])?;
        Ok(selected)
    }

    /// `y` or `Y` is yes; anything else, including empty input, is no
    pub fn confirm(&mut self, question: &str) -> Result<bool, PromptError> {
        let answer = self.ask(&format!("{} (y/n): ", question))?;
        Ok(answer.eq_ignore_ascii_case("y"))
    }

    /// Proceed unless the answer is `n` or `N`; empty input proceeds
    pub fn confirm_unless_declined(&mut self, question: &str) -> Result<bool, PromptError> {
        let answer = self.ask(&format!("{} (y/n): ", question))?;
        Ok(!answer.eq_ignore_ascii_case("n"))
    }

    pub fn ask_order_amount(&mut self) -> Result<f64, PromptError> {
        let answer = self.ask("Enter the base order amount: ")?;
        let amount: f64 = answer
            .parse()
            .map_err(|_| PromptError::NotANumber(answer.clone()))?;
        if amount.is_nan() || amount <= 0.0 {
            return Err(PromptError::NotPositive(amount));
        }
        Ok(amount)
    }

    pub fn ask_order_levels(&mut self) -> Result<usize, PromptError> {
        let answer = self.ask(&format!(
            "Enter the number of order levels (max {}): ",
            MAX_ORDER_LEVELS
        ))?;
        let levels: i64 = answer
            .parse()
            .map_err(|_| PromptError::NotAnInteger(answer.clone()))?;
        if levels < 1 || levels > MAX_ORDER_LEVELS as i64 {
            return Err(PromptError::LevelsOutOfRange {
                value: levels,
                max: MAX_ORDER_LEVELS,
            });
        }
        Ok(levels as usize)
    }

    /// Answer, or `default` when the line is blank
    pub fn ask_with_default(
        &mut self,
        question: &str,
        default: &str,
    ) -> Result<String, PromptError> {
        let answer = self.ask(question)?;
        if answer.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer)
        }
    }
}
