use std::io::{BufRead, Write};

use crate::{
    answer::{Answerer, format_sources},
    error::Result,
};

const PROMPT: &str = "\nquestion> ";

/// Ask questions until a blank line or end of input.
///
/// Each non-blank line is answered with [`Answerer::answer_question`] and
/// the answer, followed by its sources when there are any, is written to
/// `output`. Returns the number of questions answered.
pub fn run<R: BufRead, W: Write>(
    answerer: &Answerer<'_>,
    top_k: usize,
    mut input: R,
    output: &mut W,
) -> Result<usize> {
    let mut answered = 0;
    let mut line = String::new();

    loop {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        let answer = answerer.answer_question(question, top_k);
        answered += 1;

        writeln!(output, "\n--- answer ---")?;
        writeln!(output, "{}", answer.text)?;
        if !answer.sources.is_empty() {
            writeln!(output, "\n(sources) {}", format_sources(&answer.sources))?;
        }
    }

    Ok(answered)
}
