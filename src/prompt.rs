//! Line prompts that also accept piped answers.

use std::io::{self, BufRead, IsTerminal, Write};

use dialoguer::{Input, Password};

use crate::error::ChordError;

/// Asks one question. On a terminal this goes through `dialoguer`; when
/// stdin or stderr is redirected the answer is read as a plain line.
pub fn ask(prompt: &str, secret: bool) -> Result<String, ChordError> {
    if io::stdin().is_terminal() && io::stderr().is_terminal() {
        let answer = if secret {
            Password::new().with_prompt(prompt).interact()?
        } else {
            Input::<String>::new().with_prompt(prompt).interact_text()?
        };
        return Ok(answer);
    }

    let mut stderr = io::stderr();
    write!(stderr, "{prompt}: ")?;
    stderr.flush()?;
    read_answer(&mut io::stdin().lock())
}

pub fn read_answer(reader: &mut impl BufRead) -> Result<String, ChordError> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|error| ChordError::Input(error.to_string()))?;
    if read == 0 {
        return Err(ChordError::Input("unexpected end of input".to_string()));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn piped_answers_are_read_line_by_line() {
        let mut input = Cursor::new("1\r\nme@example.com\n");
        assert_eq!(read_answer(&mut input).expect("first"), "1");
        assert_eq!(read_answer(&mut input).expect("second"), "me@example.com");
    }

    #[test]
    fn closed_input_is_input_error() {
        let mut input = Cursor::new("");
        assert!(matches!(read_answer(&mut input), Err(ChordError::Input(_))));
    }

    #[test]
    fn last_line_without_newline_is_accepted() {
        let mut input = Cursor::new("2");
        assert_eq!(read_answer(&mut input).expect("answer"), "2");
    }
}
